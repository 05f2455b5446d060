//! Keyword and metadata driven complexity heuristic. This is the
//! no-model estimation tier and the fallback whenever the model gateway
//! is unavailable.

use rust_decimal::Decimal;

use crate::domain::estimate::Complexity;
use crate::domain::ticket::TicketSnapshot;

/// High-signal keywords, weighted x2 in the complexity score.
const HIGH_SIGNAL_KEYWORDS: [&str; 19] = [
    "react native",
    "upgrade",
    "migration",
    "objective-c",
    "swift",
    "native dependencies",
    "third party",
    "breaking changes",
    "integration",
    "api",
    "database",
    "security",
    "authentication",
    "iib",
    "sap",
    "mainframe",
    "enterprise integration",
    "cross-system",
    "multi-system",
];

/// Medium-signal keywords, weighted x1.
const MEDIUM_SIGNAL_KEYWORDS: [&str; 10] = [
    "crud",
    "form",
    "validation",
    "report",
    "dashboard",
    "ui",
    "frontend",
    "backend",
    "update",
    "dependency",
];

/// Trigger words for the framework-upgrade override.
const UPGRADE_TRIGGER_KEYWORDS: [&str; 3] = ["react native", "upgrade", "migration"];

/// Native-platform terms that escalate an upgrade to a combined migration.
const NATIVE_PLATFORM_KEYWORDS: [&str; 3] = ["objective-c", "swift", "native"];

/// Enterprise-integration terms. Matching tickets are pinned to the
/// competitive baseline regardless of their keyword score.
pub const ENTERPRISE_KEYWORDS: [&str; 6] =
    ["iib", "sap", "mainframe", "enterprise integration", "cross-system", "multi-system"];

const UPGRADE_WITH_NATIVE_BASE_HOURS: u32 = 300;
const UPGRADE_BASE_HOURS: u32 = 200;
const ENTERPRISE_BASE_HOURS: u32 = 80;

const HIGH_THRESHOLD: f64 = 4.0;
const MEDIUM_THRESHOLD: f64 = 2.0;

const LOW_BASE_HOURS: u32 = 40;
const MEDIUM_BASE_HOURS: u32 = 80;
const HIGH_BASE_HOURS: u32 = 160;

pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

pub fn count_matches(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|keyword| text.contains(*keyword)).count()
}

#[derive(Clone, Debug, Default)]
pub struct ComplexityScorer;

impl ComplexityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Classify a task and assign base hours from its description and
    /// optional ticket metadata.
    pub fn score(&self, description: &str, ticket: Option<&TicketSnapshot>) -> ScoredComplexity {
        let text = description.to_lowercase();

        // Overrides precede threshold scoring.
        if contains_any(&text, &UPGRADE_TRIGGER_KEYWORDS) {
            if contains_any(&text, &NATIVE_PLATFORM_KEYWORDS) {
                return ScoredComplexity {
                    complexity: Complexity::High,
                    base_hours: Decimal::from(UPGRADE_WITH_NATIVE_BASE_HOURS),
                    note: "framework upgrade combined with native migration",
                };
            }
            return ScoredComplexity {
                complexity: Complexity::High,
                base_hours: Decimal::from(UPGRADE_BASE_HOURS),
                note: "framework upgrade or migration",
            };
        }

        // Competitive baseline: enterprise-integration tickets are pinned
        // to Medium/80 even when the raw score would read High.
        if contains_any(&text, &ENTERPRISE_KEYWORDS) {
            return ScoredComplexity {
                complexity: Complexity::Medium,
                base_hours: Decimal::from(ENTERPRISE_BASE_HOURS),
                note: "enterprise integration competitive baseline",
            };
        }

        let score = self.raw_score(&text, description, ticket);
        let (complexity, base_hours) = if score >= HIGH_THRESHOLD {
            (Complexity::High, HIGH_BASE_HOURS)
        } else if score >= MEDIUM_THRESHOLD {
            (Complexity::Medium, MEDIUM_BASE_HOURS)
        } else {
            (Complexity::Low, LOW_BASE_HOURS)
        };

        ScoredComplexity {
            complexity,
            base_hours: Decimal::from(base_hours),
            note: "keyword and metadata score",
        }
    }

    fn raw_score(&self, lowered: &str, original: &str, ticket: Option<&TicketSnapshot>) -> f64 {
        let high_count = count_matches(lowered, &HIGH_SIGNAL_KEYWORDS) as f64;
        let medium_count = count_matches(lowered, &MEDIUM_SIGNAL_KEYWORDS) as f64;
        let mut score = high_count * 2.0 + medium_count;

        if let Some(ticket) = ticket {
            score += match ticket.issue_type.to_lowercase().as_str() {
                "epic" | "story" => 2.0,
                "task" | "improvement" => 1.0,
                "bug" => 0.5,
                _ => 0.0,
            };
            score += match ticket.priority.to_lowercase().as_str() {
                "critical" | "highest" => 1.5,
                "high" | "major" => 1.0,
                _ => 0.0,
            };
        }

        if original.split_whitespace().count() > 50 {
            score += 1.0;
        }

        score
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredComplexity {
    pub complexity: Complexity,
    pub base_hours: Decimal,
    pub note: &'static str,
}
