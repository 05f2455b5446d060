//! Structured decoding of model replies, with a manual extraction
//! fallback for replies that are not valid JSON or miss required keys.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::estimate::{
    round_hours, Complexity, Estimate, EstimationMethod, Phase, PhaseBreakdown,
    PHASE_SUM_TOLERANCE,
};
use crate::domain::request::PhasePlan;
use crate::phases::PhaseAllocator;

/// Hour figure assumed when no estimate can be extracted at all.
const DEFAULT_TOTAL_HOURS: u32 = 80;

/// Hour thresholds for deriving complexity from an extracted total.
const EXTRACTED_HIGH_THRESHOLD: u32 = 120;
const EXTRACTED_MEDIUM_THRESHOLD: u32 = 60;

const STRUCTURED_DEFAULT_CONFIDENCE: u8 = 75;
const EXTRACTED_CONFIDENCE: u8 = 70;

static HOUR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"total[_\s]*hours?[:\s]*(\d+)",
        r"(\d+)[_\s]*hours?\s*total",
        r"estimate[:\s]*(\d+)[_\s]*hours?",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("hour pattern compiles"))
    .collect()
});

#[derive(Debug, Deserialize)]
struct RawReply {
    total_hours: Option<f64>,
    complexity: Option<String>,
    confidence: Option<f64>,
    reasoning: Option<String>,
    risk_factors: Option<Vec<String>>,
    phases: Option<BTreeMap<String, f64>>,
}

#[derive(Clone, Debug, Default)]
pub struct ResponseParser {
    allocator: PhaseAllocator,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract a structured estimate from the raw model reply. Never
    /// fails: malformed replies degrade to manual hour extraction.
    pub fn parse(&self, reply: &str) -> Estimate {
        match self.parse_structured(reply) {
            Some(estimate) => estimate,
            None => self.extract_manually(reply),
        }
    }

    fn parse_structured(&self, reply: &str) -> Option<Estimate> {
        let start = reply.find('{')?;
        let end = reply.rfind('}')?;
        if end < start {
            return None;
        }

        let raw: RawReply = serde_json::from_str(&reply[start..=end]).ok()?;

        // Required keys; anything less goes through manual extraction.
        let total_hours = decimal_hours(raw.total_hours?)?;
        let complexity = parse_complexity(raw.complexity.as_deref()?)?;
        let raw_phases = raw.phases?;

        let mut phases: PhaseBreakdown = raw_phases
            .into_iter()
            .filter_map(|(name, hours)| {
                decimal_hours(hours).map(|hours| (Phase::from(name.as_str()), hours))
            })
            .collect();

        // Models routinely return phases that disagree with their own
        // stated total. Re-derive the breakdown from the total at default
        // weights so the pipeline invariant holds from the first stage.
        let drift = (phases.total() - total_hours).abs();
        if drift > PHASE_SUM_TOLERANCE {
            phases = self.allocator.allocate(total_hours, &PhasePlan::default()).phases;
        }

        let confidence = raw
            .confidence
            .map(|value| value.clamp(0.0, 100.0) as u8)
            .unwrap_or(STRUCTURED_DEFAULT_CONFIDENCE);

        let mut estimate = Estimate {
            total_hours,
            complexity,
            confidence,
            reasoning: raw.reasoning.unwrap_or_default(),
            risk_factors: raw.risk_factors.unwrap_or_default(),
            phases,
            method: EstimationMethod::AiPowered,
        };
        estimate.rederive_total();
        Some(estimate)
    }

    /// Regex-based salvage for free-text replies: take the first hour
    /// figure matched by any known phrasing, default to 80 hours.
    fn extract_manually(&self, reply: &str) -> Estimate {
        let lowered = reply.to_lowercase();
        let total_hours = HOUR_PATTERNS
            .iter()
            .find_map(|pattern| {
                pattern
                    .captures(&lowered)
                    .and_then(|captures| captures.get(1))
                    .and_then(|group| group.as_str().parse::<u32>().ok())
            })
            .unwrap_or(DEFAULT_TOTAL_HOURS);

        let complexity = if total_hours >= EXTRACTED_HIGH_THRESHOLD {
            Complexity::High
        } else if total_hours >= EXTRACTED_MEDIUM_THRESHOLD {
            Complexity::Medium
        } else {
            Complexity::Low
        };

        let allocation =
            self.allocator.allocate(Decimal::from(total_hours), &PhasePlan::default());

        Estimate {
            total_hours: allocation.total_hours,
            complexity,
            confidence: EXTRACTED_CONFIDENCE,
            reasoning: "Extracted from model response text".to_string(),
            risk_factors: Vec::new(),
            phases: allocation.phases,
            method: EstimationMethod::AiExtracted,
        }
    }
}

fn decimal_hours(value: f64) -> Option<Decimal> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Decimal::try_from(value).ok().map(round_hours)
}

fn parse_complexity(value: &str) -> Option<Complexity> {
    match value.trim().to_lowercase().as_str() {
        "low" => Some(Complexity::Low),
        "medium" => Some(Complexity::Medium),
        "high" => Some(Complexity::High),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::estimate::{Complexity, EstimationMethod, Phase};

    use super::ResponseParser;

    fn hours(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    #[test]
    fn well_formed_reply_parses_as_ai_powered() {
        let reply = r#"Here is my estimate:
{
    "total_hours": 160,
    "complexity": "High",
    "confidence": 85,
    "reasoning": "Large migration with native work",
    "risk_factors": ["breaking changes"],
    "phases": {
        "requirements": 24,
        "design": 32,
        "development": 76.8,
        "testing": 24,
        "deployment": 3.2
    }
}
Good luck!"#;

        let estimate = ResponseParser::new().parse(reply);
        assert_eq!(estimate.method, EstimationMethod::AiPowered);
        assert_eq!(estimate.complexity, Complexity::High);
        assert_eq!(estimate.total_hours, Decimal::from(160));
        assert_eq!(estimate.confidence, 85);
        assert_eq!(estimate.risk_factors, vec!["breaking changes".to_string()]);
        estimate.validate().expect("phases sum to total");
    }

    #[test]
    fn drifted_phases_are_rederived_from_the_total() {
        let reply = r#"{
            "total_hours": 100,
            "complexity": "Medium",
            "phases": {"development": 10, "testing": 5}
        }"#;

        let estimate = ResponseParser::new().parse(reply);
        assert_eq!(estimate.method, EstimationMethod::AiPowered);
        assert_eq!(estimate.total_hours, Decimal::from(100));
        assert_eq!(estimate.phases.get(&Phase::Development), Some(hours("48")));
        estimate.validate().expect("re-derived phases are consistent");
    }

    #[test]
    fn missing_required_keys_fall_back_to_manual_extraction() {
        let reply = r#"{"complexity": "High", "reasoning": "no hours here"}
I would estimate: 150 hours for this work overall."#;

        let estimate = ResponseParser::new().parse(reply);
        assert_eq!(estimate.method, EstimationMethod::AiExtracted);
        assert_eq!(estimate.total_hours, Decimal::from(150));
        assert_eq!(estimate.complexity, Complexity::High);
    }

    #[test]
    fn prose_reply_extracts_first_hour_phrase() {
        let reply = "This should take about 90 hours total, maybe more.";

        let estimate = ResponseParser::new().parse(reply);
        assert_eq!(estimate.method, EstimationMethod::AiExtracted);
        assert_eq!(estimate.total_hours, Decimal::from(90));
        assert_eq!(estimate.complexity, Complexity::Medium);
        assert_eq!(estimate.confidence, 70);
    }

    #[test]
    fn unparseable_reply_defaults_to_80_hours() {
        let estimate = ResponseParser::new().parse("I cannot help with that.");

        assert_eq!(estimate.method, EstimationMethod::AiExtracted);
        assert_eq!(estimate.total_hours, Decimal::from(80));
        assert_eq!(estimate.complexity, Complexity::Medium);
        estimate.validate().expect("default phases are consistent");
    }
}
