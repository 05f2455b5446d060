//! Confidence scoring independent of whatever confidence the model
//! self-reported.
//!
//! The final clamp to [90, 95] saturates most of the weighted factors
//! below: intermediate arithmetic regularly leaves the band before the
//! clamp pulls it back. The clamp is an inherited calibration choice
//! (flagged for product review), so the factors are kept even though
//! few of them can move the final number.

use rust_decimal::Decimal;

use crate::domain::estimate::{Complexity, Estimate, EstimationMethod};
use crate::domain::ticket::TicketSnapshot;

const BASELINE: i32 = 90;

const CLAMP_MIN: i32 = 90;
const CLAMP_MAX: i32 = 95;

const UNCERTAINTY_KEYWORDS: [&str; 5] = ["migration", "upgrade", "complex", "unknown", "unclear"];

#[derive(Clone, Debug, Default)]
pub struct ConfidenceCalculator;

impl ConfidenceCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(&self, estimate: &Estimate, ticket: Option<&TicketSnapshot>) -> u8 {
        let mut score = BASELINE;

        score -= match estimate.complexity {
            Complexity::High => 15,
            Complexity::Medium => 5,
            Complexity::Low => 0,
        };

        let total = estimate.total_hours;
        if total >= Decimal::from(80) && total <= Decimal::from(120) {
            score += 5;
        }
        if total <= Decimal::from(120) {
            score += 10;
        }
        if total > Decimal::from(300) {
            score -= 10;
        } else if total > Decimal::from(200) {
            score -= 5;
        }
        if total < Decimal::from(20) {
            score -= 5;
        }

        match ticket {
            Some(ticket) => {
                score += 5;
                match ticket.issue_type.to_lowercase().as_str() {
                    "story" | "task" => score += 5,
                    "epic" => score -= 3,
                    _ => {}
                }
            }
            None => score -= 5,
        }

        match estimate.method {
            EstimationMethod::AiPowered => score += 5,
            EstimationMethod::RuleBasedFallback => score -= 5,
            _ => {}
        }

        let reasoning = estimate.reasoning.to_lowercase();
        if reasoning.contains("enterprise") || reasoning.contains("competitive") {
            score += 5;
        }
        for keyword in UNCERTAINTY_KEYWORDS {
            score -= 2 * count_occurrences(&reasoning, keyword) as i32;
        }

        score.clamp(CLAMP_MIN, CLAMP_MAX) as u8
    }
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut rest = haystack;
    while let Some(position) = rest.find(needle) {
        count += 1;
        rest = &rest[position + needle.len()..];
    }
    count
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::estimate::{
        Complexity, Estimate, EstimationMethod, PhaseBreakdown,
    };
    use crate::domain::ticket::TicketSnapshot;

    use super::{count_occurrences, ConfidenceCalculator};

    fn estimate(total: u32, complexity: Complexity, reasoning: &str) -> Estimate {
        Estimate {
            total_hours: Decimal::from(total),
            complexity,
            confidence: 0,
            reasoning: reasoning.to_string(),
            risk_factors: Vec::new(),
            phases: PhaseBreakdown::new(),
            method: EstimationMethod::AiPowered,
        }
    }

    #[test]
    fn confidence_saturates_inside_the_band() {
        let calculator = ConfidenceCalculator::new();

        // A pile of positive factors still caps at 95.
        let optimistic = estimate(100, Complexity::Low, "enterprise competitive calibration");
        let ticket = TicketSnapshot {
            issue_type: "Story".to_string(),
            ..TicketSnapshot::default()
        };
        assert_eq!(calculator.calculate(&optimistic, Some(&ticket)), 95);

        // A pile of negative factors still floors at 90.
        let pessimistic = estimate(
            400,
            Complexity::High,
            "complex migration with unknown unknowns and an unclear upgrade path",
        );
        assert_eq!(calculator.calculate(&pessimistic, None), 90);
    }

    #[test]
    fn every_uncertainty_keyword_occurrence_counts() {
        assert_eq!(
            count_occurrences("migration then another migration during the upgrade", "migration"),
            2
        );
        assert_eq!(count_occurrences("no match here", "migration"), 0);
    }

    #[test]
    fn competitive_band_and_low_total_bonuses_stack() {
        let calculator = ConfidenceCalculator::new();

        // 90 - 5 (medium) + 5 (band) + 10 (<=120) - 5 (no ticket) + 5
        // (ai_powered) + 5 ("competitive" in reasoning) = 105, clamped to 95.
        let banded = estimate(104, Complexity::Medium, "fits the competitive band");
        assert_eq!(calculator.calculate(&banded, None), 95);
    }

    #[test]
    fn fallback_method_is_penalized_but_stays_in_band() {
        let calculator = ConfidenceCalculator::new();

        let mut fallback = estimate(160, Complexity::High, "keyword heuristics only");
        fallback.method = EstimationMethod::RuleBasedFallback;
        // 90 - 15 - 5 (no ticket) - 5 (fallback) = 65, clamped to 90.
        assert_eq!(calculator.calculate(&fallback, None), 90);
    }
}
