use std::cmp::Ordering;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Tolerance for the phase-sum invariant. Phase hours are rounded to two
/// decimal places, so the sum may drift from the stated total by at most
/// one cent-hour.
pub const PHASE_SUM_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Round an hour figure to the canonical two-decimal scale. Keeping the
/// scale fixed (40.00, not 40 or 40.0) makes serialized output stable
/// across code paths, which the cache's identical-output guarantee
/// relies on.
pub fn round_hours(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    rounded
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    AiPowered,
    AiExtracted,
    RuleBasedFallback,
    AmazonQ,
    AmazonQExtracted,
}

impl EstimationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiPowered => "ai_powered",
            Self::AiExtracted => "ai_extracted",
            Self::RuleBasedFallback => "rule_based_fallback",
            Self::AmazonQ => "amazon_q",
            Self::AmazonQExtracted => "amazon_q_extracted",
        }
    }
}

/// A project lifecycle phase. The five standard phases carry fixed default
/// weights; callers may add their own named phases with their own weights.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Requirements,
    Design,
    Development,
    Testing,
    Deployment,
    Custom(String),
}

pub const STANDARD_PHASES: [Phase; 5] = [
    Phase::Requirements,
    Phase::Design,
    Phase::Development,
    Phase::Testing,
    Phase::Deployment,
];

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Requirements => "requirements",
            Self::Design => "design",
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Deployment => "deployment",
            Self::Custom(name) => name.as_str(),
        }
    }

    pub fn is_standard(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Requirements => 0,
            Self::Design => 1,
            Self::Development => 2,
            Self::Testing => 3,
            Self::Deployment => 4,
            Self::Custom(_) => 5,
        }
    }
}

impl From<&str> for Phase {
    fn from(value: &str) -> Self {
        match value {
            "requirements" => Self::Requirements,
            "design" => Self::Design,
            "development" => Self::Development,
            "testing" => Self::Testing,
            "deployment" => Self::Deployment,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for Phase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Phase {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| self.as_str().cmp(other.as_str()))
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Phase::from(name.as_str()))
    }
}

/// Ordered phase -> hours mapping. Standard phases sort before custom ones
/// so serialized output and iteration order are stable across runs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseBreakdown(BTreeMap<Phase, Decimal>);

impl PhaseBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, phase: Phase, hours: Decimal) {
        self.0.insert(phase, hours);
    }

    pub fn get(&self, phase: &Phase) -> Option<Decimal> {
        self.0.get(phase).copied()
    }

    pub fn contains(&self, phase: &Phase) -> bool {
        self.0.contains_key(phase)
    }

    pub fn remove(&mut self, phase: &Phase) -> Option<Decimal> {
        self.0.remove(phase)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Phase, Decimal> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, Phase, Decimal> {
        self.0.iter_mut()
    }

    /// Sum of all phase hours. This is the authoritative figure the
    /// estimate total must be re-derived from after any mutation.
    pub fn total(&self) -> Decimal {
        self.0.values().copied().sum()
    }

    /// Multiply every phase by `factor`, rounding each phase to two
    /// decimal places before aggregation.
    pub fn scale(&mut self, factor: Decimal) {
        for hours in self.0.values_mut() {
            *hours = round_hours(*hours * factor);
        }
    }

    /// Zero out a phase if it is present, keeping its key so the
    /// breakdown still reports the full phase plan.
    pub fn zero(&mut self, phase: &Phase) {
        if let Some(hours) = self.0.get_mut(phase) {
            *hours = Decimal::ZERO;
        }
    }
}

impl FromIterator<(Phase, Decimal)> for PhaseBreakdown {
    fn from_iter<I: IntoIterator<Item = (Phase, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The central value threaded through the policy pipeline. Mutable within
/// one estimation run; `reasoning` is append-only and `phases` must always
/// sum to `total_hours` at stage boundaries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub total_hours: Decimal,
    pub complexity: Complexity,
    pub confidence: u8,
    pub reasoning: String,
    pub risk_factors: Vec<String>,
    pub phases: PhaseBreakdown,
    pub method: EstimationMethod,
}

impl Estimate {
    /// Validate the invariants every pipeline stage must uphold:
    /// non-negative hours and `sum(phases) == total_hours` within the
    /// rounding tolerance.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.total_hours < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "total_hours is negative: {}",
                self.total_hours
            )));
        }

        for (phase, hours) in self.phases.iter() {
            if *hours < Decimal::ZERO {
                return Err(DomainError::InvariantViolation(format!(
                    "phase `{phase}` has negative hours: {hours}"
                )));
            }
        }

        let phase_sum = self.phases.total();
        let drift = (phase_sum - self.total_hours).abs();
        if drift > PHASE_SUM_TOLERANCE {
            return Err(DomainError::InvariantViolation(format!(
                "phase sum {phase_sum} drifted from total {} by {drift}",
                self.total_hours
            )));
        }

        Ok(())
    }

    /// Re-derive the total from the phase breakdown. Stages that mutate
    /// phase hours call this instead of carrying their own running total.
    pub fn rederive_total(&mut self) {
        self.total_hours = round_hours(self.phases.total());
    }

    pub fn append_reasoning(&mut self, note: &str) {
        if !self.reasoning.is_empty() {
            self.reasoning.push('\n');
        }
        self.reasoning.push_str(note);
    }

    pub fn prepend_reasoning(&mut self, note: &str) {
        if self.reasoning.is_empty() {
            self.reasoning = note.to_string();
        } else {
            self.reasoning = format!("{note}\n{}", self.reasoning);
        }
    }

    pub fn add_risk_factor(&mut self, factor: impl Into<String>) {
        self.risk_factors.push(factor.into());
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Complexity, Estimate, EstimationMethod, Phase, PhaseBreakdown};

    fn hours(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn breakdown(pairs: &[(&str, &str)]) -> PhaseBreakdown {
        pairs.iter().map(|(phase, value)| (Phase::from(*phase), hours(value))).collect()
    }

    #[test]
    fn phase_order_is_lifecycle_then_custom_alphabetical() {
        let phases = breakdown(&[
            ("launch_review", "1"),
            ("deployment", "2"),
            ("requirements", "3"),
            ("development", "4"),
            ("archival", "5"),
        ]);

        let order: Vec<String> =
            phases.iter().map(|(phase, _)| phase.as_str().to_string()).collect();
        assert_eq!(order, ["requirements", "development", "deployment", "archival", "launch_review"]);
    }

    #[test]
    fn phase_round_trips_through_serde_as_plain_string() {
        let json = serde_json::to_string(&Phase::Development).expect("serialize");
        assert_eq!(json, "\"development\"");

        let custom: Phase = serde_json::from_str("\"security_review\"").expect("deserialize");
        assert_eq!(custom, Phase::Custom("security_review".to_string()));
    }

    #[test]
    fn validate_accepts_phase_sum_within_tolerance() {
        let estimate = Estimate {
            total_hours: hours("104"),
            complexity: Complexity::Medium,
            confidence: 90,
            reasoning: String::new(),
            risk_factors: Vec::new(),
            phases: breakdown(&[
                ("requirements", "15.6"),
                ("design", "20.8"),
                ("development", "49.92"),
                ("testing", "15.6"),
                ("deployment", "2.08"),
            ]),
            method: EstimationMethod::AiPowered,
        };

        estimate.validate().expect("phase sum equals total");
    }

    #[test]
    fn validate_rejects_drifted_total() {
        let mut estimate = Estimate {
            total_hours: hours("120"),
            complexity: Complexity::High,
            confidence: 90,
            reasoning: String::new(),
            risk_factors: Vec::new(),
            phases: breakdown(&[("development", "80"), ("testing", "20")]),
            method: EstimationMethod::AiPowered,
        };

        estimate.validate().expect_err("sum 100 != total 120");

        estimate.rederive_total();
        assert_eq!(estimate.total_hours, hours("100"));
        estimate.validate().expect("re-derived total is consistent");
    }

    #[test]
    fn scale_rounds_each_phase_to_two_decimals() {
        let mut phases = breakdown(&[("development", "49.92"), ("testing", "15.6")]);
        phases.scale(hours("1.15"));

        assert_eq!(phases.get(&Phase::Development), Some(hours("57.41")));
        assert_eq!(phases.get(&Phase::Testing), Some(hours("17.94")));
    }

    #[test]
    fn reasoning_is_append_only_with_prepend_for_cap_notes() {
        let mut estimate = Estimate {
            total_hours: Decimal::ZERO,
            complexity: Complexity::Low,
            confidence: 90,
            reasoning: "model reasoning".to_string(),
            risk_factors: Vec::new(),
            phases: PhaseBreakdown::new(),
            method: EstimationMethod::AiPowered,
        };

        estimate.append_reasoning("competitive cap applied");
        estimate.prepend_reasoning("security cap applied");

        assert_eq!(
            estimate.reasoning,
            "security cap applied\nmodel reasoning\ncompetitive cap applied"
        );
    }
}
