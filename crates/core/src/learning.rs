//! Historical accuracy feedback. Every estimate is recorded; once actual
//! hours arrive, per-tier actual/estimated ratios feed back into future
//! estimates of the same complexity class.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::estimate::{Complexity, Estimate};
use crate::domain::history::HistoryRecord;

/// Minimum completed records before any adjustment factors are derived.
const MIN_COMPLETED_OVERALL: usize = 3;

/// Minimum completed records within a tier for that tier's factor.
const MIN_COMPLETED_PER_TIER: usize = 2;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HistoryStoreError {
    #[error("history store I/O failure: {0}")]
    Io(String),
    #[error("history store serialization failure: {0}")]
    Serialization(String),
}

/// Durable, append-friendly record store. Implementations must flush each
/// append before returning and never leave a partially written record
/// visible, even under interleaved completions.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> Result<(), HistoryStoreError>;

    /// Back-fill actual hours on the most recent record for `ticket`.
    /// Returns false when the ticket has no history.
    async fn update_most_recent(
        &self,
        ticket: &str,
        actual_hours: Decimal,
    ) -> Result<bool, HistoryStoreError>;

    async fn load_all(&self) -> Result<Vec<HistoryRecord>, HistoryStoreError>;
}

/// Aggregate absolute-percentage-error statistics over completed records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccuracyStats {
    Empty {
        message: String,
    },
    Available {
        total_estimations: usize,
        completed_estimations: usize,
        avg_accuracy_error: f64,
        median_accuracy_error: f64,
        best_accuracy: f64,
        worst_accuracy: f64,
    },
}

/// Learned actual/estimated ratios keyed by complexity tier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComplexityAdjustments(BTreeMap<Complexity, Decimal>);

impl ComplexityAdjustments {
    pub fn from_factors(factors: BTreeMap<Complexity, Decimal>) -> Self {
        Self(factors)
    }

    pub fn factor_for(&self, complexity: Complexity) -> Option<Decimal> {
        self.0.get(&complexity).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Complexity, &Decimal)> {
        self.0.iter()
    }
}

/// An estimate after the learning pass, tagged with whether a factor was
/// applied and which one.
#[derive(Clone, Debug, PartialEq)]
pub struct ImprovedEstimate {
    pub estimate: Estimate,
    pub learning_applied: bool,
    pub adjustment_factor: Option<Decimal>,
}

pub struct LearningSystem<S> {
    store: S,
}

impl<S: HistoryStore> LearningSystem<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append a history record for this estimation. Accuracy is computed
    /// only when actual hours are already known at record time.
    pub async fn record_estimation(
        &self,
        ticket: &str,
        description: &str,
        estimate: &Estimate,
        actual_hours: Option<Decimal>,
    ) -> Result<HistoryRecord, HistoryStoreError> {
        let mut record = HistoryRecord {
            timestamp: Utc::now(),
            ticket: ticket.to_string(),
            description: description.to_string(),
            estimated_hours: estimate.total_hours,
            actual_hours: None,
            complexity: estimate.complexity,
            phases: estimate.phases.clone(),
            method: estimate.method,
            accuracy: None,
        };
        if let Some(actual) = actual_hours {
            record.record_actual(actual);
        }

        self.store.append(record.clone()).await?;
        Ok(record)
    }

    pub async fn update_actual_hours(
        &self,
        ticket: &str,
        actual_hours: Decimal,
    ) -> Result<bool, HistoryStoreError> {
        self.store.update_most_recent(ticket, actual_hours).await
    }

    pub async fn accuracy_stats(&self) -> Result<AccuracyStats, HistoryStoreError> {
        let records = self.store.load_all().await?;
        Ok(accuracy_stats(&records))
    }

    pub async fn complexity_adjustments(&self) -> Result<ComplexityAdjustments, HistoryStoreError> {
        let records = self.store.load_all().await?;
        Ok(complexity_adjustments(&records))
    }

    /// Apply the learned tier factor to an estimate, if one exists. The
    /// result always states whether an adjustment was applied.
    pub async fn improved_estimate(
        &self,
        estimate: Estimate,
    ) -> Result<ImprovedEstimate, HistoryStoreError> {
        let adjustments = self.complexity_adjustments().await?;
        Ok(apply_adjustments(estimate, &adjustments))
    }
}

pub fn apply_adjustments(
    mut estimate: Estimate,
    adjustments: &ComplexityAdjustments,
) -> ImprovedEstimate {
    let Some(factor) = adjustments.factor_for(estimate.complexity) else {
        return ImprovedEstimate { estimate, learning_applied: false, adjustment_factor: None };
    };

    estimate.phases.scale(factor);
    estimate.rederive_total();
    ImprovedEstimate { estimate, learning_applied: true, adjustment_factor: Some(factor) }
}

pub fn accuracy_stats(records: &[HistoryRecord]) -> AccuracyStats {
    let errors: Vec<f64> = records.iter().filter_map(|record| record.accuracy).collect();
    if errors.is_empty() {
        return AccuracyStats::Empty { message: "No completed estimations yet".to_string() };
    }

    AccuracyStats::Available {
        total_estimations: records.len(),
        completed_estimations: errors.len(),
        avg_accuracy_error: mean(&errors),
        median_accuracy_error: median(&errors),
        best_accuracy: errors.iter().copied().fold(f64::INFINITY, f64::min),
        worst_accuracy: errors.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

pub fn complexity_adjustments(records: &[HistoryRecord]) -> ComplexityAdjustments {
    let completed: Vec<&HistoryRecord> =
        records.iter().filter(|record| record.is_completed()).collect();
    if completed.len() < MIN_COMPLETED_OVERALL {
        return ComplexityAdjustments::default();
    }

    let mut factors = BTreeMap::new();
    for complexity in [Complexity::Low, Complexity::Medium, Complexity::High] {
        let ratios: Vec<Decimal> = completed
            .iter()
            .filter(|record| record.complexity == complexity)
            .filter(|record| record.estimated_hours > Decimal::ZERO)
            .filter_map(|record| {
                record.actual_hours.map(|actual| actual / record.estimated_hours)
            })
            .collect();

        if ratios.len() >= MIN_COMPLETED_PER_TIER {
            let sum: Decimal = ratios.iter().copied().sum();
            let factor = (sum / Decimal::from(ratios.len())).round_dp(4);
            factors.insert(complexity, factor);
        }
    }

    ComplexityAdjustments(factors)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|left, right| left.partial_cmp(right).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::estimate::{
        Complexity, Estimate, EstimationMethod, PhaseBreakdown,
    };
    use crate::domain::history::HistoryRecord;
    use crate::domain::request::PhasePlan;
    use crate::phases::PhaseAllocator;

    use super::{accuracy_stats, apply_adjustments, complexity_adjustments, AccuracyStats};

    fn record(ticket: &str, complexity: Complexity, estimated: u32, actual: Option<u32>) -> HistoryRecord {
        let mut record = HistoryRecord {
            timestamp: Utc::now(),
            ticket: ticket.to_string(),
            description: String::new(),
            estimated_hours: Decimal::from(estimated),
            actual_hours: None,
            complexity,
            phases: PhaseBreakdown::new(),
            method: EstimationMethod::AiPowered,
            accuracy: None,
        };
        if let Some(actual) = actual {
            record.record_actual(Decimal::from(actual));
        }
        record
    }

    #[test]
    fn stats_report_empty_state_without_completed_records() {
        let records = vec![record("A-1", Complexity::Low, 40, None)];
        assert!(matches!(accuracy_stats(&records), AccuracyStats::Empty { .. }));
    }

    #[test]
    fn stats_aggregate_mean_median_best_and_worst() {
        let records = vec![
            record("A-1", Complexity::Low, 40, Some(50)),
            record("A-2", Complexity::Medium, 100, Some(100)),
            record("A-3", Complexity::High, 200, Some(160)),
            record("A-4", Complexity::Low, 60, None),
        ];

        match accuracy_stats(&records) {
            AccuracyStats::Available {
                total_estimations,
                completed_estimations,
                avg_accuracy_error,
                median_accuracy_error,
                best_accuracy,
                worst_accuracy,
            } => {
                assert_eq!(total_estimations, 4);
                assert_eq!(completed_estimations, 3);
                assert!((avg_accuracy_error - 0.15).abs() < 1e-9);
                assert!((median_accuracy_error - 0.2).abs() < 1e-9);
                assert!((best_accuracy - 0.0).abs() < 1e-9);
                assert!((worst_accuracy - 0.25).abs() < 1e-9);
            }
            AccuracyStats::Empty { .. } => panic!("expected available stats"),
        }
    }

    #[test]
    fn adjustments_require_three_completed_records_overall() {
        // One tier has two completed records, but only two exist overall.
        let records = vec![
            record("A-1", Complexity::Medium, 100, Some(120)),
            record("A-2", Complexity::Medium, 80, Some(96)),
            record("A-3", Complexity::High, 200, None),
        ];

        assert!(complexity_adjustments(&records).is_empty());
    }

    #[test]
    fn tiers_with_enough_records_get_the_mean_ratio() {
        let records = vec![
            record("A-1", Complexity::Medium, 100, Some(120)),
            record("A-2", Complexity::Medium, 80, Some(96)),
            record("A-3", Complexity::High, 200, Some(150)),
        ];

        let adjustments = complexity_adjustments(&records);
        assert_eq!(
            adjustments.factor_for(Complexity::Medium),
            Some("1.2".parse().unwrap())
        );
        // High has a single completed record; no factor is derived.
        assert_eq!(adjustments.factor_for(Complexity::High), None);
    }

    #[test]
    fn improved_estimate_is_tagged_either_way() {
        let records = vec![
            record("A-1", Complexity::Medium, 100, Some(120)),
            record("A-2", Complexity::Medium, 80, Some(96)),
            record("A-3", Complexity::High, 200, Some(150)),
        ];
        let adjustments = complexity_adjustments(&records);

        let allocation =
            PhaseAllocator::new().allocate(Decimal::from(100), &PhasePlan::default());
        let estimate = Estimate {
            total_hours: allocation.total_hours,
            complexity: Complexity::Medium,
            confidence: 90,
            reasoning: String::new(),
            risk_factors: Vec::new(),
            phases: allocation.phases,
            method: EstimationMethod::AiPowered,
        };

        let improved = apply_adjustments(estimate.clone(), &adjustments);
        assert!(improved.learning_applied);
        assert_eq!(improved.adjustment_factor, Some("1.2".parse().unwrap()));
        assert_eq!(improved.estimate.total_hours, Decimal::from(120));

        let mut high = estimate;
        high.complexity = Complexity::High;
        let untouched = apply_adjustments(high.clone(), &adjustments);
        assert!(!untouched.learning_applied);
        assert_eq!(untouched.estimate, high);
    }
}
