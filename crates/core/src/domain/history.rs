use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::estimate::{Complexity, EstimationMethod, PhaseBreakdown};

/// One row of the append-only estimation history. Records are created on
/// every estimation call and back-filled with actual hours once the work
/// completes; they are never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub ticket: String,
    pub description: String,
    pub estimated_hours: Decimal,
    pub actual_hours: Option<Decimal>,
    pub complexity: Complexity,
    pub phases: PhaseBreakdown,
    pub method: EstimationMethod,
    /// Absolute percentage error |estimated - actual| / actual, computed
    /// once actual hours are known.
    pub accuracy: Option<f64>,
}

impl HistoryRecord {
    pub fn is_completed(&self) -> bool {
        self.actual_hours.is_some()
    }

    /// Set actual hours and derive the accuracy error. Zero actuals are
    /// rejected upstream, so the division is well-defined here.
    pub fn record_actual(&mut self, actual_hours: Decimal) {
        self.actual_hours = Some(actual_hours);
        self.accuracy = Some(accuracy_error(self.estimated_hours, actual_hours));
    }
}

pub fn accuracy_error(estimated: Decimal, actual: Decimal) -> f64 {
    let estimated: f64 = estimated.try_into().unwrap_or(0.0);
    let actual: f64 = actual.try_into().unwrap_or(0.0);
    if actual == 0.0 {
        return 0.0;
    }
    (estimated - actual).abs() / actual
}
