use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::estimate::Phase;
use super::ticket::TicketSnapshot;

/// Default weight percentages for the five standard phases. Chosen so the
/// weights sum to 100.
pub fn default_phase_weights() -> BTreeMap<Phase, Decimal> {
    [
        (Phase::Requirements, Decimal::from(15)),
        (Phase::Design, Decimal::from(20)),
        (Phase::Development, Decimal::from(48)),
        (Phase::Testing, Decimal::from(15)),
        (Phase::Deployment, Decimal::from(2)),
    ]
    .into_iter()
    .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhasePlanEntry {
    pub weight_pct: Decimal,
    pub included: bool,
}

/// Which phases an estimate should report, at which weight percentages.
/// Excluding a phase removes both the entry and its hours from the
/// reported total; that shrinkage is the remaining-work semantics, not a
/// normalization bug.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhasePlan {
    entries: BTreeMap<Phase, PhasePlanEntry>,
}

impl Default for PhasePlan {
    fn default() -> Self {
        let entries = default_phase_weights()
            .into_iter()
            .map(|(phase, weight_pct)| (phase, PhasePlanEntry { weight_pct, included: true }))
            .collect();
        Self { entries }
    }
}

impl PhasePlan {
    pub fn set_weight(&mut self, phase: Phase, weight_pct: Decimal) {
        self.entries
            .entry(phase)
            .and_modify(|entry| entry.weight_pct = weight_pct)
            .or_insert(PhasePlanEntry { weight_pct, included: true });
    }

    pub fn exclude(&mut self, phase: &Phase) {
        if let Some(entry) = self.entries.get_mut(phase) {
            entry.included = false;
        }
    }

    pub fn include(&mut self, phase: &Phase) {
        if let Some(entry) = self.entries.get_mut(phase) {
            entry.included = true;
        }
    }

    /// Add a caller-defined phase with its own weight percentage.
    pub fn add_custom(&mut self, name: &str, weight_pct: Decimal) {
        self.set_weight(Phase::Custom(name.to_string()), weight_pct);
    }

    pub fn included_phases(&self) -> impl Iterator<Item = (&Phase, Decimal)> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.included)
            .map(|(phase, entry)| (phase, entry.weight_pct))
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// One estimation call's input. Immutable once received.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimationRequest {
    pub description: String,
    pub ticket: Option<TicketSnapshot>,
    #[serde(default)]
    pub phase_plan: PhasePlan,
}

impl EstimationRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self { description: description.into(), ticket: None, phase_plan: PhasePlan::default() }
    }

    pub fn with_ticket(mut self, ticket: TicketSnapshot) -> Self {
        self.ticket = Some(ticket);
        self
    }

    pub fn with_phase_plan(mut self, plan: PhasePlan) -> Self {
        self.phase_plan = plan;
        self
    }
}
