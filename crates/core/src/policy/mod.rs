//! The business-rule pipeline applied to every model-derived estimate.
//!
//! Stages run in a fixed order, each receiving and returning a full
//! [`Estimate`]; the phase-sum invariant is validated after every stage.
//! Hour figures are rounded to two decimal places as they change, and
//! totals are re-derived from phases rather than carried across stages.

pub mod adjustments;
pub mod caps;
pub mod links;
pub mod status;

use crate::domain::estimate::Estimate;
use crate::domain::ticket::TicketSnapshot;
use crate::errors::DomainError;
use crate::learning::ComplexityAdjustments;

/// Read-only inputs shared by all policy stages.
#[derive(Clone, Copy, Debug)]
pub struct PolicyContext<'a> {
    pub ticket: Option<&'a TicketSnapshot>,
    /// Learned per-tier actual/estimated factors, pre-fetched so the
    /// pipeline itself stays synchronous and deterministic.
    pub adjustments: &'a ComplexityAdjustments,
}

type PolicyStage = fn(Estimate, &PolicyContext<'_>) -> Estimate;

/// Stage order is a business contract: the security cap must precede the
/// competitive cap, and status filtering must run after both so a capped
/// security ticket in QA still loses its completed phases. The learning
/// adjustment runs outside this capping sequence, after confidence is
/// scored; see [`adjustments::apply_learning`].
const STAGES: [(&str, PolicyStage); 6] = [
    ("security_cap", caps::apply_security_cap),
    ("competitive_cap", caps::apply_competitive_cap),
    ("cross_dependency", links::apply_cross_dependency),
    ("status_filter", status::apply_status_filter),
    ("historical_pattern", adjustments::apply_historical_pattern),
    ("ai_tool_discount", adjustments::apply_ai_tool_discount),
];

#[derive(Clone, Debug, Default)]
pub struct PolicyPipeline;

impl PolicyPipeline {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(
        &self,
        mut estimate: Estimate,
        ctx: &PolicyContext<'_>,
    ) -> Result<Estimate, DomainError> {
        estimate.validate().map_err(|error| {
            DomainError::InvariantViolation(format!("before policy pipeline: {error}"))
        })?;

        for (name, stage) in STAGES {
            estimate = stage(estimate, ctx);
            estimate.validate().map_err(|error| {
                DomainError::InvariantViolation(format!("after stage `{name}`: {error}"))
            })?;
        }

        Ok(estimate)
    }
}
