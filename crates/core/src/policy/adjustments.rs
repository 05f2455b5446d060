//! Multiplicative adjustments: changelog-derived rework penalties, the
//! AI-tooling efficiency discount, and the learned per-tier correction.

use rust_decimal::Decimal;

use crate::domain::estimate::{round_hours, Estimate, EstimationMethod, Phase};
use crate::domain::ticket::TicketSnapshot;

use super::PolicyContext;

/// Status-transition count above which a ticket is assumed to be churning.
const REWORK_TRANSITION_THRESHOLD: usize = 5;

/// Hours in analysis-like statuses above which scope is assumed unsettled.
const ANALYSIS_HOURS_THRESHOLD: u32 = 40;

const ANALYSIS_STATUS_TERMS: [&str; 4] = ["analysis", "refinement", "grooming", "backlog"];

fn rework_factor() -> Decimal {
    Decimal::new(115, 2)
}

fn analysis_factor() -> Decimal {
    Decimal::new(110, 2)
}

/// Per-phase efficiency factors applied when a team works with
/// AI-assisted tooling. Development benefits most; deployment least.
const AI_TOOL_FACTORS: [(Phase, i64); 5] = [
    (Phase::Requirements, 85),
    (Phase::Design, 75),
    (Phase::Development, 70),
    (Phase::Testing, 80),
    (Phase::Deployment, 90),
];

/// Tickets that churned through many statuses, or sat long in analysis,
/// historically overrun their estimates; both penalties compound.
pub fn apply_historical_pattern(mut estimate: Estimate, ctx: &PolicyContext<'_>) -> Estimate {
    let Some(ticket) = ctx.ticket else {
        return estimate;
    };

    let transitions = ticket.status_transition_count();
    if transitions > REWORK_TRANSITION_THRESHOLD {
        estimate.phases.scale(rework_factor());
        estimate.rederive_total();
        estimate.append_reasoning(&format!(
            "Rework penalty: {transitions} status transitions suggest churn, hours increased \
             by 15%."
        ));
    }

    let analysis_hours = analysis_time(ticket);
    if analysis_hours > Decimal::from(ANALYSIS_HOURS_THRESHOLD) {
        estimate.phases.scale(analysis_factor());
        estimate.rederive_total();
        estimate.append_reasoning(&format!(
            "Extended analysis: {analysis_hours} hours in analysis-like statuses, hours \
             increased by a further 10%."
        ));
    }

    estimate
}

fn analysis_time(ticket: &TicketSnapshot) -> Decimal {
    ticket
        .time_in_status
        .iter()
        .filter(|(status, _)| {
            let status = status.to_lowercase();
            ANALYSIS_STATUS_TERMS.iter().any(|term| status.contains(term))
        })
        .map(|(_, hours)| *hours)
        .sum()
}

/// AI-assisted teams get a per-phase discount. Each phase is rounded
/// before aggregation and the total is the original minus the summed
/// per-phase reductions, not the total times a blended factor.
pub fn apply_ai_tool_discount(mut estimate: Estimate, ctx: &PolicyContext<'_>) -> Estimate {
    let uses_ai_tools = ctx.ticket.map(|ticket| ticket.uses_ai_tools).unwrap_or(false);
    if !uses_ai_tools {
        return estimate;
    }

    let mut savings = Decimal::ZERO;
    for (phase, factor_pct) in AI_TOOL_FACTORS {
        let Some(previous) = estimate.phases.get(&phase) else {
            continue;
        };
        let discounted = round_hours(previous * Decimal::new(factor_pct, 2));
        savings += previous - discounted;
        estimate.phases.set(phase, discounted);
    }

    if savings > Decimal::ZERO {
        estimate.total_hours = round_hours(estimate.total_hours - savings);
        estimate.append_reasoning(&format!(
            "AI-assisted tooling discount applied: {savings} hours saved across phases."
        ));
    }

    estimate
}

/// Learned correction keyed by final complexity. Only the structured
/// model path is adjusted; extraction fallbacks are already too coarse
/// to benefit.
pub fn apply_learning(estimate: Estimate, ctx: &PolicyContext<'_>) -> Estimate {
    if estimate.method != EstimationMethod::AiPowered {
        return estimate;
    }

    let improved = crate::learning::apply_adjustments(estimate, ctx.adjustments);
    let mut estimate = improved.estimate;
    if let Some(factor) = improved.adjustment_factor {
        estimate.append_reasoning(&format!(
            "Historical learning adjustment x{factor} applied for {} complexity.",
            estimate.complexity
        ));
    }
    estimate
}
