//! Cross-dependency surcharges derived from linked issues.

use rust_decimal::Decimal;

use crate::domain::estimate::{round_hours, Complexity, Estimate};
use crate::domain::request::PhasePlan;
use crate::domain::ticket::TicketSnapshot;
use crate::phases::PhaseAllocator;
use crate::scoring::{count_matches, ENTERPRISE_KEYWORDS};

use super::PolicyContext;

const BLOCKING_LINK_HOURS: u32 = 8;
const DEPENDENCY_LINK_HOURS: u32 = 5;
const RELATION_LINK_HOURS: u32 = 2;
const ENTERPRISE_LINK_HOURS: u32 = 4;

/// Absolute ceiling on the surcharge at the point of addition.
const SURCHARGE_ABSOLUTE_CAP: u32 = 20;

/// Fixed competitive baseline for enterprise tickets with no links.
const ENTERPRISE_BASELINE_HOURS: u32 = 104;

/// Per-link surcharges for blocking/dependency/relation links, capped by
/// link count and by an absolute 20 hours. Enterprise tickets with no
/// links are instead pinned to the 104-hour competitive baseline, even
/// when the incoming estimate was higher.
pub fn apply_cross_dependency(mut estimate: Estimate, ctx: &PolicyContext<'_>) -> Estimate {
    let Some(ticket) = ctx.ticket else {
        return estimate;
    };

    if ticket.linked_issues.is_empty() {
        return apply_enterprise_baseline(estimate, ticket);
    }

    let surcharge = link_surcharge(ticket);
    if surcharge == Decimal::ZERO {
        return estimate;
    }

    let previous_total = estimate.total_hours;
    let new_total = round_hours(previous_total + surcharge);
    if previous_total > Decimal::ZERO {
        let factor = new_total / previous_total;
        estimate.phases.scale(factor);
    }
    estimate.rederive_total();
    estimate.append_reasoning(&format!(
        "Cross-dependency adjustment: +{surcharge} hours across {} linked issues.",
        ticket.linked_issues.len()
    ));
    estimate
}

fn apply_enterprise_baseline(mut estimate: Estimate, ticket: &TicketSnapshot) -> Estimate {
    let text = ticket.text().to_lowercase();
    let matched = ENTERPRISE_KEYWORDS.iter().any(|keyword| text.contains(keyword));
    if !matched {
        return estimate;
    }

    let allocation = PhaseAllocator::new()
        .allocate(Decimal::from(ENTERPRISE_BASELINE_HOURS), &PhasePlan::default());
    estimate.total_hours = allocation.total_hours;
    estimate.phases = allocation.phases;
    estimate.complexity = Complexity::Medium;
    estimate.append_reasoning(&format!(
        "Enterprise integration detected with no linked issues: competitive baseline of \
         {ENTERPRISE_BASELINE_HOURS} hours applied."
    ));
    estimate
}

fn link_surcharge(ticket: &TicketSnapshot) -> Decimal {
    let mut surcharge = 0u32;
    for link in &ticket.linked_issues {
        let link_type = link.link_type.to_lowercase();
        if link_type.contains("block") {
            surcharge += BLOCKING_LINK_HOURS;
        } else if link_type.contains("depend") {
            surcharge += DEPENDENCY_LINK_HOURS;
        } else if link_type.contains("relate") {
            surcharge += RELATION_LINK_HOURS;
        }

        let summary = link.summary.to_lowercase();
        if count_matches(&summary, &ENTERPRISE_KEYWORDS) >= 2 {
            surcharge += ENTERPRISE_LINK_HOURS;
        }
    }

    let count_cap = match ticket.linked_issues.len() {
        0..=2 => 15,
        3..=4 => 25,
        _ => 40,
    };

    Decimal::from(surcharge.min(count_cap).min(SURCHARGE_ABSOLUTE_CAP))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::estimate::Complexity;
    use crate::domain::ticket::{LinkedIssue, TicketSnapshot};
    use crate::learning::ComplexityAdjustments;
    use crate::policy::tests::estimate_with_total;
    use crate::policy::PolicyContext;

    use super::apply_cross_dependency;

    fn link(key: &str, link_type: &str, summary: &str) -> LinkedIssue {
        LinkedIssue {
            key: key.to_string(),
            link_type: link_type.to_string(),
            summary: summary.to_string(),
        }
    }

    #[test]
    fn blocking_links_add_surcharge_and_rescale_phases() {
        let adjustments = ComplexityAdjustments::default();
        let ticket = TicketSnapshot {
            linked_issues: vec![link("PROJ-2", "blocks", "downstream rollout")],
            ..TicketSnapshot::default()
        };
        let ctx = PolicyContext { ticket: Some(&ticket), adjustments: &adjustments };

        let adjusted = apply_cross_dependency(estimate_with_total(100), &ctx);
        assert_eq!(adjusted.total_hours, Decimal::from(108));
        adjusted.validate().expect("phases rescaled to the new total");
        assert!(adjusted.reasoning.contains("Cross-dependency adjustment"));
    }

    #[test]
    fn surcharge_respects_the_small_link_count_cap() {
        let adjustments = ComplexityAdjustments::default();
        // Two blocking links with enterprise-heavy summaries: raw 8+8+4+4 = 24,
        // capped at 15 by the <=2-link rule before the absolute cap.
        let ticket = TicketSnapshot {
            linked_issues: vec![
                link("PROJ-2", "is blocked by", "sap mainframe feed"),
                link("PROJ-3", "blocks", "iib cross-system bridge"),
            ],
            ..TicketSnapshot::default()
        };
        let ctx = PolicyContext { ticket: Some(&ticket), adjustments: &adjustments };

        let adjusted = apply_cross_dependency(estimate_with_total(100), &ctx);
        assert_eq!(adjusted.total_hours, Decimal::from(115));
    }

    #[test]
    fn surcharge_never_exceeds_the_absolute_cap() {
        let adjustments = ComplexityAdjustments::default();
        let linked_issues: Vec<_> =
            (0..6).map(|index| link(&format!("PROJ-{index}"), "blocks", "rollout")).collect();
        let ticket = TicketSnapshot { linked_issues, ..TicketSnapshot::default() };
        let ctx = PolicyContext { ticket: Some(&ticket), adjustments: &adjustments };

        // Six blocking links would be 48 raw and 40 by count cap; the
        // absolute 20-hour cap wins at the point of addition.
        let adjusted = apply_cross_dependency(estimate_with_total(100), &ctx);
        assert_eq!(adjusted.total_hours, Decimal::from(120));
    }

    #[test]
    fn enterprise_ticket_without_links_pins_the_104_hour_baseline() {
        let adjustments = ComplexityAdjustments::default();
        let ticket = TicketSnapshot {
            summary: "SAP enterprise integration rollout".to_string(),
            ..TicketSnapshot::default()
        };
        let ctx = PolicyContext { ticket: Some(&ticket), adjustments: &adjustments };

        // A higher-scored incoming estimate is still overridden.
        let adjusted = apply_cross_dependency(estimate_with_total(140), &ctx);
        assert_eq!(adjusted.total_hours, Decimal::from(104));
        assert_eq!(adjusted.complexity, Complexity::Medium);
        adjusted.validate().expect("baseline phases sum to 104");
    }

    #[test]
    fn plain_ticket_without_links_is_untouched() {
        let adjustments = ComplexityAdjustments::default();
        let ticket = TicketSnapshot {
            summary: "Add export button".to_string(),
            ..TicketSnapshot::default()
        };
        let ctx = PolicyContext { ticket: Some(&ticket), adjustments: &adjustments };

        let estimate = estimate_with_total(60);
        let unchanged = apply_cross_dependency(estimate.clone(), &ctx);
        assert_eq!(unchanged, estimate);
    }
}
