//! Hard caps: the security-ticket cap and the competitive cap.

use rust_decimal::Decimal;

use crate::domain::estimate::{round_hours, Complexity, Estimate, Phase, PhaseBreakdown};
use crate::domain::request::PhasePlan;
use crate::phases::PhaseAllocator;

use super::PolicyContext;

/// Terms that mark a ticket as routine security/dependency maintenance.
const SECURITY_KEYWORDS: [&str; 5] =
    ["blackduck", "security vulnerability", "cve", "dependency update", "version upgrade"];

const SECURITY_CAP_TOTAL: u32 = 32;

/// Clamp target for estimates above the competitive threshold.
const COMPETITIVE_THRESHOLD: u32 = 150;
const COMPETITIVE_CAP_TOTAL: u32 = 120;

/// Security tickets are capped at 32 hours flat. The cap overrides every
/// other stage's effect on hours; only status filtering still applies
/// afterwards.
pub fn apply_security_cap(mut estimate: Estimate, ctx: &PolicyContext<'_>) -> Estimate {
    let mut haystack = estimate.reasoning.to_lowercase();
    if let Some(ticket) = ctx.ticket {
        haystack.push(' ');
        haystack.push_str(&ticket.text().to_lowercase());
    }

    let matched = SECURITY_KEYWORDS.iter().any(|keyword| haystack.contains(keyword));
    if !matched {
        return estimate;
    }

    let mut phases = PhaseBreakdown::new();
    phases.set(Phase::Requirements, round_hours(Decimal::from(4)));
    phases.set(Phase::Design, round_hours(Decimal::ZERO));
    phases.set(Phase::Development, round_hours(Decimal::from(24)));
    phases.set(Phase::Testing, round_hours(Decimal::from(3)));
    phases.set(Phase::Deployment, round_hours(Decimal::from(1)));

    estimate.total_hours = round_hours(Decimal::from(SECURITY_CAP_TOTAL));
    estimate.complexity = Complexity::Low;
    estimate.phases = phases;
    estimate.prepend_reasoning(
        "Security ticket cap applied: BlackDuck/CVE and routine dependency or version updates \
         are capped at 32 hours.",
    );
    estimate
}

/// Estimates above 150 hours are clamped to 120 and redistributed at the
/// default weights to stay inside the competitive band.
pub fn apply_competitive_cap(mut estimate: Estimate, _ctx: &PolicyContext<'_>) -> Estimate {
    if estimate.total_hours <= Decimal::from(COMPETITIVE_THRESHOLD) {
        return estimate;
    }

    let previous_total = estimate.total_hours;
    let allocation = PhaseAllocator::new()
        .allocate(Decimal::from(COMPETITIVE_CAP_TOTAL), &PhasePlan::default());

    estimate.total_hours = allocation.total_hours;
    estimate.phases = allocation.phases;
    estimate.append_reasoning(&format!(
        "Competitive cap applied: estimate clamped from {previous_total} to \
         {COMPETITIVE_CAP_TOTAL} hours and phases redistributed at default weights."
    ));
    estimate
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::estimate::{Complexity, Phase};
    use crate::domain::ticket::TicketSnapshot;
    use crate::learning::ComplexityAdjustments;
    use crate::policy::tests::estimate_with_total;
    use crate::policy::PolicyContext;

    use super::{apply_competitive_cap, apply_security_cap};

    #[test]
    fn security_keywords_in_reasoning_trigger_the_cap() {
        let adjustments = ComplexityAdjustments::default();
        let ctx = PolicyContext { ticket: None, adjustments: &adjustments };

        let mut estimate = estimate_with_total(200);
        estimate.reasoning = "This is a CVE remediation across services".to_string();

        let capped = apply_security_cap(estimate, &ctx);
        assert_eq!(capped.total_hours, Decimal::from(32));
        assert_eq!(capped.complexity, Complexity::Low);
        assert!(capped.reasoning.starts_with("Security ticket cap applied"));
        capped.validate().expect("cap phases sum to 32");
    }

    #[test]
    fn security_keywords_in_ticket_description_trigger_the_cap() {
        let adjustments = ComplexityAdjustments::default();
        let ticket = TicketSnapshot {
            description: "Quarterly BlackDuck scan follow-up".to_string(),
            ..TicketSnapshot::default()
        };
        let ctx = PolicyContext { ticket: Some(&ticket), adjustments: &adjustments };

        let capped = apply_security_cap(estimate_with_total(96), &ctx);
        assert_eq!(capped.total_hours, Decimal::from(32));
    }

    #[test]
    fn non_security_estimate_is_untouched() {
        let adjustments = ComplexityAdjustments::default();
        let ctx = PolicyContext { ticket: None, adjustments: &adjustments };

        let estimate = estimate_with_total(96);
        let unchanged = apply_security_cap(estimate.clone(), &ctx);
        assert_eq!(unchanged, estimate);
    }

    #[test]
    fn totals_above_150_clamp_to_120_with_default_weights() {
        let adjustments = ComplexityAdjustments::default();
        let ctx = PolicyContext { ticket: None, adjustments: &adjustments };

        let capped = apply_competitive_cap(estimate_with_total(300), &ctx);
        assert_eq!(capped.total_hours, Decimal::from(120));
        assert_eq!(capped.phases.get(&Phase::Development), Some("57.6".parse().unwrap()));
        assert!(capped.reasoning.contains("Competitive cap applied"));
        capped.validate().expect("redistributed phases sum to 120");
    }

    #[test]
    fn totals_at_or_below_150_pass_through() {
        let adjustments = ComplexityAdjustments::default();
        let ctx = PolicyContext { ticket: None, adjustments: &adjustments };

        let estimate = estimate_with_total(150);
        let unchanged = apply_competitive_cap(estimate.clone(), &ctx);
        assert_eq!(unchanged, estimate);
    }
}
