//! Phase-weight allocation. Apportions a total-hour figure across the
//! included phases of a plan; excluded phases drop both their entry and
//! their hours from the reported total (remaining-work semantics).

use rust_decimal::Decimal;

use crate::domain::estimate::{round_hours, PhaseBreakdown};
use crate::domain::request::PhasePlan;

#[derive(Clone, Debug, Default)]
pub struct PhaseAllocator;

#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
    pub phases: PhaseBreakdown,
    /// Sum of the included phase hours. Not necessarily the input total:
    /// excluding phases deliberately shrinks it.
    pub total_hours: Decimal,
}

impl PhaseAllocator {
    pub fn new() -> Self {
        Self
    }

    pub fn allocate(&self, total_hours: Decimal, plan: &PhasePlan) -> Allocation {
        let hundred = Decimal::from(100);
        let phases: PhaseBreakdown = plan
            .included_phases()
            .map(|(phase, weight_pct)| {
                (phase.clone(), round_hours(total_hours * weight_pct / hundred))
            })
            .collect();

        let total_hours = round_hours(phases.total());
        Allocation { phases, total_hours }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::estimate::Phase;
    use crate::domain::request::PhasePlan;

    use super::PhaseAllocator;

    fn hours(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    #[test]
    fn default_weights_apportion_the_full_total() {
        let allocation = PhaseAllocator::new().allocate(Decimal::from(80), &PhasePlan::default());

        assert_eq!(allocation.phases.get(&Phase::Requirements), Some(hours("12")));
        assert_eq!(allocation.phases.get(&Phase::Design), Some(hours("16")));
        assert_eq!(allocation.phases.get(&Phase::Development), Some(hours("38.4")));
        assert_eq!(allocation.phases.get(&Phase::Testing), Some(hours("12")));
        assert_eq!(allocation.phases.get(&Phase::Deployment), Some(hours("1.6")));
        assert_eq!(allocation.total_hours, Decimal::from(80));
    }

    #[test]
    fn excluded_phases_shrink_the_reported_total() {
        let mut plan = PhasePlan::default();
        plan.exclude(&Phase::Requirements);
        plan.exclude(&Phase::Design);

        let allocation = PhaseAllocator::new().allocate(Decimal::from(100), &plan);

        assert!(!allocation.phases.contains(&Phase::Requirements));
        assert!(!allocation.phases.contains(&Phase::Design));
        // 48 + 15 + 2 percent of 100 hours.
        assert_eq!(allocation.total_hours, hours("65"));
    }

    #[test]
    fn custom_phases_allocate_alongside_standard_ones() {
        let mut plan = PhasePlan::default();
        plan.add_custom("security_review", Decimal::from(10));

        let allocation = PhaseAllocator::new().allocate(Decimal::from(200), &plan);

        let custom = Phase::Custom("security_review".to_string());
        assert_eq!(allocation.phases.get(&custom), Some(hours("20")));
        assert_eq!(allocation.total_hours, Decimal::from(220));
    }

    #[test]
    fn phase_hours_round_to_two_decimals() {
        let allocation =
            PhaseAllocator::new().allocate(hours("104.37"), &PhasePlan::default());

        assert_eq!(allocation.phases.get(&Phase::Development), Some(hours("50.1")));
        assert_eq!(allocation.total_hours, allocation.phases.total());
    }
}
