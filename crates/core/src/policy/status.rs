//! Status-based remaining-work filtering: phases presumed complete for
//! the ticket's current workflow status are zeroed, and the total is
//! re-derived from what survives.

use crate::domain::estimate::{Estimate, Phase};

use super::PolicyContext;

const QA_STATUSES: [&str; 5] = ["qa", "sit", "testing", "ready for testing", "in testing"];

const UAT_STATUSES: [&str; 4] =
    ["uat", "user acceptance testing", "ready for deployment", "staging"];

const DONE_STATUSES: [&str; 5] = ["done", "closed", "resolved", "deployed", "production"];

const IN_PROGRESS_STATUSES: [&str; 4] = ["in progress", "development", "coding", "in development"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StatusFamily {
    Qa,
    Uat,
    Done,
    InProgress,
}

fn classify(status: &str) -> Option<StatusFamily> {
    let status = status.trim().to_lowercase();
    if DONE_STATUSES.contains(&status.as_str()) {
        Some(StatusFamily::Done)
    } else if UAT_STATUSES.contains(&status.as_str()) {
        Some(StatusFamily::Uat)
    } else if QA_STATUSES.contains(&status.as_str()) {
        Some(StatusFamily::Qa)
    } else if IN_PROGRESS_STATUSES.contains(&status.as_str()) {
        Some(StatusFamily::InProgress)
    } else {
        None
    }
}

pub fn apply_status_filter(mut estimate: Estimate, ctx: &PolicyContext<'_>) -> Estimate {
    let Some(ticket) = ctx.ticket else {
        return estimate;
    };
    let Some(family) = classify(&ticket.status) else {
        return estimate;
    };

    match family {
        StatusFamily::Qa => {
            estimate.phases.zero(&Phase::Requirements);
            estimate.phases.zero(&Phase::Design);
            estimate.phases.zero(&Phase::Development);
        }
        StatusFamily::Uat => {
            let survivors: Vec<Phase> = estimate
                .phases
                .iter()
                .map(|(phase, _)| phase.clone())
                .filter(|phase| *phase != Phase::Deployment)
                .collect();
            for phase in survivors {
                estimate.phases.zero(&phase);
            }
        }
        StatusFamily::Done => {
            let all: Vec<Phase> = estimate.phases.iter().map(|(phase, _)| phase.clone()).collect();
            for phase in all {
                estimate.phases.zero(&phase);
            }
        }
        StatusFamily::InProgress => {
            estimate.phases.zero(&Phase::Requirements);
            estimate.phases.zero(&Phase::Design);
        }
    }

    estimate.rederive_total();
    estimate.append_reasoning(&format!(
        "Status-based filtering for `{}`: phases already completed were removed from the \
         remaining-work estimate.",
        ticket.status
    ));
    estimate
}
