use rust_decimal::Decimal;
use serde::Serialize;

use hourcast_agent::OpenAiGateway;
use hourcast_core::config::{AppConfig, LoadOptions};
use hourcast_core::domain::estimate::{Estimate, Phase};
use hourcast_core::domain::request::{EstimationRequest, PhasePlan};
use hourcast_core::errors::ApplicationError;
use hourcast_core::estimator::Estimator;
use hourcast_core::learning::LearningSystem;
use hourcast_history::JsonFileHistoryStore;
use hourcast_tracker::{HttpTrackerClient, TicketFetcher, TrackerError};

use super::{block_on, CommandResult};

const COMMAND: &str = "estimate";

#[derive(Debug, Clone, Default)]
pub struct EstimateArgs {
    pub description: Option<String>,
    pub ticket: Option<String>,
    /// Skip the model gateway even when credentials are configured.
    pub no_model: bool,
    pub exclude_phases: Vec<String>,
    /// `name=percent` weight overrides for standard or custom phases.
    pub phase_weights: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EstimateReport {
    command: &'static str,
    status: &'static str,
    ticket: Option<String>,
    estimate: Estimate,
}

pub fn run(args: EstimateArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    let plan = match build_phase_plan(&args) {
        Ok(plan) => plan,
        Err(message) => {
            return CommandResult::failure(COMMAND, "invalid_argument", message, 2)
        }
    };

    if args.description.is_none() && args.ticket.is_none() {
        return CommandResult::failure(
            COMMAND,
            "invalid_argument",
            "provide --description, --ticket, or both",
            2,
        );
    }

    let outcome = block_on(run_estimation(config, args, plan));
    match outcome {
        Ok(result) => result,
        Err(message) => CommandResult::failure(COMMAND, "runtime", message, 1),
    }
}

async fn run_estimation(
    config: AppConfig,
    args: EstimateArgs,
    plan: PhasePlan,
) -> CommandResult {
    let mut request = match build_request(&config, &args).await {
        Ok(request) => request,
        Err(result) => return result,
    };
    request.phase_plan = plan;

    let gateway = if args.no_model {
        None
    } else {
        OpenAiGateway::from_config(&config.llm).ok()
    };
    let learning = LearningSystem::new(JsonFileHistoryStore::new(&config.history.path));
    let estimator = Estimator::new(gateway, learning);

    match estimator.estimate(&request).await {
        Ok(estimate) => CommandResult::report(
            0,
            EstimateReport {
                command: COMMAND,
                status: "ok",
                ticket: request.ticket.and_then(|ticket| ticket.key).map(|key| key.0),
                estimate,
            },
        ),
        Err(ApplicationError::Domain(error)) => {
            CommandResult::failure(COMMAND, "invalid_input", error.to_string(), 2)
        }
        Err(error) => CommandResult::failure(COMMAND, "estimation", error.to_string(), 1),
    }
}

/// Resolve the request description: an explicit description wins, a
/// ticket key pulls summary+description from the tracker.
async fn build_request(
    config: &AppConfig,
    args: &EstimateArgs,
) -> Result<EstimationRequest, CommandResult> {
    let Some(key) = &args.ticket else {
        let description = args.description.clone().unwrap_or_default();
        return Ok(EstimationRequest::new(description));
    };

    let client = HttpTrackerClient::from_config(&config.tracker).map_err(|error| {
        CommandResult::failure(COMMAND, "tracker_not_configured", error.to_string(), 2)
    })?;

    let ticket = client.fetch(key).await.map_err(|error| {
        let (error_class, exit_code) = classify_tracker_error(&error);
        CommandResult::failure(COMMAND, error_class, error.to_string(), exit_code)
    })?;

    let description = match &args.description {
        Some(description) => description.clone(),
        None => ticket.text(),
    };
    Ok(EstimationRequest::new(description).with_ticket(ticket))
}

fn classify_tracker_error(error: &TrackerError) -> (&'static str, u8) {
    match error {
        TrackerError::NotConfigured => ("tracker_not_configured", 2),
        TrackerError::NotFound(_) => ("ticket_not_found", 2),
        TrackerError::MalformedIdentifier(_) => ("invalid_ticket_key", 2),
        TrackerError::AuthFailed | TrackerError::PermissionDenied(_) => ("tracker_auth", 2),
        TrackerError::Timeout { .. }
        | TrackerError::Connection(_)
        | TrackerError::ServerError { .. }
        | TrackerError::Decode(_) => ("tracker_unavailable", 1),
    }
}

fn build_phase_plan(args: &EstimateArgs) -> Result<PhasePlan, String> {
    let mut plan = PhasePlan::default();

    for weight in &args.phase_weights {
        let (name, value) = weight
            .split_once('=')
            .ok_or_else(|| format!("invalid --phase-weight `{weight}`; use name=percent"))?;
        let pct: Decimal = value
            .trim()
            .parse()
            .map_err(|_| format!("invalid percentage in --phase-weight `{weight}`"))?;
        plan.set_weight(Phase::from(name.trim()), pct);
    }

    for name in &args.exclude_phases {
        plan.exclude(&Phase::from(name.trim()));
    }

    Ok(plan)
}
