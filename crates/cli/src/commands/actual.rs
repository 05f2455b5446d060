use rust_decimal::Decimal;
use serde::Serialize;

use hourcast_agent::OpenAiGateway;
use hourcast_core::config::{AppConfig, LoadOptions};
use hourcast_core::errors::ApplicationError;
use hourcast_core::estimator::Estimator;
use hourcast_core::learning::LearningSystem;
use hourcast_history::JsonFileHistoryStore;

use super::{block_on, CommandResult};

const COMMAND: &str = "actual";

#[derive(Debug, Serialize)]
struct ActualReport {
    command: &'static str,
    status: &'static str,
    ticket: String,
    actual_hours: Decimal,
    updated: bool,
}

pub fn run(ticket: &str, hours: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    let actual_hours: Decimal = match hours.trim().parse() {
        Ok(hours) => hours,
        Err(_) => {
            return CommandResult::failure(
                COMMAND,
                "invalid_argument",
                format!("`{hours}` is not a valid hour figure"),
                2,
            )
        }
    };

    let outcome = block_on(async {
        let learning = LearningSystem::new(JsonFileHistoryStore::new(&config.history.path));
        let estimator: Estimator<OpenAiGateway, _> = Estimator::new(None, learning);
        estimator.record_actual(ticket, actual_hours).await
    });

    match outcome {
        Ok(Ok(updated)) => CommandResult::report(
            if updated { 0 } else { 1 },
            ActualReport {
                command: COMMAND,
                status: if updated { "ok" } else { "not_found" },
                ticket: ticket.to_string(),
                actual_hours,
                updated,
            },
        ),
        Ok(Err(ApplicationError::Domain(error))) => {
            CommandResult::failure(COMMAND, "invalid_input", error.to_string(), 2)
        }
        Ok(Err(error)) => CommandResult::failure(COMMAND, "persistence", error.to_string(), 1),
        Err(message) => CommandResult::failure(COMMAND, "runtime", message, 1),
    }
}
