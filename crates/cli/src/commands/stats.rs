use serde::Serialize;

use hourcast_core::config::{AppConfig, LoadOptions};
use hourcast_core::learning::{AccuracyStats, LearningSystem};
use hourcast_history::JsonFileHistoryStore;

use super::{block_on, CommandResult};

const COMMAND: &str = "stats";

#[derive(Debug, Serialize)]
struct StatsReport {
    command: &'static str,
    status: &'static str,
    accuracy: AccuracyStats,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    let outcome = block_on(async {
        let learning = LearningSystem::new(JsonFileHistoryStore::new(&config.history.path));
        learning.accuracy_stats().await
    });

    match outcome {
        Ok(Ok(accuracy)) => {
            CommandResult::report(0, StatsReport { command: COMMAND, status: "ok", accuracy })
        }
        Ok(Err(error)) => CommandResult::failure(COMMAND, "persistence", error.to_string(), 1),
        Err(message) => CommandResult::failure(COMMAND, "runtime", message, 1),
    }
}
