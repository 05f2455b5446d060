use serde::Serialize;

use hourcast_core::config::{AppConfig, LoadOptions, LogFormat};

use super::CommandResult;

const COMMAND: &str = "config";

#[derive(Debug, Serialize)]
struct ConfigReport {
    command: &'static str,
    status: &'static str,
    tracker: TrackerView,
    llm: LlmView,
    history_path: String,
    logging: LoggingView,
}

#[derive(Debug, Serialize)]
struct TrackerView {
    configured: bool,
    base_url: Option<String>,
    email: Option<String>,
    api_token: &'static str,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct LlmView {
    configured: bool,
    api_key: &'static str,
    base_url: String,
    model: String,
    timeout_secs: u64,
    seed: u64,
}

#[derive(Debug, Serialize)]
struct LoggingView {
    level: String,
    format: LogFormat,
}

const REDACTED: &str = "<redacted>";
const UNSET: &str = "<unset>";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    CommandResult::report(
        0,
        ConfigReport {
            command: COMMAND,
            status: "ok",
            tracker: TrackerView {
                configured: config.tracker.is_configured(),
                base_url: config.tracker.base_url.clone(),
                email: config.tracker.email.clone(),
                api_token: if config.tracker.api_token.is_some() { REDACTED } else { UNSET },
                timeout_secs: config.tracker.timeout_secs,
            },
            llm: LlmView {
                configured: config.llm.is_configured(),
                api_key: if config.llm.api_key.is_some() { REDACTED } else { UNSET },
                base_url: config.llm.base_url.clone(),
                model: config.llm.model.clone(),
                timeout_secs: config.llm.timeout_secs,
                seed: config.llm.seed,
            },
            history_path: config.history.path.display().to_string(),
            logging: LoggingView {
                level: config.logging.level.clone(),
                format: config.logging.format,
            },
        },
    )
}
