use serde::Serialize;

use hourcast_core::config::{AppConfig, LoadOptions};
use hourcast_core::learning::HistoryStore;
use hourcast_history::JsonFileHistoryStore;

use super::{block_on, CommandResult};

const COMMAND: &str = "doctor";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    message: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    command: &'static str,
    status: &'static str,
    checks: Vec<DoctorCheck>,
}

pub fn run() -> CommandResult {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                message: error.to_string(),
            });
            return CommandResult::report(
                2,
                DoctorReport { command: COMMAND, status: "error", checks },
            );
        }
    };

    checks.push(if config.llm.is_configured() {
        DoctorCheck {
            name: "model_gateway",
            status: CheckStatus::Pass,
            message: format!("model `{}` configured with a fixed seed", config.llm.model),
        }
    } else {
        DoctorCheck {
            name: "model_gateway",
            status: CheckStatus::Skipped,
            message: "no API key configured; estimation will use the rule-based tier"
                .to_string(),
        }
    });

    checks.push(if config.tracker.is_configured() {
        DoctorCheck {
            name: "issue_tracker",
            status: CheckStatus::Pass,
            message: "tracker credentials configured".to_string(),
        }
    } else {
        DoctorCheck {
            name: "issue_tracker",
            status: CheckStatus::Skipped,
            message: "tracker not configured; only free-text estimation is available"
                .to_string(),
        }
    });

    let history_check = block_on(async {
        let store = JsonFileHistoryStore::new(&config.history.path);
        store.load_all().await
    });
    checks.push(match history_check {
        Ok(Ok(records)) => DoctorCheck {
            name: "history_store",
            status: CheckStatus::Pass,
            message: format!(
                "history readable at `{}` ({} records)",
                config.history.path.display(),
                records.len()
            ),
        },
        Ok(Err(error)) => DoctorCheck {
            name: "history_store",
            status: CheckStatus::Fail,
            message: error.to_string(),
        },
        Err(message) => {
            DoctorCheck { name: "history_store", status: CheckStatus::Fail, message }
        }
    });

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    CommandResult::report(
        u8::from(failed),
        DoctorReport {
            command: COMMAND,
            status: if failed { "error" } else { "ok" },
            checks,
        },
    )
}
