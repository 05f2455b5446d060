use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub llm: LlmConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

/// Issue-tracker connection. All three credentials must be present for
/// ticket fetching to be enabled; estimation from a bare description
/// works without any of them.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<SecretString>,
    pub timeout_secs: u64,
}

impl TrackerConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.email.is_some() && self.api_token.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Fixed sampling seed so identical prompts produce identical
    /// completions.
    pub seed: u64,
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct HistoryConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub history_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub tracker_base_url: Option<String>,
    pub tracker_email: Option<String>,
    pub tracker_api_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig {
                base_url: None,
                email: None,
                api_token: None,
                timeout_secs: 10,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                seed: 42,
            },
            history: HistoryConfig { path: PathBuf::from("estimation_history.json") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    tracker: Option<TrackerPatch>,
    llm: Option<LlmPatch>,
    history: Option<HistoryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackerPatch {
    base_url: Option<String>,
    email: Option<String>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("hourcast.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(tracker) = patch.tracker {
            if let Some(base_url) = tracker.base_url {
                self.tracker.base_url = Some(base_url);
            }
            if let Some(email) = tracker.email {
                self.tracker.email = Some(email);
            }
            if let Some(api_token_value) = tracker.api_token {
                self.tracker.api_token = Some(secret_value(api_token_value));
            }
            if let Some(timeout_secs) = tracker.timeout_secs {
                self.tracker.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(seed) = llm.seed {
                self.llm.seed = seed;
            }
        }

        if let Some(history) = patch.history {
            if let Some(path) = history.path {
                self.history.path = path;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HOURCAST_TRACKER_BASE_URL") {
            self.tracker.base_url = Some(value);
        }
        if let Some(value) = read_env("HOURCAST_TRACKER_EMAIL") {
            self.tracker.email = Some(value);
        }
        if let Some(value) = read_env("HOURCAST_TRACKER_API_TOKEN") {
            self.tracker.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("HOURCAST_TRACKER_TIMEOUT_SECS") {
            self.tracker.timeout_secs = parse_u64("HOURCAST_TRACKER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HOURCAST_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("HOURCAST_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("HOURCAST_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("HOURCAST_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("HOURCAST_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("HOURCAST_LLM_SEED") {
            self.llm.seed = parse_u64("HOURCAST_LLM_SEED", &value)?;
        }

        if let Some(value) = read_env("HOURCAST_HISTORY_PATH") {
            self.history.path = PathBuf::from(value);
        }

        let log_level =
            read_env("HOURCAST_LOGGING_LEVEL").or_else(|| read_env("HOURCAST_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HOURCAST_LOGGING_FORMAT").or_else(|| read_env("HOURCAST_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(history_path) = overrides.history_path {
            self.history.path = history_path;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(tracker_base_url) = overrides.tracker_base_url {
            self.tracker.base_url = Some(tracker_base_url);
        }
        if let Some(tracker_email) = overrides.tracker_email {
            self.tracker.email = Some(tracker_email);
        }
        if let Some(tracker_api_token) = overrides.tracker_api_token {
            self.tracker.api_token = Some(secret_value(tracker_api_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_tracker(&self.tracker)?;
        validate_llm(&self.llm)?;
        validate_history(&self.history)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("hourcast.toml"), PathBuf::from("config/hourcast.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_tracker(tracker: &TrackerConfig) -> Result<(), ConfigError> {
    let any_set =
        tracker.base_url.is_some() || tracker.email.is_some() || tracker.api_token.is_some();
    if any_set && !tracker.is_configured() {
        return Err(ConfigError::Validation(
            "tracker configuration is partial: base_url, email, and api_token must all be set"
                .to_string(),
        ));
    }

    if let Some(base_url) = &tracker.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "tracker.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if tracker.timeout_secs == 0 || tracker.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "tracker.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.base_url.trim().is_empty() {
        return Err(ConfigError::Validation("llm.base_url must not be empty".to_string()));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_history(history: &HistoryConfig) -> Result<(), ConfigError> {
    if history.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("history.path must not be empty".to_string()));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}
