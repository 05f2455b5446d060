//! OpenAI-compatible chat-completions gateway. One request, one reply,
//! fixed sampling seed; every failure mode maps to a distinguishable
//! [`GatewayError`] so the estimator can fail over to heuristics.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use hourcast_core::config::LlmConfig;
use hourcast_core::gateway::{GatewayError, ModelGateway};

const SYSTEM_PROMPT: &str = "You are a senior software architect and project manager with 15+ \
years of experience in estimating software development tasks. Provide accurate, realistic \
estimates based on industry standards.";

const MAX_COMPLETION_TOKENS: u32 = 1000;

pub struct OpenAiGateway {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    seed: u64,
    timeout_secs: u64,
}

impl OpenAiGateway {
    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        let api_key = match &config.api_key {
            Some(key) if !key.expose_secret().trim().is_empty() => key.clone(),
            _ => return Err(GatewayError::MissingCredentials),
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| GatewayError::Connection(error.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            seed: config.seed,
            timeout_secs: config.timeout_secs,
        })
    }

    fn request_body(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: prompt.to_string() },
            ],
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            seed: self.seed,
        }
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            event_name = "gateway.request",
            model = %self.model,
            seed = self.seed,
            "sending completion request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    GatewayError::Timeout { timeout_secs: self.timeout_secs }
                } else {
                    GatewayError::Connection(error.to_string())
                }
            })?;

        match response.status().as_u16() {
            200 => {}
            401 | 403 => {
                return Err(GatewayError::Auth(format!("HTTP {}", response.status())))
            }
            429 => return Err(GatewayError::Quota("rate or quota limit hit".to_string())),
            status => {
                return Err(GatewayError::Connection(format!("unexpected HTTP {status}")))
            }
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|error| GatewayError::MalformedResponse(error.to_string()))?;
        extract_content(reply)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_completion_tokens: u32,
    seed: u64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn extract_content(reply: ChatResponse) -> Result<String, GatewayError> {
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| {
            GatewayError::MalformedResponse("reply carried no message content".to_string())
        })
}
