//! Port for the external language-model service. Implementations live
//! outside the core; the pipeline only needs a prompt-in, text-out call
//! with distinguishable failure modes so it can fail over to the
//! heuristic tier.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("model gateway is not configured (missing credentials)")]
    MissingCredentials,
    #[error("model gateway authentication failed: {0}")]
    Auth(String),
    #[error("model gateway quota exhausted: {0}")]
    Quota(String),
    #[error("model gateway request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("model gateway connection failed: {0}")]
    Connection(String),
    #[error("model gateway returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// Single request/response completion call. No streaming, no retries; a
/// call completes, times out, or errors.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError>;
}
