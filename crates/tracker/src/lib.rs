pub mod client;

use async_trait::async_trait;
use thiserror::Error;

use hourcast_core::domain::ticket::TicketSnapshot;

pub use client::HttpTrackerClient;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("tracker configuration missing: base_url, email, and api_token are required")]
    NotConfigured,
    #[error("ticket `{0}` was not found or you lack permission to view it")]
    NotFound(String),
    #[error("tracker authentication failed: check the configured email and API token")]
    AuthFailed,
    #[error("access denied to ticket `{0}`")]
    PermissionDenied(String),
    #[error("invalid ticket identifier `{0}`; use a key like PROJ-123")]
    MalformedIdentifier(String),
    #[error("tracker server error (HTTP {status})")]
    ServerError { status: u16 },
    #[error("tracker request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("cannot connect to the tracker: {0}")]
    Connection(String),
    #[error("tracker response could not be decoded: {0}")]
    Decode(String),
}

/// Read-only ticket access. The estimation core only ever needs one
/// snapshot per ticket key.
#[async_trait]
pub trait TicketFetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<TicketSnapshot, TrackerError>;
}
