//! Backend task gateway
//!
//! The controller talks to the download backend only through
//! [`TaskGateway`]. Every call hands back the raw wire value; decoding is
//! lenient (see [`reply`]) because older backends answer with JSON text
//! rather than JSON objects.

pub mod http;
pub mod reply;
pub mod sim;

use crate::download::task::TaskId;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use http::HttpGateway;
pub use sim::{SimGateway, SimOptions};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("backend interface is not ready")]
    Unavailable,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("backend connection lost: {0}")]
    Disconnected(String),

    #[error("invalid backend endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("failed to decode backend payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    /// Transport-level problem rather than an answer from the backend
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout | Self::Disconnected(_) | Self::Unavailable
        )
    }
}

/// Operations the backend exposes for download tasks.
///
/// `cancel_download` is fire-and-forget: callers log its outcome but never
/// surface it to the user and never roll anything back on failure.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    /// Whether the backend interface has been initialised
    fn is_ready(&self) -> bool;

    async fn analyze(&self, url: &str) -> Result<Value, GatewayError>;

    async fn start_download(&self, url: &str, format_id: &str) -> Result<Value, GatewayError>;

    async fn start_batch_download(
        &self,
        urls: &[String],
        format_id: &str,
    ) -> Result<Value, GatewayError>;

    async fn pause_download(&self, task_id: &TaskId) -> Result<Value, GatewayError>;

    async fn resume_download(&self, task_id: &TaskId) -> Result<Value, GatewayError>;

    async fn retry_download(&self, task_id: &TaskId) -> Result<Value, GatewayError>;

    async fn cancel_download(&self, task_id: &TaskId) -> Result<Value, GatewayError>;
}
