//! Error types shared across the market data services
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Failure talking to an upstream data source (catalog listing or
/// population query). Always transient from the engine's point of view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed upstream payload: {0}")]
    Decode(String),
}

impl SourceError {
    /// Rate limiting and server-side failures; callers may want to log
    /// these less loudly than decode failures.
    pub fn is_upstream_unavailable(&self) -> bool {
        match self {
            SourceError::Transport(_) => true,
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            SourceError::Decode(_) => false,
        }
    }
}
