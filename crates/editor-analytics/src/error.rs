//! Errors raised inside the send pipeline

use thiserror::Error;

/// Failures of the pipeline itself. Transport outcomes are not errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics state lock poisoned")]
    StatePoisoned,

    #[error("failed to serialize hit: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("analytics task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("no async runtime available to send analytics")]
    NoRuntime,
}
