//! Protocol error taxonomy

use serde_json::Value;
use thiserror::Error;

/// Errors raised by the A2A protocol layer.
#[derive(Debug, Error)]
pub enum A2aError {
    /// The payload did not decode into any known request variant.
    #[error("failed to decode A2A request: {reason}")]
    Decode { reason: String, payload: Value },

    /// No task registered under the given identifier.
    #[error("task not found: {0}")]
    NotFound(String),

    /// The requested status change violates the task state machine.
    #[error("invalid task transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// The peer returned an error envelope or was unreachable.
    #[error("remote agent failure: {0}")]
    RemoteFailure(String),

    /// Catch-all for failures that should never escape as-is.
    #[error("internal error: {0}")]
    Internal(String),
}

impl A2aError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            A2aError::Decode { .. } => crate::protocol::INVALID_PARAMS,
            A2aError::NotFound(_) => crate::protocol::TASK_NOT_FOUND,
            A2aError::InvalidTransition { .. } => crate::protocol::INTERNAL_ERROR,
            A2aError::RemoteFailure(_) => crate::protocol::INTERNAL_ERROR,
            A2aError::Internal(_) => crate::protocol::INTERNAL_ERROR,
        }
    }
}
