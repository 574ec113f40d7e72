use thiserror::Error;

use crate::session::SessionState;

/// Errors reported by the pool, the query strategies and the session.
///
/// Every variant is local and recoverable: the operation that returned it
/// left the session exactly as it found it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// The operation is not permitted in the current state.
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// The label is outside the declared label space.
    #[error("label {label} is not in the label space")]
    InvalidLabel { label: i32 },

    /// A query was attempted on an empty pool.
    #[error("the unlabeled pool is empty")]
    EmptyPool,

    /// Internal pool-index misuse. Seeing this outside the pool's own tests
    /// means the session logic is wrong.
    #[error("pool index {index} out of range for pool of size {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The classifier failed to fit, predict or score.
    #[error("classifier failed: {0}")]
    Model(String),

    /// Session construction was rejected.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}

impl SessionError {
    /// Wrap a classifier failure, keeping the whole context chain.
    pub fn model(err: anyhow::Error) -> Self {
        SessionError::Model(format!("{:#}", err))
    }

    /// Whether an adapter may retry the same call once the cause is resolved.
    /// Label errors need new human input and are never retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::InvalidState { .. })
    }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
