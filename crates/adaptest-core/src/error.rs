//! Engine error types.
//!
//! Every error is local and terminal for the operation that raised it; the
//! engine never retries internally. Bank exhaustion and degenerate
//! estimates are not errors (see `StopReason::BankExhausted` and
//! `estimator::GridEdge`).

use thiserror::Error;

use crate::model::SessionStatus;

/// Errors returned by the CAT engine.
#[derive(Debug, Error)]
pub enum CatError {
    /// The operation is not valid in the session's current state.
    #[error("session {session_id} is {status}, operation not allowed")]
    InvalidSession {
        session_id: String,
        status: SessionStatus,
    },

    /// The submitted item is not the one most recently issued.
    #[error("session {session_id}: submitted item '{submitted}' does not match issued item {}", .expected.as_deref().unwrap_or("<none>"))]
    UnknownItem {
        session_id: String,
        expected: Option<String>,
        submitted: String,
    },

    /// No session exists with the given id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Start request or engine configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An item carries parameters outside the 3PL model.
    #[error("invalid item '{item_id}': {reason}")]
    InvalidItem { item_id: String, reason: String },

    /// An external collaborator (item bank, session store) failed.
    #[error("backend error: {0:#}")]
    Backend(#[source] anyhow::Error),
}

impl CatError {
    /// Returns `true` if the caller may retry the operation unchanged.
    ///
    /// Only collaborator failures qualify; the caller owns retry policy and
    /// should only retry idempotent operations (start, resume).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatError::Backend(_))
    }

    /// Returns `true` if the error indicates client/protocol misuse.
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(
            self,
            CatError::UnknownItem { .. } | CatError::InvalidSession { .. }
        )
    }
}
