//! Policy evaluation errors
//!
//! Denials and invalid transitions are ordinary outcomes that callers branch
//! on. Only `MalformedTable` indicates a broken deployment and should abort
//! startup.

use thiserror::Error;

/// Errors returned by policy evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// Malformed or out-of-range input supplied by the caller
    #[error("validation error: {0}")]
    Validation(String),

    /// Role, standing, tier or eligibility check failed
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Record is terminal, or the condition for the transition is not met yet
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Council is not exactly three distinct eligible champions
    #[error("invalid council: {0}")]
    InvalidCouncil(String),

    /// Tier or action-role table violates its ordering invariants
    #[error("malformed policy table: {0}")]
    MalformedTable(String),
}

impl PolicyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PolicyError::Validation(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        PolicyError::AuthorizationDenied(msg.into())
    }

    pub fn transition(msg: impl Into<String>) -> Self {
        PolicyError::InvalidTransition(msg.into())
    }

    /// Whether this is an expected policy outcome rather than bad input
    pub fn is_denial(&self) -> bool {
        matches!(self, PolicyError::AuthorizationDenied(_))
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;
