//! Unified error handling for secure actions.
//!
//! Every public operation returns [`ActionError`]. Callers can tell a missing
//! or purged action ([`ActionError::NotFound`]) apart from a wrong credential
//! ([`ActionError::InvalidKey`]), and a genuine but spent token
//! ([`ActionError::Expired`], [`ActionError::LimitExceeded`]) apart from both.

use crate::db::DbError;
use crate::token::TokenError;
use thiserror::Error;

// ============================================================================
// Action Errors (public operations)
// ============================================================================

/// Errors returned by the secure action engine.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("malformed token: {0}")]
    MalformedToken(#[from] TokenError),

    #[error("action not found: {0}")]
    NotFound(String),

    #[error("the key is invalid for this action")]
    InvalidKey,

    #[error("the action expired")]
    Expired,

    #[error("the action's invocation limit was exceeded")]
    LimitExceeded,

    #[error("an action named {0:?} already exists")]
    DuplicateName(String),

    #[error("invalid action request: {0}")]
    InvalidRequest(String),

    #[error("no handler registered as {0:?}")]
    UnknownHandler(String),

    /// The handler reported that the action did not happen.
    #[error("handler failed: {0}")]
    Callback(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Backend failure, never swallowed.
    #[error("store failure: {0}")]
    Store(DbError),
}

impl ActionError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "malformed_token",
            Self::NotFound(_) => "not_found",
            Self::InvalidKey => "invalid_key",
            Self::Expired => "expired",
            Self::LimitExceeded => "limit_exceeded",
            Self::DuplicateName(_) => "duplicate_name",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnknownHandler(_) => "unknown_handler",
            Self::Callback(_) => "callback_failed",
            Self::Credential(_) => "credential_error",
            Self::Config(_) => "invalid_config",
            Self::Store(_) => "store_failure",
        }
    }

    /// Whether this error reflects a genuine token that can no longer be used.
    pub fn is_spent(&self) -> bool {
        matches!(self, Self::Expired | Self::LimitExceeded)
    }
}

impl From<DbError> for ActionError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ActionNotFound(id) => ActionError::NotFound(format!("id {}", id)),
            DbError::NoMatch { column, value } => {
                ActionError::NotFound(format!("{} {:?}", column, value))
            }
            DbError::NameExists(name) => ActionError::DuplicateName(name),
            other => ActionError::Store(other),
        }
    }
}

/// Result type for secure action operations.
pub type ActionResult<T> = Result<T, ActionError>;
