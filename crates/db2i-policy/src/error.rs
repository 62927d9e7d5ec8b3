//! Policy and binding errors.

use thiserror::Error;

/// Errors from the SQL validator and the parameter binder.
///
/// All of these are client-attributable validation failures; none are
/// retried.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Statement exceeds the policy length cap.
    #[error("statement length {length} exceeds maximum of {max} characters")]
    StatementTooLong { length: usize, max: usize },

    /// Statement contains a restricted keyword.
    #[error("restricted keyword '{keyword}' is not allowed")]
    RestrictedKeyword { keyword: String },

    /// Read-only policy requires SELECT or WITH.
    #[error("read-only policy: statement must begin with SELECT or WITH, found '{found}'")]
    NotReadOnly { found: String },

    /// A required argument was neither supplied nor defaulted.
    #[error("missing required parameter '{name}'")]
    MissingParameter { name: String },

    /// An argument failed validation against its parameter spec.
    #[error("parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Placeholder/parameter mismatch in the statement.
    #[error("binding error: {0}")]
    Binding(String),
}

impl PolicyError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PolicyError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
