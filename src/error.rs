//! Error handling for fundbook
//!
//! Engine operations return [`LedgerError`] so callers can render a precise
//! form error (field name, violated constraint). The command layer wraps
//! these in `anyhow` for context chaining.

use thiserror::Error;

/// Core error types for fund accounting operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("limited partner {lp_id} has no response for capital call {capital_call_id}")]
    ResponseNotFound { capital_call_id: i64, lp_id: i64 },

    #[error("fund {fund_id} has no LP commitments; call percentage cannot be derived")]
    NoCommitments { fund_id: i64 },

    #[error("permission denied: {action}")]
    Permission { action: String },

    #[error("ambiguous amounts: {0}")]
    ArithmeticAmbiguity(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl LedgerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        LedgerError::NotFound { entity, id }
    }

    pub fn permission(action: impl Into<String>) -> Self {
        LedgerError::Permission {
            action: action.into(),
        }
    }

    /// Stable machine-readable error kind, used by the JSON API
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation { .. } => "validation",
            LedgerError::NotFound { .. } | LedgerError::ResponseNotFound { .. } => "not_found",
            LedgerError::NoCommitments { .. } => "no_commitments",
            LedgerError::Permission { .. } => "permission",
            LedgerError::ArithmeticAmbiguity(_) => "arithmetic_ambiguity",
            LedgerError::Database(_) => "database",
        }
    }

    /// Offending input field, when the error is tied to one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            LedgerError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = LedgerError::validation("currency", "unknown currency code 'XYZ'");
        assert_eq!(err.to_string(), "invalid currency: unknown currency code 'XYZ'");

        let err = LedgerError::not_found("fund", 42);
        assert_eq!(err.to_string(), "fund 42 not found");
    }

    #[test]
    fn test_anyhow_context_chains_errors() {
        use anyhow::Context;
        let result: anyhow::Result<()> =
            Err(LedgerError::NoCommitments { fund_id: 7 }).context("failed to create capital call");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("failed to create capital call"));
        let root = err.downcast_ref::<LedgerError>().expect("root cause is a LedgerError");
        assert_eq!(root.kind(), "no_commitments");
    }

    #[test]
    fn test_kinds_and_fields() {
        assert_eq!(LedgerError::validation("date", "bad").field(), Some("date"));
        assert_eq!(
            LedgerError::ResponseNotFound {
                capital_call_id: 1,
                lp_id: 2
            }
            .kind(),
            "not_found"
        );
        assert_eq!(LedgerError::permission("delete fund").kind(), "permission");
        assert_eq!(
            LedgerError::ArithmeticAmbiguity("x".into()).field(),
            None
        );
    }
}
