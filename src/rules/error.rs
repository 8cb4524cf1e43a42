//! Error types for routing rule administration

use thiserror::Error;

/// Errors returned by rule CRUD operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("Routing rule '{0}' not found")]
    NotFound(String),

    #[error("Routing rule '{0}' already exists")]
    Duplicate(String),

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },
}

impl RuleError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        RuleError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
