//! Error types for leave-engine operations.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// A single field-level problem found while validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g. `custom_leaves[0].max_balance`).
    pub field: String,
    pub message: String,
}

/// Every problem found by a constructor, in the order they were detected.
///
/// Validation never stops at the first problem so callers can fix a whole
/// configuration in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Merge errors from a nested value, prefixing their field paths.
    pub fn extend_nested(&mut self, prefix: &str, nested: ValidationErrors) {
        for err in nested.0 {
            let field = if err.field.is_empty() {
                prefix.to_string()
            } else {
                format!("{}.{}", prefix, err.field)
            };
            self.0.push(FieldError {
                field,
                message: err.message,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(())` when nothing was recorded, otherwise `PlanError::InvalidParameter`.
    pub fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(PlanError::InvalidParameter(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| {
                if e.field.is_empty() {
                    e.message.clone()
                } else {
                    format!("{}: {}", e.field, e.message)
                }
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// Malformed configuration or query arguments.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(ValidationErrors),

    #[error("Insufficient balance for {leave} on {date}: requested {requested}, available {available}")]
    InsufficientBalance {
        leave: String,
        date: NaiveDate,
        requested: f64,
        available: f64,
    },

    #[error("Constraint violation for {leave} on {date}: {reason}")]
    ConstraintViolation {
        leave: String,
        date: NaiveDate,
        reason: String,
    },

    /// A mutation was attempted inside a cycle that has already been finalized.
    #[error("Cycle closed for {leave}: cannot modify {date}")]
    CycleClosed { leave: String, date: NaiveDate },

    #[error("Unknown leave type: {0}")]
    UnknownLeave(String),

    #[error("Recurrence error: {0}")]
    Recurrence(String),
}

impl PlanError {
    /// Shorthand for a single-field `InvalidParameter`.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push(field, message);
        PlanError::InvalidParameter(errors)
    }

    /// Errors the optimizer may absorb into a partial result.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlanError::InsufficientBalance { .. } | PlanError::ConstraintViolation { .. }
        )
    }
}

/// Convenience alias used throughout leave-engine.
pub type Result<T> = std::result::Result<T, PlanError>;
