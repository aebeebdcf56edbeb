use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

/// Coarse classification of a [`CreLoanError`], stable across context layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An input failed a precondition before any computation ran.
    Validation,
    /// A computed closing balance did not land on the declared future value.
    Reconciliation,
    /// Division by zero or a solver that failed to converge.
    Numeric,
    /// JSON conversion failure at the edges.
    Serialization,
}

#[derive(Debug, Error)]
pub enum CreLoanError {
    #[error("Invalid input: {field} = {value} ({reason})")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Reconciliation failure: {field} closed at {actual}, expected {expected}")]
    Reconciliation {
        field: String,
        actual: Decimal,
        expected: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("{operation}: {source}")]
    Context {
        operation: String,
        #[source]
        source: Box<CreLoanError>,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CreLoanError {
    /// Shorthand for an [`CreLoanError::InvalidInput`] carrying the offending value.
    pub fn invalid(field: &str, value: impl Display, reason: impl Into<String>) -> Self {
        CreLoanError::InvalidInput {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap this error with the name of the operation that was being computed.
    pub fn within(self, operation: impl Into<String>) -> Self {
        CreLoanError::Context {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CreLoanError::InvalidInput { .. } => ErrorKind::Validation,
            CreLoanError::Reconciliation { .. } => ErrorKind::Reconciliation,
            CreLoanError::DivisionByZero { .. } | CreLoanError::ConvergenceFailure { .. } => {
                ErrorKind::Numeric
            }
            CreLoanError::Context { source, .. } => source.kind(),
            CreLoanError::SerializationError(_) => ErrorKind::Serialization,
        }
    }

    /// The field named by the innermost error, if it names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            CreLoanError::InvalidInput { field, .. } | CreLoanError::Reconciliation { field, .. } => {
                Some(field.as_str())
            }
            CreLoanError::Context { source, .. } => source.field(),
            _ => None,
        }
    }

    /// The innermost error with every context layer peeled off.
    pub fn root(&self) -> &CreLoanError {
        match self {
            CreLoanError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for CreLoanError {
    fn from(e: serde_json::Error) -> Self {
        CreLoanError::SerializationError(e.to_string())
    }
}

/// Adds call context to a failed computation without swallowing it.
pub trait Contextual<T> {
    fn context(self, operation: &str) -> Result<T, CreLoanError>;
}

impl<T> Contextual<T> for Result<T, CreLoanError> {
    fn context(self, operation: &str) -> Result<T, CreLoanError> {
        self.map_err(|e| e.within(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_survives_context_layers() {
        let err = CreLoanError::Reconciliation {
            field: "capital".into(),
            actual: dec!(0.01),
            expected: dec!(0.005),
        }
        .within("interest and principal schedule")
        .within("balloon payment");

        assert_eq!(err.kind(), ErrorKind::Reconciliation);
        assert_eq!(err.field(), Some("capital"));
        assert!(matches!(err.root(), CreLoanError::Reconciliation { .. }));
    }

    #[test]
    fn test_context_display_chains_operations() {
        let err: Result<(), _> = Err(CreLoanError::invalid("periods", 0, "must be greater than 0"));
        let msg = err.context("payment").context("loan payment").unwrap_err().to_string();
        assert_eq!(
            msg,
            "loan payment: payment: Invalid input: periods = 0 (must be greater than 0)"
        );
    }
}
