//! Error types for the launchpad

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single field-level validation failure, surfaced inline at the wizard
/// step that owns the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Main error type for the launchpad.
///
/// Variants carry owned strings only so that one outcome can be cloned out to
/// every caller awaiting the same submission.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LaunchError {
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Cell capacity exceeded: need {needed} {unit}, {available} available")]
    CapacityExceeded {
        unit: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Cell is sealed and can no longer be modified")]
    SealedCellMutation,

    #[error("Invalid address {input:?}: {reason}")]
    AddressFormat { input: String, reason: String },

    #[error("A submission is already in flight")]
    SubmissionInProgress,

    #[error("Wallet rejected the request: {0}")]
    UserRejected(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Token {token_id} not found in catalog")]
    CatalogLookup { token_id: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Cell decoding error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LaunchError {
    /// Single-field validation error
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        LaunchError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn address(input: &str, reason: impl Into<String>) -> Self {
        LaunchError::AddressFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if the user can retry the same draft unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LaunchError::UserRejected(_) | LaunchError::Timeout { .. }
        )
    }

    /// Stable short label for metrics and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            LaunchError::Validation(_) => "validation",
            LaunchError::CapacityExceeded { .. } => "capacity_exceeded",
            LaunchError::SealedCellMutation => "sealed_cell_mutation",
            LaunchError::AddressFormat { .. } => "address_format",
            LaunchError::SubmissionInProgress => "submission_in_progress",
            LaunchError::UserRejected(_) => "user_rejected",
            LaunchError::Timeout { .. } => "timeout",
            LaunchError::CatalogLookup { .. } => "catalog_lookup",
            LaunchError::InvalidStateTransition { .. } => "invalid_state_transition",
            LaunchError::Decode(_) => "decode",
            LaunchError::Config(_) => "config",
            LaunchError::Internal(_) => "internal",
        }
    }

    /// Field errors when this is a validation failure
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            LaunchError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

/// Serializable view of an error for API bodies and session snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl From<&LaunchError> for ErrorReport {
    fn from(err: &LaunchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
            fields: err.field_errors().to_vec(),
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for launchpad operations
pub type LaunchResult<T> = Result<T, LaunchError>;
