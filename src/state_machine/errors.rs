use crate::error::WorkOrderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Machine-readable reason a requested transition was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialCode {
    /// Requested state equals the current state
    SelfTransition,
    /// The pair is not declared in the transition graph
    TransitionNotAllowed,
    /// Target state demands a non-empty reason
    ReasonRequired,
    /// A state value could not be recognized
    UnknownState,
    /// A free-text field exceeded the configured limit
    NoteTooLong,
}

impl DenialCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfTransition => "self_transition",
            Self::TransitionNotAllowed => "transition_not_allowed",
            Self::ReasonRequired => "reason_required",
            Self::UnknownState => "unknown_state",
            Self::NoteTooLong => "note_too_long",
        }
    }
}

impl fmt::Display for DenialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the order state-change pipeline
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("Order {order_id} not found")]
    NotFound { order_id: Uuid },

    #[error("Invalid state transition ({code}): {message}")]
    Validation { code: DenialCode, message: String },

    #[error("Precondition failed: {reason}")]
    Precondition { reason: String },

    #[error("Sub-state mapping missing for {state}: {reason}")]
    Mapping { state: String, reason: String },

    #[error("Concurrent modification detected for order {order_id}")]
    Conflict { order_id: Uuid },

    #[error("Persistence operation failed: {reason}")]
    PersistenceFailed { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateMachineError {
    /// Stable error kind for callers rendering a user-facing failure
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation_error",
            Self::Precondition { .. } => "precondition_error",
            Self::Mapping { .. } => "mapping_error",
            Self::Conflict { .. } => "conflict_error",
            Self::PersistenceFailed { .. } | Self::Serialization(_) => "persistence_error",
        }
    }

    /// Only conflicts are worth a reload-and-retry by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn denial_code(&self) -> Option<DenialCode> {
        match self {
            Self::Validation { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Specific error type for precondition guard failures
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Business rule violation: {rule}")]
    BusinessRuleViolation { rule: String },

    #[error("Resource not available: {resource}")]
    ResourceUnavailable { resource: String },

    #[error("Guard lookup failed: {0}")]
    Lookup(#[from] PersistenceError),
}

/// Specific error type for storage backends
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to save transition: {reason}")]
    TransitionSaveFailed { reason: String },

    #[error("Failed to resolve current state: {entity_id}")]
    StateResolutionFailed { entity_id: String },

    #[error("Concurrent modification detected for entity {entity_id}")]
    ConcurrentModification { entity_id: Uuid },

    #[error("Invalid transition data: {field}")]
    InvalidTransitionData { field: String },

    #[error("Unit of work already finished")]
    UnitClosed,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<GuardError> for StateMachineError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Lookup(inner) => inner.into(),
            other => Self::Precondition {
                reason: other.to_string(),
            },
        }
    }
}

impl From<PersistenceError> for StateMachineError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::ConcurrentModification { entity_id } => Self::Conflict {
                order_id: entity_id,
            },
            other => Self::PersistenceFailed {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Helper function to create validation denials
pub fn validation_denied(code: DenialCode, message: impl Into<String>) -> StateMachineError {
    StateMachineError::Validation {
        code,
        message: message.into(),
    }
}

/// Helper function to create business rule violations
pub fn business_rule_violation(rule: impl Into<String>) -> GuardError {
    GuardError::BusinessRuleViolation { rule: rule.into() }
}

/// Helper function to create missing-resource guard errors
pub fn resource_unavailable(resource: impl Into<String>) -> GuardError {
    GuardError::ResourceUnavailable {
        resource: resource.into(),
    }
}

impl From<StateMachineError> for WorkOrderError {
    fn from(err: StateMachineError) -> Self {
        match err {
            StateMachineError::NotFound { order_id } => WorkOrderError::NotFound(order_id),
            StateMachineError::Validation { .. } => WorkOrderError::ValidationError(err.to_string()),
            StateMachineError::Precondition { reason } => WorkOrderError::PreconditionError(reason),
            StateMachineError::Mapping { .. } => WorkOrderError::MappingError(err.to_string()),
            StateMachineError::Conflict { order_id } => WorkOrderError::ConflictError(order_id),
            StateMachineError::PersistenceFailed { reason } => WorkOrderError::DatabaseError(reason),
            StateMachineError::Serialization(e) => WorkOrderError::DatabaseError(e.to_string()),
        }
    }
}
