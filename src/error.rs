//! Crate-level error type for callers that do not care which layer failed.

use crate::config::ConfigurationError;
use crate::events::PublishError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkOrderError {
    #[error("Order {0} not found")]
    NotFound(Uuid),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Precondition failed: {0}")]
    PreconditionError(String),
    #[error("Sub-state mapping error: {0}")]
    MappingError(String),
    #[error("Order {0} was modified concurrently; reload and retry")]
    ConflictError(Uuid),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Event error: {0}")]
    EventError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl WorkOrderError {
    /// Stable error kind, matching `StateMachineError::kind` for shared variants
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::PreconditionError(_) => "precondition_error",
            Self::MappingError(_) => "mapping_error",
            Self::ConflictError(_) => "conflict_error",
            Self::DatabaseError(_) => "persistence_error",
            Self::EventError(_) => "event_error",
            Self::ConfigurationError(_) => "configuration_error",
        }
    }
}

impl From<serde_json::Error> for WorkOrderError {
    fn from(error: serde_json::Error) -> Self {
        WorkOrderError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for WorkOrderError {
    fn from(err: sqlx::Error) -> Self {
        WorkOrderError::DatabaseError(err.to_string())
    }
}

impl From<ConfigurationError> for WorkOrderError {
    fn from(err: ConfigurationError) -> Self {
        WorkOrderError::ConfigurationError(err.to_string())
    }
}

impl From<PublishError> for WorkOrderError {
    fn from(err: PublishError) -> Self {
        WorkOrderError::EventError(err.to_string())
    }
}

pub type WorkOrderResult<T> = anyhow::Result<T, WorkOrderError>;
