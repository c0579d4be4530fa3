//! Service-level error taxonomy.
//!
//! Components collapse domain and store failures into one flat enum so
//! callers (a transport layer, a job runner) can map errors without knowing
//! which layer produced them.

use thiserror::Error;

use stockline_core::DomainError;

use crate::store::StoreError;

/// Result type returned by every component operation.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed on `{field}`: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("{kind} named '{name}' already exists")]
    DuplicateName { kind: String, name: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("'{0}' is not in the catalog")]
    OutOfCatalog(String),

    #[error("insufficient stock for '{name}': requested {requested}, available {available}")]
    InsufficientStock {
        name: String,
        requested: i64,
        available: i64,
    },

    /// Stale version or a competing write. Retryable after re-reading.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// The store could not serve the request. Retryable by the caller; never retried internally.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

impl ServiceError {
    pub fn not_found(entity: impl Into<String>, id: impl core::fmt::Display) -> Self {
        DomainError::not_found(entity, id).into()
    }

    /// True for failures that may succeed when the same call is repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::ConcurrencyConflict(_) | ServiceError::PersistenceUnavailable(_)
        )
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation { field, reason } => {
                ServiceError::ValidationFailed { field, reason }
            }
            DomainError::DuplicateName { kind, name } => ServiceError::DuplicateName { kind, name },
            DomainError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            DomainError::OutOfCatalog(name) => ServiceError::OutOfCatalog(name),
            DomainError::InsufficientStock {
                name,
                requested,
                available,
            } => ServiceError::InsufficientStock {
                name,
                requested,
                available,
            },
            DomainError::Conflict(msg) => ServiceError::ConcurrencyConflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(msg) => ServiceError::PersistenceUnavailable(msg),
            StoreError::Conflict(msg) => ServiceError::ConcurrencyConflict(msg),
        }
    }
}
