//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// uniqueness, availability, stale versions). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A field failed validation (e.g. empty name, negative quantity).
    #[error("validation failed on `{field}`: {reason}")]
    Validation { field: String, reason: String },

    /// A name is already taken within its catalog kind.
    #[error("{kind} named '{name}' already exists")]
    DuplicateName { kind: String, name: String },

    /// A requested record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// An order line names a product that is not catalogued.
    #[error("'{0}' is not in the catalog")]
    OutOfCatalog(String),

    /// An order line asks for more than is on hand.
    #[error("insufficient stock for '{name}': requested {requested}, available {available}")]
    InsufficientStock {
        name: String,
        requested: i64,
        available: i64,
    },

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn duplicate_name(kind: impl core::fmt::Display, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind: kind.to_string(),
            name: name.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn out_of_catalog(name: impl Into<String>) -> Self {
        Self::OutOfCatalog(name.into())
    }

    pub fn insufficient_stock(name: impl Into<String>, requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            name: name.into(),
            requested,
            available,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
