//! Repository error model.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `RepositoryError` as follows:
//!
//! | SQLx Error | Constraint kind | RepositoryError |
//! |------------|-----------------|-----------------|
//! | Database | foreign key violation | `StillReferenced` |
//! | Database | any other | `Database` |
//! | any other | N/A | `Database` |
//!
//! Absence of a match is never an error: lookups return `Option`/`Vec`.

use gavel_core::{DomainError, Entity};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by sessions and repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The store rejected or failed the operation.
    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A row could not be removed or written because other rows point at it
    /// (or it points at a missing row).
    #[error("{operation} violates a foreign key: {message}")]
    StillReferenced {
        operation: &'static str,
        message: String,
    },

    /// The entity (or one it refers to) has no store identity yet.
    #[error("{0} has not been persisted yet")]
    Unpersisted(&'static str),

    /// `save` was called on an entity that already has a store identity.
    #[error("{kind} {id} is already persisted")]
    AlreadyPersisted { kind: &'static str, id: i64 },

    /// An update/delete targeted a row that does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    /// A domain rule refused the write (e.g. reopening a closed auction).
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Map SQLx errors to `RepositoryError`, logging the failing operation.
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> RepositoryError {
    tracing::warn!(operation, error = %err, "sqlx operation failed");

    match err {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            RepositoryError::StillReferenced {
                operation,
                message: db_err.message().to_string(),
            }
        }
        source => RepositoryError::Database { operation, source },
    }
}

/// The store identity of `entity`, or `Unpersisted` naming `role`.
pub(crate) fn require_id<E: Entity>(entity: &E, role: &'static str) -> Result<E::Id, RepositoryError> {
    entity.id().ok_or(RepositoryError::Unpersisted(role))
}
