//! Error types for the PostgreSQL store.

use thiserror::Error;

/// Errors that can occur talking to PostgreSQL.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PostgresError {
    /// Failed to check out a connection from the pool.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// A query or statement execution failed.
    #[error("query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// A value round-tripped through `serde_json` failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for this crate's internal operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

impl From<deadpool_postgres::PoolError> for PostgresError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        PostgresError::Pool(err.to_string())
    }
}

/// Convert a store-internal error into the pipeline's crate-wide error
/// type, so `KnowledgeGraphStore` methods can return `evidentia_core::Result`
/// directly via `?`.
impl From<PostgresError> for evidentia_core::error::Error {
    fn from(err: PostgresError) -> Self {
        evidentia_core::error::Error::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = PostgresError::NotFound("document abc".to_string());
        assert_eq!(err.to_string(), "not found: document abc");
    }

    #[test]
    fn serialization_display() {
        let err = PostgresError::Serialization("bad enum".to_string());
        assert!(err.to_string().contains("bad enum"));
    }

    #[test]
    fn converts_into_core_persistence_error() {
        let err = PostgresError::NotFound("x".to_string());
        let core_err: evidentia_core::error::Error = err.into();
        assert!(core_err.to_string().contains("persistence error"));
    }
}
