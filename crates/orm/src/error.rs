//! Error types for the persistence core
//!
//! `ModelError` is the single taxonomy surfaced by sessions, queries, the
//! store facade and the migration runner. Client-library failures are
//! carried unmodified in transparent variants.

use thiserror::Error;

use crate::config::ConfigError;
use crate::lock::LockError;

/// Result type alias for model operations
pub type OrmResult<T> = Result<T, ModelError>;

/// Error types for persistence operations
#[derive(Error, Debug)]
pub enum ModelError {
    /// Identifier has the wrong shape or arity for its collection
    #[error("Malformed identifier '{id}': {reason}")]
    MalformedId { id: String, reason: String },

    /// Embedded collection tag is not a known or registered collection
    #[error("Unknown collection for document '{id}'")]
    UnknownCollection { id: String },

    /// Create-if-absent found an existing document
    #[error("Document '{id}' already exists")]
    AlreadyExists { id: String },

    /// Optimistic concurrency check failed
    #[error("Revision conflict on document '{id}' (expected revision {expected:?})")]
    Conflict { id: String, expected: Option<String> },

    #[error("Document '{0}' not found")]
    NotFound(String),

    /// A loaded document is not of the requested model type
    #[error("Document '{id}' is not a {expected}")]
    TypeMismatch { id: String, expected: &'static str },

    #[error("Query error: {0}")]
    Query(String),

    /// Backend returned something this layer cannot interpret
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Migration error: {0}")]
    Migration(String),

    /// A migration's `up` or `down` failed; earlier migrations stay recorded
    #[error("Migration '{name}' failed: {source}")]
    MigrationFailed {
        name: String,
        #[source]
        source: Box<ModelError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] sqlx::Error),

    #[cfg(feature = "mongodb")]
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    #[cfg(any(feature = "couchdb", feature = "ravendb"))]
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "redis-backend")]
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

impl ModelError {
    pub(crate) fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::MalformedId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from a create-if-absent collision
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ModelError::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ModelError::malformed("Tickets/a", "expected 3 id parts, found 1");
        assert_eq!(
            err.to_string(),
            "Malformed identifier 'Tickets/a': expected 3 id parts, found 1"
        );

        let err = ModelError::UnknownCollection {
            id: "Widgets/1".to_string(),
        };
        assert!(err.to_string().contains("Widgets/1"));
    }

    #[test]
    fn test_migration_failure_keeps_source() {
        let err = ModelError::MigrationFailed {
            name: "20240101000000_seed".to_string(),
            source: Box::new(ModelError::Query("boom".to_string())),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Query error: boom"));
        assert!(!err.is_already_exists());
    }
}
