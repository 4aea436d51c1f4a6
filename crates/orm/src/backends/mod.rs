//! Database Backend Abstractions
//!
//! One module per document store. Each provides pure `NativeConventions`
//! and filter translation, always compiled, plus an adapter and session
//! compiled behind the backend's cargo feature. The in-memory backend has no
//! client library and is always available.

pub mod core;
pub mod couch;
pub mod memory;
pub mod mongo;
pub mod postgres;
pub mod raven;
pub mod redis;

use std::sync::Arc;

pub use self::core::DatabaseAdapter;

use crate::config::DatabaseConfig;
use crate::error::{ModelError, OrmResult};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Memory,
    Postgres,
    Mongo,
    Couch,
    Raven,
    Redis,
}

impl BackendKind {
    /// URL schemes accepted for this backend's connection string
    pub fn url_schemes(&self) -> &'static [&'static str] {
        match self {
            BackendKind::Memory => &[],
            BackendKind::Postgres => &["postgres", "postgresql"],
            BackendKind::Mongo => &["mongodb", "mongodb+srv"],
            BackendKind::Couch | BackendKind::Raven => &["http", "https"],
            BackendKind::Redis => &["redis", "rediss"],
        }
    }

    /// Cargo feature that compiles this backend's adapter
    pub fn feature(&self) -> Option<&'static str> {
        match self {
            BackendKind::Memory => None,
            BackendKind::Postgres => Some("postgres"),
            BackendKind::Mongo => Some("mongodb"),
            BackendKind::Couch => Some("couchdb"),
            BackendKind::Raven => Some("ravendb"),
            BackendKind::Redis => Some("redis-backend"),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Postgres => write!(f, "postgres"),
            BackendKind::Mongo => write!(f, "mongodb"),
            BackendKind::Couch => write!(f, "couchdb"),
            BackendKind::Raven => write!(f, "ravendb"),
            BackendKind::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(BackendKind::Memory),
            "postgresql" | "postgres" => Ok(BackendKind::Postgres),
            "mongodb" | "mongo" => Ok(BackendKind::Mongo),
            "couchdb" | "couch" => Ok(BackendKind::Couch),
            "ravendb" | "raven" => Ok(BackendKind::Raven),
            "redis" => Ok(BackendKind::Redis),
            _ => Err(format!("Unsupported database backend: {}", s)),
        }
    }
}

/// Build the adapter selected by `config`. Parameters are validated up
/// front; connectivity problems surface on first use.
pub fn connect(config: &DatabaseConfig) -> OrmResult<Arc<dyn DatabaseAdapter>> {
    config.validate()?;
    tracing::info!(backend = %config.backend, database = %config.database, "creating database adapter");

    match config.backend {
        BackendKind::Memory => Ok(Arc::new(memory::MemoryAdapter::new(config.query_limit))),
        #[cfg(feature = "postgres")]
        BackendKind::Postgres => Ok(Arc::new(postgres::PostgresAdapter::connect(config)?)),
        #[cfg(feature = "mongodb")]
        BackendKind::Mongo => Ok(Arc::new(mongo::MongoAdapter::connect(config)?)),
        #[cfg(feature = "couchdb")]
        BackendKind::Couch => Ok(Arc::new(couch::CouchAdapter::connect(config)?)),
        #[cfg(feature = "ravendb")]
        BackendKind::Raven => Ok(Arc::new(raven::RavenAdapter::connect(config)?)),
        #[cfg(feature = "redis-backend")]
        BackendKind::Redis => Ok(Arc::new(redis::RedisAdapter::connect(config)?)),
        #[allow(unreachable_patterns)]
        other => Err(ModelError::Config(crate::config::ConfigError::ValidationFailed {
            field: "backend".to_string(),
            reason: format!(
                "the {} backend is not compiled in (enable the '{}' feature)",
                other,
                other.feature().unwrap_or_default()
            ),
        })),
    }
}
