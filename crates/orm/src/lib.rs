//! # docket-orm: document persistence for the docket bot
//!
//! Typed models stored as documents in one of several document databases.
//! Every document has a string identifier `Collection/part/part..` built
//! from its collection and id parts; the active backend decides how that
//! identifier, a revision and a deletion flag are laid out natively.
//!
//! Application code works through a [`DatabaseStore`]: it opens
//! [`DocumentSession`]s, wraps models in [`Document`]s and runs
//! [`Migrator`] migrations. Backends other than the in-memory one are
//! enabled with cargo features.

pub mod backends;
pub mod collection;
pub mod config;
pub mod conventions;
pub mod error;
pub mod identifier;
pub mod lock;
pub mod logging;
pub mod migrations;
pub mod model;
pub mod query;
pub mod session;
pub mod store;

pub use backends::{BackendKind, DatabaseAdapter};
pub use collection::Collection;
pub use config::{ConfigError, DatabaseConfig};
pub use conventions::{DocumentConventions, Metadata};
pub use error::{ModelError, OrmResult};
pub use lock::{ActionLock, LockError, LockRegistry};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use migrations::{Migration, MigrationRollback, Migrator};
pub use model::{AnyDocument, DatabaseMetadata, Document, Model, ModelQueries, ModelRegistry};
pub use query::{Predicate, Query, QueryOperator};
pub use session::DocumentSession;
pub use store::{DatabaseStore, DatabaseStoreBuilder};
