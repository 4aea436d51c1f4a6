//! Migration System
//!
//! - `definitions`: the `Migration` trait, name rules and result types
//! - `runner`: `Migrator`, which applies pending migrations in order
//! - `rollback`: reversing the most recent migrations

pub mod definitions;
pub mod rollback;
pub mod runner;

pub use definitions::{
    parse_migration_name, Migration, MigrationRunResult, MigrationState, MigrationStatus, MigrationStatusEntry,
    RollbackResult,
};
pub use rollback::MigrationRollback;
pub use runner::Migrator;
