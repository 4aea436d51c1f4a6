//! Migration Definitions - Core types and structures for migrations
//!
//! A migration is a named pair of `up`/`down` operations against the store.
//! Names carry their ordering: `<UTC timestamp YYYYMMDDHHMMSS>_<slug>`.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{ModelError, OrmResult};
use crate::store::DatabaseStore;

static MIGRATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{14})_[a-z0-9_]+$").expect("valid migration name pattern"));

/// A reversible data migration
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique name, `<YYYYMMDDHHMMSS>_<slug>`
    fn name(&self) -> &str;

    async fn up(&self, store: &DatabaseStore) -> OrmResult<()>;

    async fn down(&self, store: &DatabaseStore) -> OrmResult<()>;
}

/// Timestamp encoded in a migration name
pub fn parse_migration_name(name: &str) -> OrmResult<NaiveDateTime> {
    let captures = MIGRATION_NAME.captures(name).ok_or_else(|| {
        ModelError::Migration(format!(
            "Invalid migration name '{}': expected <YYYYMMDDHHMMSS>_<lowercase_slug>",
            name
        ))
    })?;
    NaiveDateTime::parse_from_str(&captures[1], "%Y%m%d%H%M%S").map_err(|e| {
        ModelError::Migration(format!("Invalid timestamp in migration name '{}': {}", name, e))
    })
}

/// Result of running migrations
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRunResult {
    /// Number of migrations that were applied
    pub applied_count: usize,
    /// Names of migrations that were applied, in order
    pub applied_migrations: Vec<String>,
    /// Number of migrations that were skipped (already applied)
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Serialize)]
pub struct RollbackResult {
    /// Number of migrations that were rolled back
    pub rolled_back_count: usize,
    /// Names of migrations that were rolled back, most recent first
    pub rolled_back_migrations: Vec<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Lifecycle of one migration during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Applying,
    Applied,
    RollingBack,
    RolledBack,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MigrationState::Pending => "pending",
            MigrationState::Applying => "applying",
            MigrationState::Applied => "applied",
            MigrationState::RollingBack => "rolling back",
            MigrationState::RolledBack => "rolled back",
        };
        f.write_str(label)
    }
}

/// Migration status in the metadata document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MigrationStatus {
    /// Not yet applied
    Pending,
    Applied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatusEntry {
    pub name: String,
    pub status: MigrationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_migration_name() {
        let timestamp = parse_migration_name("20240131120000_backfill_statistics").unwrap();
        assert_eq!(timestamp.to_string(), "2024-01-31 12:00:00");
    }

    #[test]
    fn test_rejects_malformed_names() {
        for name in [
            "backfill_statistics",
            "2024013112000_short_timestamp",
            "20240131120000_Upper",
            "20240131120000-dash",
            "20240131120000_",
            "20241331120000_bad_month",
        ] {
            assert!(
                matches!(parse_migration_name(name), Err(ModelError::Migration(_))),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(MigrationState::RollingBack.to_string(), "rolling back");
        assert_eq!(MigrationState::Applied.to_string(), "applied");
    }
}
