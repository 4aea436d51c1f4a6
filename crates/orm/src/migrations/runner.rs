//! Migration Runner - Applies pending migrations in timestamp order
//!
//! Applied names are tracked on the `DatabaseMetadata` document, which is
//! re-persisted after every migration. A failure stops the run and leaves
//! exactly the migrations that completed recorded.

use std::collections::HashSet;
use std::time::Instant;

use super::definitions::{
    parse_migration_name, Migration, MigrationRunResult, MigrationState, MigrationStatus, MigrationStatusEntry,
};
use crate::error::{ModelError, OrmResult};
use crate::store::DatabaseStore;

/// The ordered set of known migrations
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator").field("migrations", &self.names()).finish()
    }
}

impl Migrator {
    /// Validate names, reject duplicates and sort by timestamp
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> OrmResult<Self> {
        let mut seen = HashSet::new();
        let mut keyed = Vec::with_capacity(migrations.len());
        for migration in migrations {
            let timestamp = parse_migration_name(migration.name())?;
            if !seen.insert(migration.name().to_string()) {
                return Err(ModelError::Migration(format!(
                    "Duplicate migration name '{}'",
                    migration.name()
                )));
            }
            keyed.push((timestamp, migration));
        }
        keyed.sort_by(|(a_time, a), (b_time, b)| a_time.cmp(b_time).then_with(|| a.name().cmp(b.name())));

        Ok(Self {
            migrations: keyed.into_iter().map(|(_, migration)| migration).collect(),
        })
    }

    /// Known migration names, oldest first
    pub fn names(&self) -> Vec<&str> {
        self.migrations.iter().map(|migration| migration.name()).collect()
    }

    pub(crate) fn find(&self, name: &str) -> Option<&dyn Migration> {
        self.migrations
            .iter()
            .find(|migration| migration.name() == name)
            .map(|migration| migration.as_ref())
    }

    /// Run all pending migrations
    pub async fn migrate(&self, store: &DatabaseStore) -> OrmResult<MigrationRunResult> {
        let start_time = Instant::now();
        let mut metadata = store.refresh_metadata().await?;

        let pending: Vec<&dyn Migration> = self
            .migrations
            .iter()
            .map(|migration| migration.as_ref())
            .filter(|migration| !metadata.is_applied(migration.name()))
            .collect();
        let skipped_count = self.migrations.len() - pending.len();

        let mut applied_migrations = Vec::with_capacity(pending.len());
        for migration in pending {
            let name = migration.name();
            tracing::info!(migration = name, state = %MigrationState::Applying, "migration state");

            migration.up(store).await.map_err(|source| {
                tracing::error!(migration = name, error = %source, "migration failed");
                ModelError::MigrationFailed {
                    name: name.to_string(),
                    source: Box::new(source),
                }
            })?;

            metadata.record(name);
            store.save_metadata(&metadata).await?;
            tracing::info!(migration = name, state = %MigrationState::Applied, "migration state");
            applied_migrations.push(name.to_string());
        }

        Ok(MigrationRunResult {
            applied_count: applied_migrations.len(),
            applied_migrations,
            skipped_count,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Each known migration with whether it has been applied
    pub async fn status(&self, store: &DatabaseStore) -> OrmResult<Vec<MigrationStatusEntry>> {
        let metadata = store.refresh_metadata().await?;
        for name in &metadata.migrations {
            if self.find(name).is_none() {
                tracing::warn!(migration = %name, "applied migration is not known to this build");
            }
        }

        Ok(self
            .migrations
            .iter()
            .map(|migration| MigrationStatusEntry {
                name: migration.name().to_string(),
                status: if metadata.is_applied(migration.name()) {
                    MigrationStatus::Applied
                } else {
                    MigrationStatus::Pending
                },
            })
            .collect())
    }
}
