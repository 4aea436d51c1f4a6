//! Migration Rollback - Reverses the most recently applied migrations

use std::time::Instant;

use super::definitions::{MigrationState, RollbackResult};
use super::runner::Migrator;
use crate::error::{ModelError, OrmResult};
use crate::store::DatabaseStore;

/// Extension trait for Migrator to add rollback functionality
pub trait MigrationRollback {
    /// Roll back the last `step` applied migrations, most recent first
    async fn rollback(&self, store: &DatabaseStore, step: usize) -> OrmResult<RollbackResult>;
}

impl MigrationRollback for Migrator {
    async fn rollback(&self, store: &DatabaseStore, step: usize) -> OrmResult<RollbackResult> {
        let start_time = Instant::now();
        if step == 0 {
            return Err(ModelError::Migration("Rollback step must be at least 1".to_string()));
        }

        let mut metadata = store.refresh_metadata().await?;
        let targets: Vec<String> = metadata.migrations.iter().rev().take(step).cloned().collect();

        let mut rolled_back_migrations = Vec::with_capacity(targets.len());
        for name in targets {
            let migration = self.find(&name).ok_or_else(|| {
                ModelError::Migration(format!("Migration definition not found for applied migration: {}", name))
            })?;
            tracing::info!(migration = %name, state = %MigrationState::RollingBack, "migration state");

            migration.down(store).await.map_err(|source| {
                tracing::error!(migration = %name, error = %source, "rollback failed");
                ModelError::MigrationFailed {
                    name: name.clone(),
                    source: Box::new(source),
                }
            })?;

            metadata.forget(&name);
            store.save_metadata(&metadata).await?;
            tracing::info!(migration = %name, state = %MigrationState::RolledBack, "migration state");
            rolled_back_migrations.push(name);
        }

        Ok(RollbackResult {
            rolled_back_count: rolled_back_migrations.len(),
            rolled_back_migrations,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }
}
