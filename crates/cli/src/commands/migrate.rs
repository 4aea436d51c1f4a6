//! `docket migrate`: apply, roll back or list data migrations

use anyhow::Context;
use docket_orm::migrations::MigrationStatus;
use docket_orm::{DatabaseConfig, DatabaseStore, MigrationRollback, Migrator};

use crate::{migrations, models};

async fn connect() -> anyhow::Result<DatabaseStore> {
    let config = DatabaseConfig::from_env().context("Failed to read database configuration")?;
    tracing::info!(backend = %config.backend, "connecting to database");
    let store = DatabaseStore::connect(&config, models::registry()).context("Failed to connect to database")?;
    store.setup().await.context("Failed to set up database")?;
    Ok(store)
}

fn migrator() -> anyhow::Result<Migrator> {
    Migrator::new(migrations::all()).context("Invalid migration set")
}

pub async fn run() -> anyhow::Result<()> {
    let migrator = migrator()?;
    let store = connect().await?;

    let result = migrator.migrate(&store).await;
    store.teardown().await?;
    let result = result?;

    if result.applied_count == 0 {
        println!("Nothing to migrate ({} already applied)", result.skipped_count);
    } else {
        for name in &result.applied_migrations {
            println!("Applied: {}", name);
        }
        println!(
            "Applied {} migration(s) in {}ms",
            result.applied_count, result.execution_time_ms
        );
    }
    Ok(())
}

pub async fn rollback(step: u64) -> anyhow::Result<()> {
    let step = usize::try_from(step).context("Rollback step is too large")?;
    let migrator = migrator()?;
    let store = connect().await?;

    let result = migrator.rollback(&store, step).await;
    store.teardown().await?;
    let result = result?;

    if result.rolled_back_count == 0 {
        println!("Nothing to roll back");
    } else {
        for name in &result.rolled_back_migrations {
            println!("Rolled back: {}", name);
        }
        println!(
            "Rolled back {} migration(s) in {}ms",
            result.rolled_back_count, result.execution_time_ms
        );
    }
    Ok(())
}

pub async fn status() -> anyhow::Result<()> {
    let migrator = migrator()?;
    let store = connect().await?;

    let entries = migrator.status(&store).await;
    store.teardown().await?;
    let entries = entries?;

    println!("Migration Status:");
    for entry in entries {
        let marker = match entry.status {
            MigrationStatus::Applied => "applied",
            MigrationStatus::Pending => "pending",
        };
        println!("  [{:>7}] {}", marker, entry.name);
    }
    Ok(())
}
