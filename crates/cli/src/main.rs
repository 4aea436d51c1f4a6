mod commands;
mod migrations;
mod models;

use clap::{Parser, Subcommand};
use commands::migrate;
use docket_orm::{init_logging, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "docket")]
#[command(about = "Document database tooling for the docket bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Database migration management
    #[command(args_conflicts_with_subcommands = true)]
    Migrate {
        #[command(subcommand)]
        migrate_command: Option<MigrateCommands>,

        /// Roll back instead of applying pending migrations
        #[arg(long)]
        rollback: bool,

        /// Number of migrations to roll back
        #[arg(long, requires = "rollback", value_parser = clap::value_parser!(u64).range(1..))]
        step: Option<u64>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
enum MigrateCommands {
    /// Show applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig::from_env()?;
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    match cli.command {
        Commands::Migrate {
            migrate_command,
            rollback,
            step,
        } => match migrate_command {
            Some(MigrateCommands::Status) => migrate::status().await?,
            None if rollback => migrate::rollback(step.unwrap_or(1)).await?,
            None => migrate::run().await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("docket").chain(args.iter().copied()))
    }

    #[test]
    fn test_migrate_defaults_to_apply() {
        let cli = parse(&["migrate"]).unwrap();
        let Commands::Migrate {
            migrate_command,
            rollback,
            step,
        } = cli.command;
        assert_eq!(migrate_command, None);
        assert!(!rollback);
        assert_eq!(step, None);
    }

    #[test]
    fn test_rollback_with_step() {
        let cli = parse(&["migrate", "--rollback", "--step", "3"]).unwrap();
        let Commands::Migrate { rollback, step, .. } = cli.command;
        assert!(rollback);
        assert_eq!(step, Some(3));
    }

    #[test]
    fn test_status_subcommand() {
        let cli = parse(&["migrate", "status"]).unwrap();
        let Commands::Migrate { migrate_command, .. } = cli.command;
        assert_eq!(migrate_command, Some(MigrateCommands::Status));
    }

    #[test]
    fn test_step_must_be_a_positive_integer() {
        for bad in ["0", "-1", "two", "1.5"] {
            assert!(
                parse(&["migrate", "--rollback", "--step", bad]).is_err(),
                "--step {} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_step_requires_rollback() {
        assert!(parse(&["migrate", "--step", "2"]).is_err());
    }
}
