//! # Command Line Interface
//!
//! User-facing surface for the coordinator: `status`, `switch`, `unseal`,
//! and the `backup` subcommands. Handlers return process exit codes
//! directly (0 success/cancel, 1 failure, 2 invalid arguments; clap itself
//! exits 2 on parse errors).

pub mod output;
pub mod status;
pub mod switch;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{CoordinatorPaths, ModeConfig, StoreMode};
use crate::errors::CoordinatorError;
use crate::seal::{SealManager, UnsealKeySet};
use crate::store::{StoreClient, StoreClientConfig};

#[derive(Parser)]
#[command(name = "modekeeper")]
#[command(about = "Mode & migration lifecycle coordinator for a sealable secret store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Store listener address override
    #[arg(long, global = true)]
    pub store_addr: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Ephemeral,
    Persistent,
}

impl From<ModeArg> for StoreMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Ephemeral => StoreMode::Ephemeral,
            ModeArg::Persistent => StoreMode::Persistent,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show configured mode, live store health, and consistency findings
    Status {
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Switch storage mode, migrating secrets by default
    Switch {
        /// Target mode
        target: ModeArg,

        /// Never prompt; intent must be stated via flags
        #[arg(long)]
        non_interactive: bool,

        /// Auto-unseal preference recorded for the target mode
        #[arg(long)]
        auto_unseal: Option<bool>,

        /// Back up and replay secrets into the target mode
        #[arg(long)]
        migrate: bool,

        /// Switch without migrating; requires --confirm-discard
        #[arg(long)]
        no_migrate: bool,

        /// Confirmation phrase for --no-migrate (must be `discard-secrets`)
        #[arg(long)]
        confirm_discard: Option<String>,

        /// Proceed even if the pre-migration backup recorded omissions
        #[arg(long)]
        allow_partial_backup: bool,
    },

    /// Bring a sealed persistent store to an operable state
    Unseal,

    /// Snapshot management
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Snapshot the full secret tree now
    Create,

    /// List snapshots, newest first
    List,

    /// Replay a snapshot into the live store (last write wins)
    Restore { id: String },

    /// Delete all but the newest snapshots
    Prune {
        #[arg(long, default_value_t = 5)]
        keep: usize,
    },
}

/// Parse arguments, dispatch, and return the process exit code.
pub async fn run_cli() -> i32 {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    initialise_logging(cli.verbose);

    let paths = CoordinatorPaths::from_env();
    let mut store_config = StoreClientConfig::from_env();
    if let Some(addr) = cli.store_addr {
        store_config.base_url = addr;
    }
    let store = match StoreClient::new(store_config) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {}", err);
            return 1;
        }
    };

    match cli.command {
        Commands::Status { json } => status::handle_status(paths, store, json).await,
        Commands::Switch {
            target,
            non_interactive,
            auto_unseal,
            migrate,
            no_migrate,
            confirm_discard,
            allow_partial_backup,
        } => {
            let request = switch::SwitchRequest {
                target: target.into(),
                non_interactive,
                auto_unseal,
                migrate,
                no_migrate,
                confirm_discard,
                allow_partial_backup,
            };
            switch::handle_switch(paths, store, request).await
        }
        Commands::Unseal => handle_unseal(paths, store).await,
        Commands::Backup { command } => handle_backup_command(paths, store, command).await,
    }
}

async fn handle_unseal(paths: CoordinatorPaths, store: StoreClient) -> i32 {
    let record = match ModeConfig::new(&paths).load() {
        Ok(record) => record,
        Err(CoordinatorError::NotConfigured) => {
            println!("Mode is ephemeral (default); there is no seal to open.");
            return 0;
        }
        Err(err) => {
            eprintln!("error: {}", err);
            return 1;
        }
    };

    let keys = match UnsealKeySet::load_optional(&paths.key_file()) {
        Ok(keys) => keys,
        Err(err) => {
            eprintln!("error: {}", err);
            return 1;
        }
    };

    let seal = SealManager::new(store, paths.key_file());
    match seal.ensure_unsealed(&record, keys.as_ref()).await {
        Ok(()) => {
            println!("Store is unsealed.");
            0
        }
        Err(err @ CoordinatorError::ManualUnsealRequired { .. }) => {
            println!("{}", err);
            1
        }
        Err(err) => {
            eprintln!("error: {}", err);
            1
        }
    }
}

async fn handle_backup_command(
    paths: CoordinatorPaths,
    store: StoreClient,
    command: BackupCommands,
) -> i32 {
    use crate::backup::BackupEngine;

    let mode = match ModeConfig::new(&paths).load() {
        Ok(record) => record.mode,
        Err(CoordinatorError::NotConfigured) => StoreMode::Ephemeral,
        Err(err) => {
            eprintln!("error: {}", err);
            return 1;
        }
    };
    let engine = BackupEngine::new(store, paths.backups_dir());

    match command {
        BackupCommands::Create => match engine.snapshot(&[String::new()], mode).await {
            Ok(snapshot) => {
                println!(
                    "Snapshot {} written: {} entr{} captured{}",
                    snapshot.id(),
                    snapshot.metadata.entry_count,
                    if snapshot.metadata.entry_count == 1 { "y" } else { "ies" },
                    if snapshot.metadata.omitted > 0 {
                        format!(" ({} omitted)", snapshot.metadata.omitted)
                    } else {
                        String::new()
                    }
                );
                0
            }
            Err(err) => {
                eprintln!("error: {}", err);
                1
            }
        },
        BackupCommands::List => match engine.list_snapshots() {
            Ok(snapshots) => {
                output::print_snapshots(&snapshots);
                0
            }
            Err(err) => {
                eprintln!("error: {}", err);
                1
            }
        },
        BackupCommands::Restore { id } => match engine.restore(&id).await {
            Ok(restored) => {
                println!("Restored {} secret(s) from snapshot {}.", restored, id);
                0
            }
            Err(err) => {
                eprintln!("error: {}", err);
                1
            }
        },
        BackupCommands::Prune { keep } => match engine.prune(keep) {
            Ok(removed) => {
                println!("Pruned {} snapshot(s), keeping the {} newest.", removed.len(), keep);
                0
            }
            Err(err) => {
                eprintln!("error: {}", err);
                1
            }
        },
    }
}

fn initialise_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", default_level);
    }

    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    // A subscriber may already be installed (e.g. under a test harness).
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_arg_converts() {
        assert_eq!(StoreMode::from(ModeArg::Ephemeral), StoreMode::Ephemeral);
        assert_eq!(StoreMode::from(ModeArg::Persistent), StoreMode::Persistent);
    }

    #[test]
    fn cli_parses_switch_flags() {
        let cli = Cli::try_parse_from([
            "modekeeper",
            "switch",
            "persistent",
            "--non-interactive",
            "--migrate",
            "--auto-unseal",
            "true",
        ])
        .unwrap();
        match cli.command {
            Commands::Switch { target, non_interactive, migrate, auto_unseal, .. } => {
                assert!(matches!(target, ModeArg::Persistent));
                assert!(non_interactive);
                assert!(migrate);
                assert_eq!(auto_unseal, Some(true));
            }
            _ => panic!("expected switch command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["modekeeper", "switch", "durable"]).is_err());
    }

    #[test]
    fn cli_parses_backup_prune_keep() {
        let cli =
            Cli::try_parse_from(["modekeeper", "backup", "prune", "--keep", "3"]).unwrap();
        match cli.command {
            Commands::Backup { command: BackupCommands::Prune { keep } } => assert_eq!(keep, 3),
            _ => panic!("expected backup prune"),
        }
    }
}
