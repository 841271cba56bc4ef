//! `switch <mode>` command.
//!
//! Decision logic lives in [`MigrationCoordinator`]; this file only gathers
//! intent. Interactive runs present three choices — migrate, switch without
//! migrating, or cancel — and the destructive second choice requires typing
//! a literal confirmation phrase, not just y/n. Non-interactive runs must
//! state the same intent through flags, which makes CI invocation a
//! first-class path.

use std::io::{self, BufRead, Write};

use tracing::info;

use crate::config::{CoordinatorPaths, ModeConfig, ModeRecord, StoreMode};
use crate::errors::CoordinatorError;
use crate::migration::{MigrationCoordinator, MigrationOptions};
use crate::seal::{SealManager, UnsealKeySet};
use crate::store::StoreClient;
use crate::utils::backoff::{retry_with_backoff, BackoffPolicy};

/// Phrase the operator must type (or pass) to discard secrets on switch.
pub const DISCARD_CONFIRMATION: &str = "discard-secrets";

pub struct SwitchRequest {
    pub target: StoreMode,
    pub non_interactive: bool,
    pub auto_unseal: Option<bool>,
    pub migrate: bool,
    pub no_migrate: bool,
    pub confirm_discard: Option<String>,
    pub allow_partial_backup: bool,
}

enum SwitchAction {
    Migrate,
    Discard,
    Cancel,
}

/// Returns the process exit code: 0 on success or cancellation, 1 on
/// failure, 2 on an invalid request.
pub async fn handle_switch(
    paths: CoordinatorPaths,
    store: StoreClient,
    request: SwitchRequest,
) -> i32 {
    let mode_config = ModeConfig::new(&paths);
    let current = match mode_config.load() {
        Ok(record) => record.mode,
        Err(CoordinatorError::NotConfigured) => StoreMode::Ephemeral,
        Err(err) => {
            eprintln!("error: cannot read current mode: {}", err);
            return 1;
        }
    };

    if current == request.target {
        eprintln!("error: already in {} mode; nothing to switch", current);
        return 2;
    }

    let action = match decide_action(&request, current) {
        Ok(action) => action,
        Err(exit_code) => return exit_code,
    };

    let auto_unseal = request.auto_unseal.unwrap_or(true);

    match action {
        SwitchAction::Cancel => {
            println!("Cancelled; mode remains {}.", current);
            0
        }
        SwitchAction::Migrate => {
            let options = MigrationOptions {
                auto_unseal,
                allow_partial_backup: request.allow_partial_backup,
                updated_by: whoami(),
                ..MigrationOptions::default()
            };
            let coordinator = MigrationCoordinator::new(paths, store);
            match coordinator.migrate(current, request.target, true, &options).await {
                Ok(outcome) => {
                    println!(
                        "Switched {} -> {}: {} secret(s) migrated (snapshot {}).",
                        current, request.target, outcome.restored, outcome.snapshot_id
                    );
                    0
                }
                Err(CoordinatorError::BackupIncomplete { captured, expected }) => {
                    eprintln!(
                        "error: backup captured only {} of {} entries; \
                         re-run with --allow-partial-backup to proceed anyway",
                        captured, expected
                    );
                    1
                }
                Err(err) => {
                    eprintln!("error: {}", err);
                    eprintln!("Run `modekeeper status` to inspect the current state.");
                    1
                }
            }
        }
        SwitchAction::Discard => {
            switch_without_migrating(&paths, &store, &mode_config, request.target, auto_unseal)
                .await
        }
    }
}

fn decide_action(request: &SwitchRequest, current: StoreMode) -> Result<SwitchAction, i32> {
    if request.non_interactive {
        if request.migrate && request.no_migrate {
            eprintln!("error: --migrate and --no-migrate are mutually exclusive");
            return Err(2);
        }
        if request.migrate {
            return Ok(SwitchAction::Migrate);
        }
        if request.no_migrate {
            // Destructive: the phrase must be spelled out on the command line.
            if request.confirm_discard.as_deref() == Some(DISCARD_CONFIRMATION) {
                return Ok(SwitchAction::Discard);
            }
            eprintln!(
                "error: --no-migrate discards all secrets in {} mode; \
                 pass --confirm-discard {}",
                current, DISCARD_CONFIRMATION
            );
            return Err(2);
        }
        eprintln!("error: non-interactive switch requires --migrate or --no-migrate");
        return Err(2);
    }

    prompt_action(current, request.target).map_err(|err| {
        eprintln!("error: {}", err);
        1
    })
}

fn prompt_action(current: StoreMode, target: StoreMode) -> io::Result<SwitchAction> {
    println!("Switching from {} to {} mode.", current, target);
    println!("  [1] migrate — back up all secrets and replay them into {} mode", target);
    println!("  [2] switch without migrating — secrets in {} mode are DISCARDED", current);
    println!("  [3] cancel");
    print!("Choose [1/2/3]: ");
    io::stdout().flush()?;

    let choice = read_line()?;
    match choice.trim() {
        "1" | "migrate" => Ok(SwitchAction::Migrate),
        "2" | "discard" => {
            print!("Type '{}' to confirm discarding secrets: ", DISCARD_CONFIRMATION);
            io::stdout().flush()?;
            if read_line()?.trim() == DISCARD_CONFIRMATION {
                Ok(SwitchAction::Discard)
            } else {
                println!("Confirmation did not match.");
                Ok(SwitchAction::Cancel)
            }
        }
        _ => Ok(SwitchAction::Cancel),
    }
}

fn read_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// The no-backup path: write the new record, wait for the relaunched store,
/// and bring a persistent target to an operable state.
async fn switch_without_migrating(
    paths: &CoordinatorPaths,
    store: &StoreClient,
    mode_config: &ModeConfig,
    target: StoreMode,
    auto_unseal: bool,
) -> i32 {
    let record = ModeRecord::new(target, auto_unseal, whoami(), paths);
    if let Err(err) = mode_config.save(&record) {
        eprintln!("error: failed to write mode record: {}", err);
        return 1;
    }
    info!(mode = %target, "mode record written without migration");

    let readiness =
        retry_with_backoff("store readiness wait", BackoffPolicy::default(), || store.health())
            .await;
    if let Err(err) = readiness {
        eprintln!("error: store did not come up after reconfiguration: {}", err);
        return 1;
    }

    if target == StoreMode::Persistent {
        let seal = SealManager::new(store.clone(), paths.key_file());
        let health = match store.health().await {
            Ok(health) => health,
            Err(err) => {
                eprintln!("error: {}", err);
                return 1;
            }
        };

        let keys = if !health.initialized {
            match seal.first_init(5, 3).await {
                Ok(keys) => Some(keys),
                Err(err) => {
                    eprintln!("error: failed to initialize persistent store: {}", err);
                    return 1;
                }
            }
        } else {
            match UnsealKeySet::load_optional(&paths.key_file()) {
                Ok(keys) => keys,
                Err(err) => {
                    eprintln!("error: {}", err);
                    return 1;
                }
            }
        };

        match seal.ensure_unsealed(&record, keys.as_ref()).await {
            Ok(()) => {}
            Err(CoordinatorError::ManualUnsealRequired { threshold, key_file }) => {
                // The switch itself succeeded; unsealing is a pending
                // operator step, spelled out rather than auto-performed.
                println!("Switched to {} mode (store still sealed).", target);
                println!(
                    "Manual unseal required: submit {} key share(s) from {}.",
                    threshold, key_file
                );
                return 0;
            }
            Err(err) => {
                eprintln!("error: {}", err);
                return 1;
            }
        }
    }

    println!("Switched to {} mode without migrating.", target);
    0
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "modekeeper".to_string())
}
