//! Mode-switch orchestration.
//!
//! A switch runs the staged sequence `Requested → Confirmed → BackedUp →
//! Reconfigured → Reinitialized → Restored → Verified`. Any stage failure
//! aborts the whole migration — stages are never partially retried — and the
//! resulting error carries the last stage that completed, so an operator can
//! resume or roll back by hand. Cancellation is terminal from the first two
//! stages; past them an interrupt surfaces as a failure with the same
//! last-completed-stage bookkeeping.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backup::BackupEngine;
use crate::config::{CoordinatorPaths, ModeConfig, ModeRecord, StoreMode};
use crate::errors::{CoordinatorError, Result};
use crate::seal::{SealManager, UnsealKeySet};
use crate::store::StoreClient;
use crate::utils::backoff::{retry_with_backoff, BackoffPolicy};
use crate::validation::{Report, ValidationReporter};

/// Progress marker for one switch request; errors carry the last completed
/// stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigrationStage {
    Requested,
    Confirmed,
    BackedUp,
    Reconfigured,
    Reinitialized,
    Restored,
    Verified,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStage::Requested => "requested",
            MigrationStage::Confirmed => "confirmed",
            MigrationStage::BackedUp => "backed-up",
            MigrationStage::Reconfigured => "reconfigured",
            MigrationStage::Reinitialized => "reinitialized",
            MigrationStage::Restored => "restored",
            MigrationStage::Verified => "verified",
        };
        write!(f, "{}", name)
    }
}

/// Knobs for a single migration
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Whether the target record enables auto-unseal
    pub auto_unseal: bool,
    /// Proceed even when the pre-migration snapshot recorded omissions
    pub allow_partial_backup: bool,
    /// Key shares generated at first persistent init
    pub init_shares: u32,
    /// Shares required to unseal
    pub init_threshold: u32,
    /// Recorded in the mode record's `updated_by`
    pub updated_by: String,
    /// Prefixes to capture; the empty prefix means the whole KV mount
    pub prefixes: Vec<String>,
    /// Snapshots retained after a successful migration
    pub retention: usize,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            auto_unseal: true,
            allow_partial_backup: false,
            init_shares: 5,
            init_threshold: 3,
            updated_by: "modekeeper".to_string(),
            prefixes: vec![String::new()],
            retention: 5,
        }
    }
}

/// What a successful migration produced
#[derive(Debug)]
pub struct MigrationOutcome {
    pub snapshot_id: String,
    pub restored: usize,
    pub report: Report,
}

/// Orchestrates a mode switch end to end
pub struct MigrationCoordinator {
    paths: CoordinatorPaths,
    mode_config: ModeConfig,
    store: StoreClient,
    backup: BackupEngine,
    seal: SealManager,
    validator: ValidationReporter,
    backoff: BackoffPolicy,
    cancel: CancellationToken,
}

impl MigrationCoordinator {
    pub fn new(paths: CoordinatorPaths, store: StoreClient) -> Self {
        let mode_config = ModeConfig::new(&paths);
        let backup = BackupEngine::new(store.clone(), paths.backups_dir());
        let seal = SealManager::new(store.clone(), paths.key_file());
        let validator = ValidationReporter::new(paths.clone(), store.clone());
        Self {
            paths,
            mode_config,
            store,
            backup,
            seal,
            validator,
            backoff: BackoffPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the readiness-poll backoff (tests use a tight budget).
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self.seal = SealManager::new(self.store.clone(), self.paths.key_file())
            .with_backoff(backoff);
        self
    }

    /// Install a cancellation token checked between restore writes.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn backup_engine(&self) -> &BackupEngine {
        &self.backup
    }

    /// Switch modes, moving the full secret set across backends.
    ///
    /// `confirm_explicit` is enforced here rather than at the CLI because a
    /// wrong-direction switch destroys data; no destructive step runs
    /// without it. A `from == to` request is an error, not a silent success
    /// — the caller likely has a logic bug.
    pub async fn migrate(
        &self,
        from: StoreMode,
        to: StoreMode,
        confirm_explicit: bool,
        options: &MigrationOptions,
    ) -> Result<MigrationOutcome> {
        if from == to {
            return Err(CoordinatorError::invalid_argument(format!(
                "already in {} mode; nothing to migrate",
                to
            )));
        }
        info!(%from, %to, "migration requested");

        if !confirm_explicit {
            return Err(CoordinatorError::invalid_argument(
                "migration requires explicit confirmation; nothing was changed",
            ));
        }
        let mut stage = MigrationStage::Confirmed;

        // Stage: backup. No migration proceeds without at least an attempted
        // snapshot; omissions abort unless explicitly overridden.
        let snapshot = self
            .backup
            .snapshot(&options.prefixes, from)
            .await
            .map_err(|e| fail_at(stage, e))?;
        if !snapshot.metadata.is_complete() {
            let captured = snapshot.metadata.entry_count;
            let expected = captured + snapshot.metadata.omitted;
            if !options.allow_partial_backup {
                return Err(CoordinatorError::BackupIncomplete { captured, expected });
            }
            warn!(captured, expected, "proceeding on a partial snapshot (override given)");
        }
        stage = MigrationStage::BackedUp;

        // Stage: reconfigure. Writing the record is the hand-off to the
        // external orchestrator, which stops the store and relaunches it
        // with the new launch command; we then wait for the listener.
        let record = ModeRecord::new(to, options.auto_unseal, &options.updated_by, &self.paths);
        self.mode_config.save(&record).map_err(|e| fail_at(stage, e))?;
        retry_with_backoff("store readiness wait", self.backoff, || self.store.health())
            .await
            .map_err(|e| fail_at(stage, e))?;
        stage = MigrationStage::Reconfigured;

        // Stage: reinitialize. Only persistent targets have init/unseal
        // semantics; ephemeral backends come up initialized and unsealed.
        if to == StoreMode::Persistent {
            self.prepare_persistent_target(&record, options)
                .await
                .map_err(|e| fail_at(stage, e))?;
        }
        stage = MigrationStage::Reinitialized;

        // Stage: restore.
        let restored = self
            .backup
            .restore_cancellable(snapshot.id(), &self.cancel)
            .await
            .map_err(|e| fail_at(stage, e))?;
        stage = MigrationStage::Restored;

        // Stage: verify. A failed finding fails the migration even though
        // data was moved; operators are never told "success" over an
        // inconsistent result.
        let report = self.validator.check().await.map_err(|e| fail_at(stage, e))?;
        if report.has_failures() {
            return Err(CoordinatorError::migration_failed(
                stage,
                "post-migration validation reported failures; run `modekeeper status` for details",
            ));
        }
        stage = MigrationStage::Verified;

        // Retention is housekeeping; a prune failure does not undo a
        // verified migration.
        if let Err(err) = self.backup.prune(options.retention) {
            warn!(error = %err, "snapshot pruning failed after successful migration");
        }

        info!(%from, %to, snapshot = snapshot.id(), restored, "migration complete");
        Ok(MigrationOutcome { snapshot_id: snapshot.id().to_string(), restored, report })
    }

    async fn prepare_persistent_target(
        &self,
        record: &ModeRecord,
        options: &MigrationOptions,
    ) -> Result<()> {
        let health =
            retry_with_backoff("target health", self.backoff, || self.store.health()).await?;

        let keys = if !health.initialized {
            Some(self.seal.first_init(options.init_shares, options.init_threshold).await?)
        } else {
            UnsealKeySet::load_optional(&self.paths.key_file())?
        };

        self.seal.ensure_unsealed(record, keys.as_ref()).await
    }
}

/// Wrap a stage failure, preserving an inner failure that already carries a
/// stage (and pass-through for the explicit-override contract of
/// `BackupIncomplete`).
fn fail_at(stage: MigrationStage, err: CoordinatorError) -> CoordinatorError {
    match err {
        CoordinatorError::MigrationFailed { .. } | CoordinatorError::BackupIncomplete { .. } => err,
        other => CoordinatorError::migration_failed(stage, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert!(MigrationStage::Requested < MigrationStage::Confirmed);
        assert!(MigrationStage::BackedUp < MigrationStage::Reconfigured);
        assert!(MigrationStage::Restored < MigrationStage::Verified);
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(MigrationStage::BackedUp.to_string(), "backed-up");
        assert_eq!(MigrationStage::Verified.to_string(), "verified");
    }

    #[test]
    fn fail_at_preserves_existing_stage() {
        let inner = CoordinatorError::migration_failed(MigrationStage::BackedUp, "boom");
        let wrapped = fail_at(MigrationStage::Restored, inner);
        match wrapped {
            CoordinatorError::MigrationFailed { stage, .. } => {
                assert_eq!(stage, MigrationStage::BackedUp)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_options_capture_whole_mount() {
        let options = MigrationOptions::default();
        assert_eq!(options.prefixes, vec![String::new()]);
        assert_eq!(options.retention, 5);
        assert!(options.init_threshold <= options.init_shares);
    }
}
