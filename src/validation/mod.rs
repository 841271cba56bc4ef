//! Read-only health and consistency checks.
//!
//! Every check produces a [`Finding`] tagged Pass/Warn/Fail, with a
//! remediation string where one exists. The reporter never mutates state;
//! it is safe to run at any time, including as the post-check of a
//! migration, where any Fail finding turns the migration verdict into a
//! failure even though data was moved.

use serde::Serialize;

use crate::config::{CoordinatorPaths, ModeConfig, ModeRecord, StoreMode};
use crate::errors::{CoordinatorError, Severity};
use crate::store::StoreClient;
use crate::utils::fs::is_group_or_world_readable;

/// One check outcome
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub severity: Severity,
    /// Stable machine-readable identifier, e.g. `seal-status`
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Finding {
    fn pass(code: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Pass, code, message: message.into(), remediation: None }
    }

    fn warn(code: &'static str, message: impl Into<String>, remediation: Option<String>) -> Self {
        Self { severity: Severity::Warn, code, message: message.into(), remediation }
    }

    fn fail(code: &'static str, message: impl Into<String>, remediation: Option<String>) -> Self {
        Self { severity: Severity::Fail, code, message: message.into(), remediation }
    }
}

/// Aggregated findings from one check run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub findings: Vec<Finding>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

impl Report {
    /// The worst severity across all findings (Pass when empty).
    pub fn overall(&self) -> Severity {
        self.findings.iter().map(|f| f.severity).max().unwrap_or(Severity::Pass)
    }

    pub fn has_failures(&self) -> bool {
        self.overall() == Severity::Fail
    }
}

/// Runs the consistency checks against live and on-disk state
pub struct ValidationReporter {
    paths: CoordinatorPaths,
    mode_config: ModeConfig,
    store: StoreClient,
}

impl ValidationReporter {
    pub fn new(paths: CoordinatorPaths, store: StoreClient) -> Self {
        let mode_config = ModeConfig::new(&paths);
        Self { paths, mode_config, store }
    }

    /// Run every check. Individual check failures become findings, never
    /// errors; the only way this returns `Err` is a broken environment that
    /// prevents gathering findings at all.
    pub async fn check(&self) -> crate::errors::Result<Report> {
        let mut findings = Vec::new();

        let record = self.check_mode_record(&mut findings);
        let effective_mode = record.as_ref().map(|r| r.mode).unwrap_or(StoreMode::Ephemeral);

        if effective_mode == StoreMode::Persistent {
            self.check_seal_status(&mut findings).await;
            self.check_storage_artifacts(&mut findings);
        } else {
            self.check_stale_artifacts(&mut findings);
        }

        self.check_key_file_permissions(&mut findings);
        self.check_backup_integrity(&mut findings);

        Ok(Report { findings, checked_at: chrono::Utc::now() })
    }

    fn check_mode_record(&self, findings: &mut Vec<Finding>) -> Option<ModeRecord> {
        match self.mode_config.load() {
            Ok(record) => {
                findings.push(Finding::pass(
                    "mode-record",
                    format!("mode record present: mode={}", record.mode),
                ));
                Some(record)
            }
            Err(CoordinatorError::NotConfigured) => {
                findings.push(Finding::warn(
                    "mode-record",
                    "no mode record found; treating mode as ephemeral by default",
                    Some("run `modekeeper switch <mode>` to create one".to_string()),
                ));
                None
            }
            Err(err) => {
                findings.push(Finding::fail(
                    "mode-record",
                    format!("mode record unreadable: {}", err),
                    Some(format!(
                        "inspect or remove {} and re-run switch",
                        self.mode_config.path().display()
                    )),
                ));
                None
            }
        }
    }

    async fn check_seal_status(&self, findings: &mut Vec<Finding>) {
        match self.store.health().await {
            Ok(health) if !health.initialized => {
                findings.push(Finding::warn(
                    "seal-status",
                    "persistent store is reachable but uninitialized",
                    Some("run `modekeeper switch persistent` to initialize it".to_string()),
                ));
            }
            Ok(health) if health.sealed => {
                // Expected transient state, not a defect.
                findings.push(Finding::warn(
                    "seal-status",
                    "persistent store is sealed",
                    Some(format!(
                        "run `modekeeper unseal` (key material at {})",
                        self.paths.key_file().display()
                    )),
                ));
            }
            Ok(_) => {
                findings.push(Finding::pass("seal-status", "persistent store is unsealed"));
            }
            Err(err) => {
                findings.push(Finding::fail(
                    "seal-status",
                    format!("seal status unreachable: {}", err),
                    Some(format!(
                        "verify the store listener at {} is running",
                        self.store.base_url()
                    )),
                ));
            }
        }
    }

    fn check_storage_artifacts(&self, findings: &mut Vec<Finding>) {
        let data_dir = self.paths.store_data_dir();
        if data_dir.is_dir() {
            findings.push(Finding::pass(
                "storage-artifacts",
                format!("durable storage present at {}", data_dir.display()),
            ));
        } else {
            // Configured persistent but nothing durable on disk: a previous
            // migration left the system inconsistent.
            findings.push(Finding::fail(
                "storage-artifacts",
                format!(
                    "mode is persistent but no durable storage exists at {}",
                    data_dir.display()
                ),
                Some("re-run the migration or switch back to ephemeral".to_string()),
            ));
        }
    }

    fn check_stale_artifacts(&self, findings: &mut Vec<Finding>) {
        let data_dir = self.paths.store_data_dir();
        if data_dir.is_dir() {
            // Persistent data legitimately survives a switch to ephemeral;
            // worth telling the operator about, not a defect.
            findings.push(Finding::warn(
                "storage-artifacts",
                format!(
                    "mode is ephemeral but persistent data remains at {}",
                    data_dir.display()
                ),
                Some("delete the data directory if the persistent store is retired".to_string()),
            ));
        } else {
            findings.push(Finding::pass("storage-artifacts", "no stale persistent artifacts"));
        }
    }

    fn check_key_file_permissions(&self, findings: &mut Vec<Finding>) {
        let key_file = self.paths.key_file();
        if !key_file.is_file() {
            return; // Nothing to check until persistent mode has been initialized.
        }
        match is_group_or_world_readable(&key_file) {
            Ok(true) => findings.push(Finding::fail(
                "key-permissions",
                format!("unseal key file {} is group/world-readable", key_file.display()),
                Some(format!("chmod 600 {}", key_file.display())),
            )),
            Ok(false) => findings.push(Finding::pass(
                "key-permissions",
                "unseal key file permissions are owner-only",
            )),
            Err(err) => findings.push(Finding::warn(
                "key-permissions",
                format!("could not check key file permissions: {}", err),
                None,
            )),
        }
    }

    fn check_backup_integrity(&self, findings: &mut Vec<Finding>) {
        let backups_dir = self.paths.backups_dir();
        if !backups_dir.is_dir() {
            return; // No backups yet, nothing to verify.
        }

        let mut total = 0usize;
        let mut corrupt = 0usize;
        if let Ok(entries) = std::fs::read_dir(&backups_dir) {
            for entry in entries.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }
                total += 1;
                let metadata = entry.path().join("metadata.json");
                let ok = std::fs::read_to_string(&metadata)
                    .ok()
                    .and_then(|raw| {
                        serde_json::from_str::<crate::backup::SnapshotMetadata>(&raw).ok()
                    })
                    .is_some();
                if !ok {
                    corrupt += 1;
                }
            }
        }

        if corrupt > 0 {
            findings.push(Finding::warn(
                "backup-integrity",
                format!("{} of {} snapshot(s) have missing or corrupt metadata", corrupt, total),
                Some("prune or inspect the affected snapshot directories".to_string()),
            ));
        } else if total > 0 {
            findings.push(Finding::pass(
                "backup-integrity",
                format!("{} snapshot(s) with valid metadata", total),
            ));
        }
    }
}
