//! Backup engine: snapshot, restore, prune.
//!
//! Capture is best-effort by policy: a single unreadable path is logged and
//! skipped, because a backup with omissions is strictly better than no
//! backup. The omission count lands in the metadata so callers that require
//! completeness can refuse a partial snapshot — this is recorded loss, never
//! silent loss. Restore is last-write-wins: it runs against a known-empty
//! target (migration) or as an explicit rollback, and both intend overwrite.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::StoreMode;
use crate::errors::{CoordinatorError, Result};
use crate::store::StoreClient;
use crate::utils::fs::write_atomic;

use super::snapshot::{generate_id, BackupSnapshot, SnapshotMetadata};

const METADATA_FILE: &str = "metadata.json";

/// Owns the backups directory; the only component that writes snapshots
pub struct BackupEngine {
    store: StoreClient,
    backups_dir: PathBuf,
}

impl BackupEngine {
    pub fn new(store: StoreClient, backups_dir: PathBuf) -> Self {
        Self { store, backups_dir }
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Export every secret under `prefixes` into a new timestamped snapshot.
    ///
    /// Enumeration failures abort (an empty listing is not a backup);
    /// per-path read failures are skipped and counted in `omitted`. The
    /// metadata file is written last, so a directory without one is an
    /// aborted snapshot and is ignored by listing and pruning.
    pub async fn snapshot(
        &self,
        prefixes: &[String],
        source_mode: StoreMode,
    ) -> Result<BackupSnapshot> {
        let id = generate_id(Utc::now());
        let dir = self.backups_dir.join(&id);
        let data_dir = dir.join("data");
        fs::create_dir_all(&data_dir)
            .map_err(|e| CoordinatorError::io(format!("creating {}", data_dir.display()), e))?;

        let mut entry_count = 0usize;
        let mut omitted = 0usize;

        for prefix in prefixes {
            let paths = self.store.list_recursive(prefix).await?;
            for path in paths {
                validate_secret_path(&path)?;
                match self.store.read(&path).await {
                    Ok(Some(value)) => {
                        self.write_entry(&data_dir, &path, &value)?;
                        entry_count += 1;
                    }
                    Ok(None) => {
                        warn!(%path, "listed path vanished before read; omitting");
                        omitted += 1;
                    }
                    Err(err) => {
                        warn!(%path, error = %err, "failed to read path; omitting from snapshot");
                        omitted += 1;
                    }
                }
            }
        }

        let metadata = SnapshotMetadata {
            id: id.clone(),
            source_mode,
            entry_count,
            omitted,
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| CoordinatorError::serialization("encoding snapshot metadata", e))?;
        write_atomic(&dir.join(METADATA_FILE), &json, 0o644)?;

        info!(snapshot = %id, entry_count, omitted, "snapshot written");
        Ok(BackupSnapshot { metadata, dir })
    }

    fn write_entry(&self, data_dir: &Path, path: &str, value: &str) -> Result<()> {
        let file = data_dir.join(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CoordinatorError::io(format!("creating {}", parent.display()), e))?;
        }
        let encoded = serde_json::to_vec(value)
            .map_err(|e| CoordinatorError::serialization(format!("encoding '{}'", path), e))?;
        fs::write(&file, encoded)
            .map_err(|e| CoordinatorError::io(format!("writing {}", file.display()), e))
    }

    /// Load the flat path→value map of a snapshot.
    pub fn read_entries(&self, snapshot_id: &str) -> Result<BTreeMap<String, String>> {
        let data_dir = self.snapshot_dir(snapshot_id)?.join("data");
        let mut entries = BTreeMap::new();

        for entry in WalkDir::new(&data_dir).into_iter() {
            let entry = entry.map_err(|e| {
                CoordinatorError::io(format!("walking snapshot {}", snapshot_id), e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&data_dir)
                .map_err(|_| {
                    CoordinatorError::invalid_argument(format!(
                        "entry outside snapshot data dir: {}",
                        entry.path().display()
                    ))
                })?
                .to_string_lossy()
                .into_owned();
            let raw = fs::read_to_string(entry.path())
                .map_err(|e| CoordinatorError::io(format!("reading {}", rel), e))?;
            let value: String = serde_json::from_str(&raw)
                .map_err(|e| CoordinatorError::serialization(format!("decoding '{}'", rel), e))?;
            entries.insert(rel, value);
        }

        Ok(entries)
    }

    /// Replay a snapshot into the live store; see [`Self::restore_cancellable`].
    pub async fn restore(&self, snapshot_id: &str) -> Result<usize> {
        self.restore_cancellable(snapshot_id, &CancellationToken::new()).await
    }

    /// Replay every captured pair via `write`, serially, last-write-wins.
    ///
    /// Cancellation is checked before each write: an interrupted restore
    /// stops between paths, never mid-write, and the caller learns exactly
    /// that it was cancelled.
    pub async fn restore_cancellable(
        &self,
        snapshot_id: &str,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let entries = self.read_entries(snapshot_id)?;
        let expected = entries.len();
        let mut restored = 0usize;

        for (path, value) in entries {
            if cancel.is_cancelled() {
                warn!(snapshot = %snapshot_id, restored, expected, "restore cancelled");
                return Err(CoordinatorError::Cancelled {
                    operation: format!("restore of snapshot {}", snapshot_id),
                });
            }
            self.store.write(&path, &value).await?;
            restored += 1;
        }

        info!(snapshot = %snapshot_id, restored, "snapshot restored");
        Ok(restored)
    }

    /// Delete all but the `keep` newest snapshots.
    ///
    /// Ordering comes from the timestamp embedded in the directory name.
    /// Returns the ids that were removed.
    pub fn prune(&self, keep: usize) -> Result<Vec<String>> {
        let mut ids = self.snapshot_ids()?;
        // Newest first.
        ids.sort_by(|a, b| b.cmp(a));

        let mut removed = Vec::new();
        for id in ids.into_iter().skip(keep) {
            let dir = self.backups_dir.join(&id);
            fs::remove_dir_all(&dir)
                .map_err(|e| CoordinatorError::io(format!("removing {}", dir.display()), e))?;
            removed.push(id);
        }

        if !removed.is_empty() {
            info!(removed = removed.len(), keep, "pruned old snapshots");
        }
        Ok(removed)
    }

    /// Metadata of every valid snapshot, newest first. Directories with
    /// missing or unparseable metadata are skipped with a warning.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotMetadata>> {
        let mut snapshots = Vec::new();
        for id in self.snapshot_ids()? {
            let path = self.backups_dir.join(&id).join(METADATA_FILE);
            match fs::read_to_string(&path)
                .map_err(CoordinatorError::from)
                .and_then(|raw| serde_json::from_str::<SnapshotMetadata>(&raw).map_err(Into::into))
            {
                Ok(metadata) => snapshots.push(metadata),
                Err(err) => warn!(snapshot = %id, error = %err, "skipping unreadable snapshot metadata"),
            }
        }
        snapshots.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(snapshots)
    }

    /// The most recent snapshot, if any exists.
    pub fn latest(&self) -> Result<Option<SnapshotMetadata>> {
        Ok(self.list_snapshots()?.into_iter().next())
    }

    fn snapshot_ids(&self) -> Result<Vec<String>> {
        let read = match fs::read_dir(&self.backups_dir) {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CoordinatorError::io(
                    format!("reading {}", self.backups_dir.display()),
                    e,
                ))
            }
        };

        let mut ids = Vec::new();
        for entry in read {
            let entry = entry
                .map_err(|e| CoordinatorError::io("reading backups directory entry", e))?;
            if !entry.path().is_dir() {
                continue;
            }
            // Only completed snapshots (metadata present) count.
            if entry.path().join(METADATA_FILE).is_file() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(ids)
    }

    fn snapshot_dir(&self, snapshot_id: &str) -> Result<PathBuf> {
        validate_secret_path(snapshot_id)?;
        let dir = self.backups_dir.join(snapshot_id);
        if !dir.join(METADATA_FILE).is_file() {
            return Err(CoordinatorError::invalid_argument(format!(
                "no snapshot named '{}'",
                snapshot_id
            )));
        }
        Ok(dir)
    }
}

/// Reject secret paths that would escape the snapshot data directory.
fn validate_secret_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(CoordinatorError::invalid_argument("secret path cannot be empty"));
    }
    if path.starts_with('/') {
        return Err(CoordinatorError::invalid_argument(format!(
            "secret path cannot be absolute: '{}'",
            path
        )));
    }
    if path.split('/').any(|c| c == ".." || c.is_empty()) {
        return Err(CoordinatorError::invalid_argument(format!(
            "secret path cannot contain '..' or empty components: '{}'",
            path
        )));
    }
    Ok(())
}
