//! Snapshot identity and on-disk format.
//!
//! Layout per snapshot:
//!
//! ```text
//! {backups_dir}/{id}/metadata.json
//! {backups_dir}/{id}/data/<secret path>   (one JSON-encoded value per file)
//! ```
//!
//! The id embeds the creation timestamp (`%Y%m%dT%H%M%S%3fZ`), so
//! lexicographic order over directory names equals creation order. Retention
//! pruning relies on that, never on filesystem mtime, which copy operations
//! do not preserve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::StoreMode;

/// Metadata written alongside every snapshot's data tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Timestamp-derived identity, e.g. `20260823T101530123Z`
    pub id: String,

    /// Mode the secrets were exported from; informational — the data itself
    /// is mode-agnostic
    pub source_mode: StoreMode,

    /// Entries actually captured. A restore sanity-checks against this, and
    /// the migration layer compares it with `omitted` before trusting the
    /// snapshot.
    pub entry_count: usize,

    /// Paths that failed to read and were skipped (best-effort capture)
    pub omitted: usize,

    pub created_at: DateTime<Utc>,
}

impl SnapshotMetadata {
    /// True when every listed path was captured.
    pub fn is_complete(&self) -> bool {
        self.omitted == 0
    }
}

/// Handle to a written snapshot
#[derive(Debug, Clone)]
pub struct BackupSnapshot {
    pub metadata: SnapshotMetadata,
    pub dir: PathBuf,
}

impl BackupSnapshot {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.join("data")
    }
}

/// Generate a fresh snapshot id from the current instant.
pub(crate) fn generate_id(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn id_is_sortable_by_creation_time() {
        let earlier = Utc.with_ymd_and_hms(2026, 8, 23, 10, 15, 30).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1);
        assert!(generate_id(earlier) < generate_id(later));
    }

    #[test]
    fn id_format() {
        let at = Utc.with_ymd_and_hms(2026, 8, 23, 10, 15, 30).unwrap();
        assert_eq!(generate_id(at), "20260823T101530000Z");
    }

    #[test]
    fn metadata_round_trips() {
        let metadata = SnapshotMetadata {
            id: "20260823T101530000Z".to_string(),
            source_mode: StoreMode::Ephemeral,
            entry_count: 4,
            omitted: 1,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&metadata).unwrap();
        let parsed: SnapshotMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metadata);
        assert!(!parsed.is_complete());
    }
}
