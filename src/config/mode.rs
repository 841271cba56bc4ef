//! Mode record: which storage mode is active and how to launch the store.
//!
//! Exactly one record is authoritative at a time. It is created on first
//! setup, mutated only by the migration coordinator after a confirmed
//! switch, and never deleted. Saves are atomic (stage, fsync, rename) so a
//! reader can never observe a record that fails to parse.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::paths::CoordinatorPaths;
use crate::errors::{CoordinatorError, Result};
use crate::utils::fs::write_atomic;

/// Storage mode of the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// In-memory backend; auto-initializes, never sealed, no durability
    Ephemeral,
    /// Durable backend; data and seal state survive restarts
    Persistent,
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreMode::Ephemeral => write!(f, "ephemeral"),
            StoreMode::Persistent => write!(f, "persistent"),
        }
    }
}

impl FromStr for StoreMode {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ephemeral" => Ok(StoreMode::Ephemeral),
            "persistent" => Ok(StoreMode::Persistent),
            other => Err(CoordinatorError::invalid_argument(format!(
                "unknown mode '{}' (expected 'ephemeral' or 'persistent')",
                other
            ))),
        }
    }
}

/// The authoritative record of the selected mode and its launch parameters.
///
/// The external process orchestrator honors `launch_command` when it
/// (re)starts the store; the coordinator only writes the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeRecord {
    pub mode: StoreMode,
    pub auto_unseal: bool,
    pub launch_command: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl ModeRecord {
    /// Build a record for `mode`, deriving the launch command from the mode
    /// and the resolved data directory.
    pub fn new(
        mode: StoreMode,
        auto_unseal: bool,
        updated_by: impl Into<String>,
        paths: &CoordinatorPaths,
    ) -> Self {
        Self {
            mode,
            auto_unseal,
            launch_command: Self::launch_command_for(mode, paths),
            updated_at: Utc::now(),
            updated_by: updated_by.into(),
        }
    }

    fn launch_command_for(mode: StoreMode, paths: &CoordinatorPaths) -> String {
        match mode {
            StoreMode::Ephemeral => "store server --storage=inmem".to_string(),
            StoreMode::Persistent => format!(
                "store server --storage=file --data-dir={}",
                paths.store_data_dir().display()
            ),
        }
    }
}

/// Load/save service for the mode record file
#[derive(Debug, Clone)]
pub struct ModeConfig {
    path: PathBuf,
}

impl ModeConfig {
    pub fn new(paths: &CoordinatorPaths) -> Self {
        Self { path: paths.mode_file() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the current record. An absent file is `NotConfigured`, which
    /// callers treat as ephemeral-by-default rather than a failure.
    pub fn load(&self) -> Result<ModeRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoordinatorError::NotConfigured)
            }
            Err(e) => {
                return Err(CoordinatorError::io(format!("reading {}", self.path.display()), e))
            }
        };

        serde_json::from_str(&contents).map_err(|e| {
            CoordinatorError::serialization(format!("parsing {}", self.path.display()), e)
        })
    }

    /// Persist the record atomically.
    pub fn save(&self, record: &ModeRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| CoordinatorError::serialization("encoding mode record", e))?;
        write_atomic(&self.path, &json, 0o644)?;
        info!(mode = %record.mode, auto_unseal = record.auto_unseal, "mode record saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(dir: &TempDir) -> CoordinatorPaths {
        CoordinatorPaths::new(dir.path())
    }

    #[test]
    fn mode_parses_from_str() {
        assert_eq!("ephemeral".parse::<StoreMode>().unwrap(), StoreMode::Ephemeral);
        assert_eq!("Persistent".parse::<StoreMode>().unwrap(), StoreMode::Persistent);
        assert!("durable".parse::<StoreMode>().is_err());
    }

    #[test]
    fn load_without_file_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let config = ModeConfig::new(&paths(&dir));
        assert!(matches!(config.load().unwrap_err(), CoordinatorError::NotConfigured));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let p = paths(&dir);
        let config = ModeConfig::new(&p);

        let record = ModeRecord::new(StoreMode::Persistent, true, "tester", &p);
        config.save(&record).unwrap();

        let loaded = config.load().unwrap();
        assert_eq!(loaded, record);
        assert!(loaded.launch_command.contains("--storage=file"));
    }

    #[test]
    fn ephemeral_launch_command_uses_inmem_backend() {
        let dir = TempDir::new().unwrap();
        let p = paths(&dir);
        let record = ModeRecord::new(StoreMode::Ephemeral, false, "tester", &p);
        assert_eq!(record.launch_command, "store server --storage=inmem");
    }

    #[test]
    fn corrupt_record_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let p = paths(&dir);
        std::fs::write(p.mode_file(), "{ not json").unwrap();

        let config = ModeConfig::new(&p);
        assert!(matches!(config.load().unwrap_err(), CoordinatorError::Serialization { .. }));
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = TempDir::new().unwrap();
        let p = paths(&dir);
        let config = ModeConfig::new(&p);

        config.save(&ModeRecord::new(StoreMode::Ephemeral, false, "a", &p)).unwrap();
        config.save(&ModeRecord::new(StoreMode::Persistent, true, "b", &p)).unwrap();

        let loaded = config.load().unwrap();
        assert_eq!(loaded.mode, StoreMode::Persistent);
        assert_eq!(loaded.updated_by, "b");
    }
}
