//! On-disk layout for coordinator state.
//!
//! Everything lives under one base directory (default `~/.modekeeper`,
//! overridable via `MODEKEEPER_HOME`): the mode record, the unseal-key file,
//! the backups directory, and the persistent store's data directory.

use std::path::{Path, PathBuf};

/// Resolved filesystem layout
#[derive(Debug, Clone)]
pub struct CoordinatorPaths {
    base_dir: PathBuf,
}

impl CoordinatorPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Resolve from `MODEKEEPER_HOME`, falling back to `~/.modekeeper`.
    pub fn from_env() -> Self {
        if let Ok(home) = std::env::var("MODEKEEPER_HOME") {
            return Self::new(home);
        }
        let base = std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".modekeeper"))
            .unwrap_or_else(|_| PathBuf::from(".modekeeper"));
        Self { base_dir: base }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The authoritative mode record
    pub fn mode_file(&self) -> PathBuf {
        self.base_dir.join("mode.json")
    }

    /// Unseal key material; written 0o600, validated for looser permissions
    pub fn key_file(&self) -> PathBuf {
        self.base_dir.join("unseal-keys.json")
    }

    /// Timestamp-named snapshot directories
    pub fn backups_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Durable storage directory the persistent-mode store writes into;
    /// its presence (or absence) is what validation compares against the
    /// configured mode
    pub fn store_data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }
}
