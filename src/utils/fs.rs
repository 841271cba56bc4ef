//! Atomic file persistence and permission helpers.
//!
//! The mode record and the unseal-key file are the only shared mutable files
//! in the system. Every writer goes through [`write_atomic`]: stage the bytes
//! in a sibling temp file, fsync, then rename over the target. A reader can
//! observe the old contents or the new contents, never a torn record.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::errors::{CoordinatorError, Result};

/// Write `contents` to `path` atomically (stage, fsync, rename).
///
/// `mode` is applied to the staging file before the rename so the final file
/// never exists with looser permissions, even transiently.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        CoordinatorError::invalid_argument(format!("path has no parent directory: {}", path.display()))
    })?;
    fs::create_dir_all(dir)
        .map_err(|e| CoordinatorError::io(format!("creating {}", dir.display()), e))?;

    let staging = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("staging")
    ));

    {
        let mut file = open_with_mode(&staging, mode)
            .map_err(|e| CoordinatorError::io(format!("staging {}", staging.display()), e))?;
        file.write_all(contents)
            .map_err(|e| CoordinatorError::io(format!("writing {}", staging.display()), e))?;
        file.sync_all()
            .map_err(|e| CoordinatorError::io(format!("syncing {}", staging.display()), e))?;
    }

    fs::rename(&staging, path).map_err(|e| {
        // Best effort: don't leave the staging file behind on failure.
        let _ = fs::remove_file(&staging);
        CoordinatorError::io(format!("renaming into {}", path.display()), e)
    })?;

    // Persist the rename itself.
    if let Ok(dir_handle) = File::open(dir) {
        let _ = dir_handle.sync_all();
    }

    Ok(())
}

#[cfg(unix)]
fn open_with_mode(path: &Path, mode: u32) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new().write(true).create(true).truncate(true).mode(mode).open(path)
}

#[cfg(not(unix))]
fn open_with_mode(path: &Path, _mode: u32) -> std::io::Result<File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

/// True if the file is readable by group or world.
///
/// Key material must be owner-only; the validator flags anything looser.
#[cfg(unix)]
pub fn is_group_or_world_readable(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let meta = fs::metadata(path)
        .map_err(|e| CoordinatorError::io(format!("stat {}", path.display()), e))?;
    Ok(meta.permissions().mode() & 0o044 != 0)
}

#[cfg(not(unix))]
pub fn is_group_or_world_readable(_path: &Path) -> Result<bool> {
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_round_trips_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");

        write_atomic(&path, b"{\"mode\":\"ephemeral\"}", 0o644).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{\"mode\":\"ephemeral\"}");

        // Overwrite replaces the whole file, no staging leftovers.
        write_atomic(&path, b"{}", 0o644).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_atomic_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/file.json");
        write_atomic(&path, b"x", 0o600).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn restrictive_mode_is_not_group_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.json");
        write_atomic(&path, b"secret", 0o600).unwrap();
        assert!(!is_group_or_world_readable(&path).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn loose_mode_is_flagged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.json");
        write_atomic(&path, b"secret", 0o644).unwrap();
        assert!(is_group_or_world_readable(&path).unwrap());
    }
}
