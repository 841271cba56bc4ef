//! Secret-tree backups: export before destructive operations, replay after.
//!
//! Snapshots are immutable once written, named by a sortable UTC timestamp,
//! and pruned by retention count. A snapshot is a flat path→value map plus
//! metadata — deliberately mode-agnostic so the same data replays into
//! either backend.

pub mod engine;
pub mod snapshot;

pub use engine::BackupEngine;
pub use snapshot::{BackupSnapshot, SnapshotMetadata};
