//! # Configuration Management
//!
//! Persistent coordinator state lives in a small directory of files; this
//! module resolves that layout and owns the mode record, the single source
//! of truth for how the backing store process should be (re)launched.

pub mod mode;
pub mod paths;

pub use mode::{ModeConfig, ModeRecord, StoreMode};
pub use paths::CoordinatorPaths;
