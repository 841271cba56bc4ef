//! # Modekeeper
//!
//! Mode and migration lifecycle coordinator for a sealable secret store.
//!
//! The store itself is an external process that runs in one of two storage
//! modes: `ephemeral` (in-memory, auto-initialized, lost on restart) or
//! `persistent` (file-backed, initialized once, sealed on every restart).
//! Modekeeper owns everything around that process: the durable mode record
//! an orchestrator launches the store from, the unseal key material and the
//! seal state machine, timestamped secret-tree snapshots, the staged
//! migration that moves secrets between modes, and a read-only consistency
//! report over the whole arrangement.
//!
//! ## Architecture
//!
//! - [`store`]: typed HTTP client for the store's admin and KV APIs
//! - [`config`]: file layout and the mode record
//! - [`seal`]: unseal keys on disk and the sealed→unsealed state machine
//! - [`backup`]: snapshot export, replay, and retention
//! - [`migration`]: the staged mode-switch orchestration
//! - [`validation`]: consistency findings between record, disk, and store
//! - [`cli`]: the `modekeeper` command surface

pub mod backup;
pub mod cli;
pub mod config;
pub mod errors;
pub mod migration;
pub mod seal;
pub mod secrets_util;
pub mod store;
pub mod utils;
pub mod validation;

pub use errors::{CoordinatorError, Result};

/// Application name used in logs and generated records.
pub const APP_NAME: &str = "modekeeper";

/// Application version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
