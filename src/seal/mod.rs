//! Seal/unseal state machine for persistent mode.
//!
//! Ephemeral backends auto-initialize and are never sealed, so the whole
//! module is a no-op for them. For persistent mode it owns the unseal key
//! material on disk and drives the store from sealed to unsealed.

pub mod keys;
pub mod manager;

pub use keys::UnsealKeySet;
pub use manager::{SealManager, SealState};
