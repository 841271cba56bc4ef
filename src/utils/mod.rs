//! Shared helpers: atomic file writes and bounded retry.

pub mod backoff;
pub mod fs;
