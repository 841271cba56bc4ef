//! # Error Types
//!
//! Error taxonomy for the coordinator, using `thiserror`.
//!
//! The variants mirror the operational outcomes the coordinator has to tell
//! apart: a store that cannot be reached is not the same as a store that is
//! sealed, and neither is a failure. Expected-absence conditions
//! (`NotConfigured`, `AlreadyInitialized`) get their own variants so callers
//! can branch on them without string matching.

use std::fmt;

use crate::migration::MigrationStage;

/// Custom result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Main error type for the mode & migration coordinator
#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    /// The store's listener cannot be reached (network/connection failure)
    #[error("Store unreachable: {message}")]
    Unreachable { message: String },

    /// Operation blocked because the store is sealed
    #[error("Store is sealed; unseal it before retrying")]
    Sealed,

    /// Token rejected by the store
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Init called against an already-initialized store
    #[error("Store is already initialized")]
    AlreadyInitialized,

    /// No mode record exists yet; callers treat this as ephemeral-by-default
    #[error("No mode record found (not configured)")]
    NotConfigured,

    /// Fewer unseal keys available than the threshold requires
    #[error("Insufficient unseal keys: {available} available, {threshold} required")]
    InsufficientKeys { available: usize, threshold: usize },

    /// Store remained sealed after submitting every available key
    #[error("Unseal failed: store still sealed after {attempts} key(s)")]
    UnsealFailed { attempts: usize },

    /// Auto-unseal is disabled; the operator must unseal by hand
    #[error(
        "Manual unseal required: submit {threshold} key share(s) from {key_file} \
         (run `modekeeper unseal` after enabling auto-unseal, or use the store's unseal API)"
    )]
    ManualUnsealRequired { threshold: usize, key_file: String },

    /// Snapshot captured fewer entries than the live store holds
    #[error("Backup incomplete: captured {captured} of {expected} entries")]
    BackupIncomplete { captured: usize, expected: usize },

    /// A migration stage failed; carries the last stage that completed
    #[error("Migration failed after stage {stage}: {message}")]
    MigrationFailed { stage: MigrationStage, message: String },

    /// Bounded retry exhausted its time budget
    #[error("Operation timed out: {operation} after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    /// Caller signalled cancellation; the operation stopped at a safe point
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Caller passed an argument the coordinator rejects outright
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Unexpected HTTP response from the store
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl CoordinatorError {
    /// Create an unreachable error
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable { message: message.into() }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Create an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Create a serialization error with context
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization { context: context.into(), source }
    }

    /// Create an HTTP error
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http { message: message.into() }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), elapsed_ms }
    }

    /// Create a migration failure carrying the last completed stage
    pub fn migration_failed(stage: MigrationStage, message: impl Into<String>) -> Self {
        Self::MigrationFailed { stage, message: message.into() }
    }

    /// Check if this error should be retried.
    ///
    /// Only transport-level failures qualify; a sealed store needs an unseal,
    /// not a retry, and everything else needs an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordinatorError::Unreachable { .. } | CoordinatorError::Timeout { .. })
    }

    /// Expected-absence conditions are not failures; the CLI reports them
    /// informationally instead of exiting non-zero.
    pub fn is_expected_absence(&self) -> bool {
        matches!(self, CoordinatorError::NotConfigured | CoordinatorError::AlreadyInitialized)
    }
}

impl From<std::io::Error> for CoordinatorError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { context: "I/O operation failed".to_string(), source: error }
    }
}

impl From<serde_json::Error> for CoordinatorError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { context: "JSON serialization failed".to_string(), source: error }
    }
}

impl From<reqwest::Error> for CoordinatorError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::Unreachable { message: error.to_string() }
        } else {
            Self::Http { message: error.to_string() }
        }
    }
}

/// Severity used by validation findings; lives here so the error module is
/// the single home for "how bad is it" vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Pass => write!(f, "PASS"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Fail => write!(f, "FAIL"),
        }
    }
}
