//! Seal state machine.
//!
//! States: `Ephemeral` (terminal, no seal concept), `PersistentUninitialized`,
//! `PersistentSealed`, `PersistentUnsealed`. Uninitialized moves to sealed
//! via [`SealManager::first_init`]; sealed moves to unsealed by submitting
//! key shares; the reverse transition only happens through an external seal
//! action this component never performs.
//!
//! Seal state is always fetched live — another operator can seal the store
//! at any time, so nothing here caches beyond a single operation.

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{ModeRecord, StoreMode};
use crate::errors::{CoordinatorError, Result};
use crate::seal::keys::UnsealKeySet;
use crate::store::StoreClient;
use crate::utils::backoff::{retry_with_backoff, BackoffPolicy};

/// Derived seal state; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealState {
    Ephemeral,
    PersistentUninitialized,
    PersistentSealed,
    PersistentUnsealed,
}

impl fmt::Display for SealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SealState::Ephemeral => write!(f, "ephemeral (no seal)"),
            SealState::PersistentUninitialized => write!(f, "uninitialized"),
            SealState::PersistentSealed => write!(f, "sealed"),
            SealState::PersistentUnsealed => write!(f, "unsealed"),
        }
    }
}

/// Drives the seal/unseal lifecycle against a live store
pub struct SealManager {
    store: StoreClient,
    key_file: PathBuf,
    backoff: BackoffPolicy,
}

impl SealManager {
    pub fn new(store: StoreClient, key_file: PathBuf) -> Self {
        Self { store, key_file, backoff: BackoffPolicy::default() }
    }

    /// Override the health-poll backoff (tests use a tight budget).
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn key_file(&self) -> &std::path::Path {
        &self.key_file
    }

    /// Derive the current seal state from a live health call. The store may
    /// be mid-restart, so the health poll retries with bounded backoff.
    pub async fn seal_state(&self, record: &ModeRecord) -> Result<SealState> {
        if record.mode == StoreMode::Ephemeral {
            return Ok(SealState::Ephemeral);
        }

        let health =
            retry_with_backoff("seal-status poll", self.backoff, || self.store.health()).await?;

        Ok(if !health.initialized {
            SealState::PersistentUninitialized
        } else if health.sealed {
            SealState::PersistentSealed
        } else {
            SealState::PersistentUnsealed
        })
    }

    /// Bring the store to an operable (unsealed) state, or say exactly what
    /// the operator must do instead.
    ///
    /// Idempotent: an already-unsealed store (and any ephemeral store) is an
    /// immediate success. With `auto_unseal` off this never touches the seal
    /// and instead returns [`CoordinatorError::ManualUnsealRequired`] — a
    /// deliberate trade of convenience for not letting an unattended process
    /// consume key material.
    pub async fn ensure_unsealed(
        &self,
        record: &ModeRecord,
        keys: Option<&UnsealKeySet>,
    ) -> Result<()> {
        match self.seal_state(record).await? {
            SealState::Ephemeral | SealState::PersistentUnsealed => Ok(()),
            SealState::PersistentUninitialized => Err(CoordinatorError::invalid_argument(
                "store is uninitialized; initialize persistent mode before unsealing",
            )),
            SealState::PersistentSealed => {
                let keys = keys.ok_or_else(|| {
                    CoordinatorError::invalid_argument(format!(
                        "store is sealed and no unseal key material exists at {}",
                        self.key_file.display()
                    ))
                })?;

                if !record.auto_unseal {
                    return Err(CoordinatorError::ManualUnsealRequired {
                        threshold: keys.threshold as usize,
                        key_file: self.key_file.display().to_string(),
                    });
                }

                self.unseal_with(keys).await
            }
        }
    }

    /// Submit the first `threshold` key shares in generation order, stopping
    /// as soon as the store reports unsealed.
    async fn unseal_with(&self, keys: &UnsealKeySet) -> Result<()> {
        if keys.keys.len() < keys.threshold as usize {
            return Err(CoordinatorError::InsufficientKeys {
                available: keys.keys.len(),
                threshold: keys.threshold as usize,
            });
        }

        let mut attempts = 0;
        for key in keys.keys.iter().take(keys.threshold as usize) {
            attempts += 1;
            let status = self.store.unseal(key).await?;
            info!(
                progress = status.progress,
                threshold = status.threshold,
                sealed = status.sealed,
                "unseal share accepted"
            );
            if !status.sealed {
                info!(attempts, "store unsealed");
                return Ok(());
            }
        }

        warn!(attempts, "store still sealed after submitting the threshold share count");
        Err(CoordinatorError::UnsealFailed { attempts })
    }

    /// First persistent-mode activation: initialize the store and persist
    /// the resulting key set with restrictive permissions.
    ///
    /// Callers must check `health().initialized` first; an initialized store
    /// yields [`CoordinatorError::AlreadyInitialized`] from the store itself.
    pub async fn first_init(&self, shares: u32, threshold: u32) -> Result<UnsealKeySet> {
        let response = self.store.init(shares, threshold).await?;
        let key_set = UnsealKeySet::from_init(response, threshold);
        key_set.save(&self.key_file)?;
        info!(shares, threshold, key_file = %self.key_file.display(), "store initialized");
        Ok(key_set)
    }
}
