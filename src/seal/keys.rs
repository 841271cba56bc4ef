//! Unseal key material: produced once at first persistent-mode init,
//! consumed repeatedly by the seal manager.
//!
//! Key shares are kept in generation order — the unseal loop submits them in
//! exactly the order the store handed them out, never re-sorted. The file is
//! written atomically with 0o600 permissions; [`SecretString`] keeps the
//! shares out of logs, so persistence goes through an explicit plain mirror
//! struct rather than the redacting serializer.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{CoordinatorError, Result};
use crate::secrets_util::SecretString;
use crate::store::types::InitResponse;
use crate::utils::fs::write_atomic;

/// Key shares, threshold, and root token from the store's init operation
#[derive(Debug, Clone)]
pub struct UnsealKeySet {
    /// Key shares in generation order
    pub keys: Vec<SecretString>,
    /// Shares required to unseal
    pub threshold: u32,
    pub root_token: SecretString,
    pub created_at: DateTime<Utc>,
}

/// Plain on-disk mirror; only ever serialized into the 0o600 key file.
#[derive(Serialize, Deserialize)]
struct UnsealKeySetFile {
    keys: Vec<String>,
    threshold: u32,
    root_token: String,
    created_at: DateTime<Utc>,
}

impl UnsealKeySet {
    /// Build a key set from a fresh init response.
    pub fn from_init(response: InitResponse, threshold: u32) -> Self {
        Self {
            keys: response.keys,
            threshold,
            root_token: response.root_token,
            created_at: Utc::now(),
        }
    }

    /// Validate the threshold invariant: 1 <= threshold <= len(keys).
    fn validate(&self) -> Result<()> {
        if self.threshold == 0 || self.threshold as usize > self.keys.len() {
            return Err(CoordinatorError::invalid_argument(format!(
                "key set invalid: threshold {} with {} key share(s)",
                self.threshold,
                self.keys.len()
            )));
        }
        Ok(())
    }

    /// Persist to `path` with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let mirror = UnsealKeySetFile {
            keys: self.keys.iter().map(|k| k.expose_secret().to_string()).collect(),
            threshold: self.threshold,
            root_token: self.root_token.expose_secret().to_string(),
            created_at: self.created_at,
        };
        let json = serde_json::to_vec_pretty(&mirror)
            .map_err(|e| CoordinatorError::serialization("encoding key set", e))?;
        write_atomic(path, &json, 0o600)?;
        info!(
            path = %path.display(),
            shares = self.keys.len(),
            threshold = self.threshold,
            "unseal key set persisted"
        );
        Ok(())
    }

    /// Load from `path`; `Ok(None)` when no key material exists yet.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoordinatorError::io(format!("reading {}", path.display()), e)),
        };

        let mirror: UnsealKeySetFile = serde_json::from_str(&contents).map_err(|e| {
            CoordinatorError::serialization(format!("parsing {}", path.display()), e)
        })?;

        let key_set = Self {
            keys: mirror.keys.into_iter().map(SecretString::new).collect(),
            threshold: mirror.threshold,
            root_token: SecretString::new(mirror.root_token),
            created_at: mirror.created_at,
        };
        key_set.validate()?;
        Ok(Some(key_set))
    }
}
