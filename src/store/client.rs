//! HTTP client for the store's administrative API.
//!
//! Thin and retry-free: every method performs exactly one request and maps
//! the outcome onto the coordinator's error taxonomy. Connection failures
//! become [`CoordinatorError::Unreachable`], a 503 on a data path becomes
//! [`CoordinatorError::Sealed`], and 401/403 become
//! [`CoordinatorError::Unauthorized`] — callers decide what to do about each.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::errors::{CoordinatorError, Result};
use crate::secrets_util::SecretString;

use super::types::{
    HealthStatus, InitRequest, InitResponse, KvListResponse, KvReadResponse, KvWriteRequest,
    SealStatus, StoreErrorResponse, UnsealRequest,
};

/// Store connection configuration
#[derive(Debug, Clone)]
pub struct StoreClientConfig {
    /// Store listener address (e.g., "http://127.0.0.1:8200")
    pub base_url: String,

    /// Token supplied by the external bootstrap process; passed through
    /// unmodified on every request
    pub token: Option<String>,

    /// KV mount path under which the secret tree lives
    pub kv_mount: String,

    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for StoreClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8200".to_string(),
            token: None,
            kv_mount: "secret".to_string(),
            timeout: 10,
        }
    }
}

impl StoreClientConfig {
    /// Read connection settings from `MODEKEEPER_STORE_*` environment
    /// variables, with code defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("MODEKEEPER_STORE_ADDR").unwrap_or(defaults.base_url),
            token: std::env::var("MODEKEEPER_STORE_TOKEN").ok(),
            kv_mount: std::env::var("MODEKEEPER_KV_MOUNT").unwrap_or(defaults.kv_mount),
            timeout: std::env::var("MODEKEEPER_STORE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout),
        }
    }
}

/// Typed client over the store's administrative API
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: Client,
    config: StoreClientConfig,
}

impl StoreClient {
    pub fn new(config: StoreClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| CoordinatorError::http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => builder.header("X-Store-Token", token),
            None => builder,
        }
    }

    fn sys_url(&self, endpoint: &str) -> String {
        format!("{}/v1/sys/{}", self.config.base_url, endpoint)
    }

    fn kv_url(&self, path: &str) -> String {
        format!("{}/v1/{}/{}", self.config.base_url, self.config.kv_mount, path)
    }

    /// Fetch live health. The store encodes state in the status code as well
    /// as the body (200 active, 429 standby, 501 uninitialized, 503 sealed);
    /// all of those carry a parseable body and none of them is an error.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.sys_url("health");
        debug!(%url, "GET health");

        let response = self.client.get(&url).send().await.map_err(connection_error)?;
        let status = response.status();

        match status.as_u16() {
            200 | 429 | 501 | 503 => {
                let health: HealthStatus = response.json().await.map_err(|e| {
                    CoordinatorError::http(format!("malformed health body: {}", e))
                })?;
                Ok(health)
            }
            _ => Err(self.unexpected_status("health", status, response).await),
        }
    }

    /// Initialize the store, producing key shares and the root token.
    ///
    /// Not idempotent by design: an already-initialized store yields
    /// [`CoordinatorError::AlreadyInitialized`]. Check `health().initialized`
    /// first.
    pub async fn init(&self, shares: u32, threshold: u32) -> Result<InitResponse> {
        if threshold == 0 || threshold > shares {
            return Err(CoordinatorError::invalid_argument(format!(
                "threshold {} must be between 1 and shares {}",
                threshold, shares
            )));
        }

        let url = self.sys_url("init");
        debug!(%url, shares, threshold, "POST init");

        let body = InitRequest { secret_shares: shares, secret_threshold: threshold };
        let response =
            self.authed(self.client.post(&url)).json(&body).send().await.map_err(connection_error)?;
        let status = response.status();

        if status == StatusCode::BAD_REQUEST {
            return Err(CoordinatorError::AlreadyInitialized);
        }
        if !status.is_success() {
            return Err(self.unexpected_status("init", status, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| CoordinatorError::http(format!("malformed init response: {}", e)))
    }

    /// Submit one key share toward unsealing.
    pub async fn unseal(&self, key: &SecretString) -> Result<SealStatus> {
        let url = self.sys_url("unseal");
        debug!(%url, "PUT unseal");

        let body = UnsealRequest { key: key.expose_secret() };
        let response =
            self.authed(self.client.put(&url)).json(&body).send().await.map_err(connection_error)?;
        let status = response.status();

        if !status.is_success() {
            return Err(self.classify_kv_error("unseal", status, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| CoordinatorError::http(format!("malformed unseal response: {}", e)))
    }

    /// Read a single secret value; `Ok(None)` when the path does not exist.
    pub async fn read(&self, path: &str) -> Result<Option<String>> {
        let url = self.kv_url(path);
        debug!(%url, "GET kv");

        let response = self.authed(self.client.get(&url)).send().await.map_err(connection_error)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.classify_kv_error(path, status, response).await);
        }

        let envelope: KvReadResponse = response
            .json()
            .await
            .map_err(|e| CoordinatorError::http(format!("malformed read response: {}", e)))?;
        Ok(envelope.data.get("value").cloned())
    }

    /// Write a secret value; last write wins.
    pub async fn write(&self, path: &str, value: &str) -> Result<()> {
        let url = self.kv_url(path);
        debug!(%url, "PUT kv");

        let body = KvWriteRequest { value };
        let response =
            self.authed(self.client.put(&url)).json(&body).send().await.map_err(connection_error)?;
        let status = response.status();

        if !status.is_success() {
            return Err(self.classify_kv_error(path, status, response).await);
        }
        Ok(())
    }

    /// List the immediate children of a prefix. Sub-trees carry a trailing
    /// `/`. A missing prefix lists as empty rather than erroring.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let url = format!("{}?list=true", self.kv_url(prefix));
        debug!(%url, "LIST kv");

        let response = self.authed(self.client.get(&url)).send().await.map_err(connection_error)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(self.classify_kv_error(prefix, status, response).await);
        }

        let envelope: KvListResponse = response
            .json()
            .await
            .map_err(|e| CoordinatorError::http(format!("malformed list response: {}", e)))?;
        Ok(envelope.data.keys)
    }

    /// Recursively enumerate every leaf path under a prefix.
    pub async fn list_recursive(&self, prefix: &str) -> Result<Vec<String>> {
        let mut leaves = Vec::new();
        let mut pending = vec![prefix.trim_end_matches('/').to_string()];

        while let Some(current) = pending.pop() {
            for child in self.list(&current).await? {
                let name = child.trim_end_matches('/');
                let full = if current.is_empty() {
                    name.to_string()
                } else {
                    format!("{}/{}", current, name)
                };
                if child.ends_with('/') {
                    pending.push(full);
                } else {
                    leaves.push(full);
                }
            }
        }

        leaves.sort();
        Ok(leaves)
    }

    /// Read every secret under the given prefixes into a flat, ordered map.
    ///
    /// Strict: any single read failure fails the whole call. The backup
    /// engine does its own walk when best-effort capture is wanted.
    pub async fn read_all(&self, prefixes: &[String]) -> Result<BTreeMap<String, String>> {
        let mut entries = BTreeMap::new();
        for prefix in prefixes {
            for path in self.list_recursive(prefix).await? {
                match self.read(&path).await? {
                    Some(value) => {
                        entries.insert(path, value);
                    }
                    // Deleted between list and read; skip.
                    None => warn!(%path, "path listed but absent on read"),
                }
            }
        }
        Ok(entries)
    }

    /// Map a non-success status on a data-path operation onto the taxonomy.
    async fn classify_kv_error(
        &self,
        context: &str,
        status: StatusCode,
        response: Response,
    ) -> CoordinatorError {
        let body: StoreErrorResponse = response.json().await.unwrap_or(StoreErrorResponse {
            errors: Vec::new(),
        });
        let detail = body.errors.join("; ");

        match status.as_u16() {
            401 | 403 => CoordinatorError::unauthorized(if detail.is_empty() {
                format!("token rejected for '{}'", context)
            } else {
                detail
            }),
            // 503 on a data path means the seal is blocking the operation.
            503 => CoordinatorError::Sealed,
            _ => CoordinatorError::http(format!(
                "'{}' failed with status {}{}",
                context,
                status,
                if detail.is_empty() { String::new() } else { format!(": {}", detail) }
            )),
        }
    }

    async fn unexpected_status(
        &self,
        context: &str,
        status: StatusCode,
        response: Response,
    ) -> CoordinatorError {
        let text = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
        CoordinatorError::http(format!("'{}' returned status {}: {}", context, status, text))
    }
}

fn connection_error(error: reqwest::Error) -> CoordinatorError {
    // Any transport-level failure is Unreachable; the caller owns retries.
    CoordinatorError::unreachable(error.to_string())
}
