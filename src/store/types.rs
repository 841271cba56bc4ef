//! Wire DTOs for the store's administrative API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::secrets_util::SecretString;

/// Response from `GET /v1/sys/health`.
///
/// The store reports health through both the body and the status code
/// (200 active, 429 standby, 501 uninitialized, 503 sealed); the body is
/// authoritative here and all four codes parse as health, not errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub initialized: bool,
    pub sealed: bool,
}

/// Seal progress from `PUT /v1/sys/unseal`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SealStatus {
    pub sealed: bool,
    /// Key shares accepted so far in the current unseal attempt.
    pub progress: u32,
    /// Shares required to reconstruct the unseal capability.
    pub threshold: u32,
}

/// Request body for `POST /v1/sys/init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitRequest {
    pub secret_shares: u32,
    pub secret_threshold: u32,
}

/// Response from `POST /v1/sys/init`: the one and only time the store hands
/// out key shares and the root token.
#[derive(Debug, Deserialize)]
pub struct InitResponse {
    pub keys: Vec<SecretString>,
    pub root_token: SecretString,
}

/// Request body for `PUT /v1/sys/unseal`.
#[derive(Debug, Serialize)]
pub struct UnsealRequest<'a> {
    pub key: &'a str,
}

/// KV read envelope: `{"data": {"value": "..."}}`.
#[derive(Debug, Deserialize)]
pub struct KvReadResponse {
    pub data: HashMap<String, String>,
}

/// KV write body; values are stored under a single `value` field.
#[derive(Debug, Serialize)]
pub struct KvWriteRequest<'a> {
    pub value: &'a str,
}

/// KV list envelope: `{"data": {"keys": ["a", "sub/"]}}`.
#[derive(Debug, Deserialize)]
pub struct KvListResponse {
    pub data: KvListKeys,
}

#[derive(Debug, Deserialize)]
pub struct KvListKeys {
    pub keys: Vec<String>,
}

/// Error envelope the store uses for non-success responses.
#[derive(Debug, Deserialize)]
pub struct StoreErrorResponse {
    #[serde(default)]
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_deserializes() {
        let json = r#"{"initialized": true, "sealed": false}"#;
        let health: HealthStatus = serde_json::from_str(json).unwrap();
        assert!(health.initialized);
        assert!(!health.sealed);
    }

    #[test]
    fn seal_status_deserializes_progress() {
        let json = r#"{"sealed": true, "progress": 2, "threshold": 3}"#;
        let status: SealStatus = serde_json::from_str(json).unwrap();
        assert!(status.sealed);
        assert_eq!(status.progress, 2);
        assert_eq!(status.threshold, 3);
    }

    #[test]
    fn init_response_keys_are_redacted_in_debug() {
        let json = r#"{"keys": ["k1", "k2"], "root_token": "rt"}"#;
        let resp: InitResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.keys.len(), 2);
        assert_eq!(resp.keys[0].expose_secret(), "k1");

        let debug = format!("{:?}", resp);
        assert!(!debug.contains("k1"));
        assert!(!debug.contains("rt"));
    }

    #[test]
    fn list_response_keeps_trailing_slash_markers() {
        let json = r#"{"data": {"keys": ["API_KEY", "nested/"]}}"#;
        let resp: KvListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data.keys, vec!["API_KEY", "nested/"]);
    }

    #[test]
    fn error_envelope_tolerates_missing_errors_field() {
        let resp: StoreErrorResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.errors.is_empty());
    }
}
