//! Seal lifecycle against a mock store: idempotent unsealing and the
//! failure paths that need operator action.

use chrono::Utc;
use modekeeper::config::{CoordinatorPaths, ModeRecord, StoreMode};
use modekeeper::errors::CoordinatorError;
use modekeeper::seal::{SealManager, UnsealKeySet};
use modekeeper::secrets_util::SecretString;
use modekeeper::store::{StoreClient, StoreClientConfig};
use modekeeper::utils::backoff::BackoffPolicy;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> StoreClient {
    StoreClient::new(StoreClientConfig {
        base_url: server.uri(),
        token: Some("test-token".to_string()),
        kv_mount: "secret".to_string(),
        timeout: 5,
    })
    .unwrap()
}

fn manager(dir: &TempDir, server: &MockServer) -> SealManager {
    SealManager::new(client_for(server), CoordinatorPaths::new(dir.path()).key_file())
        .with_backoff(BackoffPolicy::fast())
}

fn persistent_record(dir: &TempDir, auto_unseal: bool) -> ModeRecord {
    let paths = CoordinatorPaths::new(dir.path());
    ModeRecord::new(StoreMode::Persistent, auto_unseal, "test", &paths)
}

fn key_set(shares: &[&str], threshold: u32) -> UnsealKeySet {
    UnsealKeySet {
        keys: shares.iter().map(|s| SecretString::from(*s)).collect(),
        threshold,
        root_token: SecretString::from("s.root"),
        created_at: Utc::now(),
    }
}

async fn mount_health(server: &MockServer, status: u16, initialized: bool, sealed: bool) {
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(json!({"initialized": initialized, "sealed": sealed})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn ensure_unsealed_is_idempotent_on_an_unsealed_store() {
    let server = MockServer::start().await;
    mount_health(&server, 200, true, false).await;
    // An unsealed store never sees a key share.
    Mock::given(method("PUT"))
        .and(path("/v1/sys/unseal"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seal = manager(&dir, &server);
    let record = persistent_record(&dir, true);
    let keys = key_set(&["k1", "k2", "k3"], 2);

    seal.ensure_unsealed(&record, Some(&keys)).await.unwrap();
    seal.ensure_unsealed(&record, Some(&keys)).await.unwrap();
}

#[tokio::test]
async fn ephemeral_mode_has_no_seal_to_open() {
    let server = MockServer::start().await;
    // No health mock mounted: ephemeral short-circuits before any request.
    let dir = TempDir::new().unwrap();
    let seal = manager(&dir, &server);
    let paths = CoordinatorPaths::new(dir.path());
    let record = ModeRecord::new(StoreMode::Ephemeral, true, "test", &paths);

    seal.ensure_unsealed(&record, None).await.unwrap();
}

#[tokio::test]
async fn manual_unseal_names_the_key_file() {
    let server = MockServer::start().await;
    mount_health(&server, 503, true, true).await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/unseal"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seal = manager(&dir, &server);
    let record = persistent_record(&dir, false);
    let keys = key_set(&["k1", "k2", "k3"], 2);

    let err = seal.ensure_unsealed(&record, Some(&keys)).await.unwrap_err();
    match err {
        CoordinatorError::ManualUnsealRequired { threshold, key_file } => {
            assert_eq!(threshold, 2);
            assert!(key_file.ends_with("unseal-keys.json"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn fewer_shares_than_threshold_is_rejected_upfront() {
    let server = MockServer::start().await;
    mount_health(&server, 503, true, true).await;
    Mock::given(method("PUT"))
        .and(path("/v1/sys/unseal"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seal = manager(&dir, &server);
    let record = persistent_record(&dir, true);
    let keys = key_set(&["k1", "k2"], 3);

    let err = seal.ensure_unsealed(&record, Some(&keys)).await.unwrap_err();
    match err {
        CoordinatorError::InsufficientKeys { available, threshold } => {
            assert_eq!(available, 2);
            assert_eq!(threshold, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn still_sealed_after_threshold_shares_is_a_failure() {
    let server = MockServer::start().await;
    mount_health(&server, 503, true, true).await;
    // The store accepts every share but never reports unsealed; submission
    // stops at the threshold count, not at the full key set.
    Mock::given(method("PUT"))
        .and(path("/v1/sys/unseal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sealed": true,
            "progress": 1,
            "threshold": 3
        })))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seal = manager(&dir, &server);
    let record = persistent_record(&dir, true);
    let keys = key_set(&["k1", "k2", "k3", "k4", "k5"], 3);

    let err = seal.ensure_unsealed(&record, Some(&keys)).await.unwrap_err();
    match err {
        CoordinatorError::UnsealFailed { attempts } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn sealed_store_without_key_material_is_rejected() {
    let server = MockServer::start().await;
    mount_health(&server, 503, true, true).await;

    let dir = TempDir::new().unwrap();
    let seal = manager(&dir, &server);
    let record = persistent_record(&dir, true);

    let err = seal.ensure_unsealed(&record, None).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidArgument { .. }));
}
