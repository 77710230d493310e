//! End-to-end sync pipeline tests against a mock upstream.
//!
//! These tests exercise the full fetch, decode, classify, aggregate and
//! persist path, including the failure shapes: non-2xx responses, timeouts,
//! and per-user isolation during bulk syncs.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{Days, Utc};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use substation::fetch::SubStoreClient;
use substation::model::{SyncResult, unbound_tokens};
use substation::settings::Settings;
use substation::store::{KvStore, KvStoreExt, MemoryStore, keys};
use substation::sync::{SyncEngine, log};

// ============================================================================
// Fixtures
// ============================================================================

// Labels carry the usual provider smuggling: absolute expiry dates, an
// exp: timestamp (2026-01-01) and traffic markers.
const SHARE_BODY: &str = "\
vless://uuid-1@a.example.com:443?security=tls#%E5%88%B0%E6%9C%9F:2026-10-01%20%E5%89%A9%E4%BD%99:50GB
trojan://pw@b.example.com:443#到期:2026-09-15
ss://YWVzLTEyOC1nY206cGFzcw@c.example.com:8388#remain:25.5GB
not a proxy line
hysteria2://auth@d.example.com:443#exp:1767225600
";

fn build_engine(settings: Settings) -> SyncEngine {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let client = SubStoreClient::new(Duration::from_millis(settings.fetch_timeout_ms)).unwrap();
    SyncEngine::new(store, client, settings)
}

fn engine_for(server_uri: &str) -> SyncEngine {
    build_engine(Settings {
        substore_url: Some(server_uri.to_string()),
        backend_prefix: String::new(),
        collection: Some("main".to_string()),
        token: Some("tok-global".to_string()),
        fetch_timeout_ms: 5_000,
        data_file: Some("memory".to_string()),
    })
}

async fn mount_share(server: &MockServer, collection: &str, token: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/share/col/{}", collection)))
        .and(query_param("token", token))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

// ============================================================================
// Global Sync
// ============================================================================

#[tokio::test]
async fn test_global_sync_aggregates_plain_share() {
    let server = MockServer::start().await;
    mount_share(&server, "main", "tok-global", SHARE_BODY).await;

    let engine = engine_for(&server.uri());
    let outcome = engine.sync_global().await;

    assert!(outcome.success);
    assert_eq!(outcome.node_count, Some(4));
    assert_eq!(outcome.invalid_lines, Some(1));
    assert_eq!(outcome.earliest_expire.as_deref(), Some("2026-01-01"));
    assert_eq!(outcome.total_remain_gb, Some(75.5));
    assert!(outcome.error.is_none());

    // The stored record matches the outcome and keeps the raw lines
    let result: SyncResult = engine
        .store()
        .get_json(keys::SYNC_RESULT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.node_count, 4);
    assert_eq!(result.earliest_expire.as_deref(), Some("2026-01-01"));
    assert_eq!(result.total_remain_gb, Some(75.5));
    assert_eq!(result.raw_lines.len(), 4);
    assert!(result.raw_lines[0].starts_with("vless://"));
    assert_eq!(result.protocols.vless, 1);
    assert_eq!(result.protocols.trojan, 1);
    assert_eq!(result.protocols.shadowsocks, 1);
    assert_eq!(result.protocols.other, 1);

    let entries = log::entries(engine.store()).await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].success);
    assert_eq!(entries[0].node_count, Some(4));
}

#[tokio::test]
async fn test_global_sync_unwraps_base64_share() {
    let server = MockServer::start().await;
    mount_share(&server, "main", "tok-global", &STANDARD.encode(SHARE_BODY)).await;

    let engine = engine_for(&server.uri());
    let outcome = engine.sync_global().await;

    // Same aggregation as the plain-text share
    assert!(outcome.success);
    assert_eq!(outcome.node_count, Some(4));
    assert_eq!(outcome.earliest_expire.as_deref(), Some("2026-01-01"));
    assert_eq!(outcome.total_remain_gb, Some(75.5));
}

#[tokio::test]
async fn test_failed_sync_preserves_previous_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/share/col/main"))
        .and(query_param("token", "tok-global"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SHARE_BODY))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/share/col/main"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let engine = engine_for(&server.uri());

    let first = engine.sync_global().await;
    assert!(first.success);
    let stored_after_first: SyncResult = engine
        .store()
        .get_json(keys::SYNC_RESULT)
        .await
        .unwrap()
        .unwrap();

    let second = engine.sync_global().await;
    assert!(!second.success);
    assert!(second.error.as_deref().unwrap().contains("503"));

    // The failed attempt did not touch the stored result
    let stored_after_second: SyncResult = engine
        .store()
        .get_json(keys::SYNC_RESULT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_after_second, stored_after_first);

    // Both attempts are logged, newest first
    let entries = log::entries(engine.store()).await;
    assert_eq!(entries.len(), 2);
    assert!(!entries[0].success);
    assert!(entries[1].success);
}

#[tokio::test]
async fn test_sync_timeout_is_structured_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/share/col/main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(SHARE_BODY)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let engine = build_engine(Settings {
        substore_url: Some(server.uri()),
        backend_prefix: String::new(),
        collection: Some("main".to_string()),
        token: Some("tok-global".to_string()),
        fetch_timeout_ms: 200,
        data_file: Some("memory".to_string()),
    });

    let outcome = engine.sync_global().await;
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().unwrap().contains("timed out"));

    let entries = log::entries(engine.store()).await;
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
}

// ============================================================================
// User Sync
// ============================================================================

#[tokio::test]
async fn test_user_sync_converts_days_remaining() {
    let server = MockServer::start().await;
    let body = "vless://uuid@u1.example.com:443#%E5%89%A9%E4%BD%9930%E5%A4%A9\n\
                ss://x@u2.example.com:8388#还剩 7 天";
    mount_share(&server, "team-a", "tok-alice", body).await;

    let engine = engine_for(&server.uri());
    engine.create_user("alice").await.unwrap();
    engine.bind_user("alice", "team-a", "tok-alice").await.unwrap();

    // The conversion is anchored to the current UTC day; allow for a
    // midnight rollover between here and the assertion.
    let expected_before = plus_days(7);
    let outcome = engine.sync_user("alice").await;
    let expected_after = plus_days(7);

    assert!(outcome.success);
    assert_eq!(outcome.node_count, Some(2));

    let user = engine.get_user("alice").await.unwrap().unwrap();
    let result = user.last_sync_result.unwrap();
    assert_eq!(result.node_count, 2);
    let earliest = result.earliest_expire.unwrap();
    assert!(
        earliest == expected_before || earliest == expected_after,
        "unexpected earliest expiry: {}",
        earliest
    );

    // A user sync never writes the global result
    let global: Option<SyncResult> = engine.store().get_json(keys::SYNC_RESULT).await.unwrap();
    assert!(global.is_none());
}

#[tokio::test]
async fn test_user_sync_failure_keeps_previous_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/share/col/team-a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ss://a@h:1#x"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/share/col/team-a"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let engine = engine_for(&server.uri());
    engine.create_user("alice").await.unwrap();
    engine.bind_user("alice", "team-a", "tok-alice").await.unwrap();

    assert!(engine.sync_user("alice").await.success);
    let first = engine
        .get_user("alice")
        .await
        .unwrap()
        .unwrap()
        .last_sync_result
        .unwrap();

    let outcome = engine.sync_user("alice").await;
    assert!(!outcome.success);

    let kept = engine
        .get_user("alice")
        .await
        .unwrap()
        .unwrap()
        .last_sync_result
        .unwrap();
    assert_eq!(kept, first);
}

// ============================================================================
// Bulk Sync
// ============================================================================

#[tokio::test]
async fn test_bulk_sync_isolates_user_failures() {
    let server = MockServer::start().await;
    mount_share(&server, "col-a", "tok-a", "ss://a@h:1#x\nvless://b@h:2#y").await;
    Mock::given(method("GET"))
        .and(path("/share/col/col-b"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = engine_for(&server.uri());
    engine.create_user("alice").await.unwrap();
    engine.bind_user("alice", "col-a", "tok-a").await.unwrap();
    engine.create_user("bob").await.unwrap();
    engine.bind_user("bob", "col-b", "tok-b").await.unwrap();
    engine.create_user("carol").await.unwrap();

    let outcome = engine.sync_all_users().await;
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.synced, 2);
    assert_eq!(outcome.success, 1);
    assert_eq!(outcome.failed, 1);

    // Alice synced, bob's failure left his record without a result
    let alice = engine.get_user("alice").await.unwrap().unwrap();
    assert_eq!(alice.last_sync_result.unwrap().node_count, 2);
    let bob = engine.get_user("bob").await.unwrap().unwrap();
    assert!(bob.last_sync_result.is_none());

    // The pass itself is recorded despite the failure
    let config = engine.auto_sync_config().await.unwrap();
    assert!(config.last_scheduled_sync.is_some());

    // Bulk syncs never touch the global result
    let global: Option<SyncResult> = engine.store().get_json(keys::SYNC_RESULT).await.unwrap();
    assert!(global.is_none());
}

// ============================================================================
// Upstream Listings
// ============================================================================

#[tokio::test]
async fn test_upstream_token_and_collection_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/store/api/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"status":"success","data":[{"token":"tok-a","name":"alice"},{"token":"tok-b"}]}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/store/api/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"status":"success","data":[{"name":"main","subscriptions":["s1","s2"]},{"name":"backup"}]}"#,
        ))
        .mount(&server)
        .await;

    let engine = build_engine(Settings {
        substore_url: Some(server.uri()),
        backend_prefix: "/store".to_string(),
        collection: None,
        token: None,
        fetch_timeout_ms: 5_000,
        data_file: Some("memory".to_string()),
    });

    let tokens = engine.list_upstream_tokens().await.unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].token, "tok-a");
    assert_eq!(tokens[0].name.as_deref(), Some("alice"));

    let collections = engine.list_upstream_collections().await.unwrap();
    assert_eq!(collections.len(), 2);
    assert_eq!(collections[0].name, "main");
    assert_eq!(collections[0].subscriptions, vec!["s1", "s2"]);
    assert!(collections[1].subscriptions.is_empty());

    // Binding tok-a leaves only tok-b unbound
    engine.create_user("alice").await.unwrap();
    engine.bind_user("alice", "main", "tok-a").await.unwrap();
    let users = engine.list_users().await.unwrap();
    let unbound = unbound_tokens(&tokens, &users);
    assert_eq!(unbound.len(), 1);
    assert_eq!(unbound[0].token, "tok-b");
}

#[tokio::test]
async fn test_upstream_envelope_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tokens"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"status":"failed","data":[]}"#),
        )
        .mount(&server)
        .await;

    let engine = engine_for(&server.uri());
    let err = engine.list_upstream_tokens().await.unwrap_err();
    assert!(format!("{}", err).contains("status 'failed'"));
}

// ============================================================================
// Sync Log
// ============================================================================

#[tokio::test]
async fn test_sync_log_ring_caps_at_ten() {
    let server = MockServer::start().await;
    mount_share(&server, "main", "tok-global", SHARE_BODY).await;

    let engine = engine_for(&server.uri());
    for _ in 0..12 {
        assert!(engine.sync_global().await.success);
    }

    let entries = log::entries(engine.store()).await;
    assert_eq!(entries.len(), 10);
    assert!(entries.iter().all(|entry| entry.success));
}

fn plus_days(days: u64) -> String {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(days))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string()
}
