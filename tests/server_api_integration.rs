//! Integration tests for the server crate's state and control-plane route
//! handlers, exercised directly rather than over a bound socket.

use axum::extract::{Path, State};
use std::sync::Arc;
use store::{InMemoryKv, KvStore};

use server::routes::admin;
use server::{ServerConfig, ServerState};

fn test_state() -> Arc<ServerState> {
    let mut config = ServerConfig::default();
    config.api_keys.insert("test-api-key".to_string());
    config.rate_limit_per_minute = 1000;

    let kv: Arc<dyn KvStore> = Arc::new(InMemoryKv::new());
    Arc::new(ServerState::new(config, kv))
}

#[tokio::test]
async fn state_initializes_with_configured_api_key() {
    let state = test_state();
    assert!(state.is_valid_api_key("test-api-key"));
    assert!(!state.is_valid_api_key("wrong-key"));
    assert!(!state.is_valid_api_key(""));
}

#[tokio::test]
async fn rate_limit_allows_requests_under_the_configured_ceiling() {
    let state = test_state();
    for _ in 0..10 {
        assert!(state.check_rate_limit("test-api-key"));
    }
}

#[test]
fn server_config_defaults_match_documented_values() {
    let config = ServerConfig::default();
    assert_eq!(config.port, 8080);
    assert_eq!(config.timeout_secs, 30);
    assert_eq!(config.max_body_size_mb, 10);
    assert_eq!(config.rate_limit_per_minute, 100);
    assert!(config.enable_cors);
    assert!(config.metrics_enabled);
}

/// Admin surface: an empty `indexed_tags` list reports no tags.
#[tokio::test]
async fn admin_list_tags_starts_empty() {
    let state = test_state();
    let response = admin::list_tags(State(state)).await.unwrap();
    assert!(response.0.tags.is_empty());
}

/// Admin surface: adding a tag makes it visible to both `list_tags` and
/// the Discoverer's own `LRANGE indexed_tags` read.
#[tokio::test]
async fn admin_add_then_list_tags_round_trips() {
    let state = test_state();
    let added = admin::add_tag(
        State(state.clone()),
        axum::Json(admin::AddTagRequest {
            tag: "touhou".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(added.0.tags, vec!["touhou".to_string()]);

    let listed = admin::list_tags(State(state)).await.unwrap();
    assert_eq!(listed.0.tags, vec!["touhou".to_string()]);
}

/// Admin surface: removing a tag clears it from the worklist.
#[tokio::test]
async fn admin_remove_tag_clears_worklist_entry() {
    let state = test_state();
    admin::add_tag(
        State(state.clone()),
        axum::Json(admin::AddTagRequest {
            tag: "touhou".to_string(),
        }),
    )
    .await
    .unwrap();

    let removed = admin::remove_tag(State(state), Path("touhou".to_string()))
        .await
        .unwrap();
    assert!(removed.0.tags.is_empty());
}

/// Admin surface: queue depth reflects `LLEN index_queue:{tag}` and
/// starts at zero for a tag with no enqueued skeletons.
#[tokio::test]
async fn admin_queue_depth_starts_at_zero() {
    let state = test_state();
    let depth = admin::queue_depth(State(state), Path("touhou".to_string()))
        .await
        .unwrap();
    assert_eq!(depth.0.depth, 0);
    assert_eq!(depth.0.tag, "touhou");
}

/// Admin surface: an empty request body is rejected before it ever
/// reaches the KV store.
#[tokio::test]
async fn admin_add_tag_rejects_blank_tag() {
    let state = test_state();
    let err = admin::add_tag(
        State(state),
        axum::Json(admin::AddTagRequest { tag: "  ".to_string() }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, server::ServerError::BadRequest(_)));
}
