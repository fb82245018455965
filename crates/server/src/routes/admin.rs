//! Control-plane endpoints for operating the ingestion pipeline's tag
//! worklist: `indexed_tags`, per-tag queue depth, and character counts.

use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::{character_key, index_queue_key, INDEXED_TAGS_KEY};

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<String>,
}

pub async fn list_tags(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<Json<TagListResponse>> {
    let raw = state.kv.lrange(INDEXED_TAGS_KEY, 0, -1).await?;
    let tags = raw
        .into_iter()
        .map(String::from_utf8)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(Json(TagListResponse { tags }))
}

#[derive(Debug, Deserialize)]
pub struct AddTagRequest {
    pub tag: String,
}

/// Append a tag to the Discoverer's worklist (`LPUSH indexed_tags`). The
/// Discoverer's next pass picks it up; this does not touch `index_queue:*`
/// directly.
pub async fn add_tag(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<AddTagRequest>,
) -> ServerResult<Json<TagListResponse>> {
    if req.tag.trim().is_empty() {
        return Err(ServerError::BadRequest("tag must not be empty".into()));
    }
    state.kv.lpush(INDEXED_TAGS_KEY, req.tag.as_bytes()).await?;
    list_tags(State(state)).await
}

/// Remove every occurrence of a tag from the worklist (`LREM ... 0`).
pub async fn remove_tag(
    State(state): State<Arc<ServerState>>,
    Path(tag): Path<String>,
) -> ServerResult<Json<TagListResponse>> {
    state.kv.lrem(INDEXED_TAGS_KEY, 0, tag.as_bytes()).await?;
    list_tags(State(state)).await
}

#[derive(Debug, Serialize)]
pub struct QueueDepthResponse {
    pub tag: String,
    pub depth: u64,
}

pub async fn queue_depth(
    State(state): State<Arc<ServerState>>,
    Path(tag): Path<String>,
) -> ServerResult<Json<QueueDepthResponse>> {
    let depth = state.kv.llen(&index_queue_key(&tag)).await?;
    Ok(Json(QueueDepthResponse { tag, depth }))
}

#[derive(Debug, Serialize)]
pub struct CharacterCountResponse {
    pub character: String,
    pub count: u64,
}

/// Number of indexed images tagged with a given character
/// (`SCARD character:{name}`).
pub async fn character_count(
    State(state): State<Arc<ServerState>>,
    Path(character): Path<String>,
) -> ServerResult<Json<CharacterCountResponse>> {
    let count = state.kv.scard(&character_key(&character)).await?;
    Ok(Json(CharacterCountResponse { character, count }))
}
