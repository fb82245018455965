//! `POST /api/v1/search` — upload an image, get back the
//! closest previously-indexed entries ranked by Hamming distance.

use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::{Searcher, DEFAULT_THRESHOLD};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub imhash: String,
    pub distance: u32,
    pub src: String,
    pub src_id: String,
    pub src_url: Option<String>,
    pub characters: Vec<String>,
    pub rating: char,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
}

/// Decode the request body as an image, fingerprint it, and rank the
/// closest previously-indexed images by Hamming distance. An empty
/// `hits` list means "no candidate below threshold" — there is no
/// distinct "not indexed" error.
pub async fn search(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SearchParams>,
    body: axum::body::Bytes,
) -> ServerResult<Json<SearchResponse>> {
    let query = fingerprint::Fingerprint::from_image_bytes(&body)?;

    let searcher = Searcher::new(&state.index);
    let candidates = searcher.search(&query, params.threshold).await?;

    let mut hits = Vec::with_capacity(candidates.len());
    for (imhash, distance) in candidates {
        let entry = match state.index.load(&imhash).await {
            Ok(entry) => entry,
            Err(store::StoreError::NotFound) => continue,
            Err(err) => return Err(ServerError::from(err)),
        };
        hits.push(SearchHit {
            imhash: imhash.to_hex(),
            distance,
            src: entry.src,
            src_id: entry.src_id,
            src_url: entry.src_url,
            characters: entry.characters.into_iter().collect(),
            rating: entry.rating.as_char(),
        });
    }

    Ok(Json(SearchResponse { hits }))
}
