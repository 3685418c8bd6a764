//! Directory listing endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::listing::{list_directory, Listing};
use crate::server::error::ApiError;
use crate::server::ServerState;

/// GET /
///
/// Lists the served directory itself.
pub(crate) async fn root(State(state): State<Arc<ServerState>>) -> Result<Json<Listing>, ApiError> {
    list(&state, String::new()).await
}

/// GET /browse/*subpath
///
/// Lists a directory below the served directory. Every entry carries its
/// short code; stale index entries are pruned first.
pub(crate) async fn browse(
    State(state): State<Arc<ServerState>>,
    Path(subpath): Path<String>,
) -> Result<Json<Listing>, ApiError> {
    list(&state, subpath).await
}

async fn list(state: &ServerState, dir: String) -> Result<Json<Listing>, ApiError> {
    let index = state.index.clone();
    let listing = tokio::task::spawn_blocking(move || list_directory(&index, &dir)).await??;
    Ok(Json(listing))
}

/// URL of the listing view for a relative directory path.
pub(crate) fn browse_url(rel: &str) -> String {
    if rel.is_empty() {
        return "/".to_string();
    }
    let encoded: Vec<String> = rel
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("/browse/{}", encoded.join("/"))
}
