//! Index status endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::server::error::ApiError;
use crate::server::ServerState;

/// Response payload for index status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatusResponse {
    pub base_dir: String,
    pub snapshot_path: String,
    pub entries: usize,
    pub aliases: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_save_error: Option<String>,
}

/// GET /status
pub(crate) async fn status(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<IndexStatusResponse>, ApiError> {
    let index = state.index.clone();
    let status = tokio::task::spawn_blocking(move || index.status()).await?;
    Ok(Json(IndexStatusResponse {
        base_dir: state.index.base().display().to_string(),
        snapshot_path: status.snapshot_path.display().to_string(),
        entries: status.entries,
        aliases: status.aliases,
        last_save_error: status.last_save_error,
    }))
}
