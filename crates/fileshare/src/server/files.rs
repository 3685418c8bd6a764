//! File streaming.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::response::Response;
use pathindex::{resolve_under, IndexError};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::server::error::ApiError;
use crate::server::ServerState;

/// GET /file/*path
///
/// Streams a file below the served directory. Honors `Range` requests.
pub(crate) async fn stream(
    State(state): State<Arc<ServerState>>,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let full = resolve_under(state.index.base(), &path)?;
    serve_file(&full, request).await
}

/// Streams `full` in response to `request`, with the content type guessed
/// from its extension. Directories and missing files are not found.
pub(crate) async fn serve_file(full: &FsPath, request: Request) -> Result<Response, ApiError> {
    let metadata = tokio::fs::metadata(full).await.map_err(IndexError::from)?;
    if metadata.is_dir() {
        return Err(ApiError::not_found());
    }

    let response = match ServeFile::new(full).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.map(Body::new))
}
