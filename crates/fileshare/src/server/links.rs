//! Short link resolution.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Redirect, Response};
use pathindex::{resolve_under, IndexError, ShortCode};

use crate::server::browse::browse_url;
use crate::server::error::ApiError;
use crate::server::files::serve_file;
use crate::server::ServerState;

/// GET /s/:code
///
/// Resolves a short code. Folders redirect to their listing; files are
/// streamed directly. Unknown codes and vanished targets are not found.
#[tracing::instrument(skip_all)]
pub(crate) async fn resolve(
    State(state): State<Arc<ServerState>>,
    Path(code): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let Some(code) = ShortCode::parse(&code) else {
        return Err(ApiError::not_found());
    };

    let index = state.index.clone();
    let target = tokio::task::spawn_blocking(move || index.target_for(&code))
        .await?
        .ok_or_else(ApiError::not_found)?;

    let full = resolve_under(state.index.base(), &target)?;
    let metadata = tokio::fs::metadata(&full)
        .await
        .map_err(IndexError::from)?;

    if metadata.is_dir() {
        tracing::debug!(path = %target, "redirecting to listing");
        return Ok(Redirect::to(&browse_url(&target)).into_response());
    }
    serve_file(&full, request).await
}
