//! Bundle handlers: list, open, delete.

use super::RevealResponse;
use crate::api::AppState;
use crate::error::Result;
use crate::types::BundleInfo;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// GET /bundles - Persisted bundles, newest first
#[utoipa::path(
    get,
    path = "/bundles",
    tag = "bundles",
    responses(
        (status = 200, description = "Bundles under the download root", body = Vec<BundleInfo>),
        (status = 500, description = "Download root could not be read", body = crate::error::ApiError)
    )
)]
pub async fn list_bundles(State(state): State<AppState>) -> Result<Json<Vec<BundleInfo>>> {
    Ok(Json(state.tracker.list_bundles().await?))
}

/// POST /bundles/:name/open - Open a bundle in the local file manager
#[utoipa::path(
    post,
    path = "/bundles/{name}/open",
    tag = "bundles",
    params(
        ("name" = String, Path, description = "Bundle folder name")
    ),
    responses(
        (status = 200, description = "Whether a file manager was launched", body = RevealResponse),
        (status = 404, description = "No such bundle", body = crate::error::ApiError)
    )
)]
pub async fn open_bundle(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RevealResponse>> {
    let opened = state.tracker.reveal_bundle(&name).await?;
    Ok(Json(RevealResponse { opened }))
}

/// DELETE /bundles/:name - Remove a bundle and its files
#[utoipa::path(
    delete,
    path = "/bundles/{name}",
    tag = "bundles",
    params(
        ("name" = String, Path, description = "Bundle folder name")
    ),
    responses(
        (status = 204, description = "Bundle deleted"),
        (status = 404, description = "No such bundle", body = crate::error::ApiError)
    )
)]
pub async fn delete_bundle(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    state.tracker.delete_bundle(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
