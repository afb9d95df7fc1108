//! Task handlers: preview, submit, poll.

use super::{DownloadRequest, PreviewRequest, SubmitResponse};
use crate::api::AppState;
use crate::error::Result;
use crate::types::{PreviewResponse, Task, TaskId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// POST /preview - Resolve a reference and fetch preview metadata
#[utoipa::path(
    post,
    path = "/preview",
    tag = "tasks",
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Resolved reference, with preview metadata when available", body = PreviewResponse),
        (status = 400, description = "Input is not a post/reel URL or username", body = crate::error::ApiError)
    )
)]
pub async fn preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>> {
    let response = state.tracker.preview(&request.url).await?;
    Ok(Json(response))
}

/// POST /downloads - Create a task and start its pipeline
#[utoipa::path(
    post,
    path = "/downloads",
    tag = "tasks",
    request_body = DownloadRequest,
    responses(
        (status = 202, description = "Task created and queued", body = SubmitResponse),
        (status = 400, description = "Input is not a post/reel URL or username", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let task_id = state.tracker.submit(&request.url, request.options)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id })))
}

/// GET /tasks/:id - Task snapshot
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task id")
    ),
    responses(
        (status = 200, description = "Current task state", body = Task),
        (status = 404, description = "Unknown or expired task id", body = crate::error::ApiError)
    )
)]
pub async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Task>> {
    let task = state.tracker.status(&TaskId::from(id))?;
    Ok(Json(task))
}
