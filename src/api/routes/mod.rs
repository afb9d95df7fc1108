//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] - Preview, submission and polling
//! - [`bundles`] - Persisted output browsing
//! - [`system`] - Health, events, OpenAPI

use serde::{Deserialize, Serialize};

use crate::types::{DownloadOptions, TaskId};

mod bundles;
mod system;
mod tasks;

pub use bundles::*;
pub use system::*;
pub use tasks::*;

/// Request body for POST /preview
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PreviewRequest {
    /// Post/reel URL or username
    pub url: String,
}

/// Request body for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadRequest {
    /// Post/reel URL or username
    pub url: String,
    /// Caption and cover options
    #[serde(flatten)]
    pub options: DownloadOptions,
}

/// Response for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    /// Id to poll at GET /tasks/:id
    pub task_id: TaskId,
}

/// Response for POST /bundles/:name/open
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RevealResponse {
    /// Whether a file manager was launched
    pub opened: bool,
}
