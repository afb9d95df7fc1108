//! Core types for repost-dl

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::fetcher::ContentReference;

/// Length of generated task ids
const TASK_ID_LEN: usize = 20;

/// Opaque, unguessable task identifier
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TASK_ID_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Task status
///
/// `Pending -> Running -> {Completed | Failed}`. Terminal states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, waiting for a pipeline slot
    Pending,
    /// Pipeline executing
    Running,
    /// Bundle persisted
    Completed,
    /// Pipeline aborted with an error
    Failed,
}

impl TaskStatus {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of a completed task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskResult {
    /// Bundle folder name under the download root
    pub folder: String,
    /// Human-readable summary, e.g. "Successfully downloaded 4 file(s)"
    pub summary: String,
    /// Files in the bundle, sorted by name
    pub files: Vec<String>,
    /// Rendered caption (also persisted as caption.txt)
    pub caption: String,
}

/// Snapshot of a task, as returned to pollers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Task {
    /// Task id
    pub id: TaskId,
    /// Current status
    pub status: TaskStatus,
    /// Progress percentage (0-100), never decreases
    pub progress: u8,
    /// Human-readable description of the current stage
    pub message: String,
    /// Populated once the task completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    /// Populated once the task failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the task last changed
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A freshly created task
    pub(crate) fn pending(id: TaskId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0,
            message: "Queued".to_string(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-request download options
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadOptions {
    /// Prefix the caption with "#Repost from @owner" (default: true)
    #[serde(default = "default_true")]
    pub repost_caption: bool,

    /// Custom caption template; `@username` is replaced with the owner handle.
    ///
    /// A blank template yields the original caption only.
    #[serde(default)]
    pub caption_template: Option<String>,

    /// Produce cover images (default: the configured `cover.enabled_by_default`)
    #[serde(default)]
    pub add_cover: Option<bool>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            repost_caption: true,
            caption_template: None,
            add_cover: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Kind of a media item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video
    Video,
}

/// A fetched media file, in source order
#[derive(Clone, Debug)]
pub struct MediaItem {
    /// 1-based position in the post
    pub index: usize,
    /// Image or video
    pub kind: MediaKind,
    /// Raw file contents, exactly as fetched
    pub bytes: Vec<u8>,
    /// File name on the platform's CDN
    pub original_filename: String,
    /// Lowercase extension without the dot
    pub extension: String,
}

impl MediaItem {
    /// Zero-padded stem shared by the media file and its cover, e.g. "01"
    pub fn stem(&self) -> String {
        format!("{:02}", self.index)
    }

    /// Persisted file name, e.g. "01.jpg"
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem(), self.extension)
    }
}

/// Metadata shown before committing to a download
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PreviewInfo {
    /// Owner handle
    pub owner: String,
    /// Caption, truncated for display
    pub caption: String,
    /// Like count, when the platform exposes it
    pub likes: Option<u64>,
    /// Comment count, when the platform exposes it
    pub comments: Option<u64>,
    /// URL of the display image
    pub thumbnail_url: Option<String>,
    /// Whether the post is a video
    pub is_video: bool,
}

/// Answer to a preview request
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PreviewResponse {
    /// Resolved reference
    pub reference: ContentReference,
    /// Human-readable description, e.g. "Post/Reel: CxYz123"
    pub description: String,
    /// Preview metadata when it could be fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewInfo>,
    /// Why the preview is missing, when it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_error: Option<String>,
}

/// A persisted bundle, as listed from the download root
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BundleInfo {
    /// Folder name
    pub name: String,
    /// Number of files in the bundle
    pub file_count: usize,
    /// Last modification time of the folder
    pub modified_at: Option<DateTime<Utc>>,
}

/// Event emitted during the task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task created and scheduled
    Queued {
        /// Task id
        id: TaskId,
        /// Resolved reference
        reference: String,
    },

    /// Task advanced to a new stage or percentage
    Progress {
        /// Task id
        id: TaskId,
        /// Progress percentage (0-100)
        progress: u8,
        /// Stage description
        message: String,
    },

    /// Task persisted its bundle
    Completed {
        /// Task id
        id: TaskId,
        /// Bundle folder name
        folder: String,
    },

    /// Task failed
    Failed {
        /// Task id
        id: TaskId,
        /// Error message
        error: String,
    },

    /// Finished tasks dropped from the registry
    Evicted {
        /// Number of tasks evicted
        count: usize,
    },

    /// Tracker shutting down
    Shutdown,
}
