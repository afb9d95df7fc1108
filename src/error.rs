//! Error types for repost-dl
//!
//! This module provides the error taxonomy for the library:
//! - Input validation and reference resolution failures (reported before a task exists)
//! - Fetch, compose and storage failures (recorded on the task that hit them)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for repost-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for repost-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "cover.width")
        key: Option<String>,
    },

    /// Input is neither a recognized post/reel URL nor a plausible username
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Fetching metadata or media from the source platform failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Preview metadata could not be retrieved (non-fatal for callers)
    #[error("preview unavailable: {0}")]
    PreviewUnavailable(String),

    /// Cover composition failed
    #[error("cover composition failed: {0}")]
    Compose(#[from] ComposeError),

    /// Writing the output bundle failed
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        /// The path that could not be written
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Task or bundle not found
    #[error("not found: {0}")]
    NotFound(String),

    /// A task was asked to run a second time
    #[error("task {0} has already been started")]
    TaskAlreadyStarted(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a storage error for `path`
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Fetch failures, distinguished by cause where the platform makes that possible
#[derive(Debug, Error)]
pub enum FetchError {
    /// The post or account no longer exists
    #[error("{0} not found")]
    NotFound(String),

    /// The platform refused access (login required, private account, rate wall)
    #[error("access denied for {0}: login required")]
    AccessDenied(String),

    /// Transient network failure (connect error, 5xx, 429)
    #[error("network failure while fetching {target}: {reason}")]
    Network {
        /// What was being fetched
        target: String,
        /// The underlying cause
        reason: String,
    },

    /// The platform answered with something we could not interpret
    #[error("unexpected response for {target}: {reason}")]
    InvalidResponse {
        /// What was being fetched
        target: String,
        /// Why the response was rejected
        reason: String,
    },

    /// The reference kind is not supported by this operation
    #[error("unsupported reference: {0}")]
    Unsupported(String),
}

/// Cover composition failures
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The configured template file does not exist
    #[error("cover template not found: {}", path.display())]
    TemplateNotFound {
        /// The template path that was looked up
        path: PathBuf,
    },

    /// The template or source image could not be decoded
    #[error("failed to decode {what}: {reason}")]
    Decode {
        /// Which image failed ("template" or a media file name)
        what: String,
        /// Decoder error message
        reason: String,
    },

    /// The composited cover could not be encoded
    #[error("failed to encode cover: {0}")]
    Encode(String),

    /// Cover geometry does not fit inside the template
    #[error("cover rectangle {width}x{height}+{x}+{y} exceeds template {template_width}x{template_height}")]
    Geometry {
        /// Cover width
        width: u32,
        /// Cover height
        height: u32,
        /// Left offset
        x: u32,
        /// Top offset
        y: u32,
        /// Template width
        template_width: u32,
        /// Template height
        template_height: u32,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "not found: task 8f3kq0",
///     "details": { "id": "8f3kq0" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_reference")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidReference(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Fetch(FetchError::NotFound(_)) => 404,

            // 409 Conflict
            Error::TaskAlreadyStarted(_) => 409,

            // 403 Forbidden - the platform refused us
            Error::Fetch(FetchError::AccessDenied(_)) => 403,

            // 422 Unprocessable Entity
            Error::Fetch(FetchError::Unsupported(_)) => 422,
            Error::Compose(_) => 422,

            // 502 Bad Gateway - External service errors
            Error::Fetch(FetchError::Network { .. }) => 502,
            Error::Fetch(FetchError::InvalidResponse { .. }) => 502,
            Error::PreviewUnavailable(_) => 502,
            Error::Network(_) => 502,

            // 500 Internal Server Error - Server-side issues
            Error::Storage { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidReference(_) => "invalid_reference",
            Error::Fetch(e) => match e {
                FetchError::NotFound(_) => "content_not_found",
                FetchError::AccessDenied(_) => "access_denied",
                FetchError::Network { .. } => "fetch_network_error",
                FetchError::InvalidResponse { .. } => "invalid_response",
                FetchError::Unsupported(_) => "unsupported_reference",
            },
            Error::PreviewUnavailable(_) => "preview_unavailable",
            Error::Compose(e) => match e {
                ComposeError::TemplateNotFound { .. } => "template_not_found",
                ComposeError::Decode { .. } => "decode_failed",
                ComposeError::Encode(_) => "encode_failed",
                ComposeError::Geometry { .. } => "invalid_geometry",
            },
            Error::Storage { .. } => "storage_error",
            Error::NotFound(_) => "not_found",
            Error::TaskAlreadyStarted(_) => "task_already_started",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Storage { path, .. } => Some(serde_json::json!({
                "path": path,
            })),
            Error::Compose(ComposeError::TemplateNotFound { path }) => Some(serde_json::json!({
                "template": path,
            })),
            Error::TaskAlreadyStarted(id) => Some(serde_json::json!({
                "id": id,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
