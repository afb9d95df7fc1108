//! # repost-dl
//!
//! Asynchronous engine that downloads a post's media, composes cover images
//! onto a template and writes a repost caption, one background task per request.
//!
//! Each submission becomes a task that callers poll by id:
//!
//! 1. **Fetch** - resolve the URL or username and retrieve every media file in source order
//! 2. **Compose** - optionally paste each image, center-cropped, onto the cover template
//! 3. **Caption** - render `#Repost from @owner` ahead of the original caption
//! 4. **Persist** - write everything into a fresh, uniquely named bundle folder
//!
//! The library never installs a `tracing` subscriber and reads no files or
//! environment variables for configuration; both are up to the embedder.
//!
//! ## Quick Start
//!
//! ```no_run
//! use repost_dl::{Config, DownloadOptions, TaskTracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracker = TaskTracker::new(Config::default()).await?;
//!
//!     let id = tracker.submit(
//!         "https://www.instagram.com/p/CxYz123/",
//!         DownloadOptions::default(),
//!     )?;
//!
//!     loop {
//!         let task = tracker.status(&id)?;
//!         println!("{}% {}", task.progress, task.message);
//!         if task.status.is_terminal() {
//!             break;
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//!     }
//!
//!     tracker.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Repost caption rendering
pub mod caption;
/// Cover image composition
pub mod compose;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Reference resolution and media retrieval
pub mod fetcher;
/// Bundle folders on disk
pub mod layout;
/// Task engine (decomposed into focused submodules)
pub mod tracker;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use caption::CaptionRecord;
pub use compose::{CoverComposer, CoverGeometry, CoverTemplate};
pub use config::Config;
pub use error::{ApiError, ComposeError, Error, ErrorDetail, FetchError, Result, ToHttpStatus};
pub use fetcher::{ContentReference, InstagramSource, MediaFetcher, MediaSource, ReferenceKind};
pub use layout::OutputLayout;
pub use tracker::TaskTracker;
pub use types::{
    BundleInfo, DownloadOptions, Event, MediaItem, MediaKind, PreviewInfo, PreviewResponse, Task,
    TaskId, TaskResult, TaskStatus,
};

/// Wait for a termination signal, then shut the tracker down gracefully.
///
/// - **Unix:** SIGTERM or SIGINT
/// - **Other platforms:** Ctrl+C
///
/// # Example
///
/// ```no_run
/// use repost_dl::{Config, TaskTracker, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let tracker = Arc::new(TaskTracker::new(Config::default()).await?);
///     let _api = tracker.spawn_api_server();
///
///     run_with_shutdown(&tracker).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(tracker: &TaskTracker) -> Result<()> {
    wait_for_signal().await;
    tracker.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let (sigterm, sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (term, int) => {
            if let Err(e) = term.as_ref().and(int.as_ref()) {
                tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            }
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C");
            return;
        }
    };

    let (mut sigterm, mut sigint) = (sigterm, sigint);
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
        _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
