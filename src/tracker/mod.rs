//! Task engine split into focused submodules.
//!
//! The `TaskTracker` struct and its methods are organized by domain:
//! - [`registry`] - Task records, run guard and retention
//! - [`pipeline`] - Fetch, compose and persist on a background task
//! - [`bundles`] - Browsing, revealing and deleting persisted bundles
//! - [`lifecycle`] - Retention sweeper and graceful shutdown

mod bundles;
mod lifecycle;
mod pipeline;
mod registry;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker as PipelineTracker;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{ContentReference, InstagramSource, MediaFetcher, MediaSource, ReferenceKind};
use crate::layout::OutputLayout;
use crate::types::{DownloadOptions, Event, PreviewResponse, Task, TaskId};

use registry::{TaskHandle, TaskRegistry};

/// Scheduling state shared by every clone of the tracker
#[derive(Clone)]
pub(crate) struct RunState {
    /// Limits how many pipelines execute at once
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Every spawned pipeline, so shutdown can wait for them
    pub(crate) pipelines: PipelineTracker,
    /// Cancelled at shutdown: stops the sweeper and tasks still waiting for a slot
    pub(crate) shutdown: CancellationToken,
}

/// Asynchronous download/compose task engine (cloneable - all fields are Arc-wrapped)
///
/// Construct one per process and share it; there is no global registry.
#[derive(Clone)]
pub struct TaskTracker {
    pub(crate) config: Arc<Config>,
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) fetcher: MediaFetcher,
    pub(crate) layout: OutputLayout,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) run_state: RunState,
}

impl TaskTracker {
    /// Create a tracker fetching from the configured platform
    ///
    /// Starts the retention sweeper, so this must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for invalid configuration.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = InstagramSource::new(&config)?;
        Self::with_source(config, Arc::new(source)).await
    }

    /// Create a tracker on a custom [`MediaSource`]
    pub async fn with_source(config: Config, source: Arc<dyn MediaSource>) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            source = source.name(),
            download_dir = %config.download_dir().display(),
            max_concurrent_tasks = config.download.max_concurrent_tasks,
            "Task tracker initialized"
        );

        // Buffer of 1000 events: subscribers further behind see RecvError::Lagged
        let (event_tx, _rx) = broadcast::channel(1000);

        let tracker = Self {
            registry: Arc::new(TaskRegistry::new(
                config.retention.max_tasks,
                config.retention.terminal_ttl,
            )),
            fetcher: MediaFetcher::new(source),
            layout: OutputLayout::new(config.download_dir().clone()),
            event_tx,
            run_state: RunState {
                concurrent_limit: Arc::new(Semaphore::new(config.download.max_concurrent_tasks)),
                accepting_new: Arc::new(AtomicBool::new(true)),
                pipelines: PipelineTracker::new(),
                shutdown: CancellationToken::new(),
            },
            config: Arc::new(config),
        };

        tracker.start_retention_sweeper();
        Ok(tracker)
    }

    /// Allocate a new pending task
    ///
    /// A task that is never passed to [`run`](Self::run) expires after
    /// `retention.terminal_ttl`, and shutdown fails it.
    ///
    /// # Errors
    ///
    /// [`Error::ShuttingDown`] once shutdown has begun.
    pub fn create(&self) -> Result<TaskId> {
        self.ensure_accepting()?;

        let (id, evicted) = self.registry.insert();
        self.report_capacity_evictions(evicted);
        Ok(id)
    }

    /// Start the pipeline for a pending task and return immediately
    ///
    /// The task stays `pending` until a concurrency slot frees up.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown id
    /// - [`Error::TaskAlreadyStarted`] when the task was already run
    /// - [`Error::ShuttingDown`] once shutdown has begun
    pub fn run(
        &self,
        id: &TaskId,
        reference: ContentReference,
        options: DownloadOptions,
    ) -> Result<()> {
        self.ensure_accepting()?;

        let slot = self
            .registry
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
        if !slot.claim() {
            return Err(Error::TaskAlreadyStarted(id.to_string()));
        }
        let handle = TaskHandle::new(id.clone(), slot, self.event_tx.clone());
        self.spawn_pipeline(handle, reference, options);
        Ok(())
    }

    fn spawn_pipeline(
        &self,
        handle: TaskHandle,
        reference: ContentReference,
        options: DownloadOptions,
    ) {
        let id = handle.id();
        tracing::info!(task_id = %id, reference = %reference, "Task queued");
        self.emit_event(Event::Queued {
            id: id.clone(),
            reference: reference.to_string(),
        });

        let tracker = self.clone();
        self.run_state
            .pipelines
            .spawn(async move { tracker.execute(handle, reference, options).await });
    }

    /// Resolve `raw`, create a task and start it
    ///
    /// Invalid input is rejected before any task exists.
    pub fn submit(&self, raw: &str, options: DownloadOptions) -> Result<TaskId> {
        let reference = MediaFetcher::resolve(raw)?;
        self.ensure_accepting()?;

        let (id, slot, evicted) = self.registry.insert_claimed();
        self.report_capacity_evictions(evicted);
        let handle = TaskHandle::new(id.clone(), slot, self.event_tx.clone());
        self.spawn_pipeline(handle, reference, options);
        Ok(id)
    }

    /// Snapshot of a task
    ///
    /// Never blocks on the running pipeline beyond a single field copy.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for unknown or evicted ids.
    pub fn status(&self, id: &TaskId) -> Result<Task> {
        self.registry
            .get(id)
            .map(|slot| slot.snapshot())
            .ok_or_else(|| Error::NotFound(format!("task {id}")))
    }

    /// Resolve `raw` and fetch preview metadata
    ///
    /// A failed preview is not an error: the response carries the reason
    /// instead. Profiles have no preview.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`] when `raw` cannot be resolved.
    pub async fn preview(&self, raw: &str) -> Result<PreviewResponse> {
        let reference = MediaFetcher::resolve(raw)?;
        let description = reference.describe();

        let (preview, preview_error) = if reference.kind == ReferenceKind::Profile {
            (None, None)
        } else {
            match self.fetcher.fetch_metadata_preview(&reference).await {
                Ok(preview) => (Some(preview), None),
                Err(Error::PreviewUnavailable(reason)) => (None, Some(reason)),
                Err(e) => (None, Some(e.to_string())),
            }
        };

        Ok(PreviewResponse {
            reference,
            description,
            preview,
            preview_error,
        })
    }

    /// Subscribe to task events
    ///
    /// Each subscriber receives every event independently. A subscriber more
    /// than 1000 events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Send an event to all subscribers; dropped when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let tracker = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(tracker, config).await })
    }

    fn report_capacity_evictions(&self, evicted: usize) {
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted stale tasks over capacity");
            self.emit_event(Event::Evicted { count: evicted });
        }
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.run_state.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }
}
