//! Background pipeline: fetch, compose covers, persist.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::caption::CaptionRecord;
use crate::compose::{CoverArtifact, CoverComposer, CoverTemplate};
use crate::error::Result;
use crate::fetcher::{ContentReference, FetchedPost};
use crate::types::{DownloadOptions, MediaKind, TaskResult};

use super::TaskTracker;
use super::registry::TaskHandle;

/// Progress reached when the stage starts
const FETCH_START: u8 = 10;
const COMPOSE_START: u8 = 60;
const SAVE_START: u8 = 85;

/// Share of `done` out of `total` mapped into `[from, to]`
fn stage_progress(from: u8, to: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return to;
    }
    let span = usize::from(to - from);
    let step = span * done.min(total) / total;
    from + u8::try_from(step).unwrap_or(to - from)
}

impl TaskTracker {
    /// Drive one task to a terminal state
    ///
    /// Every error, and any panic, is recorded on the task. Nothing escapes.
    pub(crate) async fn execute(
        &self,
        handle: TaskHandle,
        reference: ContentReference,
        options: DownloadOptions,
    ) {
        let limit = Arc::clone(&self.run_state.concurrent_limit);
        let permit = tokio::select! {
            biased;
            _ = self.run_state.shutdown.cancelled() => {
                handle.fail("shutdown before the task started".to_string());
                return;
            }
            permit = limit.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    handle.fail("task scheduler closed".to_string());
                    return;
                }
            },
        };

        handle.start("Fetching media");
        let outcome = AssertUnwindSafe(self.run_pipeline(&handle, &reference, &options))
            .catch_unwind()
            .await;
        drop(permit);

        match outcome {
            Ok(Ok(result)) => handle.complete(result),
            Ok(Err(e)) => {
                tracing::error!(task_id = %handle.id(), reference = %reference, error = %e, "Pipeline failed");
                handle.fail(e.to_string());
            }
            Err(_) => {
                tracing::error!(task_id = %handle.id(), reference = %reference, "Pipeline panicked");
                handle.fail("internal error while processing the task".to_string());
            }
        }
    }

    async fn run_pipeline(
        &self,
        handle: &TaskHandle,
        reference: &ContentReference,
        options: &DownloadOptions,
    ) -> Result<TaskResult> {
        handle.advance(FETCH_START, "Fetching media");
        let on_item = |done: usize, total: usize| {
            handle.advance(
                stage_progress(FETCH_START, COMPOSE_START, done, total),
                format!("Fetching media ({done}/{total})"),
            );
        };
        let post = self.fetcher.fetch_media(reference, &on_item).await?;

        let add_cover = options
            .add_cover
            .unwrap_or(self.config.cover.enabled_by_default);
        let covers = if add_cover {
            self.compose_covers(handle, &post).await?
        } else {
            Vec::new()
        };

        handle.advance(SAVE_START, "Saving files");
        let caption = CaptionRecord::new(&post.owner, &post.caption, options).render();
        let allocation = self.layout.allocate(reference).await?;
        let bundle = self
            .layout
            .persist(allocation, &post.items, &covers, &caption)
            .await?;

        Ok(TaskResult {
            summary: bundle.summary(),
            folder: bundle.name,
            files: bundle.files,
            caption,
        })
    }

    /// One cover per image item, in item order
    async fn compose_covers(&self, handle: &TaskHandle, post: &FetchedPost) -> Result<Vec<CoverArtifact>> {
        let images: Vec<_> = post
            .items
            .iter()
            .filter(|item| item.kind == MediaKind::Image)
            .collect();
        if images.is_empty() {
            tracing::debug!(task_id = %handle.id(), "No images, skipping cover composition");
            return Ok(Vec::new());
        }

        handle.advance(COMPOSE_START, "Composing cover");
        let cover = &self.config.cover;
        let template = CoverTemplate::load(&cover.template_path).await?;
        let composer = CoverComposer::new(template, cover.geometry(), cover.jpeg_quality)?;

        let mut covers = Vec::with_capacity(images.len());
        for (done, item) in images.iter().enumerate() {
            if let Some(artifact) = composer.compose(item).await? {
                covers.push(artifact);
            }
            handle.advance(
                stage_progress(COMPOSE_START, SAVE_START, done + 1, images.len()),
                format!("Composing cover ({}/{})", done + 1, images.len()),
            );
        }
        Ok(covers)
    }
}
