//! Shared test helpers for creating TaskTracker instances in tests.

use async_trait::async_trait;
use image::ImageFormat;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tokio::sync::Semaphore;

use crate::compose::tests::solid_image;
use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::fetcher::{ContentReference, FetchedPost, ItemProgress, MediaSource};
use crate::tracker::TaskTracker;
use crate::types::{MediaItem, MediaKind, PreviewInfo, Task, TaskId};

/// What a [`StaticSource`] answers with
#[derive(Clone)]
pub(crate) enum Outcome {
    Post(FetchedPost),
    NotFound,
    AccessDenied,
}

/// In-memory media source
///
/// When a gate is set, every fetch waits for one permit before answering,
/// which lets tests hold pipelines in the running state.
pub(crate) struct StaticSource {
    outcome: Outcome,
    gate: Option<Arc<Semaphore>>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub(crate) fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            gate: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn gated(outcome: Outcome, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(outcome)
        }
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for StaticSource {
    async fn fetch_preview(&self, reference: &ContentReference) -> Result<PreviewInfo> {
        match &self.outcome {
            Outcome::Post(post) => Ok(PreviewInfo {
                owner: post.owner.clone(),
                caption: post.caption.clone(),
                likes: Some(42),
                comments: Some(3),
                thumbnail_url: Some("https://cdn.example/thumb.jpg".into()),
                is_video: post.items.first().is_some_and(|i| i.kind == MediaKind::Video),
            }),
            Outcome::NotFound => Err(FetchError::NotFound(reference.to_string()).into()),
            Outcome::AccessDenied => Err(FetchError::AccessDenied(reference.to_string()).into()),
        }
    }

    async fn fetch_post(
        &self,
        reference: &ContentReference,
        on_item: ItemProgress<'_>,
    ) -> Result<FetchedPost> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        match &self.outcome {
            Outcome::Post(post) => {
                let total = post.items.len();
                for done in 1..=total {
                    on_item(done, total);
                }
                Ok(post.clone())
            }
            Outcome::NotFound => Err(FetchError::NotFound(reference.to_string()).into()),
            Outcome::AccessDenied => Err(FetchError::AccessDenied(reference.to_string()).into()),
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}

pub(crate) fn image_item(index: usize) -> MediaItem {
    MediaItem {
        index,
        kind: MediaKind::Image,
        bytes: solid_image(64, 48, [200, 30, 30], ImageFormat::Jpeg),
        original_filename: format!("{index}_n.jpg"),
        extension: "jpg".into(),
    }
}

pub(crate) fn video_item(index: usize) -> MediaItem {
    MediaItem {
        index,
        kind: MediaKind::Video,
        bytes: format!("video-{index}").into_bytes(),
        original_filename: format!("{index}_n.mp4"),
        extension: "mp4".into(),
    }
}

pub(crate) fn post(owner: &str, caption: &str, items: Vec<MediaItem>) -> Outcome {
    Outcome::Post(FetchedPost {
        owner: owner.into(),
        caption: caption.into(),
        items,
    })
}

/// Config rooted in a temp dir, with a small JPEG cover template
pub(crate) fn test_config(dir: &TempDir) -> Config {
    let template_path = dir.path().join("template.jpg");
    std::fs::write(
        &template_path,
        solid_image(120, 150, [255, 255, 255], ImageFormat::Jpeg),
    )
    .unwrap();

    let mut config = Config::default();
    config.download.download_dir = dir.path().join("downloads");
    config.download.max_concurrent_tasks = 3;
    config.cover.template_path = template_path;
    config.cover.width = 40;
    config.cover.height = 50;
    config.cover.pos_x = 10;
    config.cover.pos_y = 20;
    config
}

/// Tracker on `source`, with its temp dir (which must be kept alive)
pub(crate) async fn create_test_tracker(source: Arc<dyn MediaSource>) -> (TaskTracker, TempDir) {
    let dir = tempdir().unwrap();
    let config = test_config(&dir);
    let tracker = TaskTracker::with_source(config, source).await.unwrap();
    (tracker, dir)
}

/// Poll until the task is terminal, like a client would
pub(crate) async fn wait_for_terminal(tracker: &TaskTracker, id: &TaskId) -> Task {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let task = tracker.status(id).unwrap();
            if task.status.is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task did not finish in time")
}

/// Names of the files in a bundle folder, sorted
pub(crate) fn bundle_files(tracker: &TaskTracker, folder: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(tracker.layout.root().join(folder))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
