//! Media fetching
//!
//! - [`reference`] turns raw user input into a [`ContentReference`]
//! - [`MediaSource`] is the seam to the platform; [`InstagramSource`] is the HTTP implementation
//! - [`MediaFetcher`] wraps a source with the preview/fetch contract the task pipeline relies on

mod instagram;
mod payload;
mod reference;

pub use instagram::InstagramSource;
pub use reference::{ContentReference, ReferenceKind, resolve};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, FetchError, Result};
use crate::types::{MediaItem, MediaKind, PreviewInfo};

/// Maximum caption length shown in previews
pub const PREVIEW_CAPTION_CHARS: usize = 300;

/// Callback invoked after each media file is retrieved, with (done, total)
pub type ItemProgress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Everything fetched for one reference
#[derive(Debug, Clone)]
pub struct FetchedPost {
    /// Owner handle
    pub owner: String,
    /// Original caption, empty when there is none
    pub caption: String,
    /// Media in source order, indices starting at 1
    pub items: Vec<MediaItem>,
}

/// Access to a content platform
///
/// Implementations must return media in source order (carousel position order)
/// with contiguous 1-based indices.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Lightweight metadata fetch. Must not touch the filesystem.
    async fn fetch_preview(&self, reference: &ContentReference) -> Result<PreviewInfo>;

    /// Retrieve all media plus owner and caption
    async fn fetch_post(
        &self,
        reference: &ContentReference,
        on_item: ItemProgress<'_>,
    ) -> Result<FetchedPost>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Preview and media retrieval on top of a [`MediaSource`]
#[derive(Clone)]
pub struct MediaFetcher {
    source: Arc<dyn MediaSource>,
}

impl MediaFetcher {
    /// Wrap a source
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self { source }
    }

    /// Parse a URL or bare username
    pub fn resolve(raw: &str) -> Result<ContentReference> {
        resolve(raw)
    }

    /// Fetch preview metadata with the caption truncated for display
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`Error::PreviewUnavailable`], so callers can
    /// show it as a warning and carry on.
    pub async fn fetch_metadata_preview(&self, reference: &ContentReference) -> Result<PreviewInfo> {
        match self.source.fetch_preview(reference).await {
            Ok(mut preview) => {
                preview.caption = truncate_caption(&preview.caption, PREVIEW_CAPTION_CHARS);
                Ok(preview)
            }
            Err(e) => {
                tracing::warn!(
                    reference = %reference,
                    source = self.source.name(),
                    error = %e,
                    "Preview unavailable"
                );
                Err(Error::PreviewUnavailable(preview_reason(e)))
            }
        }
    }

    /// Fetch all media for `reference` in source order
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] with the cause distinguished where the platform allows,
    /// and [`FetchError::InvalidResponse`] when the source breaks the `1..=n` numbering.
    pub async fn fetch_media(
        &self,
        reference: &ContentReference,
        on_item: ItemProgress<'_>,
    ) -> Result<FetchedPost> {
        let post = self.source.fetch_post(reference, on_item).await?;

        if let Some((position, item)) = post
            .items
            .iter()
            .enumerate()
            .find(|(i, item)| item.index != i + 1)
        {
            return Err(FetchError::InvalidResponse {
                target: reference.to_string(),
                reason: format!(
                    "media index {} at position {}, expected contiguous indices from 1",
                    item.index,
                    position + 1
                ),
            }
            .into());
        }

        tracing::debug!(
            reference = %reference,
            source = self.source.name(),
            items = post.items.len(),
            "Fetched media"
        );
        Ok(post)
    }
}

fn preview_reason(error: Error) -> String {
    match error {
        Error::PreviewUnavailable(reason) => reason,
        other => other.to_string(),
    }
}

/// Cut `caption` to `max_chars` characters, appending "..." when anything was removed
pub fn truncate_caption(caption: &str, max_chars: usize) -> String {
    match caption.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &caption[..byte_idx]),
        None => caption.to_string(),
    }
}

/// Pick the extension for a downloaded file
///
/// Uses the URL's extension when it is a known one for `kind`, otherwise the kind's default.
pub(crate) fn extension_for(file_name: &str, kind: MediaKind, known: &[String]) -> String {
    let from_name = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| known.iter().any(|k| k == ext));

    from_name.unwrap_or_else(|| match kind {
        MediaKind::Image => "jpg".to_string(),
        MediaKind::Video => "mp4".to_string(),
    })
}
