//! HTTP source for Instagram's public JSON endpoints

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use url::Url;

use super::payload::{PostEnvelope, ProfileEnvelope, ShortcodeMedia};
use super::{ContentReference, FetchedPost, ItemProgress, MediaSource, ReferenceKind, extension_for};
use crate::config::Config;
use crate::error::{Error, FetchError, Result};
use crate::types::{MediaItem, MediaKind, PreviewInfo};

/// A media file to download, before its bytes are fetched
struct PendingMedia {
    index: usize,
    kind: MediaKind,
    url: String,
}

/// Fetches post metadata and media over HTTP
pub struct InstagramSource {
    client: reqwest::Client,
    base_url: Url,
    max_parallel_media: usize,
    image_extensions: Vec<String>,
    video_extensions: Vec<String>,
}

impl InstagramSource {
    /// Build a source from configuration
    ///
    /// # Errors
    ///
    /// Fails when `source.base_url` is not a valid URL or the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let mut base_url = Url::parse(&config.source.base_url).map_err(|e| Error::Config {
            message: format!("invalid base_url '{}': {}", config.source.base_url, e),
            key: Some("source.base_url".to_string()),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        let app_id = HeaderValue::from_str(&config.source.app_id).map_err(|e| Error::Config {
            message: format!("invalid app_id: {e}"),
            key: Some("source.app_id".to_string()),
        })?;
        headers.insert("X-IG-App-ID", app_id);

        let client = reqwest::Client::builder()
            .user_agent(config.source.user_agent.clone())
            .connect_timeout(config.source.connect_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            max_parallel_media: config.source.max_parallel_media.max(1),
            image_extensions: config.download.image_extensions.clone(),
            video_extensions: config.download.video_extensions.clone(),
        })
    }

    fn post_url(&self, shortcode: &str) -> Result<Url> {
        let mut url = self.join(&format!("p/{shortcode}/"))?;
        url.query_pairs_mut()
            .append_pair("__a", "1")
            .append_pair("__d", "dis");
        Ok(url)
    }

    fn profile_url(&self, username: &str) -> Result<Url> {
        let mut url = self.join("api/v1/users/web_profile_info/")?;
        url.query_pairs_mut().append_pair("username", username);
        Ok(url)
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Other(format!("failed to build URL for {path}: {e}")))
    }

    /// GET `url` and map the platform's failure modes onto [`FetchError`]
    async fn get(&self, url: Url, target: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        // Private content redirects to the login page instead of failing
        if response.url().path().contains("/accounts/login") {
            return Err(FetchError::AccessDenied(target.to_string()).into());
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error = match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound(target.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                FetchError::AccessDenied(target.to_string())
            }
            StatusCode::TOO_MANY_REQUESTS => FetchError::Network {
                target: target.to_string(),
                reason: "rate limited (HTTP 429)".to_string(),
            },
            s if s.is_server_error() => FetchError::Network {
                target: target.to_string(),
                reason: format!("HTTP {}", s.as_u16()),
            },
            s => FetchError::InvalidResponse {
                target: target.to_string(),
                reason: format!("HTTP {}", s.as_u16()),
            },
        };
        Err(error.into())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, target: &str) -> Result<T> {
        let body = self
            .get(url, target)
            .await?
            .text()
            .await
            .map_err(|e| FetchError::Network {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        serde_json::from_str(&body).map_err(|e| {
            FetchError::InvalidResponse {
                target: target.to_string(),
                reason: format!("malformed JSON: {e}"),
            }
            .into()
        })
    }

    async fn fetch_shortcode_media(&self, reference: &ContentReference) -> Result<ShortcodeMedia> {
        let target = reference.to_string();
        let envelope: PostEnvelope = self.get_json(self.post_url(&reference.value)?, &target).await?;
        envelope.into_media().ok_or_else(|| {
            FetchError::InvalidResponse {
                target,
                reason: "response contains no post".to_string(),
            }
            .into()
        })
    }

    /// Owner, caption and the list of files to download for `reference`
    async fn list_media(
        &self,
        reference: &ContentReference,
    ) -> Result<(String, String, Vec<ShortcodeMedia>)> {
        match reference.kind {
            ReferenceKind::Post | ReferenceKind::Reel | ReferenceKind::Tv => {
                let media = self.fetch_shortcode_media(reference).await?;
                let owner = media.owner_username();
                let caption = media.caption();
                Ok((owner, caption, media.flatten()))
            }
            ReferenceKind::Profile => {
                let target = reference.to_string();
                let envelope: ProfileEnvelope = self
                    .get_json(self.profile_url(&reference.value)?, &target)
                    .await?;
                let user = envelope
                    .data
                    .user
                    .ok_or_else(|| FetchError::NotFound(target.clone()))?;

                // First timeline page only; carousels are expanded in place
                let nodes: Vec<ShortcodeMedia> = user
                    .edge_owner_to_timeline_media
                    .map(|timeline| {
                        timeline
                            .edges
                            .iter()
                            .flat_map(|edge| edge.node.flatten())
                            .collect()
                    })
                    .unwrap_or_default();
                Ok((user.username, String::new(), nodes))
            }
        }
    }

    async fn download(&self, pending: PendingMedia, target: &str) -> Result<MediaItem> {
        let url = Url::parse(&pending.url).map_err(|e| FetchError::InvalidResponse {
            target: target.to_string(),
            reason: format!("bad media URL '{}': {}", pending.url, e),
        })?;
        let original_filename = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .unwrap_or("media")
            .to_string();

        let item_target = format!("{target} item {}", pending.index);
        let bytes = self
            .get(url, &item_target)
            .await?
            .bytes()
            .await
            .map_err(|e| FetchError::Network {
                target: item_target.clone(),
                reason: e.to_string(),
            })?;

        let known = match pending.kind {
            MediaKind::Image => &self.image_extensions,
            MediaKind::Video => &self.video_extensions,
        };
        let extension = extension_for(&original_filename, pending.kind, known);

        Ok(MediaItem {
            index: pending.index,
            kind: pending.kind,
            bytes: bytes.to_vec(),
            original_filename,
            extension,
        })
    }
}

#[async_trait]
impl MediaSource for InstagramSource {
    async fn fetch_preview(&self, reference: &ContentReference) -> Result<PreviewInfo> {
        if !reference.kind.is_post() {
            return Err(FetchError::Unsupported(format!(
                "previews are only available for posts, not {reference}"
            ))
            .into());
        }

        let media = self.fetch_shortcode_media(reference).await?;
        Ok(PreviewInfo {
            owner: media.owner_username(),
            caption: media.caption(),
            likes: media.likes(),
            comments: media.comments(),
            thumbnail_url: media.display_url.clone(),
            is_video: media.is_video,
        })
    }

    async fn fetch_post(
        &self,
        reference: &ContentReference,
        on_item: ItemProgress<'_>,
    ) -> Result<FetchedPost> {
        let target = reference.to_string();
        let (owner, caption, nodes) = self.list_media(reference).await?;

        let pending: Vec<PendingMedia> = nodes
            .iter()
            .filter_map(|node| {
                node.media_url().map(|url| (node.is_video, url.to_string()))
            })
            .enumerate()
            .map(|(i, (is_video, url))| PendingMedia {
                index: i + 1,
                kind: if is_video {
                    MediaKind::Video
                } else {
                    MediaKind::Image
                },
                url,
            })
            .collect();

        if pending.is_empty() {
            return Err(FetchError::InvalidResponse {
                target,
                reason: "no downloadable media".to_string(),
            }
            .into());
        }

        let total = pending.len();
        tracing::debug!(reference = %reference, total, "Downloading media files");

        // buffered() yields in input order, so items stay in source order
        let mut downloads = stream::iter(pending)
            .map(|p| self.download(p, &target))
            .buffered(self.max_parallel_media);

        let mut items = Vec::with_capacity(total);
        while let Some(result) = downloads.next().await {
            items.push(result?);
            on_item(items.len(), total);
        }

        Ok(FetchedPost {
            owner,
            caption,
            items,
        })
    }

    fn name(&self) -> &str {
        "instagram"
    }
}
