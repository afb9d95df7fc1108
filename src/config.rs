//! Configuration types for repost-dl

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

use crate::compose::CoverGeometry;

/// Download behavior configuration (storage root, concurrency, file classification)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Root directory that holds one subdirectory per bundle (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum number of pipelines running at once (default: 3)
    ///
    /// Tasks submitted beyond this limit stay `pending` until a slot frees up.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,

    /// File extensions treated as images, lowercase without the dot
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// File extensions treated as videos, lowercase without the dot
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_tasks: default_max_concurrent(),
            image_extensions: default_image_extensions(),
            video_extensions: default_video_extensions(),
        }
    }
}

/// Cover composition configuration
///
/// The rectangle is fixed configuration: every source image is center-cropped
/// to `width`x`height` and pasted at (`pos_x`, `pos_y`) on the template.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CoverConfig {
    /// Template image the cover is composited onto
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,

    /// Width of the pasted rectangle (default: 849)
    #[serde(default = "default_cover_width")]
    pub width: u32,

    /// Height of the pasted rectangle (default: 1061)
    #[serde(default = "default_cover_height")]
    pub height: u32,

    /// Left offset of the pasted rectangle (default: 109)
    #[serde(default = "default_pos_x")]
    pub pos_x: u32,

    /// Top offset of the pasted rectangle (default: 137)
    #[serde(default = "default_pos_y")]
    pub pos_y: u32,

    /// Whether downloads produce covers when the request does not say (default: true)
    #[serde(default = "default_true")]
    pub enabled_by_default: bool,

    /// JPEG quality used when the template is a JPEG (default: 90)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl CoverConfig {
    /// Geometry of the pasted rectangle
    pub fn geometry(&self) -> CoverGeometry {
        CoverGeometry {
            width: self.width,
            height: self.height,
            x: self.pos_x,
            y: self.pos_y,
        }
    }
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
            width: default_cover_width(),
            height: default_cover_height(),
            pos_x: default_pos_x(),
            pos_y: default_pos_y(),
            enabled_by_default: true,
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Source platform configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SourceConfig {
    /// Base URL of the platform (default: "https://www.instagram.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Web application id header expected by the platform's JSON endpoints
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Connect timeout (default: 10 seconds)
    ///
    /// Only bounds establishing the connection. A fetch that connects and then
    /// stalls is not interrupted.
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub connect_timeout: Duration,

    /// Number of media files downloaded in parallel for one post (default: 4)
    #[serde(default = "default_max_parallel_media")]
    pub max_parallel_media: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            app_id: default_app_id(),
            connect_timeout: default_connect_timeout(),
            max_parallel_media: default_max_parallel_media(),
        }
    }
}

/// Task registry retention
///
/// Pending and running tasks are never evicted.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetentionConfig {
    /// Registry size above which the oldest finished tasks are evicted (default: 1000)
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,

    /// How long a finished task stays pollable (default: 30 minutes)
    #[serde(default = "default_terminal_ttl", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub terminal_ttl: Duration,

    /// Interval of the background sweep (default: 60 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_tasks: default_max_tasks(),
            terminal_ttl: default_terminal_ttl(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for the task tracker
///
/// Every section has defaults, so `Config::default()` works out of the box
/// and partial JSON/TOML documents deserialize.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Storage root, concurrency and file classification
    #[serde(default)]
    pub download: DownloadConfig,

    /// Cover template and geometry
    #[serde(default)]
    pub cover: CoverConfig,

    /// Source platform access
    #[serde(default)]
    pub source: SourceConfig,

    /// Task registry retention
    #[serde(default)]
    pub retention: RetentionConfig,

    /// REST API
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Check values that would otherwise fail deep inside a pipeline
    pub fn validate(&self) -> crate::Result<()> {
        if self.download.max_concurrent_tasks == 0 {
            return Err(config_error(
                "max_concurrent_tasks must be at least 1",
                "download.max_concurrent_tasks",
            ));
        }
        if self.cover.width == 0 || self.cover.height == 0 {
            return Err(config_error(
                "cover width and height must be non-zero",
                "cover.width",
            ));
        }
        if self.source.max_parallel_media == 0 {
            return Err(config_error(
                "max_parallel_media must be at least 1",
                "source.max_parallel_media",
            ));
        }
        if url::Url::parse(&self.source.base_url).is_err() {
            return Err(config_error(
                format!("invalid base_url '{}'", self.source.base_url),
                "source.base_url",
            ));
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> crate::Error {
    crate::Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp", "bmp", "heic"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_video_extensions() -> Vec<String> {
    ["mp4", "mov", "mkv", "webm", "avi"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_template_path() -> PathBuf {
    PathBuf::from("./assets/cover_template.png")
}

fn default_cover_width() -> u32 {
    849
}

fn default_cover_height() -> u32 {
    1061
}

fn default_pos_x() -> u32 {
    109
}

fn default_pos_y() -> u32 {
    137
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://www.instagram.com".to_string()
}

fn default_user_agent() -> String {
    concat!("repost-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_app_id() -> String {
    "936619743392459".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_parallel_media() -> usize {
    4
}

fn default_max_tasks() -> usize {
    1000
}

fn default_terminal_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
