//! OpenAPI documentation and schema generation

use utoipa::OpenApi;

/// OpenAPI documentation for the repost-dl REST API
///
/// Served at `/openapi.json`, and to Swagger UI at `/swagger-ui` when enabled.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "repost-dl REST API",
        version = "0.1.0",
        description = "Download posts with their media, compose cover images and build repost captions as background tasks",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local server")
    ),
    paths(
        // Tasks
        crate::api::routes::preview,
        crate::api::routes::submit_download,
        crate::api::routes::get_task,

        // Bundles
        crate::api::routes::list_bundles,
        crate::api::routes::open_bundle,
        crate::api::routes::delete_bundle,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::TaskId,
        crate::types::TaskStatus,
        crate::types::TaskResult,
        crate::types::Task,
        crate::types::DownloadOptions,
        crate::types::MediaKind,
        crate::types::PreviewInfo,
        crate::types::PreviewResponse,
        crate::types::BundleInfo,
        crate::types::Event,
        crate::fetcher::ContentReference,
        crate::fetcher::ReferenceKind,
        crate::compose::CoverGeometry,

        crate::config::Config,
        crate::config::DownloadConfig,
        crate::config::CoverConfig,
        crate::config::SourceConfig,
        crate::config::RetentionConfig,
        crate::config::ApiConfig,

        crate::api::routes::PreviewRequest,
        crate::api::routes::DownloadRequest,
        crate::api::routes::SubmitResponse,
        crate::api::routes::RevealResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "tasks", description = "Preview a reference, submit downloads and poll their progress"),
        (name = "bundles", description = "Persisted output folders"),
        (name = "system", description = "Health check, OpenAPI document and event stream"),
    )
)]
pub struct ApiDoc;
