//! REST API server module
//!
//! Exposes the task engine over HTTP: preview, submission, polling,
//! bundle browsing and a server-sent event stream.

use crate::{Config, Result, TaskTracker};
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Path Swagger UI loads its document from
const SWAGGER_SPEC_PATH: &str = "/api-docs/openapi.json";

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Tasks
/// - `POST /preview` - Resolve a reference and fetch preview metadata
/// - `POST /downloads` - Create a task and start it (202 with the task id)
/// - `GET /tasks/:id` - Poll a task
///
/// ## Bundles
/// - `GET /bundles` - List persisted bundles
/// - `POST /bundles/:name/open` - Open a bundle in the file manager
/// - `DELETE /bundles/:name` - Delete a bundle
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /events` - Server-sent events stream
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
pub fn create_router(tracker: Arc<TaskTracker>, config: Arc<Config>) -> Router {
    let state = AppState::new(tracker, config.clone());

    let router = Router::new()
        // Tasks
        .route("/preview", post(routes::preview))
        .route("/downloads", post(routes::submit_download))
        .route("/tasks/:id", get(routes::get_task))
        // Bundles
        .route("/bundles", get(routes::list_bundles))
        .route("/bundles/:name/open", post(routes::open_bundle))
        .route("/bundles/:name", delete(routes::delete_bundle))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // SwaggerUi serves its own copy of the document, so it needs a path of its own
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url(SWAGGER_SPEC_PATH, ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin; otherwise only the listed
/// origins that parse as header values are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server stops. The tracker's shutdown does not stop the
/// server; embedders abort the returned future or drop the runtime.
///
/// # Example
///
/// ```no_run
/// use repost_dl::{Config, TaskTracker};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let tracker = Arc::new(TaskTracker::new((*config).clone()).await?);
///
/// repost_dl::api::start_api_server(tracker, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(tracker: Arc<TaskTracker>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(tracker, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(bind_address),
        "API server listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
