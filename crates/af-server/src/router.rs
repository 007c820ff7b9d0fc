//! Axum router construction.
//!
//! Builds the application router with its routes and middleware layers.

use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Extra body allowance on top of the upload limit for multipart framing.
const MULTIPART_SLACK_BYTES: u64 = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::convert::convert_upload,
        routes::health::health,
        routes::health::tools,
    ),
    components(schemas(
        routes::convert::ConvertForm,
        routes::health::HealthResponse,
        af_av::ToolInfo,
    ))
)]
pub struct ApiDoc;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    let body_limit = ctx
        .config
        .server
        .max_upload_bytes
        .saturating_add(MULTIPART_SLACK_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/convert", post(routes::convert::convert_upload))
        .route("/health", get(routes::health::health))
        .route("/api/tools", get(routes::health::tools))
        .route("/api/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
