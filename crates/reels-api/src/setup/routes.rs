//! Route configuration and setup

use crate::api_doc::{ApiDoc, OPENAPI_JSON_PATH};
use crate::auth::auth_middleware;
use crate::error::hide_error_details;
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use reels_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Request bodies are small JSON documents; the video itself goes straight
/// to object storage.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config);

    let http_concurrency_limit = config.http_concurrency_limit().max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let public_routes = Router::new()
        .route("/videos/{id}", get(handlers::videos::get_video))
        .route("/feed", get(handlers::feed::feed))
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness_check));

    let protected_routes = Router::new()
        .route("/videos/upload/init", post(handlers::videos::upload_init))
        .route(
            "/videos/upload/complete",
            post(handlers::videos::upload_complete),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let mut app = public_routes
        .merge(protected_routes)
        .with_state(state)
        .route(OPENAPI_JSON_PATH, get(|| async { Json(ApiDoc::openapi()) }))
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_JSON_PATH).path("/docs"));

    if config.is_production() {
        app = app.layer(axum::middleware::from_fn(hide_error_details));
    }

    let app = app
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}
