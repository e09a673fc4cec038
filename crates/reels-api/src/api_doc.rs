//! OpenAPI documentation, served at `/api-docs/openapi.json` and browsable
//! under `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use crate::services;
use reels_core::models;

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Reels API",
        version = "0.1.0",
        description = "Short-video upload pipeline. Clients upload directly to object storage through a presigned URL, confirm the upload, and the video appears in the feed once its 720p rendition and cover are ready."
    ),
    paths(
        handlers::videos::upload_init,
        handlers::videos::upload_complete,
        handlers::videos::get_video,
        handlers::feed::feed,
        handlers::health::health_check,
        handlers::health::liveness_check,
    ),
    components(schemas(
        models::VideoResponse,
        models::VideoStatus,
        services::UploadInitRequest,
        services::UploadInitResponse,
        handlers::videos::UploadCompleteRequest,
        handlers::feed::FeedResponse,
        handlers::health::HealthCheckResponse,
        error::ErrorResponse,
        error::ErrorBody,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "videos", description = "Upload handshake and video lookup"),
        (name = "feed", description = "Public feed of ready videos"),
        (name = "health", description = "Health checks")
    )
)]
pub struct ApiDoc;
