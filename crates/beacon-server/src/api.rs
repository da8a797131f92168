//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `health` - Service health checks
//! - `config` - Configuration read, replace and reload
//! - `regions` - Region monitoring lifecycle and classifications
//! - `samples` - Ranging sample ingestion
//! - `events` - Consumer event feed
//! - `advertising` - iBeacon advertising pass-through
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod advertising;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod openapi;
pub mod regions;
pub mod samples;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::{get_openapi_json, ApiDoc};

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /swagger-ui            - Swagger UI
/// /api
/// ├── /regions           - Region monitoring and classification
/// ├── /samples           - Ranging sample ingestion
/// ├── /events            - Consumer event feed
/// ├── /advertising       - iBeacon advertising
/// ├── /config            - Configuration
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/regions", regions::router())
                .nest("/samples", samples::router())
                .nest("/events", events::router())
                .nest("/advertising", advertising::router())
                .nest("/config", config::router()),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
