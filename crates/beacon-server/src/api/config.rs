//! Configuration API endpoints.
//!
//! Reads and replaces the engine configuration file. Advertising defaults
//! apply to the next transmit request; changes to the ingest, classifier,
//! publisher or monitoring sections take effect on restart.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use beacon_core::Config;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the config router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_config).put(update_config))
        .route("/reload", post(reload_config))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Active configuration and where it is stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigResponse {
    /// Path of the configuration file.
    #[schema(example = "/etc/beacon/config.toml")]
    pub path: String,

    /// Active configuration.
    pub config: Config,
}

/// Response after replacing or reloading the configuration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateConfigResponse {
    /// Whether the update was successful.
    pub success: bool,

    /// Whether the engine must be restarted for the change to take effect.
    #[schema(example = false)]
    pub restart_required: bool,

    /// Configuration now active.
    pub config: Config,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get current configuration.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    operation_id = "getConfig",
    summary = "Get current configuration",
    description = "Returns the active configuration and the file it is persisted to.",
    responses(
        (status = 200, description = "Configuration retrieved", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let state_guard = state.read().await;

    Json(ConfigResponse {
        path: state_guard.config_path.display().to_string(),
        config: state_guard.config.clone(),
    })
}

/// Replace the configuration.
#[utoipa::path(
    put,
    path = "/api/config",
    tag = "config",
    operation_id = "updateConfig",
    summary = "Replace the configuration",
    description = "Validates the configuration, writes it to the configuration file and \
        makes it active. Omitted sections and fields take their default values.",
    request_body = Config,
    responses(
        (status = 200, description = "Configuration saved", body = UpdateConfigResponse),
        (status = 422, description = "Configuration is invalid", body = ErrorResponse),
        (status = 500, description = "Configuration could not be written", body = ErrorResponse)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(config): Json<Config>,
) -> ApiResult<Json<UpdateConfigResponse>> {
    let mut state_guard = state.write().await;
    let restart_required = state_guard.save_config(config)?;

    Ok(Json(UpdateConfigResponse {
        success: true,
        restart_required,
        config: state_guard.config.clone(),
    }))
}

/// Reload the configuration file.
#[utoipa::path(
    post,
    path = "/api/config/reload",
    tag = "config",
    operation_id = "reloadConfig",
    summary = "Reload the configuration file",
    description = "Re-reads the configuration file, applying `BEACON__*` environment \
        overrides, and makes it active.",
    responses(
        (status = 200, description = "Configuration reloaded", body = UpdateConfigResponse),
        (status = 404, description = "Configuration file does not exist", body = ErrorResponse),
        (status = 422, description = "Configuration file is malformed or invalid", body = ErrorResponse)
    )
)]
pub async fn reload_config(
    State(state): State<SharedState>,
) -> ApiResult<Json<UpdateConfigResponse>> {
    let mut state_guard = state.write().await;
    let restart_required = state_guard.reload_config()?;

    Ok(Json(UpdateConfigResponse {
        success: true,
        restart_required,
        config: state_guard.config.clone(),
    }))
}
