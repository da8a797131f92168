//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers
//! with automatic conversion to appropriate HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use beacon_core::{AdvertiseError, BeaconError, ConfigError, IngestError, RegionError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to a specific HTTP status code and produces a
/// consistent JSON error response.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 404 Not Found - Resource does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 409 Conflict - Operation cannot be completed due to current state.
    Conflict {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Region the conflict concerns, if any.
        region_id: Option<String>,
    },

    /// 422 Unprocessable Entity - Well-formed input that makes no sense.
    UnprocessableEntity {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Region the input concerns, if any.
        region_id: Option<String>,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details (not exposed to client in production).
        details: Option<String>,
    },
}

impl ApiError {
    /// Region not tracked by the engine.
    pub fn region_not_found(region_id: &str) -> Self {
        Self::NotFound {
            error_code: "region_not_found".to_string(),
            message: format!("Region '{region_id}' is not monitored"),
        }
    }

    /// HTTP status this error answers with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "STALE_SAMPLE",
    "message": "Sample for region 'com.pubnub.test' observed before the last accepted sample",
    "details": { "region_id": "com.pubnub.test" }
}))]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "UNKNOWN_REGION").
    #[schema(example = "UNKNOWN_REGION")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "Region 'com.pubnub.test' is not ranging")]
    pub message: String,

    /// Optional additional details for debugging.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

fn region_details(region_id: Option<String>) -> Option<serde_json::Value> {
    region_id.map(|id| serde_json::json!({ "region_id": id }))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = match self {
            Self::BadRequest { error_code, message } | Self::NotFound { error_code, message } => {
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                }
            }

            Self::Conflict {
                error_code,
                message,
                region_id,
            }
            | Self::UnprocessableEntity {
                error_code,
                message,
                region_id,
            } => ErrorResponse {
                error: error_code,
                message,
                details: region_details(region_id),
            },

            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );

                ErrorResponse {
                    error: error_code,
                    message,
                    details: details.map(|d| serde_json::json!(d)),
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::UnprocessableEntity { message, .. } => {
                write!(f, "Unprocessable Entity: {message}")
            }
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from beacon_core errors.
impl From<BeaconError> for ApiError {
    fn from(err: BeaconError) -> Self {
        let error_code = err.error_code().to_string();
        let message = err.to_string();
        if err.is_config_error() {
            tracing::warn!(error_code = %error_code, message = %message, "Configuration rejected");
        }

        match err.http_status_code() {
            400 => Self::BadRequest {
                error_code,
                message,
            },
            404 => Self::NotFound {
                error_code,
                message,
            },
            409 => Self::Conflict {
                error_code,
                message,
                region_id: None,
            },
            422 => Self::UnprocessableEntity {
                error_code,
                message,
                region_id: None,
            },
            _ => Self::InternalError {
                error_code,
                message,
                details: None,
            },
        }
    }
}

/// Sample rejections keep the region in the response details.
impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let region_id = Some(err.region_id().to_string());
        let message = err.to_string();
        match Self::from(BeaconError::from(err)) {
            Self::Conflict { error_code, .. } => Self::Conflict {
                error_code,
                message,
                region_id,
            },
            Self::UnprocessableEntity { error_code, .. } => Self::UnprocessableEntity {
                error_code,
                message,
                region_id,
            },
            other => other,
        }
    }
}

impl From<RegionError> for ApiError {
    fn from(err: RegionError) -> Self {
        Self::from(BeaconError::from(err))
    }
}

impl From<AdvertiseError> for ApiError {
    fn from(err: AdvertiseError) -> Self {
        Self::from(BeaconError::from(err))
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::from(BeaconError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_bad_request_error() {
        let err = ApiError::BadRequest {
            error_code: "test_error".to_string(),
            message: "Test message".to_string(),
        };
        assert!(err.to_string().contains("Bad Request"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "test_error".to_string(),
            message: "Test message".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test_error"));
    }

    #[test]
    fn test_unknown_region_is_conflict_with_region_details() {
        let err = ApiError::from(IngestError::UnknownRegion {
            region_id: "lobby".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        match err {
            ApiError::Conflict {
                error_code,
                region_id,
                ..
            } => {
                assert_eq!(error_code, "UNKNOWN_REGION");
                assert_eq!(region_id.as_deref(), Some("lobby"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_stale_sample_is_conflict() {
        let now = Utc::now();
        let err = ApiError::from(IngestError::StaleSample {
            region_id: "lobby".to_string(),
            observed_at: now,
            last_accepted_at: now,
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_rssi_is_unprocessable() {
        let err = ApiError::from(IngestError::InvalidRssi {
            region_id: "lobby".to_string(),
            rssi: 0,
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_region_error_is_bad_request() {
        let err = ApiError::from(RegionError::EmptyIdentifier);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_advertise_error_is_conflict() {
        let err = ApiError::from(AdvertiseError::IncompleteIdentity {
            identifier: "lobby".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_config_validation_is_unprocessable() {
        let err = ApiError::from(ConfigError::ValidationError {
            field: "classifier.window_capacity".to_string(),
            message: "must be at least 1".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("classifier.window_capacity"));
    }

    #[test]
    fn test_missing_config_is_not_found() {
        let err = ApiError::from(ConfigError::NotFound("/etc/beacon/config.toml".to_string()));
        match err {
            ApiError::NotFound { error_code, .. } => assert_eq!(error_code, "CONFIG_NOT_FOUND"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_config_write_failure_is_internal() {
        let err = ApiError::from(ConfigError::WriteError {
            path: "/etc/beacon".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(
            err,
            ApiError::InternalError { ref error_code, .. } if error_code == "PERSISTENCE_ERROR"
        ));
    }
}
