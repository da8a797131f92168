//! OpenAPI specification generation for the beacon API.
//!
//! The document is served at `/api/openapi.json`, rendered by Swagger UI at
//! `/swagger-ui`, and written to disk by the `gen-openapi` binary for client
//! generation.

use axum::Json;
use beacon_core::{
    AdvertisingConfig, BeaconIdentity, ClassificationEvent, ClassifierConfig, Config,
    ConsumerEvent, ErrorKind, IngestConfig, MonitoringConfig, PowerState,
    ProximityClassification, ProximityTier, PublisherConfig, RegionTrackingState,
};
use utoipa::OpenApi;

use super::advertising::{AdvertisingResponse, RadioStateRequest, TransmitRequest};
use super::config::{ConfigResponse, UpdateConfigResponse};
use super::error::ErrorResponse;
use super::events::EventsResponse;
use super::health::HealthResponse;
use super::regions::{
    ClassificationResponse, MonitoringFailureRequest, RangingAction, RegionResponse,
    RegionsResponse, StartMonitoringRequest, TransitionResponse,
};
use super::samples::{SampleRequest, SampleResponse};

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for beacon.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "beacon API",
        version = "0.1.0",
        description = r#"
# beacon API

beacon correlates iBeacon ranging samples into stable proximity classifications.

## Overview

A sensor bridge reports what the platform location stack sees:

1. **Regions**: start/stop monitoring, region entries and exits, monitoring failures
2. **Samples**: raw RSSI readings while a region is ranging
3. **Proximity**: smoothed classification per region (`immediate`, `near`, `far`, `unknown`)
4. **Events**: the de-duplicated feed delivered to consumers
5. **Advertising**: turn this host into an iBeacon
6. **Config**: read, replace or reload the configuration file

## Lifecycle

`unmonitored -> entered -> ranging <-> exited`, and back to `unmonitored` on stop or failure.
Samples are only accepted while a region is `ranging`.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local beacon server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "regions", description = "Region monitoring lifecycle"),
        (name = "proximity", description = "Ranging samples, classifications and the consumer event feed"),
        (name = "advertising", description = "iBeacon advertising pass-through"),
        (name = "config", description = "Configuration management")
    ),
    paths(
        // Health endpoints
        super::health::health_check,
        // Region endpoints
        super::regions::list_regions,
        super::regions::start_monitoring,
        super::regions::get_region,
        super::regions::stop_monitoring,
        super::regions::region_entered,
        super::regions::region_exited,
        super::regions::monitoring_failed,
        // Proximity endpoints
        super::regions::get_classification,
        super::samples::ingest_sample,
        super::events::get_events,
        // Advertising endpoints
        super::advertising::get_advertising,
        super::advertising::transmit,
        super::advertising::set_radio_state,
        super::advertising::stop_advertising,
        // Config endpoints
        super::config::get_config,
        super::config::update_config,
        super::config::reload_config,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            // Health types
            HealthResponse,
            // Region types
            RegionResponse,
            RegionsResponse,
            StartMonitoringRequest,
            TransitionResponse,
            RangingAction,
            MonitoringFailureRequest,
            ClassificationResponse,
            // Proximity types
            SampleRequest,
            SampleResponse,
            EventsResponse,
            // Advertising types
            AdvertisingResponse,
            TransmitRequest,
            RadioStateRequest,
            // Config types
            ConfigResponse,
            UpdateConfigResponse,
            Config,
            IngestConfig,
            ClassifierConfig,
            PublisherConfig,
            AdvertisingConfig,
            MonitoringConfig,
            // Domain types
            BeaconIdentity,
            ProximityTier,
            ProximityClassification,
            RegionTrackingState,
            ClassificationEvent,
            ConsumerEvent,
            ErrorKind,
            PowerState,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "beacon API");
        assert!(spec.paths.paths.contains_key("/api/samples"));
        assert!(spec.paths.paths.contains_key("/api/regions/{id}/classification"));
        assert!(spec.paths.paths.contains_key("/api/config/reload"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"beacon API\""));
        assert!(json.contains("ingestSample"));
    }
}
