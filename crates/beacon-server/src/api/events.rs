//! Consumer event feed.
//!
//! Classification changes and monitoring failures are buffered in a bounded
//! log; consumers poll it here.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use beacon_core::ConsumerEvent;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::state::SharedState;

/// Events returned when no limit is given.
pub const DEFAULT_EVENT_LIMIT: usize = 50;

/// Creates the events router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_events))
}

/// Query parameters for the events endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Maximum number of events to return, newest last.
    #[param(example = 20, minimum = 1)]
    pub limit: Option<usize>,

    /// Only return events for this region.
    #[param(example = "com.pubnub.test")]
    pub region_id: Option<String>,
}

/// Recent consumer events.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventsResponse {
    /// Events, oldest first.
    pub events: Vec<ConsumerEvent>,

    /// Events currently buffered.
    #[schema(example = 3)]
    pub buffered: usize,

    /// Events delivered since startup, including ones evicted from the buffer.
    #[schema(example = 12)]
    pub total_delivered: u64,
}

/// Get recent consumer events.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "proximity",
    operation_id = "getEvents",
    summary = "Get recent consumer events",
    description = "Returns the most recent published classifications and monitoring \
        failures, oldest first. Classifications are only emitted when a region's \
        confirmed tier changes.",
    params(EventsQuery),
    responses(
        (status = 200, description = "Events retrieved", body = EventsResponse)
    )
)]
pub async fn get_events(
    State(state): State<SharedState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let state_guard = state.read().await;
    let log = state_guard.engine.sink();
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT).max(1);

    let events = match query.region_id.as_deref() {
        Some(region_id) => {
            let mut matching: Vec<ConsumerEvent> = log
                .recent(usize::MAX)
                .into_iter()
                .filter(|event| event.region_id() == region_id)
                .cloned()
                .collect();
            let skip = matching.len().saturating_sub(limit);
            matching.drain(..skip);
            matching
        }
        None => log.recent(limit).into_iter().cloned().collect(),
    };

    Json(EventsResponse {
        events,
        buffered: log.len(),
        total_delivered: log.total_delivered(),
    })
}
