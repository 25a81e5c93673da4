use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::registry::EventRecord;
use crate::server::{AppState, errors::ApiError, extract::ApiQuery};

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub from: Option<u64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
    /// Sequence to pass as `from` to continue reading.
    pub next: u64,
}

/// Pages through the revocation event log in commit order.
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let from = query.from.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let events = state.registry.events(from, limit).await?;
    let next = events.last().map_or(from, |e| e.sequence + 1);
    Ok(Json(EventsResponse { events, next }))
}
