use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::db::repo::outbox;
use crate::domain::StoredEvent;
use crate::error::AppError;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub after_seq: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    pub events: Vec<StoredEvent>,
    /// Pass as `afterSeq` to continue.
    pub next_seq: i64,
}

pub async fn get_events(
    Query(params): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Result<Json<EventsResponse>, AppError> {
    let after_seq = params.after_seq.unwrap_or(0);
    if after_seq < 0 {
        return Err(AppError::BadRequest("afterSeq must be >= 0".into()));
    }
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let mut conn = state.repo.acquire().await?;
    let events = outbox::fetch_events_after(&mut conn, after_seq, limit).await?;
    let next_seq = events.last().map(|e| e.seq).unwrap_or(after_seq);

    Ok(Json(EventsResponse { events, next_seq }))
}
