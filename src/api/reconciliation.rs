use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::db::repo::outbox;
use crate::domain::{ReconciliationItem, UserId};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResponse {
    pub user_id: String,
    pub available_balance: String,
    pub ledger_sum: String,
    pub entry_count: usize,
    pub chain_intact: bool,
    pub consistent: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationQueueResponse {
    pub items: Vec<ReconciliationItem>,
}

pub async fn get_user_reconciliation(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReconciliationResponse>, AppError> {
    let report = state.coordinator.reconcile_user(&UserId::new(id)).await?;
    Ok(Json(ReconciliationResponse {
        consistent: report.is_consistent(),
        user_id: report.user_id.0,
        available_balance: report.available_balance.to_canonical_string(),
        ledger_sum: report.ledger_sum.to_canonical_string(),
        entry_count: report.entry_count,
        chain_intact: report.chain_intact,
    }))
}

pub async fn get_reconciliation_queue(
    State(state): State<AppState>,
) -> Result<Json<ReconciliationQueueResponse>, AppError> {
    let mut conn = state.repo.acquire().await?;
    let items = outbox::fetch_open_reconciliation_items(&mut conn).await?;
    Ok(Json(ReconciliationQueueResponse { items }))
}
