use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::deposits::DecisionRequest;
use crate::api::{parse_amount, AppState};
use crate::db::repo::withdrawals;
use crate::domain::{UserId, Withdrawal, WithdrawalDecision};
use crate::error::AppError;
use crate::orchestration::WithdrawalOutcome;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalRequest {
    pub user_id: String,
    pub amount: String,
    #[serde(default)]
    pub payout_details: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDto {
    pub id: String,
    pub user_id: String,
    pub amount: String,
    pub status: String,
    pub payout_details: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<i64>,
}

impl From<Withdrawal> for WithdrawalDto {
    fn from(w: Withdrawal) -> Self {
        Self {
            id: w.id,
            user_id: w.user_id.0,
            amount: w.amount.to_canonical_string(),
            status: w.status.to_string(),
            payout_details: w.payout_details,
            created_at: w.created_at.as_ms(),
            decided_at: w.decided_at.map(|t| t.as_ms()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    pub withdrawal: WithdrawalDto,
    pub balance: String,
}

impl From<WithdrawalOutcome> for WithdrawalResponse {
    fn from(o: WithdrawalOutcome) -> Self {
        Self {
            withdrawal: o.withdrawal.into(),
            balance: o.balance.to_canonical_string(),
        }
    }
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    Json(body): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalResponse>), AppError> {
    let amount = parse_amount(&body.amount)?;
    let outcome = state
        .coordinator
        .request_withdrawal(&UserId::new(body.user_id), amount, &body.payout_details)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

pub async fn get_withdrawal(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WithdrawalDto>, AppError> {
    let mut conn = state.repo.acquire().await?;
    let withdrawal = withdrawals::fetch_withdrawal(&mut conn, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("withdrawal {}", id)))?;
    Ok(Json(withdrawal.into()))
}

pub async fn decide_withdrawal(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let decision = WithdrawalDecision::from_str(&body.decision).map_err(|_| {
        AppError::BadRequest("decision must be \"complete\" or \"fail\"".into())
    })?;

    let outcome = state.coordinator.decide_withdrawal(&id, decision).await?;
    Ok(Json(outcome.into()))
}
