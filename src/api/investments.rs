use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::deposits::DepositDto;
use crate::api::{parse_amount, AppState};
use crate::domain::{PlanId, UserId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundInvestmentRequest {
    pub user_id: String,
    pub plan_id: String,
    pub amount: String,
}

/// Creates the plan-tagged deposit; the investment opens when it is approved.
pub async fn fund_investment(
    State(state): State<AppState>,
    Json(body): Json<FundInvestmentRequest>,
) -> Result<(StatusCode, Json<DepositDto>), AppError> {
    let amount = parse_amount(&body.amount)?;
    if body.plan_id.trim().is_empty() {
        return Err(AppError::BadRequest("planId is required".into()));
    }

    let deposit = state
        .coordinator
        .fund_investment(&UserId::new(body.user_id), PlanId::new(body.plan_id), amount)
        .await?;
    Ok((StatusCode::CREATED, Json(deposit.into())))
}
