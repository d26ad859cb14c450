use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::{parse_amount, AppState};
use crate::db::repo::deposits;
use crate::domain::{Commission, Deposit, DepositDecision, Investment, PlanId, UserId};
use crate::error::AppError;
use crate::orchestration::DepositOutcome;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepositRequest {
    pub user_id: String,
    pub amount: String,
    pub plan_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositDto {
    pub id: String,
    pub user_id: String,
    pub amount: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<i64>,
}

impl From<Deposit> for DepositDto {
    fn from(d: Deposit) -> Self {
        Self {
            id: d.id,
            user_id: d.user_id.0,
            amount: d.amount.to_canonical_string(),
            status: d.status.to_string(),
            plan_id: d.plan_id.map(|p| p.0),
            created_at: d.created_at.as_ms(),
            decided_at: d.decided_at.map(|t| t.as_ms()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentDto {
    pub id: String,
    pub plan_id: String,
    pub principal: String,
    pub status: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl From<Investment> for InvestmentDto {
    fn from(i: Investment) -> Self {
        Self {
            id: i.id,
            plan_id: i.plan_id.0,
            principal: i.principal.to_canonical_string(),
            status: i.status.to_string(),
            start_ms: i.start_ms.as_ms(),
            end_ms: i.end_ms.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionDto {
    pub referrer_id: String,
    pub level: i64,
    pub amount: String,
}

impl From<Commission> for CommissionDto {
    fn from(c: Commission) -> Self {
        Self {
            referrer_id: c.referrer_id.0,
            level: c.level,
            amount: c.amount.to_canonical_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositDecisionResponse {
    pub deposit: DepositDto,
    pub balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investment: Option<InvestmentDto>,
    pub commissions: Vec<CommissionDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission_error: Option<String>,
    /// Users who reached a new level as a result of this deposit.
    pub level_ups: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub level_errors: Vec<String>,
}

impl From<DepositOutcome> for DepositDecisionResponse {
    fn from(o: DepositOutcome) -> Self {
        Self {
            deposit: o.deposit.into(),
            balance: o.balance.to_canonical_string(),
            investment: o.investment.map(InvestmentDto::from),
            commissions: o.commissions.into_iter().map(CommissionDto::from).collect(),
            commission_error: o.commission_error,
            level_ups: o.level_ups.into_iter().map(|l| l.user_id.0).collect(),
            level_errors: o.level_errors,
        }
    }
}

pub async fn create_deposit(
    State(state): State<AppState>,
    Json(body): Json<CreateDepositRequest>,
) -> Result<(StatusCode, Json<DepositDto>), AppError> {
    let amount = parse_amount(&body.amount)?;
    let plan_id = body
        .plan_id
        .filter(|p| !p.trim().is_empty())
        .map(PlanId::new);

    let deposit = state
        .coordinator
        .request_deposit(&UserId::new(body.user_id), amount, plan_id)
        .await?;
    Ok((StatusCode::CREATED, Json(deposit.into())))
}

pub async fn get_deposit(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DepositDto>, AppError> {
    let mut conn = state.repo.acquire().await?;
    let deposit = deposits::fetch_deposit(&mut conn, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("deposit {}", id)))?;
    Ok(Json(deposit.into()))
}

pub async fn decide_deposit(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<DepositDecisionResponse>, AppError> {
    let decision = DepositDecision::from_str(&body.decision).map_err(|_| {
        AppError::BadRequest("decision must be \"approve\" or \"reject\"".into())
    })?;

    let outcome = state.coordinator.decide_deposit(&id, decision).await?;
    Ok(Json(outcome.into()))
}
