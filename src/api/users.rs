use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::db::repo::{investments, ledger, users};
use crate::domain::{InvestmentStatus, Transaction, User, UserId};
use crate::engine::LevelOutcome;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub id: Option<String>,
    pub referred_by: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub available_balance: String,
    pub total_deposits: String,
    pub total_withdrawals: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
    pub level: i64,
    pub created_at: i64,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id.0,
            available_balance: u.available_balance.to_canonical_string(),
            total_deposits: u.total_deposits.to_canonical_string(),
            total_withdrawals: u.total_withdrawals.to_canonical_string(),
            referred_by: u.referred_by.map(|r| r.0),
            level: u.level,
            created_at: u.created_at.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: UserDto,
    pub active_investments: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: String,
    pub seq: i64,
    pub kind: String,
    pub amount: String,
    pub status: String,
    pub reference_type: String,
    pub reference_id: String,
    pub balance_after: String,
    pub entry_hash: String,
    pub created_at: i64,
}

impl From<Transaction> for TransactionDto {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            seq: t.seq,
            kind: t.kind.to_string(),
            amount: t.signed_amount.to_canonical_string(),
            status: t.status.to_string(),
            reference_type: t.reference_type.to_string(),
            reference_id: t.reference_id,
            balance_after: t.balance_after.to_canonical_string(),
            entry_hash: t.entry_hash,
            created_at: t.created_at.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub user_id: String,
    pub transactions: Vec<TransactionDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelResponse {
    pub user_id: String,
    pub active_referrals: i64,
    pub previous_level: i64,
    pub level: i64,
    pub granted: Vec<GrantedTierDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantedTierDto {
    pub level: i64,
    pub name: String,
    pub bonus: String,
    pub benefits: Vec<String>,
}

impl From<LevelOutcome> for LevelResponse {
    fn from(o: LevelOutcome) -> Self {
        Self {
            user_id: o.user_id.0,
            active_referrals: o.active_referrals,
            previous_level: o.previous_level,
            level: o.level,
            granted: o
                .granted
                .into_iter()
                .map(|t| GrantedTierDto {
                    level: t.level,
                    name: t.name,
                    bonus: t.bonus_amount.to_canonical_string(),
                    benefits: t.benefits,
                })
                .collect(),
        }
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    let user = state
        .coordinator
        .register_user(body.id.map(UserId::new), body.referred_by.map(UserId::new))
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn get_user(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = UserId::new(id);
    let mut conn = state.repo.acquire().await?;
    let user = users::fetch_user(&mut conn, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
    let active_investments = investments::fetch_investments_for_user(&mut conn, &user_id)
        .await?
        .iter()
        .filter(|i| i.status == InvestmentStatus::Active)
        .count();

    Ok(Json(UserResponse {
        user: user.into(),
        active_investments,
    }))
}

pub async fn get_transactions(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let user_id = UserId::new(id);
    let mut conn = state.repo.acquire().await?;
    if users::fetch_user(&mut conn, &user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("user {}", user_id)));
    }
    let transactions = ledger::fetch_transactions_for_user(&mut conn, &user_id)
        .await?
        .into_iter()
        .map(TransactionDto::from)
        .collect();

    Ok(Json(TransactionsResponse {
        user_id: user_id.0,
        transactions,
    }))
}

pub async fn recalculate_level(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LevelResponse>, AppError> {
    let outcome = state
        .coordinator
        .recalculate_level(&UserId::new(id))
        .await?;
    Ok(Json(outcome.into()))
}
