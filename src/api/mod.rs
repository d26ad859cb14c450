pub mod deposits;
pub mod events;
pub mod health;
pub mod investments;
pub mod reconciliation;
pub mod users;
pub mod withdrawals;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::Decimal;
use crate::error::AppError;
use crate::orchestration::LedgerCoordinator;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub coordinator: Arc<LedgerCoordinator>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, coordinator: Arc<LedgerCoordinator>) -> Self {
        Self {
            repo,
            config,
            coordinator,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/users", post(users::create_user))
        .route("/v1/users/:id", get(users::get_user))
        .route("/v1/users/:id/level", post(users::recalculate_level))
        .route("/v1/users/:id/transactions", get(users::get_transactions))
        .route(
            "/v1/users/:id/reconciliation",
            get(reconciliation::get_user_reconciliation),
        )
        .route("/v1/deposits", post(deposits::create_deposit))
        .route("/v1/deposits/:id", get(deposits::get_deposit))
        .route("/v1/deposits/:id/decision", post(deposits::decide_deposit))
        .route("/v1/withdrawals", post(withdrawals::create_withdrawal))
        .route("/v1/withdrawals/:id", get(withdrawals::get_withdrawal))
        .route(
            "/v1/withdrawals/:id/decision",
            post(withdrawals::decide_withdrawal),
        )
        .route("/v1/investments", post(investments::fund_investment))
        .route("/v1/events", get(events::get_events))
        .route(
            "/v1/reconciliation-queue",
            get(reconciliation::get_reconciliation_queue),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Parse a request amount such as `"1000.50"`.
pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str_canonical(raw)
        .map_err(|_| AppError::BadRequest(format!("Invalid amount: {}", raw)))
}
