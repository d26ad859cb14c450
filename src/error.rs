use crate::domain::Decimal;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures of the balance and reward core.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Insufficient funds: available={available}, requested={requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already processed: {0}")]
    AlreadyProcessed(String),
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("Compensation failed: {0}")]
    CompensationFailed(String),
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::AlreadyProcessed(_) => "already_processed",
            LedgerError::DependencyUnavailable(_) => "dependency_unavailable",
            LedgerError::CompensationFailed(_) => "compensation_failed",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::Database(_) => "database_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::AlreadyProcessed(_) | LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::CompensationFailed(_) | LedgerError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Ledger(LedgerError::Database(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::Ledger(err) => {
                let status = err.status_code();
                if status.is_server_error() {
                    tracing::error!("{}", err);
                } else {
                    tracing::debug!("{}", err);
                }
                (status, err.code(), err.to_string())
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            LedgerError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LedgerError::AlreadyProcessed("d1".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            LedgerError::DependencyUnavailable("settings".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            LedgerError::InsufficientFunds {
                available: Decimal::from_i64(1),
                requested: Decimal::from_i64(2),
            }
            .code(),
            "insufficient_funds"
        );
    }

    #[test]
    fn test_ledger_error_response_status() {
        let resp = AppError::from(LedgerError::NotFound("deposit d1".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::from(LedgerError::CompensationFailed("d1".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
