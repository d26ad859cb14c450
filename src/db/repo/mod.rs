//! Repository layer for database operations.
//!
//! Query functions take a `&mut SqliteConnection` so the coordinator can run
//! several of them inside one transaction (or savepoint). Read-only API paths
//! borrow a pooled connection through [`Repository::acquire`].
//!
//! Functions are organized across submodules by table:
//! - `users.rs` - balances, totals, levels, referral links
//! - `deposits.rs` / `withdrawals.rs` - request records and their status claims
//! - `ledger.rs` - append-only transaction rows
//! - `investments.rs` - plans and activated investments
//! - `commissions.rs` - referral commissions
//! - `levels.rs` - tier configuration and bonus grants
//! - `settings.rs` - referral program settings
//! - `outbox.rs` - outbound events and the reconciliation queue

pub mod commissions;
pub mod deposits;
pub mod investments;
pub mod ledger;
pub mod levels;
pub mod outbox;
pub mod settings;
pub mod users;
pub mod withdrawals;

use crate::domain::Decimal;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

/// Owner of the connection pool.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a unit of work.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Borrow a connection for reads outside a unit of work.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
        self.pool.acquire().await
    }
}

fn decode_error(column: &str, reason: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(format!("column {}: {}", column, reason).into())
}

pub(crate) fn decimal_col(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| decode_error(column, e))
}

pub(crate) fn opt_decimal_col(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| Decimal::from_str(&s).map_err(|e| decode_error(column, e)))
        .transpose()
}

pub(crate) fn enum_col<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    T::from_str(&raw).map_err(|e| decode_error(column, e))
}
