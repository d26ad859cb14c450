//! Deposit rows and their one-shot status claim.

use super::{decimal_col, enum_col};
use crate::domain::{Deposit, DepositStatus, PlanId, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

fn deposit_from_row(row: &SqliteRow) -> Result<Deposit, sqlx::Error> {
    let plan_id: Option<String> = row.try_get("plan_id")?;
    let decided_at: Option<i64> = row.try_get("decided_at")?;
    Ok(Deposit {
        id: row.try_get("id")?,
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        amount: decimal_col(row, "amount")?,
        status: enum_col(row, "status")?,
        plan_id: plan_id.map(PlanId::new),
        created_at: TimeMs::new(row.try_get("created_at")?),
        decided_at: decided_at.map(TimeMs::new),
    })
}

pub async fn insert_deposit(
    conn: &mut SqliteConnection,
    deposit: &Deposit,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO deposits (id, user_id, amount, status, plan_id, created_at, decided_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&deposit.id)
    .bind(deposit.user_id.as_str())
    .bind(deposit.amount.to_canonical_string())
    .bind(deposit.status.as_str())
    .bind(deposit.plan_id.as_ref().map(|p| p.as_str()))
    .bind(deposit.created_at.as_ms())
    .bind(deposit.decided_at.map(|t| t.as_ms()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_deposit(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Deposit>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, amount, status, plan_id, created_at, decided_at
        FROM deposits WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(deposit_from_row).transpose()
}

/// Move a pending deposit to `to`. Returns false if it was not pending.
///
/// This is the idempotency guard for decisions: only one caller can ever
/// win the pending → terminal transition.
pub async fn claim_deposit(
    conn: &mut SqliteConnection,
    id: &str,
    to: DepositStatus,
    decided_at: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE deposits SET status = ?, decided_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(to.as_str())
    .bind(decided_at.as_ms())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Move a deposit between two non-pending states, e.g. approved → approved_uninvested.
pub async fn transition_deposit(
    conn: &mut SqliteConnection,
    id: &str,
    from: DepositStatus,
    to: DepositStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE deposits SET status = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_deposits_for_user(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<Vec<Deposit>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, amount, status, plan_id, created_at, decided_at
        FROM deposits WHERE user_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(user_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(deposit_from_row).collect()
}
