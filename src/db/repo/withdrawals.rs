//! Withdrawal rows and their one-shot status claim.

use super::{decimal_col, enum_col};
use crate::domain::{TimeMs, UserId, Withdrawal, WithdrawalStatus};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

fn withdrawal_from_row(row: &SqliteRow) -> Result<Withdrawal, sqlx::Error> {
    let decided_at: Option<i64> = row.try_get("decided_at")?;
    Ok(Withdrawal {
        id: row.try_get("id")?,
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        amount: decimal_col(row, "amount")?,
        status: enum_col(row, "status")?,
        payout_details: row.try_get("payout_details")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
        decided_at: decided_at.map(TimeMs::new),
    })
}

pub async fn insert_withdrawal(
    conn: &mut SqliteConnection,
    withdrawal: &Withdrawal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO withdrawals (id, user_id, amount, status, payout_details, created_at, decided_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&withdrawal.id)
    .bind(withdrawal.user_id.as_str())
    .bind(withdrawal.amount.to_canonical_string())
    .bind(withdrawal.status.as_str())
    .bind(&withdrawal.payout_details)
    .bind(withdrawal.created_at.as_ms())
    .bind(withdrawal.decided_at.map(|t| t.as_ms()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_withdrawal(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Withdrawal>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, amount, status, payout_details, created_at, decided_at
        FROM withdrawals WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(withdrawal_from_row).transpose()
}

/// Move a pending withdrawal to `to`. Returns false if it was not pending.
pub async fn claim_withdrawal(
    conn: &mut SqliteConnection,
    id: &str,
    to: WithdrawalStatus,
    decided_at: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE withdrawals SET status = ?, decided_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(to.as_str())
    .bind(decided_at.as_ms())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}
