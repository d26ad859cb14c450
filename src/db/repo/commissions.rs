//! Referral commission rows.

use super::{decimal_col, enum_col};
use crate::domain::{Commission, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

fn commission_from_row(row: &SqliteRow) -> Result<Commission, sqlx::Error> {
    Ok(Commission {
        id: row.try_get("id")?,
        referrer_id: UserId::new(row.try_get::<String, _>("referrer_id")?),
        referred_id: UserId::new(row.try_get::<String, _>("referred_id")?),
        level: row.try_get("level")?,
        amount: decimal_col(row, "amount")?,
        status: enum_col(row, "status")?,
        trigger_deposit_id: row.try_get("trigger_deposit_id")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
    })
}

pub async fn commission_exists(
    conn: &mut SqliteConnection,
    trigger_deposit_id: &str,
    referrer_id: &UserId,
    level: i64,
) -> Result<bool, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM commissions
        WHERE trigger_deposit_id = ? AND referrer_id = ? AND level = ?
        "#,
    )
    .bind(trigger_deposit_id)
    .bind(referrer_id.as_str())
    .bind(level)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.0 > 0)
}

/// Insert a commission. Returns false if one already exists for the same
/// (trigger deposit, referrer, level).
pub async fn insert_commission(
    conn: &mut SqliteConnection,
    commission: &Commission,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO commissions (
            id, referrer_id, referred_id, level, amount, status,
            trigger_deposit_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(trigger_deposit_id, referrer_id, level) DO NOTHING
        "#,
    )
    .bind(&commission.id)
    .bind(commission.referrer_id.as_str())
    .bind(commission.referred_id.as_str())
    .bind(commission.level)
    .bind(commission.amount.to_canonical_string())
    .bind(commission.status.as_str())
    .bind(&commission.trigger_deposit_id)
    .bind(commission.created_at.as_ms())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_commissions_for_deposit(
    conn: &mut SqliteConnection,
    trigger_deposit_id: &str,
) -> Result<Vec<Commission>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, referrer_id, referred_id, level, amount, status, trigger_deposit_id, created_at
        FROM commissions WHERE trigger_deposit_id = ?
        ORDER BY level ASC
        "#,
    )
    .bind(trigger_deposit_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(commission_from_row).collect()
}
