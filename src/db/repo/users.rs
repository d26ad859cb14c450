//! User rows: balances, totals, levels and referral links.

use super::decimal_col;
use crate::domain::{Decimal, TimeMs, User, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

const USER_COLUMNS: &str = "id, available_balance, total_deposits, total_withdrawals, \
     referred_by, level, version, created_at";

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    let referred_by: Option<String> = row.try_get("referred_by")?;
    Ok(User {
        id: UserId::new(row.try_get::<String, _>("id")?),
        available_balance: decimal_col(row, "available_balance")?,
        total_deposits: decimal_col(row, "total_deposits")?,
        total_withdrawals: decimal_col(row, "total_withdrawals")?,
        referred_by: referred_by.map(UserId::new),
        level: row.try_get("level")?,
        version: row.try_get("version")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
    })
}

/// Insert a user. Returns false if the id is already taken.
pub async fn insert_user(conn: &mut SqliteConnection, user: &User) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (
            id, available_balance, total_deposits, total_withdrawals,
            referred_by, level, version, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(user.id.as_str())
    .bind(user.available_balance.to_canonical_string())
    .bind(user.total_deposits.to_canonical_string())
    .bind(user.total_withdrawals.to_canonical_string())
    .bind(user.referred_by.as_ref().map(|r| r.as_str()))
    .bind(user.level)
    .bind(user.version)
    .bind(user.created_at.as_ms())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_user(
    conn: &mut SqliteConnection,
    id: &UserId,
) -> Result<Option<User>, sqlx::Error> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// No-op write on the user row.
///
/// SQLite has no `SELECT ... FOR UPDATE`; issuing a write first makes the
/// surrounding transaction take the database write lock before it reads
/// any balance. Returns false if the user does not exist.
pub async fn touch_user(conn: &mut SqliteConnection, id: &UserId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET version = version WHERE id = ?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Compare-and-set the balance. Returns false if `expected_version` is stale.
pub async fn update_balance(
    conn: &mut SqliteConnection,
    id: &UserId,
    new_balance: Decimal,
    expected_version: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET available_balance = ?, version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(new_balance.to_canonical_string())
    .bind(id.as_str())
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Overwrite the cumulative deposit/withdrawal totals.
pub async fn update_totals(
    conn: &mut SqliteConnection,
    id: &UserId,
    total_deposits: Decimal,
    total_withdrawals: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET total_deposits = ?, total_withdrawals = ? WHERE id = ?")
        .bind(total_deposits.to_canonical_string())
        .bind(total_withdrawals.to_canonical_string())
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Raise the stored level; never lowers it. Returns true if it changed.
pub async fn raise_level(
    conn: &mut SqliteConnection,
    id: &UserId,
    level: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET level = ? WHERE id = ? AND level < ?")
        .bind(level)
        .bind(id.as_str())
        .bind(level)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of users referred by `referrer` that have made a deposit.
///
/// Totals are stored canonically, so a user who never deposited (or whose
/// deposits were all reversed) holds exactly `'0'`.
pub async fn count_active_referrals(
    conn: &mut SqliteConnection,
    referrer: &UserId,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM users WHERE referred_by = ? AND total_deposits != '0'",
    )
    .bind(referrer.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}
