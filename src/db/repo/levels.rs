//! Tier configuration and the per-user bonus grant guard.

use super::decimal_col;
use crate::domain::{Decimal, LevelTier, TimeMs, UserId};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

/// All configured tiers, ascending by level.
pub async fn fetch_level_tiers(conn: &mut SqliteConnection) -> Result<Vec<LevelTier>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT level, name, referrals_required, bonus_amount, benefits
        FROM level_tiers ORDER BY level ASC
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let benefits: String = row.try_get("benefits")?;
            let benefits: Vec<String> = serde_json::from_str(&benefits).map_err(|e| {
                sqlx::Error::Decode(format!("column benefits: {}", e).into())
            })?;
            Ok(LevelTier {
                level: row.try_get("level")?,
                name: row.try_get("name")?,
                referrals_required: row.try_get("referrals_required")?,
                bonus_amount: decimal_col(row, "bonus_amount")?,
                benefits,
            })
        })
        .collect()
}

/// Record that `user_id` received the bonus for `level`.
///
/// Returns false if the grant already exists, which makes the bonus
/// at-most-once per tier per user.
pub async fn insert_level_bonus(
    conn: &mut SqliteConnection,
    user_id: &UserId,
    level: i64,
    amount: Decimal,
    granted_at: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO level_bonuses (user_id, level, amount, granted_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id, level) DO NOTHING
        "#,
    )
    .bind(user_id.as_str())
    .bind(level)
    .bind(amount.to_canonical_string())
    .bind(granted_at.as_ms())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Levels whose bonus `user_id` has already received, ascending.
pub async fn fetch_granted_levels(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT level FROM level_bonuses WHERE user_id = ? ORDER BY level ASC")
            .bind(user_id.as_str())
            .fetch_all(&mut *conn)
            .await?;

    Ok(rows.into_iter().map(|(level,)| level).collect())
}
