//! Referral program settings (single row).

use crate::domain::ReferralSettings;
use sqlx::sqlite::SqliteConnection;

/// Raw stored settings: `(enabled, percentages)`.
pub async fn fetch_referral_settings_raw(
    conn: &mut SqliteConnection,
) -> Result<Option<(i64, String)>, sqlx::Error> {
    sqlx::query_as("SELECT enabled, percentages FROM referral_settings WHERE id = 1")
        .fetch_optional(&mut *conn)
        .await
}

/// Write settings only if none exist yet. Returns true if they were written.
pub async fn seed_referral_settings(
    conn: &mut SqliteConnection,
    settings: &ReferralSettings,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO referral_settings (id, enabled, percentages) VALUES (1, ?, ?) \
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(settings.enabled as i64)
    .bind(settings.percentages_to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace the settings (operator tooling and tests).
pub async fn store_referral_settings(
    conn: &mut SqliteConnection,
    settings: &ReferralSettings,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO referral_settings (id, enabled, percentages) VALUES (1, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET enabled = excluded.enabled, percentages = excluded.percentages",
    )
    .bind(settings.enabled as i64)
    .bind(settings.percentages_to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
