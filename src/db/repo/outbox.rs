//! Outbound events and the operator reconciliation queue.
//!
//! Events are written in the same transaction as the balance change they
//! describe, so they exist if and only if that change committed.

use crate::domain::{LedgerEvent, ReconciliationItem, StoredEvent, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

pub async fn insert_event(
    conn: &mut SqliteConnection,
    event: &LedgerEvent,
    created_at: TimeMs,
) -> Result<i64, sqlx::Error> {
    let payload = serde_json::to_string(event)
        .map_err(|e| sqlx::Error::Protocol(format!("event payload: {}", e)))?;

    let result = sqlx::query(
        "INSERT INTO events (kind, user_id, payload, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(event.kind())
    .bind(event.user_id().as_str())
    .bind(payload)
    .bind(created_at.as_ms())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Events with `seq > after_seq`, oldest first.
pub async fn fetch_events_after(
    conn: &mut SqliteConnection,
    after_seq: i64,
    limit: i64,
) -> Result<Vec<StoredEvent>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT seq, kind, user_id, payload, created_at
        FROM events WHERE seq > ?
        ORDER BY seq ASC LIMIT ?
        "#,
    )
    .bind(after_seq)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let payload: String = row.try_get("payload")?;
            let payload = serde_json::from_str(&payload)
                .map_err(|e| sqlx::Error::Decode(format!("column payload: {}", e).into()))?;
            Ok(StoredEvent {
                seq: row.try_get("seq")?,
                kind: row.try_get("kind")?,
                user_id: UserId::new(row.try_get::<String, _>("user_id")?),
                payload,
                created_at: TimeMs::new(row.try_get("created_at")?),
            })
        })
        .collect()
}

pub async fn enqueue_reconciliation(
    conn: &mut SqliteConnection,
    record_type: &str,
    record_id: &str,
    user_id: &UserId,
    reason: &str,
    created_at: TimeMs,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO reconciliation_queue (record_type, record_id, user_id, reason, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(record_type)
    .bind(record_id)
    .bind(user_id.as_str())
    .bind(reason)
    .bind(created_at.as_ms())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

fn item_from_row(row: &SqliteRow) -> Result<ReconciliationItem, sqlx::Error> {
    let resolved_at: Option<i64> = row.try_get("resolved_at")?;
    Ok(ReconciliationItem {
        id: row.try_get("id")?,
        record_type: row.try_get("record_type")?,
        record_id: row.try_get("record_id")?,
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        reason: row.try_get("reason")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
        resolved_at: resolved_at.map(TimeMs::new),
    })
}

/// Unresolved queue items, oldest first.
pub async fn fetch_open_reconciliation_items(
    conn: &mut SqliteConnection,
) -> Result<Vec<ReconciliationItem>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, record_type, record_id, user_id, reason, created_at, resolved_at
        FROM reconciliation_queue WHERE resolved_at IS NULL
        ORDER BY id ASC
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(item_from_row).collect()
}
