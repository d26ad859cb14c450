//! Ledger rows. Rows are never deleted and only `status` is ever updated.

use super::{decimal_col, enum_col};
use crate::domain::{
    ReferenceType, TimeMs, Transaction, TransactionKind, TransactionStatus, UserId,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

const TRANSACTION_COLUMNS: &str = "seq, id, user_id, kind, signed_amount, status, \
     reference_type, reference_id, balance_after, prev_hash, entry_hash, created_at";

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, sqlx::Error> {
    Ok(Transaction {
        id: row.try_get("id")?,
        seq: row.try_get("seq")?,
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        kind: enum_col(row, "kind")?,
        signed_amount: decimal_col(row, "signed_amount")?,
        status: enum_col(row, "status")?,
        reference_type: enum_col(row, "reference_type")?,
        reference_id: row.try_get("reference_id")?,
        balance_after: decimal_col(row, "balance_after")?,
        prev_hash: row.try_get("prev_hash")?,
        entry_hash: row.try_get("entry_hash")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
    })
}

/// Append a row and return its assigned sequence number.
pub async fn insert_transaction(
    conn: &mut SqliteConnection,
    txn: &Transaction,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO transactions (
            id, user_id, kind, signed_amount, status, reference_type,
            reference_id, balance_after, prev_hash, entry_hash, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&txn.id)
    .bind(txn.user_id.as_str())
    .bind(txn.kind.as_str())
    .bind(txn.signed_amount.to_canonical_string())
    .bind(txn.status.as_str())
    .bind(txn.reference_type.as_str())
    .bind(&txn.reference_id)
    .bind(txn.balance_after.to_canonical_string())
    .bind(&txn.prev_hash)
    .bind(&txn.entry_hash)
    .bind(txn.created_at.as_ms())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Most recent row of a user's chain.
pub async fn fetch_last_transaction(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<Option<Transaction>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE user_id = ? ORDER BY seq DESC LIMIT 1",
        TRANSACTION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(transaction_from_row).transpose()
}

/// A user's full chain in posting order.
pub async fn fetch_transactions_for_user(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE user_id = ? ORDER BY seq ASC",
        TRANSACTION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id.as_str())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(transaction_from_row).collect()
}

/// The row of `kind` posted for an originating record.
pub async fn fetch_by_reference(
    conn: &mut SqliteConnection,
    reference_type: ReferenceType,
    reference_id: &str,
    kind: TransactionKind,
) -> Result<Option<Transaction>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM transactions \
         WHERE reference_type = ? AND reference_id = ? AND kind = ? \
         ORDER BY seq ASC LIMIT 1",
        TRANSACTION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(reference_type.as_str())
        .bind(reference_id)
        .bind(kind.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(transaction_from_row).transpose()
}

/// Advance a row's status. Returns false if it was not in `from`.
pub async fn update_transaction_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: TransactionStatus,
    to: TransactionStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE transactions SET status = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
