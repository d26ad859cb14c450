use crate::db::repo::ledger;
use crate::domain::{
    new_record_id, Decimal, ReconciliationReport, ReferenceType, TimeMs, Transaction,
    TransactionKind, TransactionStatus, User, UserId, GENESIS_HASH,
};
use crate::error::LedgerError;
use sqlx::sqlite::SqliteConnection;
use tracing::warn;

/// What a ledger row records besides its amount.
#[derive(Debug, Clone, Copy)]
pub struct Posting<'a> {
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub reference_type: ReferenceType,
    pub reference_id: &'a str,
}

impl<'a> Posting<'a> {
    /// A settled row.
    pub fn completed(kind: TransactionKind, reference_type: ReferenceType, reference_id: &'a str) -> Self {
        Self {
            kind,
            status: TransactionStatus::Completed,
            reference_type,
            reference_id,
        }
    }

    /// A hold that a later decision settles or reverses.
    pub fn pending(kind: TransactionKind, reference_type: ReferenceType, reference_id: &'a str) -> Self {
        Self {
            status: TransactionStatus::Pending,
            ..Self::completed(kind, reference_type, reference_id)
        }
    }
}

/// Append-only transaction ledger with a per-user hash chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionLedger;

impl TransactionLedger {
    /// Append one row chained onto the user's previous row.
    ///
    /// Callers hold the database write lock, so the chain head cannot move
    /// between the read and the insert.
    pub async fn append(
        &self,
        conn: &mut SqliteConnection,
        user_id: &UserId,
        signed_amount: Decimal,
        balance_after: Decimal,
        posting: Posting<'_>,
    ) -> Result<Transaction, sqlx::Error> {
        let prev_hash = ledger::fetch_last_transaction(conn, user_id)
            .await?
            .map(|t| t.entry_hash)
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let mut txn = Transaction {
            id: new_record_id(),
            seq: 0,
            user_id: user_id.clone(),
            kind: posting.kind,
            signed_amount,
            status: posting.status,
            reference_type: posting.reference_type,
            reference_id: posting.reference_id.to_string(),
            balance_after,
            prev_hash,
            entry_hash: String::new(),
            created_at: TimeMs::now(),
        };
        txn.entry_hash = txn.compute_hash();
        txn.seq = ledger::insert_transaction(conn, &txn).await?;

        Ok(txn)
    }

    /// Move a row through its status lifecycle.
    ///
    /// # Errors
    /// `Conflict` if the row is not currently in `from`.
    pub async fn set_status(
        &self,
        conn: &mut SqliteConnection,
        txn: &Transaction,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<(), LedgerError> {
        if !ledger::update_transaction_status(conn, &txn.id, from, to).await? {
            return Err(LedgerError::Conflict(format!(
                "ledger row {} is not {}",
                txn.id, from
            )));
        }
        Ok(())
    }

    /// The row of `kind` posted for a deposit, withdrawal or other record.
    pub async fn find_for_reference(
        &self,
        conn: &mut SqliteConnection,
        reference_type: ReferenceType,
        reference_id: &str,
        kind: TransactionKind,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        ledger::fetch_by_reference(conn, reference_type, reference_id, kind).await
    }

    pub async fn history(
        &self,
        conn: &mut SqliteConnection,
        user_id: &UserId,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        ledger::fetch_transactions_for_user(conn, user_id).await
    }

    /// Compare the stored balance with the signed sum of the user's rows and
    /// verify the hash chain.
    ///
    /// Every posted row counts: pending holds and reversed holds both moved
    /// the balance when they were written, and a reversal is always paired
    /// with its own refund row.
    pub async fn reconcile(
        &self,
        conn: &mut SqliteConnection,
        user: &User,
    ) -> Result<ReconciliationReport, sqlx::Error> {
        let rows = self.history(conn, &user.id).await?;

        let mut chain_intact = true;
        let mut expected_prev = GENESIS_HASH;
        for row in &rows {
            if row.prev_hash != expected_prev || !row.hash_is_valid() {
                warn!(
                    "Ledger chain broken for user {} at row {} (seq {})",
                    user.id, row.id, row.seq
                );
                chain_intact = false;
                break;
            }
            expected_prev = row.entry_hash.as_str();
        }

        let ledger_sum: Decimal = rows.iter().map(|r| r.signed_amount).sum();

        Ok(ReconciliationReport {
            user_id: user.id.clone(),
            available_balance: user.available_balance,
            ledger_sum,
            entry_count: rows.len(),
            chain_intact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::db::repo::users;
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    async fn setup() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        (init_db(&db_path).await.expect("init_db failed"), temp_dir)
    }

    #[tokio::test]
    async fn test_append_chains_rows() {
        let (pool, _temp) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = User::new(UserId::new("u1"), None, TimeMs::new(1));
        users::insert_user(&mut conn, &user).await.unwrap();

        let ledger = TransactionLedger;
        let first = ledger
            .append(
                &mut conn,
                &user.id,
                Decimal::from_i64(100),
                Decimal::from_i64(100),
                Posting::completed(TransactionKind::Deposit, ReferenceType::Deposit, "d1"),
            )
            .await
            .unwrap();
        let second = ledger
            .append(
                &mut conn,
                &user.id,
                Decimal::from_i64(-40),
                Decimal::from_i64(60),
                Posting::pending(TransactionKind::Withdrawal, ReferenceType::Withdrawal, "w1"),
            )
            .await
            .unwrap();

        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(second.prev_hash, first.entry_hash);
        assert!(second.seq > first.seq);
        assert_eq!(second.status, TransactionStatus::Pending);

        let found = ledger
            .find_for_reference(&mut conn, ReferenceType::Withdrawal, "w1", TransactionKind::Withdrawal)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn test_reconcile_detects_tampering() {
        let (pool, _temp) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut user = User::new(UserId::new("u1"), None, TimeMs::new(1));
        users::insert_user(&mut conn, &user).await.unwrap();

        let ledger = TransactionLedger;
        let row = ledger
            .append(
                &mut conn,
                &user.id,
                Decimal::from_i64(100),
                Decimal::from_i64(100),
                Posting::completed(TransactionKind::Deposit, ReferenceType::Deposit, "d1"),
            )
            .await
            .unwrap();
        user.available_balance = Decimal::from_i64(100);

        let report = ledger.reconcile(&mut conn, &user).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.entry_count, 1);

        sqlx::query("UPDATE transactions SET signed_amount = '1000' WHERE id = ?")
            .bind(&row.id)
            .execute(&mut *conn)
            .await
            .unwrap();
        let report = ledger.reconcile(&mut conn, &user).await.unwrap();
        assert!(!report.chain_intact);
        assert!(!report.is_consistent());
    }

    #[tokio::test]
    async fn test_set_status_requires_expected_state() {
        let (pool, _temp) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = User::new(UserId::new("u1"), None, TimeMs::new(1));
        users::insert_user(&mut conn, &user).await.unwrap();

        let ledger = TransactionLedger;
        let hold = ledger
            .append(
                &mut conn,
                &user.id,
                Decimal::from_i64(-10),
                Decimal::from_i64(0),
                Posting::pending(TransactionKind::Withdrawal, ReferenceType::Withdrawal, "w1"),
            )
            .await
            .unwrap();

        ledger
            .set_status(&mut conn, &hold, TransactionStatus::Pending, TransactionStatus::Completed)
            .await
            .unwrap();
        let err = ledger
            .set_status(&mut conn, &hold, TransactionStatus::Pending, TransactionStatus::Reversed)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }
}
