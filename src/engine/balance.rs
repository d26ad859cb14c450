use crate::db::repo::{outbox, users};
use crate::domain::{Decimal, LedgerEvent, Transaction, UserId};
use crate::engine::ledger::{Posting, TransactionLedger};
use crate::error::LedgerError;
use sqlx::sqlite::SqliteConnection;
use tracing::debug;

/// Result of a single credit or debit.
#[derive(Debug, Clone)]
pub struct BalanceChange {
    pub transaction: Transaction,
    pub balance: Decimal,
}

/// Authoritative per-user balance.
///
/// Every credit or debit writes the balance and its ledger row on the same
/// connection, so they commit or roll back together.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceStore {
    ledger: TransactionLedger,
}

impl BalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn credit(
        &self,
        conn: &mut SqliteConnection,
        user_id: &UserId,
        amount: Decimal,
        posting: Posting<'_>,
    ) -> Result<BalanceChange, LedgerError> {
        require_positive(amount)?;
        self.apply(conn, user_id, amount, posting).await
    }

    /// Subtract `amount`; fails closed with `InsufficientFunds` and no effect
    /// if the balance would go negative.
    pub async fn debit(
        &self,
        conn: &mut SqliteConnection,
        user_id: &UserId,
        amount: Decimal,
        posting: Posting<'_>,
    ) -> Result<BalanceChange, LedgerError> {
        require_positive(amount)?;
        self.apply(conn, user_id, -amount, posting).await
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        user_id: &UserId,
        delta: Decimal,
        posting: Posting<'_>,
    ) -> Result<BalanceChange, LedgerError> {
        let user = users::fetch_user(conn, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", user_id)))?;

        let balance = user
            .available_balance
            .checked_add(delta)
            .ok_or_else(|| LedgerError::Validation(format!("amount {} overflows balance", delta)))?;
        if balance.is_negative() {
            return Err(LedgerError::InsufficientFunds {
                available: user.available_balance,
                requested: delta.abs(),
            });
        }

        if !users::update_balance(conn, user_id, balance, user.version).await? {
            return Err(LedgerError::Conflict(format!(
                "balance of user {} changed concurrently",
                user_id
            )));
        }

        let transaction = self
            .ledger
            .append(conn, user_id, delta, balance, posting)
            .await?;

        let event = LedgerEvent::BalanceChanged {
            user_id: user_id.clone(),
            transaction_id: transaction.id.clone(),
            delta,
            balance,
        };
        outbox::insert_event(conn, &event, transaction.created_at).await?;

        debug!(
            "Posted {} {} for user {} (balance {})",
            transaction.kind, delta, user_id, balance
        );

        Ok(BalanceChange {
            transaction,
            balance,
        })
    }
}

fn require_positive(amount: Decimal) -> Result<(), LedgerError> {
    if !amount.is_positive() {
        return Err(LedgerError::Validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{ReferenceType, TimeMs, TransactionKind, User};
    use sqlx::SqlitePool;
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn setup() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let mut conn = pool.acquire().await.unwrap();
        let user = User::new(UserId::new("u1"), None, TimeMs::new(1));
        users::insert_user(&mut conn, &user).await.unwrap();
        drop(conn);
        (pool, temp_dir)
    }

    fn deposit_posting(id: &str) -> Posting<'_> {
        Posting::completed(TransactionKind::Deposit, ReferenceType::Deposit, id)
    }

    #[tokio::test]
    async fn test_credit_then_debit() {
        let (pool, _temp) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let store = BalanceStore::new();
        let user = UserId::new("u1");

        let change = store
            .credit(&mut conn, &user, Decimal::from_str("1000").unwrap(), deposit_posting("d1"))
            .await
            .unwrap();
        assert_eq!(change.balance, Decimal::from_i64(1000));
        assert_eq!(change.transaction.balance_after, change.balance);

        let change = store
            .debit(
                &mut conn,
                &user,
                Decimal::from_str("300").unwrap(),
                Posting::pending(TransactionKind::Withdrawal, ReferenceType::Withdrawal, "w1"),
            )
            .await
            .unwrap();
        assert_eq!(change.balance, Decimal::from_i64(700));
        assert_eq!(change.transaction.signed_amount, Decimal::from_i64(-300));

        let stored = users::fetch_user(&mut conn, &user).await.unwrap().unwrap();
        assert_eq!(stored.available_balance, Decimal::from_i64(700));
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_overdraw_is_rejected_without_effect() {
        let (pool, _temp) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let store = BalanceStore::new();
        let user = UserId::new("u1");

        store
            .credit(&mut conn, &user, Decimal::from_i64(50), deposit_posting("d1"))
            .await
            .unwrap();
        let err = store
            .debit(
                &mut conn,
                &user,
                Decimal::from_i64(51),
                Posting::pending(TransactionKind::Withdrawal, ReferenceType::Withdrawal, "w1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        let stored = users::fetch_user(&mut conn, &user).await.unwrap().unwrap();
        assert_eq!(stored.available_balance, Decimal::from_i64(50));
        let rows = TransactionLedger.history(&mut conn, &user).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_and_unknown_user() {
        let (pool, _temp) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let store = BalanceStore::new();

        let err = store
            .credit(&mut conn, &UserId::new("u1"), Decimal::zero(), deposit_posting("d1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = store
            .credit(&mut conn, &UserId::new("ghost"), Decimal::from_i64(1), deposit_posting("d1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_every_change_records_an_event() {
        let (pool, _temp) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let store = BalanceStore::new();

        store
            .credit(&mut conn, &UserId::new("u1"), Decimal::from_i64(5), deposit_posting("d1"))
            .await
            .unwrap();
        let events = outbox::fetch_events_after(&mut conn, 0, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "balance_changed");
        assert_eq!(events[0].payload["balance"], "5");
    }
}
