//! Ledger rows: the append-only audit trail behind every balance change.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// `prev_hash` of the first row in a user's chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

string_enum! {
    TransactionKind {
        Deposit => "deposit",
        DepositReversal => "deposit_reversal",
        Withdrawal => "withdrawal",
        WithdrawalRefund => "withdrawal_refund",
        Investment => "investment",
        Commission => "commission",
        LevelBonus => "level_bonus",
    }
}

string_enum! {
    /// Posting state of a row. All three have already moved the balance;
    /// `Pending` marks a withdrawal hold, `Reversed` a hold paired with a refund.
    TransactionStatus {
        Pending => "pending",
        Completed => "completed",
        Reversed => "reversed",
    }
}

string_enum! {
    ReferenceType {
        Deposit => "deposit",
        Withdrawal => "withdrawal",
        Investment => "investment",
        Commission => "commission",
        LevelTier => "level_tier",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: String,
    /// Global insertion order, assigned by the database.
    pub seq: i64,
    pub user_id: UserId,
    pub kind: TransactionKind,
    /// Positive for credits, negative for debits.
    pub signed_amount: Decimal,
    pub status: TransactionStatus,
    pub reference_type: ReferenceType,
    pub reference_id: String,
    pub balance_after: Decimal,
    pub prev_hash: String,
    pub entry_hash: String,
    pub created_at: TimeMs,
}

impl Transaction {
    /// Hash of this row chained onto `prev_hash`.
    ///
    /// Status and seq are excluded: status moves through its lifecycle after
    /// posting and seq is only known once the row is inserted.
    pub fn compute_hash(&self) -> String {
        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hash_var(&mut hasher, &self.prev_hash);
        hash_var(&mut hasher, &self.id);
        hash_var(&mut hasher, self.user_id.as_str());
        hash_var(&mut hasher, self.kind.as_str());
        hash_var(&mut hasher, &self.signed_amount.to_canonical_string());
        hash_var(&mut hasher, self.reference_type.as_str());
        hash_var(&mut hasher, &self.reference_id);
        hash_var(&mut hasher, &self.balance_after.to_canonical_string());
        hasher.update(self.created_at.as_ms().to_le_bytes());

        hex::encode(hasher.finalize())
    }

    /// True if the stored hash matches the row's contents.
    pub fn hash_is_valid(&self) -> bool {
        self.entry_hash == self.compute_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample() -> Transaction {
        let mut txn = Transaction {
            id: "t1".to_string(),
            seq: 0,
            user_id: UserId::new("u1"),
            kind: TransactionKind::Deposit,
            signed_amount: Decimal::from_str("1000").unwrap(),
            status: TransactionStatus::Completed,
            reference_type: ReferenceType::Deposit,
            reference_id: "d1".to_string(),
            balance_after: Decimal::from_str("1000").unwrap(),
            prev_hash: GENESIS_HASH.to_string(),
            entry_hash: String::new(),
            created_at: TimeMs::new(1000),
        };
        txn.entry_hash = txn.compute_hash();
        txn
    }

    #[test]
    fn test_hash_ignores_status_and_seq() {
        let mut txn = sample();
        txn.status = TransactionStatus::Reversed;
        txn.seq = 42;
        assert!(txn.hash_is_valid());
    }

    #[test]
    fn test_hash_detects_amount_tampering() {
        let mut txn = sample();
        txn.signed_amount = Decimal::from_str("100000").unwrap();
        assert!(!txn.hash_is_valid());
    }

    #[test]
    fn test_hash_is_scale_insensitive() {
        let a = sample();
        let mut b = sample();
        b.signed_amount = Decimal::from_str("1000.00").unwrap();
        b.entry_hash = b.compute_hash();
        assert_eq!(a.entry_hash, b.entry_hash);
    }

    #[test]
    fn test_hash_depends_on_previous() {
        let a = sample();
        let mut b = sample();
        b.prev_hash = a.entry_hash.clone();
        assert_ne!(b.compute_hash(), a.entry_hash);
        assert_eq!(a.entry_hash.len(), 64);
    }
}
