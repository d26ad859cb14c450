//! User account state owned by the balance store.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    /// Spendable balance; never negative.
    pub available_balance: Decimal,
    /// Sum of approved deposits, net of reversals.
    pub total_deposits: Decimal,
    /// Sum of completed withdrawals.
    pub total_withdrawals: Decimal,
    /// Weak reference: the referrer may not exist.
    pub referred_by: Option<UserId>,
    pub level: i64,
    /// Bumped on every balance write; used for compare-and-set updates.
    pub version: i64,
    pub created_at: TimeMs,
}

impl User {
    pub fn new(id: UserId, referred_by: Option<UserId>, created_at: TimeMs) -> Self {
        Self {
            id,
            available_balance: Decimal::zero(),
            total_deposits: Decimal::zero(),
            total_withdrawals: Decimal::zero(),
            referred_by,
            level: 0,
            version: 0,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_empty() {
        let user = User::new(UserId::new("u1"), None, TimeMs::new(1));
        assert!(user.available_balance.is_zero());
        assert_eq!(user.level, 0);
        assert!(user.total_deposits.is_zero());
    }
}
