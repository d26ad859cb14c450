//! Withdrawal requests. Funds are reserved when the request is made.

use crate::domain::{new_record_id, Decimal, TimeMs, UserId};
use serde::Serialize;

string_enum! {
    WithdrawalStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
    }
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

string_enum! {
    WithdrawalDecision {
        Complete => "complete",
        Fail => "fail",
    }
}

impl WithdrawalDecision {
    pub fn target_status(&self) -> WithdrawalStatus {
        match self {
            WithdrawalDecision::Complete => WithdrawalStatus::Completed,
            WithdrawalDecision::Fail => WithdrawalStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Withdrawal {
    pub id: String,
    pub user_id: UserId,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    /// Free-form payout instructions (bank account, wallet address).
    pub payout_details: String,
    pub created_at: TimeMs,
    pub decided_at: Option<TimeMs>,
}

impl Withdrawal {
    pub fn new_pending(user_id: UserId, amount: Decimal, payout_details: String) -> Self {
        Self {
            id: new_record_id(),
            user_id,
            amount,
            status: WithdrawalStatus::Pending,
            payout_details,
            created_at: TimeMs::now(),
            decided_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_targets() {
        assert_eq!(
            WithdrawalDecision::Complete.target_status(),
            WithdrawalStatus::Completed
        );
        assert_eq!(WithdrawalDecision::Fail.target_status(), WithdrawalStatus::Failed);
        assert!(WithdrawalStatus::Failed.is_terminal());
        assert!(!WithdrawalStatus::Pending.is_terminal());
    }
}
