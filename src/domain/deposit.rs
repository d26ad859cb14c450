//! Deposit requests and their administrative decisions.

use crate::domain::{new_record_id, Decimal, PlanId, TimeMs, UserId};
use serde::Serialize;

string_enum! {
    /// Lifecycle of a deposit. Everything except `Pending` is terminal.
    DepositStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        /// Credited, plan activation failed, credit reversed; needs an operator.
        ApprovedUninvested => "approved_uninvested",
        /// A compensation step failed; balance and ledger need manual review.
        NeedsReconciliation => "needs_reconciliation",
    }
}

impl DepositStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DepositStatus::Pending)
    }
}

string_enum! {
    DepositDecision {
        Approve => "approve",
        Reject => "reject",
    }
}

impl DepositDecision {
    /// Status a pending deposit moves to when this decision is claimed.
    pub fn target_status(&self) -> DepositStatus {
        match self {
            DepositDecision::Approve => DepositStatus::Approved,
            DepositDecision::Reject => DepositStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deposit {
    pub id: String,
    pub user_id: UserId,
    pub amount: Decimal,
    pub status: DepositStatus,
    /// Investment plan this deposit funds, if any.
    pub plan_id: Option<PlanId>,
    pub created_at: TimeMs,
    pub decided_at: Option<TimeMs>,
}

impl Deposit {
    pub fn new_pending(user_id: UserId, amount: Decimal, plan_id: Option<PlanId>) -> Self {
        Self {
            id: new_record_id(),
            user_id,
            amount,
            status: DepositStatus::Pending,
            plan_id,
            created_at: TimeMs::now(),
            decided_at: None,
        }
    }
}
