//! Operator queue items and per-user reconciliation reports.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::Serialize;

/// A record that a compensation could not settle cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationItem {
    pub id: i64,
    pub record_type: String,
    pub record_id: String,
    pub user_id: UserId,
    pub reason: String,
    pub created_at: TimeMs,
    pub resolved_at: Option<TimeMs>,
}

/// Balance versus ledger for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub user_id: UserId,
    pub available_balance: Decimal,
    pub ledger_sum: Decimal,
    pub entry_count: usize,
    /// Every row's hash is valid and chains onto its predecessor.
    pub chain_intact: bool,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.chain_intact && self.available_balance == self.ledger_sum
    }
}
