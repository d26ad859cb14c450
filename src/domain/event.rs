//! Outbound facts recorded for the notification and live-update subsystems.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    BalanceChanged {
        user_id: UserId,
        transaction_id: String,
        delta: Decimal,
        balance: Decimal,
    },
    CommissionEarned {
        user_id: UserId,
        referred_id: UserId,
        level: i64,
        amount: Decimal,
        trigger_deposit_id: String,
    },
    LevelUp {
        user_id: UserId,
        level: i64,
        bonus: Decimal,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::BalanceChanged { .. } => "balance_changed",
            LedgerEvent::CommissionEarned { .. } => "commission_earned",
            LedgerEvent::LevelUp { .. } => "level_up",
        }
    }

    /// User the fact is about (and who would be notified).
    pub fn user_id(&self) -> &UserId {
        match self {
            LedgerEvent::BalanceChanged { user_id, .. }
            | LedgerEvent::CommissionEarned { user_id, .. }
            | LedgerEvent::LevelUp { user_id, .. } => user_id,
        }
    }
}

/// An event as read back from the outbox.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub seq: i64,
    pub kind: String,
    pub user_id: UserId,
    pub payload: serde_json::Value,
    pub created_at: TimeMs,
}
