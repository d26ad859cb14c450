//! Domain types for the balance and reward core.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Identifiers and time primitives
//! - Users, deposits, withdrawals, ledger rows, investments, commissions, tiers
//! - Outbound facts and reconciliation records

/// Declares a fieldless enum stored as a snake_case string column.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} value: {}",
                        stringify!($name),
                        other
                    )),
                }
            }
        }
    };
}

pub mod commission;
pub mod decimal;
pub mod deposit;
pub mod event;
pub mod investment;
pub mod level;
pub mod primitives;
pub mod reconciliation;
pub mod transaction;
pub mod user;
pub mod withdrawal;

pub use commission::{Commission, CommissionStatus, ReferralSettings, MAX_REFERRAL_DEPTH};
pub use decimal::Decimal;
pub use deposit::{Deposit, DepositDecision, DepositStatus};
pub use event::{LedgerEvent, StoredEvent};
pub use investment::{Investment, InvestmentStatus, Plan, MAX_PLAN_DURATION_DAYS};
pub use level::LevelTier;
pub use primitives::{new_record_id, PlanId, TimeMs, UserId};
pub use reconciliation::{ReconciliationItem, ReconciliationReport};
pub use transaction::{
    ReferenceType, Transaction, TransactionKind, TransactionStatus, GENESIS_HASH,
};
pub use user::User;
pub use withdrawal::{Withdrawal, WithdrawalDecision, WithdrawalStatus};
