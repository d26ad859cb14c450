//! Balance-affecting components.
//!
//! Each component works on a `&mut SqliteConnection` borrowed from the
//! coordinator's unit of work, so a whole command commits or rolls back
//! as one.

pub mod balance;
pub mod commission;
pub mod investment;
pub mod ledger;
pub mod level;
pub mod locks;

pub use balance::{BalanceChange, BalanceStore};
pub use commission::CommissionEngine;
pub use investment::InvestmentActivator;
pub use ledger::{Posting, TransactionLedger};
pub use level::{LevelEngine, LevelOutcome};
pub use locks::UserLocks;
