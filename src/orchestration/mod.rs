//! Command orchestration.

pub mod coordinator;

pub use coordinator::{DepositOutcome, LedgerCoordinator, WithdrawalOutcome};
