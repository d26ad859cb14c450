//! SQLite persistence for balances, ledger rows and reward records.
//!
//! - `migrations`: pool setup, pragmas, idempotent schema with seeded tiers and plans
//! - `repo`: per-table queries over a borrowed connection

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
