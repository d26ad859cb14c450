pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use catalog::{CatalogError, DbPlanCatalog, HttpPlanCatalog, MockPlanCatalog, PlanCatalog};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Decimal, PlanId, TimeMs, UserId};
pub use error::{AppError, LedgerError};
pub use orchestration::{DepositOutcome, LedgerCoordinator, WithdrawalOutcome};
