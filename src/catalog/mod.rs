//! Plan catalog abstraction: where investment plan definitions come from.

use crate::domain::{Plan, PlanId};
use async_trait::async_trait;
use std::fmt;

pub mod db;
pub mod http;
pub mod mock;

pub use db::DbPlanCatalog;
pub use http::HttpPlanCatalog;
pub use mock::MockPlanCatalog;

/// Source of plan definitions.
///
/// Implementations must handle retry/backoff themselves. Callers resolve
/// plans before opening a unit of work, so a slow catalog never holds the
/// database write lock.
#[async_trait]
pub trait PlanCatalog: Send + Sync + fmt::Debug {
    /// Fetch a plan by id.
    ///
    /// # Returns
    /// `Ok(None)` if the catalog does not know the plan.
    async fn fetch_plan(&self, id: &PlanId) -> Result<Option<Plan>, CatalogError>;
}

/// Error type for plan catalog lookups.
#[derive(Debug, Clone)]
pub enum CatalogError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Invalid JSON or malformed plan
    ParseError(String),
    /// Local storage error
    Storage(String),
    /// Other error
    Other(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            CatalogError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            CatalogError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            CatalogError::Storage(msg) => write!(f, "Storage error: {}", msg),
            CatalogError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CatalogError {}
