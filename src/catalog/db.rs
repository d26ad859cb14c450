//! Plans read from the local `plans` table.

use super::{CatalogError, PlanCatalog};
use crate::db::repo::investments;
use crate::domain::{Plan, PlanId};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct DbPlanCatalog {
    pool: SqlitePool,
}

impl DbPlanCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanCatalog for DbPlanCatalog {
    async fn fetch_plan(&self, id: &PlanId) -> Result<Option<Plan>, CatalogError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))?;
        investments::fetch_plan(&mut conn, id)
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))
    }
}
