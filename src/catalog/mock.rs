//! In-memory plan catalog for tests.

use super::{CatalogError, PlanCatalog};
use crate::domain::{Plan, PlanId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Mock catalog that serves predefined plans, or fails every lookup.
#[derive(Debug, Clone, Default)]
pub struct MockPlanCatalog {
    plans: HashMap<PlanId, Plan>,
    failure: Option<CatalogError>,
}

impl MockPlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plans.insert(plan.id.clone(), plan);
        self
    }

    /// Make every lookup fail with `error`.
    pub fn failing(mut self, error: CatalogError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl PlanCatalog for MockPlanCatalog {
    async fn fetch_plan(&self, id: &PlanId) -> Result<Option<Plan>, CatalogError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self.plans.get(id).cloned())
    }
}
