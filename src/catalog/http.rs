//! Remote plan service client.

use super::{CatalogError, PlanCatalog};
use crate::domain::{Plan, PlanId};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Plan catalog backed by `GET {base_url}/plans/{id}`.
#[derive(Debug, Clone)]
pub struct HttpPlanCatalog {
    client: Client,
    base_url: String,
    max_elapsed: Duration,
}

impl HttpPlanCatalog {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            max_elapsed: Duration::from_secs(10),
        }
    }

    /// Cap on total time spent retrying one lookup.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    fn plan_url(&self, id: &PlanId) -> String {
        format!("{}/plans/{}", self.base_url, id.as_str())
    }
}

#[async_trait]
impl PlanCatalog for HttpPlanCatalog {
    async fn fetch_plan(&self, id: &PlanId) -> Result<Option<Plan>, CatalogError> {
        let url = self.plan_url(id);
        debug!("Fetching plan {} from {}", id, url);

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                backoff::Error::transient(CatalogError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(backoff::Error::transient(CatalogError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(CatalogError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            let plan = response
                .json::<Plan>()
                .await
                .map_err(|e| backoff::Error::permanent(CatalogError::ParseError(e.to_string())))?;
            if &plan.id != id {
                return Err(backoff::Error::permanent(CatalogError::ParseError(format!(
                    "requested plan {} but service returned {}",
                    id, plan.id
                ))));
            }
            Ok(Some(plan))
        })
        .await
    }
}
