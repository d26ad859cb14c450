use crate::catalog::PlanCatalog;
use crate::db::repo::investments;
use crate::domain::{
    new_record_id, Deposit, Investment, InvestmentStatus, Plan, PlanId, ReferenceType, TimeMs,
    TransactionKind,
};
use crate::engine::balance::BalanceStore;
use crate::engine::ledger::Posting;
use crate::error::LedgerError;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use std::sync::Arc;
use tracing::{info, warn};

/// Turns an approved plan-tagged deposit into an active investment.
#[derive(Debug, Clone)]
pub struct InvestmentActivator {
    catalog: Arc<dyn PlanCatalog>,
    balances: BalanceStore,
}

impl InvestmentActivator {
    pub fn new(catalog: Arc<dyn PlanCatalog>, balances: BalanceStore) -> Self {
        Self { catalog, balances }
    }

    /// Look up a plan in the catalog.
    ///
    /// Called before a unit of work opens; catalog failures surface as
    /// `DependencyUnavailable`, unknown plans as `NotFound`.
    pub async fn resolve_plan(&self, plan_id: &PlanId) -> Result<Plan, LedgerError> {
        match self.catalog.fetch_plan(plan_id).await {
            Ok(Some(plan)) => Ok(plan),
            Ok(None) => Err(LedgerError::NotFound(format!("plan {}", plan_id))),
            Err(e) => Err(LedgerError::DependencyUnavailable(format!(
                "plan catalog: {}",
                e
            ))),
        }
    }

    /// Debit the deposit's principal and open the investment.
    ///
    /// Runs inside its own savepoint: on any error the debit and the
    /// investment row are rolled back before the error is returned.
    pub async fn activate_from_deposit(
        &self,
        conn: &mut SqliteConnection,
        deposit: &Deposit,
        plan: &Plan,
    ) -> Result<Investment, LedgerError> {
        let mut savepoint = conn.begin().await?;
        match self.activate(&mut savepoint, deposit, plan).await {
            Ok(investment) => {
                savepoint.commit().await?;
                info!(
                    "Activated investment {} in plan {} for user {} (principal {})",
                    investment.id, plan.id, deposit.user_id, deposit.amount
                );
                Ok(investment)
            }
            Err(err) => {
                warn!("Activation of deposit {} failed: {}", deposit.id, err);
                savepoint.rollback().await.map_err(|rb| {
                    LedgerError::CompensationFailed(format!(
                        "rolling back activation of deposit {}: {}",
                        deposit.id, rb
                    ))
                })?;
                Err(err)
            }
        }
    }

    async fn activate(
        &self,
        conn: &mut SqliteConnection,
        deposit: &Deposit,
        plan: &Plan,
    ) -> Result<Investment, LedgerError> {
        plan.check_principal(deposit.amount)
            .map_err(LedgerError::Validation)?;

        let start = TimeMs::now();
        let end = start.plus_days(plan.duration_days).ok_or_else(|| {
            LedgerError::Validation(format!(
                "plan {} duration of {} days is out of range",
                plan.id, plan.duration_days
            ))
        })?;
        let investment = Investment {
            id: new_record_id(),
            user_id: deposit.user_id.clone(),
            plan_id: plan.id.clone(),
            deposit_id: deposit.id.clone(),
            principal: deposit.amount,
            status: InvestmentStatus::Active,
            start_ms: start,
            end_ms: end,
        };

        self.balances
            .debit(
                conn,
                &deposit.user_id,
                deposit.amount,
                Posting::completed(
                    TransactionKind::Investment,
                    ReferenceType::Investment,
                    &investment.id,
                ),
            )
            .await?;
        investments::insert_investment(conn, &investment).await?;

        Ok(investment)
    }
}
