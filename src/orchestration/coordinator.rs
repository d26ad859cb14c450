use crate::catalog::PlanCatalog;
use crate::config::Config;
use crate::db::repo::{deposits, outbox, users, withdrawals};
use crate::db::Repository;
use crate::domain::{
    Commission, Decimal, Deposit, DepositDecision, DepositStatus, Investment, Plan, PlanId,
    ReconciliationReport, ReferenceType, TimeMs, TransactionKind, TransactionStatus, User, UserId,
    Withdrawal, WithdrawalDecision,
};
use crate::engine::{
    BalanceStore, CommissionEngine, InvestmentActivator, LevelEngine, LevelOutcome, Posting,
    TransactionLedger, UserLocks,
};
use crate::error::LedgerError;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a deposit decision.
#[derive(Debug, Clone)]
pub struct DepositOutcome {
    pub deposit: Deposit,
    /// Depositor's balance after the command.
    pub balance: Decimal,
    pub investment: Option<Investment>,
    pub commissions: Vec<Commission>,
    /// Why commissions were skipped, if they were.
    pub commission_error: Option<String>,
    /// Recalculations that granted at least one tier.
    pub level_ups: Vec<LevelOutcome>,
    /// Recalculations that failed and were skipped, as `user: reason`.
    pub level_errors: Vec<String>,
}

/// Result of a withdrawal request or decision.
#[derive(Debug, Clone)]
pub struct WithdrawalOutcome {
    pub withdrawal: Withdrawal,
    pub balance: Decimal,
}

/// Saga orchestrator for every balance-affecting command.
///
/// A command holds its user's lock for its whole duration and runs in one
/// database transaction whose first statement is a write. Conditional steps
/// (activation, commissions, level recalculation) run in savepoints so a
/// failing step is undone without touching the credit that preceded it.
#[derive(Debug)]
pub struct LedgerCoordinator {
    repo: Arc<Repository>,
    locks: UserLocks,
    balances: BalanceStore,
    ledger: TransactionLedger,
    commissions: CommissionEngine,
    levels: LevelEngine,
    activator: InvestmentActivator,
    min_withdrawal: Decimal,
}

impl LedgerCoordinator {
    pub fn new(repo: Arc<Repository>, catalog: Arc<dyn PlanCatalog>, config: &Config) -> Self {
        let balances = BalanceStore::new();
        Self {
            repo,
            locks: UserLocks::new(),
            balances,
            ledger: TransactionLedger,
            commissions: CommissionEngine::new(balances),
            levels: LevelEngine::new(balances),
            activator: InvestmentActivator::new(catalog, balances),
            min_withdrawal: config.min_withdrawal,
        }
    }

    /// Create a user, optionally linked to an existing referrer.
    pub async fn register_user(
        &self,
        id: Option<UserId>,
        referred_by: Option<UserId>,
    ) -> Result<User, LedgerError> {
        let id = id.unwrap_or_else(UserId::generate);
        if id.as_str().trim().is_empty() {
            return Err(LedgerError::Validation("user id must not be empty".to_string()));
        }
        if referred_by.as_ref() == Some(&id) {
            return Err(LedgerError::Validation(
                "a user cannot refer themselves".to_string(),
            ));
        }

        let _guard = self.locks.lock(&id).await;
        let mut tx = self.repo.begin().await?;

        if let Some(referrer) = &referred_by {
            if !users::touch_user(&mut tx, referrer).await? {
                return Err(LedgerError::NotFound(format!("referrer {}", referrer)));
            }
        }
        let user = User::new(id, referred_by, TimeMs::now());
        if !users::insert_user(&mut tx, &user).await? {
            return Err(LedgerError::AlreadyProcessed(format!(
                "user {} already exists",
                user.id
            )));
        }

        tx.commit().await?;
        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Record a pending deposit, optionally tagged for an investment plan.
    pub async fn request_deposit(
        &self,
        user_id: &UserId,
        amount: Decimal,
        plan_id: Option<PlanId>,
    ) -> Result<Deposit, LedgerError> {
        validate_amount(amount)?;
        if let Some(plan_id) = &plan_id {
            let plan = self.activator.resolve_plan(plan_id).await?;
            plan.check_principal(amount)
                .map_err(LedgerError::Validation)?;
        }

        let _guard = self.locks.lock(user_id).await;
        let mut tx = self.repo.begin().await?;

        if !users::touch_user(&mut tx, user_id).await? {
            return Err(LedgerError::NotFound(format!("user {}", user_id)));
        }
        let deposit = Deposit::new_pending(user_id.clone(), amount, plan_id);
        deposits::insert_deposit(&mut tx, &deposit).await?;

        tx.commit().await?;
        info!(
            "Deposit {} of {} requested by {} (plan {:?})",
            deposit.id, amount, user_id, deposit.plan_id
        );
        Ok(deposit)
    }

    /// Request funding of an investment plan: a plan-tagged pending deposit
    /// that becomes an investment when approved.
    pub async fn fund_investment(
        &self,
        user_id: &UserId,
        plan_id: PlanId,
        amount: Decimal,
    ) -> Result<Deposit, LedgerError> {
        self.request_deposit(user_id, amount, Some(plan_id)).await
    }

    /// Approve or reject a pending deposit.
    ///
    /// Approval credits the depositor. A plan-tagged deposit is then
    /// activated; if activation fails the credit is reversed and the deposit
    /// is left `approved_uninvested` for an operator. An untagged deposit pays
    /// referral commissions and recalculates the levels of every paid
    /// ancestor and of the depositor's direct referrer.
    ///
    /// # Errors
    /// `AlreadyProcessed` if the deposit was already decided.
    /// `CompensationFailed` if a failed activation could not be reversed; the
    /// deposit is committed as `needs_reconciliation` with a queue item.
    pub async fn decide_deposit(
        &self,
        deposit_id: &str,
        decision: DepositDecision,
    ) -> Result<DepositOutcome, LedgerError> {
        let snapshot = self.read_deposit(deposit_id).await?;
        if snapshot.status.is_terminal() {
            return Err(LedgerError::AlreadyProcessed(format!(
                "deposit {} is already {}",
                snapshot.id, snapshot.status
            )));
        }

        // Resolved before the write lock is taken.
        let plan = match (&snapshot.plan_id, decision) {
            (Some(plan_id), DepositDecision::Approve) => {
                Some(self.activator.resolve_plan(plan_id).await)
            }
            _ => None,
        };

        let _guard = self.locks.lock(&snapshot.user_id).await;
        let mut tx = self.repo.begin().await?;

        let decided_at = TimeMs::now();
        let status = decision.target_status();
        if !deposits::claim_deposit(&mut tx, deposit_id, status, decided_at).await? {
            return Err(match deposits::fetch_deposit(&mut tx, deposit_id).await? {
                Some(current) => LedgerError::AlreadyProcessed(format!(
                    "deposit {} is already {}",
                    current.id, current.status
                )),
                None => LedgerError::NotFound(format!("deposit {}", deposit_id)),
            });
        }

        let mut outcome = DepositOutcome {
            deposit: Deposit {
                status,
                decided_at: Some(decided_at),
                ..snapshot
            },
            balance: Decimal::zero(),
            investment: None,
            commissions: Vec::new(),
            commission_error: None,
            level_ups: Vec::new(),
            level_errors: Vec::new(),
        };

        let compensation_failure = match decision {
            DepositDecision::Approve => self.approve(&mut tx, &mut outcome, plan).await?,
            DepositDecision::Reject => None,
        };

        outcome.balance = current_balance(&mut tx, &outcome.deposit.user_id).await?;
        tx.commit().await?;

        compensation_outcome(compensation_failure)?;
        info!(
            "Deposit {} {} for {} (balance {})",
            outcome.deposit.id, outcome.deposit.status, outcome.deposit.user_id, outcome.balance
        );
        Ok(outcome)
    }

    /// Apply an approval. Returns `Some(reason)` when the deposit had to be
    /// left in `needs_reconciliation`.
    async fn approve(
        &self,
        conn: &mut SqliteConnection,
        outcome: &mut DepositOutcome,
        plan: Option<Result<Plan, LedgerError>>,
    ) -> Result<Option<String>, LedgerError> {
        let deposit = outcome.deposit.clone();
        let depositor = users::fetch_user(conn, &deposit.user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", deposit.user_id)))?;

        self.balances
            .credit(
                conn,
                &depositor.id,
                deposit.amount,
                Posting::completed(TransactionKind::Deposit, ReferenceType::Deposit, &deposit.id),
            )
            .await?;
        let total_deposits = checked_total(
            depositor.total_deposits.checked_add(deposit.amount),
            "total deposits",
            &depositor.id,
        )?;
        users::update_totals(conn, &depositor.id, total_deposits, depositor.total_withdrawals)
            .await?;

        match plan {
            Some(plan) => {
                let activation = match plan {
                    Ok(plan) => {
                        self.activator
                            .activate_from_deposit(conn, &deposit, &plan)
                            .await
                    }
                    Err(err) => Err(err),
                };
                match activation {
                    Ok(investment) => outcome.investment = Some(investment),
                    Err(cause) => return self.leave_uninvested(conn, outcome, cause).await,
                }
            }
            None => {
                let mut savepoint = conn.begin().await?;
                match self
                    .commissions
                    .process_deposit_commission(
                        &mut savepoint,
                        &deposit.user_id,
                        deposit.amount,
                        &deposit.id,
                    )
                    .await
                {
                    Ok(paid) => {
                        savepoint.commit().await?;
                        outcome.commissions = paid;
                    }
                    Err(LedgerError::DependencyUnavailable(reason)) => {
                        savepoint.rollback().await?;
                        warn!(
                            "Commissions skipped for deposit {}: {}",
                            deposit.id, reason
                        );
                        outcome.commission_error = Some(reason);
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        let mut to_recalculate: Vec<UserId> = outcome
            .commissions
            .iter()
            .map(|c| c.referrer_id.clone())
            .collect();
        if let Some(referrer) = depositor.referred_by {
            if !to_recalculate.contains(&referrer) {
                to_recalculate.push(referrer);
            }
        }
        for user_id in to_recalculate {
            let mut savepoint = conn.begin().await?;
            match self.levels.recalculate_level(&mut savepoint, &user_id).await {
                Ok(level) => {
                    savepoint.commit().await?;
                    if !level.granted.is_empty() {
                        outcome.level_ups.push(level);
                    }
                }
                Err(err) => {
                    savepoint.rollback().await?;
                    warn!("Level recalculation for {} skipped: {}", user_id, err);
                    outcome.level_errors.push(format!("{}: {}", user_id, err));
                }
            }
        }

        Ok(None)
    }

    /// Compensate a failed activation: reverse the credit and park the deposit.
    async fn leave_uninvested(
        &self,
        conn: &mut SqliteConnection,
        outcome: &mut DepositOutcome,
        cause: LedgerError,
    ) -> Result<Option<String>, LedgerError> {
        let deposit = outcome.deposit.clone();
        let reason = format!("plan activation failed: {}", cause);
        warn!("Deposit {}: {}; reversing credit", deposit.id, reason);

        let mut savepoint = conn.begin().await?;
        let reversal = match self.reverse_credit(&mut savepoint, &deposit).await {
            Ok(()) => savepoint.commit().await.map_err(LedgerError::from),
            Err(err) => {
                savepoint.rollback().await?;
                Err(err)
            }
        };

        match reversal {
            Ok(()) => {
                self.park_deposit(conn, outcome, DepositStatus::ApprovedUninvested, &reason)
                    .await?;
                Ok(None)
            }
            Err(err) => {
                let reason = format!("{}; reversal failed: {}", reason, err);
                error!("Deposit {} needs reconciliation: {}", deposit.id, reason);
                self.park_deposit(conn, outcome, DepositStatus::NeedsReconciliation, &reason)
                    .await?;
                Ok(Some(reason))
            }
        }
    }

    async fn reverse_credit(
        &self,
        conn: &mut SqliteConnection,
        deposit: &Deposit,
    ) -> Result<(), LedgerError> {
        let user = users::fetch_user(conn, &deposit.user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", deposit.user_id)))?;
        self.balances
            .debit(
                conn,
                &user.id,
                deposit.amount,
                Posting::completed(
                    TransactionKind::DepositReversal,
                    ReferenceType::Deposit,
                    &deposit.id,
                ),
            )
            .await?;
        let total_deposits = checked_total(
            user.total_deposits.checked_sub(deposit.amount),
            "total deposits",
            &user.id,
        )?;
        users::update_totals(conn, &user.id, total_deposits, user.total_withdrawals).await?;
        Ok(())
    }

    /// Move an approved deposit to an operator-attention status and queue it.
    async fn park_deposit(
        &self,
        conn: &mut SqliteConnection,
        outcome: &mut DepositOutcome,
        status: DepositStatus,
        reason: &str,
    ) -> Result<(), LedgerError> {
        let deposit = &mut outcome.deposit;
        if !deposits::transition_deposit(conn, &deposit.id, DepositStatus::Approved, status).await? {
            return Err(LedgerError::Conflict(format!(
                "deposit {} left approved state concurrently",
                deposit.id
            )));
        }
        deposit.status = status;
        outbox::enqueue_reconciliation(
            conn,
            "deposit",
            &deposit.id,
            &deposit.user_id,
            reason,
            TimeMs::now(),
        )
        .await?;
        Ok(())
    }

    /// Reserve funds for a payout: debit now, settle on decision.
    pub async fn request_withdrawal(
        &self,
        user_id: &UserId,
        amount: Decimal,
        payout_details: &str,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        validate_amount(amount)?;
        if amount < self.min_withdrawal {
            return Err(LedgerError::Validation(format!(
                "minimum withdrawal is {}",
                self.min_withdrawal
            )));
        }
        let payout_details = payout_details.trim();
        if payout_details.is_empty() {
            return Err(LedgerError::Validation(
                "payout details are required".to_string(),
            ));
        }

        let _guard = self.locks.lock(user_id).await;
        let mut tx = self.repo.begin().await?;

        if !users::touch_user(&mut tx, user_id).await? {
            return Err(LedgerError::NotFound(format!("user {}", user_id)));
        }
        let withdrawal = Withdrawal::new_pending(user_id.clone(), amount, payout_details.to_string());
        let change = self
            .balances
            .debit(
                &mut tx,
                user_id,
                amount,
                Posting::pending(
                    TransactionKind::Withdrawal,
                    ReferenceType::Withdrawal,
                    &withdrawal.id,
                ),
            )
            .await?;
        withdrawals::insert_withdrawal(&mut tx, &withdrawal).await?;

        tx.commit().await?;
        info!(
            "Withdrawal {} of {} requested by {} (balance {})",
            withdrawal.id, amount, user_id, change.balance
        );
        Ok(WithdrawalOutcome {
            withdrawal,
            balance: change.balance,
        })
    }

    /// Complete or fail a pending withdrawal.
    ///
    /// Completion settles the hold without moving money. Failure reverses the
    /// hold and refunds the amount with its own ledger row.
    pub async fn decide_withdrawal(
        &self,
        withdrawal_id: &str,
        decision: WithdrawalDecision,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        let snapshot = self.read_withdrawal(withdrawal_id).await?;
        if snapshot.status.is_terminal() {
            return Err(LedgerError::AlreadyProcessed(format!(
                "withdrawal {} is already {}",
                snapshot.id, snapshot.status
            )));
        }

        let _guard = self.locks.lock(&snapshot.user_id).await;
        let mut tx = self.repo.begin().await?;

        let decided_at = TimeMs::now();
        let status = decision.target_status();
        if !withdrawals::claim_withdrawal(&mut tx, withdrawal_id, status, decided_at).await? {
            return Err(match withdrawals::fetch_withdrawal(&mut tx, withdrawal_id).await? {
                Some(current) => LedgerError::AlreadyProcessed(format!(
                    "withdrawal {} is already {}",
                    current.id, current.status
                )),
                None => LedgerError::NotFound(format!("withdrawal {}", withdrawal_id)),
            });
        }
        let withdrawal = Withdrawal {
            status,
            decided_at: Some(decided_at),
            ..snapshot
        };

        let hold = self
            .ledger
            .find_for_reference(
                &mut tx,
                ReferenceType::Withdrawal,
                &withdrawal.id,
                TransactionKind::Withdrawal,
            )
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("ledger hold for withdrawal {}", withdrawal.id))
            })?;

        match decision {
            WithdrawalDecision::Complete => {
                self.ledger
                    .set_status(
                        &mut tx,
                        &hold,
                        TransactionStatus::Pending,
                        TransactionStatus::Completed,
                    )
                    .await?;
                let user = users::fetch_user(&mut tx, &withdrawal.user_id)
                    .await?
                    .ok_or_else(|| {
                        LedgerError::NotFound(format!("user {}", withdrawal.user_id))
                    })?;
                let total_withdrawals = checked_total(
                    user.total_withdrawals.checked_add(withdrawal.amount),
                    "total withdrawals",
                    &user.id,
                )?;
                users::update_totals(&mut tx, &user.id, user.total_deposits, total_withdrawals)
                    .await?;
            }
            WithdrawalDecision::Fail => {
                self.ledger
                    .set_status(
                        &mut tx,
                        &hold,
                        TransactionStatus::Pending,
                        TransactionStatus::Reversed,
                    )
                    .await?;
                self.balances
                    .credit(
                        &mut tx,
                        &withdrawal.user_id,
                        withdrawal.amount,
                        Posting::completed(
                            TransactionKind::WithdrawalRefund,
                            ReferenceType::Withdrawal,
                            &withdrawal.id,
                        ),
                    )
                    .await?;
            }
        }

        let balance = current_balance(&mut tx, &withdrawal.user_id).await?;
        tx.commit().await?;
        info!(
            "Withdrawal {} {} for {} (balance {})",
            withdrawal.id, withdrawal.status, withdrawal.user_id, balance
        );
        Ok(WithdrawalOutcome {
            withdrawal,
            balance,
        })
    }

    /// Operator-driven level recalculation.
    pub async fn recalculate_level(&self, user_id: &UserId) -> Result<LevelOutcome, LedgerError> {
        let _guard = self.locks.lock(user_id).await;
        let mut tx = self.repo.begin().await?;

        if !users::touch_user(&mut tx, user_id).await? {
            return Err(LedgerError::NotFound(format!("user {}", user_id)));
        }
        let outcome = self.levels.recalculate_level(&mut tx, user_id).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    /// Compare a user's balance with their ledger.
    pub async fn reconcile_user(&self, user_id: &UserId) -> Result<ReconciliationReport, LedgerError> {
        // Read-only transaction for a consistent snapshot.
        let mut tx = self.repo.begin().await?;
        let user = users::fetch_user(&mut tx, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", user_id)))?;
        let report = self.ledger.reconcile(&mut tx, &user).await?;
        tx.commit().await?;

        if !report.is_consistent() {
            warn!(
                "User {} does not reconcile: balance {} ledger {} chain intact {}",
                user_id, report.available_balance, report.ledger_sum, report.chain_intact
            );
        }
        Ok(report)
    }

    async fn read_deposit(&self, deposit_id: &str) -> Result<Deposit, LedgerError> {
        let mut conn = self.repo.acquire().await?;
        deposits::fetch_deposit(&mut conn, deposit_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("deposit {}", deposit_id)))
    }

    async fn read_withdrawal(&self, withdrawal_id: &str) -> Result<Withdrawal, LedgerError> {
        let mut conn = self.repo.acquire().await?;
        withdrawals::fetch_withdrawal(&mut conn, withdrawal_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("withdrawal {}", withdrawal_id)))
    }
}

async fn current_balance(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<Decimal, LedgerError> {
    users::fetch_user(conn, user_id)
        .await?
        .map(|u| u.available_balance)
        .ok_or_else(|| LedgerError::NotFound(format!("user {}", user_id)))
}

/// Positive, at most two decimal places, within the per-request ceiling.
fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    amount.check_money_amount().map_err(LedgerError::Validation)
}

fn checked_total(
    total: Option<Decimal>,
    what: &str,
    user_id: &UserId,
) -> Result<Decimal, LedgerError> {
    total.ok_or_else(|| LedgerError::Validation(format!("{} of user {} overflow", what, user_id)))
}

/// A compensation that could not be applied surfaces after the commit that
/// parked the record.
fn compensation_outcome(failure: Option<String>) -> Result<(), LedgerError> {
    match failure {
        Some(reason) => Err(LedgerError::CompensationFailed(reason)),
        None => Ok(()),
    }
}
