use crate::db::repo::{levels, outbox, users};
use crate::domain::level::{highest_tier_met, tiers_to_grant};
use crate::domain::{LedgerEvent, LevelTier, ReferenceType, TimeMs, TransactionKind, UserId};
use crate::engine::balance::BalanceStore;
use crate::engine::ledger::Posting;
use crate::error::LedgerError;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use tracing::info;

/// Outcome of one level recalculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelOutcome {
    pub user_id: UserId,
    pub active_referrals: i64,
    pub previous_level: i64,
    pub level: i64,
    /// Tiers whose bonus this call granted, ascending.
    pub granted: Vec<LevelTier>,
}

/// Referral tiers and their one-time bonuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelEngine {
    balances: BalanceStore,
}

impl LevelEngine {
    pub fn new(balances: BalanceStore) -> Self {
        Self { balances }
    }

    /// Recompute `user_id`'s tier from its active (deposited) referrals.
    ///
    /// Each newly crossed tier is granted separately, lowest first. A tier's
    /// bonus is paid at most once per user however often this runs, and the
    /// stored level is never lowered.
    pub async fn recalculate_level(
        &self,
        conn: &mut SqliteConnection,
        user_id: &UserId,
    ) -> Result<LevelOutcome, LedgerError> {
        let user = users::fetch_user(conn, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", user_id)))?;

        let active_referrals = users::count_active_referrals(conn, &user.id).await?;
        let tiers = levels::fetch_level_tiers(conn).await?;

        let mut granted = Vec::new();
        for tier in tiers_to_grant(&tiers, active_referrals, user.level) {
            let now = TimeMs::now();
            if !levels::insert_level_bonus(conn, &user.id, tier.level, tier.bonus_amount, now).await? {
                continue;
            }

            if tier.bonus_amount.is_positive() {
                let reference_id = tier.level.to_string();
                self.balances
                    .credit(
                        conn,
                        &user.id,
                        tier.bonus_amount,
                        Posting::completed(
                            TransactionKind::LevelBonus,
                            ReferenceType::LevelTier,
                            &reference_id,
                        ),
                    )
                    .await?;
            }

            let event = LedgerEvent::LevelUp {
                user_id: user.id.clone(),
                level: tier.level,
                bonus: tier.bonus_amount,
            };
            outbox::insert_event(conn, &event, now).await?;

            info!(
                "User {} reached level {} ({}) with {} active referrals, bonus {}",
                user.id, tier.level, tier.name, active_referrals, tier.bonus_amount
            );
            granted.push(tier.clone());
        }

        let level = highest_tier_met(&tiers, active_referrals)
            .map(|t| t.level)
            .unwrap_or(user.level)
            .max(user.level);
        if level > user.level {
            users::raise_level(conn, &user.id, level).await?;
        }

        Ok(LevelOutcome {
            user_id: user.id,
            active_referrals,
            previous_level: user.level,
            level,
            granted,
        })
    }
}
