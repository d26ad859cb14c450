use crate::db::repo::{commissions, outbox, settings, users};
use crate::domain::{
    new_record_id, Commission, CommissionStatus, Decimal, LedgerEvent, ReferenceType,
    ReferralSettings, TimeMs, TransactionKind, UserId, MAX_REFERRAL_DEPTH,
};
use crate::engine::balance::BalanceStore;
use crate::engine::ledger::Posting;
use crate::error::LedgerError;
use sqlx::sqlite::SqliteConnection;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Pays referral commissions up the referrer chain of a depositor.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommissionEngine {
    balances: BalanceStore,
}

impl CommissionEngine {
    pub fn new(balances: BalanceStore) -> Self {
        Self { balances }
    }

    /// Current referral program settings.
    ///
    /// # Errors
    /// `DependencyUnavailable` if the settings row is missing, unreadable or
    /// malformed.
    pub async fn load_settings(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<ReferralSettings, LedgerError> {
        let (enabled, raw) = settings::fetch_referral_settings_raw(conn)
            .await
            .map_err(|e| {
                LedgerError::DependencyUnavailable(format!("referral settings unreadable: {}", e))
            })?
            .ok_or_else(|| {
                LedgerError::DependencyUnavailable("referral settings not configured".to_string())
            })?;

        let percentages = ReferralSettings::parse_percentages(&raw).map_err(|e| {
            LedgerError::DependencyUnavailable(format!("referral settings malformed: {}", e))
        })?;

        Ok(ReferralSettings {
            enabled: enabled != 0,
            percentages,
        })
    }

    /// Credit each ancestor of `depositor` its share of `amount`.
    ///
    /// Walks `referred_by` up to [`MAX_REFERRAL_DEPTH`] hops. The walk ends
    /// at the top of the chain, at a referrer that no longer exists, or at
    /// the first repeated user. A commission already recorded for
    /// (trigger deposit, ancestor, hop) is skipped, so a retried walk pays
    /// nothing twice. Returns the commissions paid by this call.
    pub async fn process_deposit_commission(
        &self,
        conn: &mut SqliteConnection,
        depositor_id: &UserId,
        amount: Decimal,
        trigger_deposit_id: &str,
    ) -> Result<Vec<Commission>, LedgerError> {
        let settings = self.load_settings(conn).await?;
        if !settings.enabled {
            debug!("Referral program disabled; no commission for deposit {}", trigger_deposit_id);
            return Ok(Vec::new());
        }

        let depositor = users::fetch_user(conn, depositor_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {}", depositor_id)))?;

        let mut paid = Vec::new();
        let mut seen: HashSet<UserId> = HashSet::new();
        seen.insert(depositor.id.clone());
        let mut next = depositor.referred_by.clone();

        for hop in 1..=MAX_REFERRAL_DEPTH {
            let Some(ancestor_id) = next.take() else {
                break;
            };
            if !seen.insert(ancestor_id.clone()) {
                warn!(
                    "Referral cycle at {} while paying deposit {}; stopping walk",
                    ancestor_id, trigger_deposit_id
                );
                break;
            }
            let Some(ancestor) = users::fetch_user(conn, &ancestor_id).await? else {
                debug!("Referrer {} no longer exists; stopping walk", ancestor_id);
                break;
            };
            next = ancestor.referred_by.clone();

            let level = hop as i64;
            let due = match settings.percentage_for(hop) {
                Some(percent) => amount.percent_of(percent).ok_or_else(|| {
                    LedgerError::Validation(format!(
                        "commission of {}% on {} overflows",
                        percent, amount
                    ))
                })?,
                None => Decimal::zero(),
            };
            if !due.is_positive() {
                debug!("Nothing due to {} at level {}", ancestor.id, level);
                continue;
            }
            if commissions::commission_exists(conn, trigger_deposit_id, &ancestor.id, level).await? {
                debug!(
                    "Commission for deposit {} already paid to {} at level {}",
                    trigger_deposit_id, ancestor.id, level
                );
                continue;
            }

            let commission = Commission {
                id: new_record_id(),
                referrer_id: ancestor.id.clone(),
                referred_id: depositor.id.clone(),
                level,
                amount: due,
                status: CommissionStatus::Completed,
                trigger_deposit_id: trigger_deposit_id.to_string(),
                created_at: TimeMs::now(),
            };
            if !commissions::insert_commission(conn, &commission).await? {
                continue;
            }

            self.balances
                .credit(
                    conn,
                    &ancestor.id,
                    due,
                    Posting::completed(
                        TransactionKind::Commission,
                        ReferenceType::Commission,
                        &commission.id,
                    ),
                )
                .await?;

            let event = LedgerEvent::CommissionEarned {
                user_id: ancestor.id.clone(),
                referred_id: depositor.id.clone(),
                level,
                amount: due,
                trigger_deposit_id: trigger_deposit_id.to_string(),
            };
            outbox::insert_event(conn, &event, commission.created_at).await?;

            info!(
                "Paid level {} commission {} to {} for deposit {}",
                level, due, ancestor.id, trigger_deposit_id
            );
            paid.push(commission);
        }

        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::db::repo::settings::store_referral_settings;
    use crate::domain::User;
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    async fn setup(chain: &[(&str, Option<&str>)], percentages: &str) -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let mut conn = pool.acquire().await.unwrap();
        for (i, (id, referrer)) in chain.iter().enumerate() {
            let user = User::new(
                UserId::new(*id),
                referrer.map(UserId::new),
                TimeMs::new(i as i64),
            );
            users::insert_user(&mut conn, &user).await.unwrap();
        }
        let settings = ReferralSettings {
            enabled: true,
            percentages: ReferralSettings::parse_percentages(percentages).unwrap(),
        };
        store_referral_settings(&mut conn, &settings).await.unwrap();
        drop(conn);
        (pool, temp_dir)
    }

    async fn balance(conn: &mut SqliteConnection, id: &str) -> Decimal {
        users::fetch_user(conn, &UserId::new(id))
            .await
            .unwrap()
            .unwrap()
            .available_balance
    }

    #[tokio::test]
    async fn test_two_level_fan_out() {
        let (pool, _temp) = setup(&[("r2", None), ("r1", Some("r2")), ("d", Some("r1"))], "10,5").await;
        let mut conn = pool.acquire().await.unwrap();
        let engine = CommissionEngine::default();

        let paid = engine
            .process_deposit_commission(&mut conn, &UserId::new("d"), Decimal::from_i64(1000), "dep1")
            .await
            .unwrap();
        assert_eq!(paid.len(), 2);
        assert_eq!(paid[0].level, 1);
        assert_eq!(balance(&mut conn, "r1").await, Decimal::from_i64(100));
        assert_eq!(balance(&mut conn, "r2").await, Decimal::from_i64(50));
        assert_eq!(balance(&mut conn, "d").await, Decimal::zero());

        let again = engine
            .process_deposit_commission(&mut conn, &UserId::new("d"), Decimal::from_i64(1000), "dep1")
            .await
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(balance(&mut conn, "r1").await, Decimal::from_i64(100));
        let stored = commissions::fetch_commissions_for_deposit(&mut conn, "dep1")
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_overflowing_commission_is_validation_error() {
        let (pool, _temp) = setup(&[("r1", None), ("d", Some("r1"))], "10").await;
        let mut conn = pool.acquire().await.unwrap();
        let engine = CommissionEngine::default();

        let huge = Decimal::from_str_canonical("79228162514264337593543950335").unwrap();
        let result = engine
            .process_deposit_commission(&mut conn, &UserId::new("d"), huge, "dep-huge")
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert_eq!(balance(&mut conn, "r1").await, Decimal::zero());
    }

    #[tokio::test]
    async fn test_cycle_stops_walk() {
        // a <-> b referral loop; d deposits under a.
        let (pool, _temp) = setup(&[("a", None), ("b", Some("a")), ("d", Some("a"))], "10,5,3,2,1").await;
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("UPDATE users SET referred_by = 'b' WHERE id = 'a'")
            .execute(&mut *conn)
            .await
            .unwrap();

        let paid = CommissionEngine::default()
            .process_deposit_commission(&mut conn, &UserId::new("d"), Decimal::from_i64(100), "dep1")
            .await
            .unwrap();
        let recipients: Vec<&str> = paid.iter().map(|c| c.referrer_id.as_str()).collect();
        assert_eq!(recipients, vec!["a", "b"]);
        assert_eq!(balance(&mut conn, "a").await, Decimal::from_i64(10));
        assert_eq!(balance(&mut conn, "b").await, Decimal::from_i64(5));
    }

    #[tokio::test]
    async fn test_disabled_program_pays_nothing() {
        let (pool, _temp) = setup(&[("r1", None), ("d", Some("r1"))], "10").await;
        let mut conn = pool.acquire().await.unwrap();
        let settings = ReferralSettings {
            enabled: false,
            percentages: vec![Decimal::from_i64(10)],
        };
        store_referral_settings(&mut conn, &settings).await.unwrap();

        let paid = CommissionEngine::default()
            .process_deposit_commission(&mut conn, &UserId::new("d"), Decimal::from_i64(100), "dep1")
            .await
            .unwrap();
        assert!(paid.is_empty());
        assert_eq!(balance(&mut conn, "r1").await, Decimal::zero());
    }

    #[tokio::test]
    async fn test_missing_settings_is_dependency_unavailable() {
        let (pool, _temp) = setup(&[("r1", None), ("d", Some("r1"))], "10").await;
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("DELETE FROM referral_settings")
            .execute(&mut *conn)
            .await
            .unwrap();

        let err = CommissionEngine::default()
            .process_deposit_commission(&mut conn, &UserId::new("d"), Decimal::from_i64(100), "dep1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DependencyUnavailable(_)));
    }

    #[tokio::test]
    async fn test_dangling_referrer_ends_walk_quietly() {
        let (pool, _temp) = setup(&[("d", None)], "10,5").await;
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("UPDATE users SET referred_by = 'gone' WHERE id = 'd'")
            .execute(&mut *conn)
            .await
            .unwrap();

        let paid = CommissionEngine::default()
            .process_deposit_commission(&mut conn, &UserId::new("d"), Decimal::from_i64(100), "dep1")
            .await
            .unwrap();
        assert!(paid.is_empty());
    }

    #[tokio::test]
    async fn test_commission_rounds_to_cents() {
        let (pool, _temp) = setup(&[("r1", None), ("d", Some("r1"))], "3").await;
        let mut conn = pool.acquire().await.unwrap();

        let paid = CommissionEngine::default()
            .process_deposit_commission(
                &mut conn,
                &UserId::new("d"),
                Decimal::from_str_canonical("33.35").unwrap(),
                "dep1",
            )
            .await
            .unwrap();
        // 3% of 33.35 = 1.0005
        assert_eq!(paid[0].amount, Decimal::from_str_canonical("1.00").unwrap());
    }
}
