//! Investment plans and the contracts activated from plan-tagged deposits.

use crate::domain::{Decimal, PlanId, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// Longest plan term accepted, roughly a century.
pub const MAX_PLAN_DURATION_DAYS: i64 = 36_500;

/// A plan definition as published by the plan catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub duration_days: i64,
    pub min_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    /// Percentage paid out at maturity; informational for this core.
    pub return_rate: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Plan {
    /// Check that `principal` may fund this plan.
    ///
    /// # Errors
    /// Returns a human-readable reason when the plan is closed or the amount
    /// is outside its bounds.
    pub fn check_principal(&self, principal: Decimal) -> Result<(), String> {
        if !self.active {
            return Err(format!("plan {} is not accepting deposits", self.id));
        }
        if self.duration_days <= 0 || self.duration_days > MAX_PLAN_DURATION_DAYS {
            return Err(format!(
                "plan {} has no valid duration ({} days)",
                self.id, self.duration_days
            ));
        }
        if principal < self.min_amount {
            return Err(format!(
                "amount {} is below the minimum {} for plan {}",
                principal, self.min_amount, self.id
            ));
        }
        if let Some(max) = self.max_amount {
            if principal > max {
                return Err(format!(
                    "amount {} exceeds the maximum {} for plan {}",
                    principal, max, self.id
                ));
            }
        }
        Ok(())
    }
}

string_enum! {
    InvestmentStatus {
        Active => "active",
        Completed => "completed",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Investment {
    pub id: String,
    pub user_id: UserId,
    pub plan_id: PlanId,
    /// Deposit that funded this investment.
    pub deposit_id: String,
    pub principal: Decimal,
    pub status: InvestmentStatus,
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn plan() -> Plan {
        Plan {
            id: PlanId::new("starter"),
            name: "Starter".to_string(),
            duration_days: 30,
            min_amount: Decimal::from_str("500").unwrap(),
            max_amount: Some(Decimal::from_str("5000").unwrap()),
            return_rate: Decimal::from_str("8").unwrap(),
            active: true,
        }
    }

    #[test]
    fn test_principal_bounds() {
        let p = plan();
        assert!(p.check_principal(Decimal::from_str("500").unwrap()).is_ok());
        assert!(p.check_principal(Decimal::from_str("5000").unwrap()).is_ok());
        assert!(p.check_principal(Decimal::from_str("499.99").unwrap()).is_err());
        assert!(p.check_principal(Decimal::from_str("5000.01").unwrap()).is_err());
    }

    #[test]
    fn test_inactive_plan_rejected() {
        let mut p = plan();
        p.active = false;
        let err = p.check_principal(Decimal::from_str("600").unwrap()).unwrap_err();
        assert!(err.contains("not accepting"));
    }

    #[test]
    fn test_duration_out_of_range_rejected() {
        let mut p = plan();
        p.duration_days = MAX_PLAN_DURATION_DAYS;
        assert!(p.check_principal(Decimal::from_str("600").unwrap()).is_ok());
        p.duration_days = MAX_PLAN_DURATION_DAYS + 1;
        let err = p.check_principal(Decimal::from_str("600").unwrap()).unwrap_err();
        assert!(err.contains("valid duration"));
        p.duration_days = i64::MAX;
        assert!(p.check_principal(Decimal::from_str("600").unwrap()).is_err());
    }

    #[test]
    fn test_plan_json_defaults_active() {
        let json = serde_json::json!({
            "id": "gold",
            "name": "Gold",
            "durationDays": 90,
            "minAmount": "1000",
            "returnRate": "15"
        });
        let p: Plan = serde_json::from_value(json).unwrap();
        assert!(p.active);
        assert_eq!(p.max_amount, None);
        assert_eq!(p.duration_days, 90);
    }
}
