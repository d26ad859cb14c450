//! Referral commissions and the referral program settings.

use crate::domain::{Decimal, TimeMs, UserId};
use serde::Serialize;
use std::str::FromStr;

/// Deepest ancestor a deposit pays commission to.
pub const MAX_REFERRAL_DEPTH: usize = 5;

string_enum! {
    CommissionStatus {
        Completed => "completed",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commission {
    pub id: String,
    /// Ancestor receiving the commission.
    pub referrer_id: UserId,
    /// Depositor whose deposit triggered it.
    pub referred_id: UserId,
    /// Hop distance from the depositor, 1-based.
    pub level: i64,
    pub amount: Decimal,
    pub status: CommissionStatus,
    pub trigger_deposit_id: String,
    pub created_at: TimeMs,
}

/// Referral program switch and per-level percentages (index 0 is level 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralSettings {
    pub enabled: bool,
    pub percentages: Vec<Decimal>,
}

impl ReferralSettings {
    /// Percentage paid at `level` (1-based), if the table covers it.
    pub fn percentage_for(&self, level: usize) -> Option<Decimal> {
        if level == 0 {
            return None;
        }
        self.percentages.get(level - 1).copied()
    }

    /// Parse a comma-separated percentage table such as `"10,5,3,2,1"`.
    ///
    /// # Errors
    /// Returns a reason if an entry is not a number, lies outside 0..=100,
    /// or the table is longer than [`MAX_REFERRAL_DEPTH`].
    pub fn parse_percentages(raw: &str) -> Result<Vec<Decimal>, String> {
        let percentages = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Decimal::from_str(s).map_err(|_| format!("not a number: {}", s)))
            .collect::<Result<Vec<_>, _>>()?;

        if percentages.len() > MAX_REFERRAL_DEPTH {
            return Err(format!(
                "at most {} levels supported, got {}",
                MAX_REFERRAL_DEPTH,
                percentages.len()
            ));
        }
        let hundred = Decimal::from_i64(100);
        if let Some(bad) = percentages
            .iter()
            .find(|p| p.is_negative() || **p > hundred)
        {
            return Err(format!("percentage out of range: {}", bad));
        }
        Ok(percentages)
    }

    /// Storage form of the percentage table.
    pub fn percentages_to_string(&self) -> String {
        self.percentages
            .iter()
            .map(|p| p.to_canonical_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}
