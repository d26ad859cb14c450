//! Referral tiers and the single threshold computation every caller shares.

use crate::domain::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelTier {
    pub level: i64,
    pub name: String,
    pub referrals_required: i64,
    /// One-time bonus credited when the tier is first reached.
    pub bonus_amount: Decimal,
    pub benefits: Vec<String>,
}

/// Highest tier whose referral requirement is met by `active_referrals`.
///
/// `tiers` may be in any order.
pub fn highest_tier_met(tiers: &[LevelTier], active_referrals: i64) -> Option<&LevelTier> {
    tiers
        .iter()
        .filter(|t| t.referrals_required <= active_referrals)
        .max_by_key(|t| t.level)
}

/// Tiers newly reached by a user currently at `current_level`, ascending.
///
/// Every crossed tier is returned separately so each bonus is granted on
/// its own; a jump over several thresholds yields several entries.
pub fn tiers_to_grant(
    tiers: &[LevelTier],
    active_referrals: i64,
    current_level: i64,
) -> Vec<&LevelTier> {
    let mut crossed: Vec<&LevelTier> = tiers
        .iter()
        .filter(|t| t.level > current_level && t.referrals_required <= active_referrals)
        .collect();
    crossed.sort_by_key(|t| t.level);
    crossed
}
