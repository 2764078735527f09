//! Trust tiers and the tier rule table
//!
//! Participants are classified from rolling statistics supplied by the
//! reputation subsystem. The rule table is process-wide configuration: it is
//! validated once when built and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::privilege::TrustPrivilege;
use crate::error::{PolicyError, Result};

/// Highest rating a participant can hold
pub const MAX_RATING: f64 = 5.0;

/// Discrete reputation level, ordered from least to most exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Newcomer,
    Active,
    Trusted,
    Verified,
    Champion,
}

impl TrustTier {
    pub const ALL: [TrustTier; 5] = [
        TrustTier::Newcomer,
        TrustTier::Active,
        TrustTier::Trusted,
        TrustTier::Verified,
        TrustTier::Champion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustTier::Newcomer => "newcomer",
            TrustTier::Active => "active",
            TrustTier::Trusted => "trusted",
            TrustTier::Verified => "verified",
            TrustTier::Champion => "champion",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RawParticipantStats {
    exchanges: u32,
    rating: f64,
    dispute_rate: f64,
    account_age_days: u32,
}

/// Rolling statistics for one participant
///
/// Always valid once constructed: rating within `[0, 5]`, dispute rate
/// within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParticipantStats")]
pub struct ParticipantStats {
    exchanges: u32,
    rating: f64,
    dispute_rate: f64,
    account_age_days: u32,
}

impl ParticipantStats {
    pub fn new(exchanges: u32, rating: f64, dispute_rate: f64, account_age_days: u32) -> Result<Self> {
        if !rating.is_finite() || !(0.0..=MAX_RATING).contains(&rating) {
            return Err(PolicyError::validation(format!(
                "rating {} outside [0, {}]",
                rating, MAX_RATING
            )));
        }
        if !dispute_rate.is_finite() || !(0.0..=1.0).contains(&dispute_rate) {
            return Err(PolicyError::validation(format!(
                "dispute rate {} outside [0, 1]",
                dispute_rate
            )));
        }

        Ok(Self {
            exchanges,
            rating,
            dispute_rate,
            account_age_days,
        })
    }

    /// Statistics of a participant who just joined
    pub fn fresh() -> Self {
        Self {
            exchanges: 0,
            rating: 0.0,
            dispute_rate: 0.0,
            account_age_days: 0,
        }
    }

    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }

    pub fn rating(&self) -> f64 {
        self.rating
    }

    pub fn dispute_rate(&self) -> f64 {
        self.dispute_rate
    }

    pub fn account_age_days(&self) -> u32 {
        self.account_age_days
    }
}

impl TryFrom<RawParticipantStats> for ParticipantStats {
    type Error = PolicyError;

    fn try_from(raw: RawParticipantStats) -> Result<Self> {
        ParticipantStats::new(raw.exchanges, raw.rating, raw.dispute_rate, raw.account_age_days)
    }
}

/// Thresholds a participant must meet to hold a tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRequirements {
    pub min_exchanges: u32,
    pub min_rating: f64,
    pub max_dispute_rate: f64,
    pub min_account_age_days: u32,
}

impl TierRequirements {
    pub fn is_satisfied_by(&self, stats: &ParticipantStats) -> bool {
        stats.exchanges >= self.min_exchanges
            && stats.rating >= self.min_rating
            && stats.dispute_rate <= self.max_dispute_rate
            && stats.account_age_days >= self.min_account_age_days
    }

    fn is_trivial(&self) -> bool {
        self.min_exchanges == 0
            && self.min_rating == 0.0
            && self.max_dispute_rate >= 1.0
            && self.min_account_age_days == 0
    }
}

/// One row of the tier table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustTierRule {
    pub tier: TrustTier,
    pub requirements: TierRequirements,
    pub privileges: BTreeSet<TrustPrivilege>,
}

/// Validated tier rules, one per tier, stored lowest tier first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TrustTierRule>", into = "Vec<TrustTierRule>")]
pub struct TierTable {
    rules: Vec<TrustTierRule>,
}

impl TierTable {
    /// Build a table, checking every ordering invariant.
    ///
    /// Rules may be listed in any order. The table must cover every tier
    /// exactly once, thresholds must tighten monotonically towards the top,
    /// the lowest tier must accept anyone, and each tier's privileges must be
    /// a strict superset of the tier below.
    pub fn new(mut rules: Vec<TrustTierRule>) -> Result<Self> {
        rules.sort_by_key(|r| r.tier);

        let tiers: Vec<TrustTier> = rules.iter().map(|r| r.tier).collect();
        if tiers != TrustTier::ALL {
            return Err(PolicyError::MalformedTable(format!(
                "tier table must list each of {:?} exactly once, got {:?}",
                TrustTier::ALL,
                tiers
            )));
        }

        for rule in &rules {
            let req = &rule.requirements;
            if !req.min_rating.is_finite() || !(0.0..=MAX_RATING).contains(&req.min_rating) {
                return Err(PolicyError::MalformedTable(format!(
                    "{}: min_rating {} outside [0, {}]",
                    rule.tier, req.min_rating, MAX_RATING
                )));
            }
            if !req.max_dispute_rate.is_finite() || !(0.0..=1.0).contains(&req.max_dispute_rate) {
                return Err(PolicyError::MalformedTable(format!(
                    "{}: max_dispute_rate {} outside [0, 1]",
                    rule.tier, req.max_dispute_rate
                )));
            }
        }

        if !rules[0].requirements.is_trivial() {
            return Err(PolicyError::MalformedTable(format!(
                "lowest tier {} must not impose requirements",
                rules[0].tier
            )));
        }

        for pair in rules.windows(2) {
            let (lower, higher) = (&pair[0], &pair[1]);
            let (lo, hi) = (&lower.requirements, &higher.requirements);

            if hi.min_exchanges < lo.min_exchanges
                || hi.min_rating < lo.min_rating
                || hi.max_dispute_rate > lo.max_dispute_rate
                || hi.min_account_age_days < lo.min_account_age_days
            {
                return Err(PolicyError::MalformedTable(format!(
                    "{} thresholds are looser than {}",
                    higher.tier, lower.tier
                )));
            }

            if !(higher.privileges.is_superset(&lower.privileges)
                && higher.privileges.len() > lower.privileges.len())
            {
                return Err(PolicyError::MalformedTable(format!(
                    "{} privileges must strictly extend {}",
                    higher.tier, lower.tier
                )));
            }
        }

        Ok(Self { rules })
    }

    /// Parse and validate a JSON table override
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PolicyError::MalformedTable(e.to_string()))
    }

    pub fn rules(&self) -> &[TrustTierRule] {
        &self.rules
    }

    pub fn rule(&self, tier: TrustTier) -> &TrustTierRule {
        &self.rules[tier.index()]
    }

    /// Tier assigned when nothing else qualifies
    pub fn default_tier(&self) -> TrustTier {
        self.rules[0].tier
    }

    /// Highest tier whose requirements `stats` fully satisfies
    pub fn classify(&self, stats: &ParticipantStats) -> TrustTier {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.requirements.is_satisfied_by(stats))
            .map(|rule| rule.tier)
            .unwrap_or_else(|| self.default_tier())
    }

    /// Requirements still unmet for the next tier up, if any
    pub fn next_tier(&self, stats: &ParticipantStats) -> Option<(TrustTier, &TierRequirements)> {
        let current = self.classify(stats);
        self.rules
            .get(current.index() + 1)
            .map(|rule| (rule.tier, &rule.requirements))
    }
}

impl TryFrom<Vec<TrustTierRule>> for TierTable {
    type Error = PolicyError;

    fn try_from(rules: Vec<TrustTierRule>) -> Result<Self> {
        TierTable::new(rules)
    }
}

impl From<TierTable> for Vec<TrustTierRule> {
    fn from(table: TierTable) -> Self {
        table.rules
    }
}

impl Default for TierTable {
    fn default() -> Self {
        use TrustPrivilege::*;

        let newcomer = [CreateProfile, BrowseParticipants, ProposeExchanges, JoinPublicCommunities];
        let active = [LeaveReviews, EndorseSkills];
        let trusted = [CreateCommunities, UnlimitedPendingExchanges, PriorityMatching];
        let verified = [CommunityModeration, DisputeMediation, FeaturedDiscovery];
        let champion = [ProtocolGovernance, VouchNewcomers];

        let mut granted = BTreeSet::new();
        let mut rule = |tier, requirements, extra: &[TrustPrivilege]| {
            granted.extend(extra.iter().copied());
            TrustTierRule {
                tier,
                requirements,
                privileges: granted.clone(),
            }
        };

        let rules = vec![
            rule(
                TrustTier::Newcomer,
                TierRequirements {
                    min_exchanges: 0,
                    min_rating: 0.0,
                    max_dispute_rate: 1.0,
                    min_account_age_days: 0,
                },
                &newcomer,
            ),
            rule(
                TrustTier::Active,
                TierRequirements {
                    min_exchanges: 1,
                    min_rating: 0.0,
                    max_dispute_rate: 0.5,
                    min_account_age_days: 0,
                },
                &active,
            ),
            rule(
                TrustTier::Trusted,
                TierRequirements {
                    min_exchanges: 5,
                    min_rating: 4.0,
                    max_dispute_rate: 0.2,
                    min_account_age_days: 14,
                },
                &trusted,
            ),
            rule(
                TrustTier::Verified,
                TierRequirements {
                    min_exchanges: 20,
                    min_rating: 4.5,
                    max_dispute_rate: 0.1,
                    min_account_age_days: 30,
                },
                &verified,
            ),
            rule(
                TrustTier::Champion,
                TierRequirements {
                    min_exchanges: 50,
                    min_rating: 4.8,
                    max_dispute_rate: 0.05,
                    min_account_age_days: 90,
                },
                &champion,
            ),
        ];

        Self { rules }
    }
}

/// Classify `stats` against `table`
pub fn classify_tier(stats: &ParticipantStats, table: &TierTable) -> TrustTier {
    table.classify(stats)
}
