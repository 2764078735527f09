//! Participation milestones
//!
//! Milestones are derived by comparing statistics before and after an
//! update; the caller decides how to celebrate them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tier::{ParticipantStats, TierTable, TrustTier, MAX_RATING};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneType {
    FirstExchange,
    ActiveStatus,
    TrustedStatus,
    VerifiedStatus,
    ChampionStatus,
    FirstCommunityCreated,
    FirstMediation,
    #[serde(rename = "exchanges_10")]
    Exchanges10,
    #[serde(rename = "exchanges_25")]
    Exchanges25,
    #[serde(rename = "exchanges_50")]
    Exchanges50,
    #[serde(rename = "exchanges_100")]
    Exchanges100,
    #[serde(rename = "perfect_rating_10")]
    PerfectRating10,
}

impl MilestoneType {
    /// Status milestone for reaching `tier`, if that tier has one
    pub fn for_tier(tier: TrustTier) -> Option<Self> {
        match tier {
            TrustTier::Newcomer => None,
            TrustTier::Active => Some(MilestoneType::ActiveStatus),
            TrustTier::Trusted => Some(MilestoneType::TrustedStatus),
            TrustTier::Verified => Some(MilestoneType::VerifiedStatus),
            TrustTier::Champion => Some(MilestoneType::ChampionStatus),
        }
    }
}

const EXCHANGE_MILESTONES: [(u32, MilestoneType); 5] = [
    (1, MilestoneType::FirstExchange),
    (10, MilestoneType::Exchanges10),
    (25, MilestoneType::Exchanges25),
    (50, MilestoneType::Exchanges50),
    (100, MilestoneType::Exchanges100),
];

const PERFECT_RATING_EXCHANGES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub participant_id: String,
    pub milestone_type: MilestoneType,
    pub achieved_at: DateTime<Utc>,
    pub community_id: Option<String>,
    pub celebrated: bool,
}

impl Milestone {
    pub fn new(participant_id: &str, milestone_type: MilestoneType, achieved_at: DateTime<Utc>) -> Self {
        Self {
            participant_id: participant_id.to_string(),
            milestone_type,
            achieved_at,
            community_id: None,
            celebrated: false,
        }
    }
}

/// Milestones newly reached between `before` and `after`
///
/// Tier milestones are only awarded on promotion; dropping a tier and
/// regaining it awards the status again.
pub fn detect_milestones(
    table: &TierTable,
    before: &ParticipantStats,
    after: &ParticipantStats,
) -> Vec<MilestoneType> {
    let mut reached = Vec::new();

    for (count, milestone) in EXCHANGE_MILESTONES {
        if before.exchanges() < count && after.exchanges() >= count {
            reached.push(milestone);
        }
    }

    let was_perfect = before.exchanges() >= PERFECT_RATING_EXCHANGES && before.rating() >= MAX_RATING;
    let is_perfect = after.exchanges() >= PERFECT_RATING_EXCHANGES && after.rating() >= MAX_RATING;
    if is_perfect && !was_perfect {
        reached.push(MilestoneType::PerfectRating10);
    }

    let old_tier = table.classify(before);
    let new_tier = table.classify(after);
    reached.extend(
        TrustTier::ALL
            .iter()
            .filter(|t| **t > old_tier && **t <= new_tier)
            .filter_map(|t| MilestoneType::for_tier(*t)),
    );

    reached
}
