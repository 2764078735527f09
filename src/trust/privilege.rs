//! Trust privileges and tier lookups
//!
//! A privilege is a named capability granted by trust tier. Lookups go
//! through a validated `TierTable`, so every tier always resolves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::tier::{TierTable, TrustTier};
use crate::error::{PolicyError, Result};

/// Capability gated by trust tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPrivilege {
    CreateProfile,
    BrowseParticipants,
    ProposeExchanges,
    JoinPublicCommunities,
    LeaveReviews,
    EndorseSkills,
    CreateCommunities,
    UnlimitedPendingExchanges,
    PriorityMatching,
    CommunityModeration,
    DisputeMediation,
    FeaturedDiscovery,
    ProtocolGovernance,
    VouchNewcomers,
}

impl TrustPrivilege {
    pub const ALL: [TrustPrivilege; 14] = [
        TrustPrivilege::CreateProfile,
        TrustPrivilege::BrowseParticipants,
        TrustPrivilege::ProposeExchanges,
        TrustPrivilege::JoinPublicCommunities,
        TrustPrivilege::LeaveReviews,
        TrustPrivilege::EndorseSkills,
        TrustPrivilege::CreateCommunities,
        TrustPrivilege::UnlimitedPendingExchanges,
        TrustPrivilege::PriorityMatching,
        TrustPrivilege::CommunityModeration,
        TrustPrivilege::DisputeMediation,
        TrustPrivilege::FeaturedDiscovery,
        TrustPrivilege::ProtocolGovernance,
        TrustPrivilege::VouchNewcomers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustPrivilege::CreateProfile => "create_profile",
            TrustPrivilege::BrowseParticipants => "browse_participants",
            TrustPrivilege::ProposeExchanges => "propose_exchanges",
            TrustPrivilege::JoinPublicCommunities => "join_public_communities",
            TrustPrivilege::LeaveReviews => "leave_reviews",
            TrustPrivilege::EndorseSkills => "endorse_skills",
            TrustPrivilege::CreateCommunities => "create_communities",
            TrustPrivilege::UnlimitedPendingExchanges => "unlimited_pending_exchanges",
            TrustPrivilege::PriorityMatching => "priority_matching",
            TrustPrivilege::CommunityModeration => "community_moderation",
            TrustPrivilege::DisputeMediation => "dispute_mediation",
            TrustPrivilege::FeaturedDiscovery => "featured_discovery",
            TrustPrivilege::ProtocolGovernance => "protocol_governance",
            TrustPrivilege::VouchNewcomers => "vouch_newcomers",
        }
    }
}

impl fmt::Display for TrustPrivilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privileges granted to `tier`
pub fn privileges_for(table: &TierTable, tier: TrustTier) -> &BTreeSet<TrustPrivilege> {
    &table.rule(tier).privileges
}

pub fn has_privilege(table: &TierTable, tier: TrustTier, privilege: TrustPrivilege) -> bool {
    privileges_for(table, tier).contains(&privilege)
}

/// Like `has_privilege`, but as a denial the caller can propagate
pub fn require_privilege(
    table: &TierTable,
    tier: TrustTier,
    privilege: TrustPrivilege,
) -> Result<()> {
    if has_privilege(table, tier, privilege) {
        Ok(())
    } else {
        Err(PolicyError::denied(format!(
            "tier {} lacks privilege {}",
            tier, privilege
        )))
    }
}
