//! Applying sanctions to community members
//!
//! Standing only moves downward here (`good → warning → suspended`).
//! Restoring a member is a separate, explicit `reinstate` call.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::member::{CommunityMember, MemberStanding, Warning};
use super::moderation::{ActionRoleTable, ModeratorAction};
use crate::dispute::DisputeSanction;
use crate::error::{PolicyError, Result};

/// Durations used when sanctions are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplinePolicy {
    pub suspension_days: u32,
    /// Warnings never expire when `None`
    pub warning_expiry_days: Option<u32>,
}

impl Default for DisciplinePolicy {
    fn default() -> Self {
        Self {
            suspension_days: 30,
            warning_expiry_days: Some(90),
        }
    }
}

/// What applying a sanction did to the member record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SanctionEffect {
    Unchanged,
    Warned { warning_id: String },
    Suspended { until: DateTime<Utc> },
    /// Caller must drop the membership
    RemovedFromCommunity,
    /// Caller must ban the participant protocol-wide
    ProtocolBanned,
}

/// Apply `sanction` to `member`
pub fn apply_sanction(
    member: &mut CommunityMember,
    sanction: DisputeSanction,
    reason: &str,
    issued_by: &str,
    policy: &DisciplinePolicy,
    now: DateTime<Utc>,
) -> SanctionEffect {
    let effect = match sanction {
        DisputeSanction::None => SanctionEffect::Unchanged,
        DisputeSanction::Warning => {
            let warning = Warning {
                id: format!("warning_{}_{}", member.participant_id, now.timestamp_millis()),
                reason: reason.to_string(),
                issued_by: issued_by.to_string(),
                issued_at: now,
                expires_at: policy
                    .warning_expiry_days
                    .map(|days| now + Duration::days(days as i64)),
            };
            let warning_id = warning.id.clone();
            member.warnings.push(warning);
            member.standing = member.standing.max(MemberStanding::Warning);
            SanctionEffect::Warned { warning_id }
        }
        DisputeSanction::Suspension30d => {
            let proposed = now + Duration::days(policy.suspension_days as i64);
            let until = if member.standing == MemberStanding::Suspended {
                match member.suspended_until {
                    // Already suspended indefinitely
                    None => None,
                    Some(existing) => Some(existing.max(proposed)),
                }
            } else {
                Some(proposed)
            };
            member.standing = MemberStanding::Suspended;
            member.suspended_until = until;
            match until {
                Some(until) => SanctionEffect::Suspended { until },
                None => SanctionEffect::Unchanged,
            }
        }
        DisputeSanction::CommunityRemoval => {
            member.standing = MemberStanding::Suspended;
            member.suspended_until = None;
            SanctionEffect::RemovedFromCommunity
        }
        DisputeSanction::ProtocolBan => {
            member.standing = MemberStanding::Suspended;
            member.suspended_until = None;
            SanctionEffect::ProtocolBanned
        }
    };

    info!(
        participant = %member.participant_id,
        community = %member.community_id,
        sanction = %sanction,
        standing = %member.standing,
        "Sanction applied"
    );

    effect
}

/// Restore good standing; the only upward standing transition
pub fn reinstate(member: &mut CommunityMember) {
    member.standing = MemberStanding::Good;
    member.suspended_until = None;
    info!(
        participant = %member.participant_id,
        community = %member.community_id,
        "Member reinstated"
    );
}

/// Perform a disciplinary moderator action on `target`
///
/// The actor must be authorized for the action and must outrank the target.
pub fn moderate(
    table: &ActionRoleTable,
    actor: &CommunityMember,
    target: &mut CommunityMember,
    action: ModeratorAction,
    reason: &str,
    policy: &DisciplinePolicy,
    now: DateTime<Utc>,
) -> Result<SanctionEffect> {
    if actor.community_id != target.community_id {
        return Err(PolicyError::validation(format!(
            "{} and {} belong to different communities",
            actor.participant_id, target.participant_id
        )));
    }
    table.authorization(actor, action).into_result(action)?;

    let Some(sanction) = action.sanction() else {
        return Ok(SanctionEffect::Unchanged);
    };
    if actor.participant_id == target.participant_id || target.role >= actor.role {
        return Err(PolicyError::denied(format!(
            "{} ({}) cannot {} {} ({})",
            actor.participant_id, actor.role, action, target.participant_id, target.role
        )));
    }

    Ok(apply_sanction(target, sanction, reason, &actor.participant_id, policy, now))
}
