//! Moderator actions and role-based authorization
//!
//! Each action has a minimum role. Standing is a hard gate on top of the
//! role check: members in `warning` or `suspended` standing cannot moderate,
//! whatever their role.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use super::member::{CommunityMember, CommunityRole, MemberStanding};
use crate::dispute::DisputeSanction;
use crate::error::{PolicyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeratorAction {
    ApproveMember,
    RejectMember,
    WarnMember,
    MuteMember,
    SuspendMember,
    RemoveMember,
    /// Enforce the sanction of a resolved dispute
    ResolveDispute,
    /// Move a community dispute up one level
    EscalateDispute,
}

impl ModeratorAction {
    pub const ALL: [ModeratorAction; 8] = [
        ModeratorAction::ApproveMember,
        ModeratorAction::RejectMember,
        ModeratorAction::WarnMember,
        ModeratorAction::MuteMember,
        ModeratorAction::SuspendMember,
        ModeratorAction::RemoveMember,
        ModeratorAction::ResolveDispute,
        ModeratorAction::EscalateDispute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeratorAction::ApproveMember => "approve_member",
            ModeratorAction::RejectMember => "reject_member",
            ModeratorAction::WarnMember => "warn_member",
            ModeratorAction::MuteMember => "mute_member",
            ModeratorAction::SuspendMember => "suspend_member",
            ModeratorAction::RemoveMember => "remove_member",
            ModeratorAction::ResolveDispute => "resolve_dispute",
            ModeratorAction::EscalateDispute => "escalate_dispute",
        }
    }

    /// Sanction this action imposes on its target, if it disciplines anyone
    pub fn sanction(&self) -> Option<DisputeSanction> {
        match self {
            ModeratorAction::WarnMember => Some(DisputeSanction::Warning),
            ModeratorAction::SuspendMember => Some(DisputeSanction::Suspension30d),
            ModeratorAction::RemoveMember => Some(DisputeSanction::CommunityRemoval),
            _ => None,
        }
    }
}

impl fmt::Display for ModeratorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Authorization {
    Granted,
    InsufficientRole {
        required: CommunityRole,
        actual: CommunityRole,
    },
    StandingRestricted {
        standing: MemberStanding,
    },
}

impl Authorization {
    pub fn is_granted(&self) -> bool {
        matches!(self, Authorization::Granted)
    }

    /// Turn a denial into `PolicyError::AuthorizationDenied`
    pub fn into_result(self, action: ModeratorAction) -> Result<()> {
        match self {
            Authorization::Granted => Ok(()),
            Authorization::InsufficientRole { required, actual } => Err(PolicyError::denied(
                format!("{} requires {}, member is {}", action, required, actual),
            )),
            Authorization::StandingRestricted { standing } => Err(PolicyError::denied(format!(
                "{} not allowed while standing is {}",
                action, standing
            ))),
        }
    }
}

/// Minimum role per moderator action; covers every action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<ModeratorAction, CommunityRole>", into = "BTreeMap<ModeratorAction, CommunityRole>")]
pub struct ActionRoleTable {
    requirements: BTreeMap<ModeratorAction, CommunityRole>,
}

impl ActionRoleTable {
    pub fn new(requirements: BTreeMap<ModeratorAction, CommunityRole>) -> Result<Self> {
        let missing: Vec<&str> = ModeratorAction::ALL
            .iter()
            .filter(|a| !requirements.contains_key(a))
            .map(|a| a.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(PolicyError::MalformedTable(format!(
                "action role table missing {}",
                missing.join(", ")
            )));
        }

        Ok(Self { requirements })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PolicyError::MalformedTable(e.to_string()))
    }

    pub fn required_role(&self, action: ModeratorAction) -> CommunityRole {
        // Every action is present once the table is built
        self.requirements
            .get(&action)
            .copied()
            .unwrap_or(CommunityRole::Founder)
    }

    pub fn authorization(&self, member: &CommunityMember, action: ModeratorAction) -> Authorization {
        let decision = if member.standing != MemberStanding::Good {
            Authorization::StandingRestricted {
                standing: member.standing,
            }
        } else {
            let required = self.required_role(action);
            if member.role >= required {
                Authorization::Granted
            } else {
                Authorization::InsufficientRole {
                    required,
                    actual: member.role,
                }
            }
        };

        debug!(
            participant = %member.participant_id,
            community = %member.community_id,
            action = %action,
            decision = ?decision,
            "Moderation authorization evaluated"
        );

        decision
    }

    pub fn authorize(&self, member: &CommunityMember, action: ModeratorAction) -> bool {
        self.authorization(member, action).is_granted()
    }
}

impl TryFrom<BTreeMap<ModeratorAction, CommunityRole>> for ActionRoleTable {
    type Error = PolicyError;

    fn try_from(requirements: BTreeMap<ModeratorAction, CommunityRole>) -> Result<Self> {
        ActionRoleTable::new(requirements)
    }
}

impl From<ActionRoleTable> for BTreeMap<ModeratorAction, CommunityRole> {
    fn from(table: ActionRoleTable) -> Self {
        table.requirements
    }
}

impl Default for ActionRoleTable {
    fn default() -> Self {
        let requirements = ModeratorAction::ALL
            .iter()
            .map(|action| {
                let role = match action {
                    ModeratorAction::SuspendMember | ModeratorAction::RemoveMember => {
                        CommunityRole::Admin
                    }
                    _ => CommunityRole::Moderator,
                };
                (*action, role)
            })
            .collect();

        Self { requirements }
    }
}

/// Whether `member` may perform `action` under `table`
pub fn authorize(table: &ActionRoleTable, member: &CommunityMember, action: ModeratorAction) -> bool {
    table.authorize(member, action)
}
