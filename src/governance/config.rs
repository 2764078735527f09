//! Community governance configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::community::{CommunityMember, CommunityRole, MemberStanding};
use crate::error::{PolicyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceModel {
    /// Founder decides
    FounderLed,
    /// Admins vote by majority
    AdminCouncil,
    /// All members vote
    Democratic,
    /// High agreement required
    Consensus,
    /// Representatives vote
    Delegated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    SettingsChange,
    MemberRemoval,
    RoleChange,
    CommunityMerge,
    PolicyChange,
    FederationJoin,
    FederationLeave,
}

impl DecisionType {
    pub const ALL: [DecisionType; 7] = [
        DecisionType::SettingsChange,
        DecisionType::MemberRemoval,
        DecisionType::RoleChange,
        DecisionType::CommunityMerge,
        DecisionType::PolicyChange,
        DecisionType::FederationJoin,
        DecisionType::FederationLeave,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::SettingsChange => "settings_change",
            DecisionType::MemberRemoval => "member_removal",
            DecisionType::RoleChange => "role_change",
            DecisionType::CommunityMerge => "community_merge",
            DecisionType::PolicyChange => "policy_change",
            DecisionType::FederationJoin => "federation_join",
            DecisionType::FederationLeave => "federation_leave",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-community decision policy. Read-only to the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub model: GovernanceModel,

    /// Voting parameters (for voting models)
    pub voting_period_hours: u32,
    /// Minimum participation, as a fraction of eligible voters
    pub quorum_percentage: f64,
    /// Minimum share of `for` among decisive votes
    pub approval_threshold: f64,

    pub who_can_propose: BTreeSet<CommunityRole>,
    pub who_can_vote: BTreeSet<CommunityRole>,

    pub decisions_requiring_vote: BTreeSet<DecisionType>,
}

impl GovernanceConfig {
    /// Defaults for a governance model
    pub fn for_model(model: GovernanceModel) -> Self {
        use CommunityRole::*;

        let everyone: BTreeSet<CommunityRole> = CommunityRole::ALL.into_iter().collect();
        let admins: BTreeSet<CommunityRole> = [Admin, Founder].into_iter().collect();
        let representatives: BTreeSet<CommunityRole> = [Moderator, Admin, Founder].into_iter().collect();
        let all_decisions: BTreeSet<DecisionType> = DecisionType::ALL.into_iter().collect();

        match model {
            GovernanceModel::FounderLed => Self {
                model,
                voting_period_hours: 24,
                quorum_percentage: 1.0,
                approval_threshold: 0.5,
                who_can_propose: admins,
                who_can_vote: [Founder].into_iter().collect(),
                decisions_requiring_vote: BTreeSet::new(),
            },
            GovernanceModel::AdminCouncil => Self {
                model,
                voting_period_hours: 72,
                quorum_percentage: 0.5,
                approval_threshold: 0.5,
                who_can_propose: admins.clone(),
                who_can_vote: admins,
                decisions_requiring_vote: all_decisions,
            },
            GovernanceModel::Democratic => Self {
                model,
                voting_period_hours: 168,
                quorum_percentage: 0.3,
                approval_threshold: 0.5,
                who_can_propose: everyone.clone(),
                who_can_vote: everyone,
                decisions_requiring_vote: all_decisions,
            },
            GovernanceModel::Consensus => Self {
                model,
                voting_period_hours: 168,
                quorum_percentage: 0.5,
                approval_threshold: 0.8,
                who_can_propose: everyone.clone(),
                who_can_vote: everyone,
                decisions_requiring_vote: all_decisions,
            },
            GovernanceModel::Delegated => Self {
                model,
                voting_period_hours: 72,
                quorum_percentage: 0.5,
                approval_threshold: 0.5,
                who_can_propose: everyone,
                who_can_vote: representatives,
                decisions_requiring_vote: all_decisions,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.voting_period_hours == 0 {
            return Err(PolicyError::validation("voting period must be non-zero"));
        }
        if !self.quorum_percentage.is_finite() || !(0.0..=1.0).contains(&self.quorum_percentage) {
            return Err(PolicyError::validation(format!(
                "quorum {} outside [0, 1]",
                self.quorum_percentage
            )));
        }
        if !self.approval_threshold.is_finite()
            || self.approval_threshold <= 0.0
            || self.approval_threshold > 1.0
        {
            return Err(PolicyError::validation(format!(
                "approval threshold {} outside (0, 1]",
                self.approval_threshold
            )));
        }
        if self.who_can_vote.is_empty() || self.who_can_propose.is_empty() {
            return Err(PolicyError::validation(
                "at least one role must be able to propose and vote",
            ));
        }
        Ok(())
    }

    pub fn requires_vote(&self, decision: DecisionType) -> bool {
        self.decisions_requiring_vote.contains(&decision)
    }

    /// Suspended members can neither propose nor vote
    pub fn can_propose(&self, member: &CommunityMember) -> bool {
        member.standing != MemberStanding::Suspended && self.who_can_propose.contains(&member.role)
    }

    pub fn can_vote(&self, member: &CommunityMember) -> bool {
        member.standing != MemberStanding::Suspended && self.who_can_vote.contains(&member.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_presets_validate() {
        for model in [
            GovernanceModel::FounderLed,
            GovernanceModel::AdminCouncil,
            GovernanceModel::Democratic,
            GovernanceModel::Consensus,
            GovernanceModel::Delegated,
        ] {
            GovernanceConfig::for_model(model).validate().unwrap();
        }
        assert_eq!(GovernanceConfig::for_model(GovernanceModel::Consensus).approval_threshold, 0.8);
    }

    #[test]
    fn test_founder_led_needs_no_votes() {
        let config = GovernanceConfig::for_model(GovernanceModel::FounderLed);
        for decision in DecisionType::ALL {
            assert!(!config.requires_vote(decision));
        }
    }

    #[test]
    fn test_eligibility() {
        let config = GovernanceConfig::for_model(GovernanceModel::AdminCouncil);
        let now = Utc::now();
        let admin = CommunityMember::new("c1", "a", CommunityRole::Admin, now);
        let member = CommunityMember::new("c1", "m", CommunityRole::Member, now);
        let suspended = CommunityMember::new("c1", "s", CommunityRole::Founder, now)
            .with_standing(MemberStanding::Suspended);

        assert!(config.can_vote(&admin));
        assert!(!config.can_vote(&member));
        assert!(!config.can_vote(&suspended));
        assert!(!config.can_propose(&suspended));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut config = GovernanceConfig::for_model(GovernanceModel::Democratic);
        config.quorum_percentage = 1.2;
        assert!(config.validate().is_err());

        let mut config = GovernanceConfig::for_model(GovernanceModel::Democratic);
        config.approval_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = GovernanceConfig::for_model(GovernanceModel::Democratic);
        config.who_can_vote.clear();
        assert!(config.validate().is_err());
    }
}
