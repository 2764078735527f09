//! Policy engine
//!
//! Bundles the validated rule tables with the six evaluation operations.
//! The engine is immutable once built and can be shared freely between
//! tasks behind an `Arc`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::community::{
    apply_sanction, moderate, reinstate, ActionRoleTable, Authorization, CommunityMember,
    DisciplinePolicy, MemberStanding, ModeratorAction, SanctionEffect,
};
use crate::dispute::{Dispute, DisputeClaim, DisputeEvent, DisputePolicy, DisputeTransition};
use crate::error::{PolicyError, Result};
use crate::governance::{GovernanceConfig, Proposal, ProposalStatus};
use crate::trust::{
    detect_milestones, Milestone, MilestoneType, ParticipantStats, TierRequirements, TierTable,
    TrustPrivilege, TrustTier, Vouch,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyEngine {
    tiers: TierTable,
    action_roles: ActionRoleTable,
    disputes: DisputePolicy,
    discipline: DisciplinePolicy,
}

impl PolicyEngine {
    pub fn new(
        tiers: TierTable,
        action_roles: ActionRoleTable,
        disputes: DisputePolicy,
        discipline: DisciplinePolicy,
    ) -> Result<Self> {
        disputes.validate()?;
        Ok(Self {
            tiers,
            action_roles,
            disputes,
            discipline,
        })
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn action_roles(&self) -> &ActionRoleTable {
        &self.action_roles
    }

    pub fn dispute_policy(&self) -> &DisputePolicy {
        &self.disputes
    }

    pub fn discipline_policy(&self) -> &DisciplinePolicy {
        &self.discipline
    }

    // ========================================================================
    // Trust
    // ========================================================================

    pub fn classify_tier(&self, stats: &ParticipantStats) -> TrustTier {
        let tier = self.tiers.classify(stats);
        debug!(
            exchanges = stats.exchanges(),
            rating = stats.rating(),
            dispute_rate = stats.dispute_rate(),
            tier = %tier,
            "Classified participant"
        );
        tier
    }

    pub fn privileges_for(&self, tier: TrustTier) -> &BTreeSet<TrustPrivilege> {
        crate::trust::privileges_for(&self.tiers, tier)
    }

    pub fn has_privilege(&self, tier: TrustTier, privilege: TrustPrivilege) -> bool {
        crate::trust::has_privilege(&self.tiers, tier, privilege)
    }

    /// Next tier up and what it takes to get there
    pub fn next_tier(&self, stats: &ParticipantStats) -> Option<(TrustTier, &TierRequirements)> {
        self.tiers.next_tier(stats)
    }

    pub fn milestones_between(
        &self,
        before: &ParticipantStats,
        after: &ParticipantStats,
    ) -> Vec<MilestoneType> {
        detect_milestones(&self.tiers, before, after)
    }

    /// Milestone records for everything `participant_id` reached between
    /// `before` and `after`
    pub fn award_milestones(
        &self,
        participant_id: &str,
        community_id: Option<&str>,
        before: &ParticipantStats,
        after: &ParticipantStats,
        now: DateTime<Utc>,
    ) -> Vec<Milestone> {
        detect_milestones(&self.tiers, before, after)
            .into_iter()
            .map(|milestone_type| {
                let mut milestone = Milestone::new(participant_id, milestone_type, now);
                milestone.community_id = community_id.map(str::to_string);
                milestone
            })
            .collect()
    }

    pub fn vouch(
        &self,
        voucher_id: &str,
        voucher_stats: &ParticipantStats,
        vouchee_id: &str,
        vouchee_stats: &ParticipantStats,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vouch> {
        Vouch::issue(
            &self.tiers,
            voucher_id,
            self.tiers.classify(voucher_stats),
            vouchee_id,
            self.tiers.classify(vouchee_stats),
            message,
            now,
        )
    }

    // ========================================================================
    // Community moderation
    // ========================================================================

    pub fn authorize(&self, member: &CommunityMember, action: ModeratorAction) -> bool {
        self.action_roles.authorize(member, action)
    }

    pub fn authorization(&self, member: &CommunityMember, action: ModeratorAction) -> Authorization {
        self.action_roles.authorization(member, action)
    }

    pub fn moderate(
        &self,
        actor: &CommunityMember,
        target: &mut CommunityMember,
        action: ModeratorAction,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<SanctionEffect> {
        moderate(&self.action_roles, actor, target, action, reason, &self.discipline, now)
    }

    /// Restore `target` to good standing, returning the standing it had
    ///
    /// Lifting a sanction takes the authority to impose one: the actor needs
    /// `SuspendMember` and must outrank the target.
    pub fn reinstate(
        &self,
        actor: &CommunityMember,
        target: &mut CommunityMember,
    ) -> Result<MemberStanding> {
        if actor.community_id != target.community_id {
            return Err(PolicyError::validation(format!(
                "{} and {} belong to different communities",
                actor.participant_id, target.participant_id
            )));
        }
        self.action_roles
            .authorization(actor, ModeratorAction::SuspendMember)
            .into_result(ModeratorAction::SuspendMember)?;
        if actor.participant_id == target.participant_id || target.role >= actor.role {
            return Err(PolicyError::denied(format!(
                "{} ({}) cannot reinstate {} ({})",
                actor.participant_id, actor.role, target.participant_id, target.role
            )));
        }

        let previous = target.standing;
        reinstate(target);
        Ok(previous)
    }

    // ========================================================================
    // Governance and disputes
    // ========================================================================

    pub fn resolve_proposal(
        &self,
        proposal: &mut Proposal,
        config: &GovernanceConfig,
        now: DateTime<Utc>,
    ) -> Result<ProposalStatus> {
        proposal.resolve(config, now)
    }

    pub fn open_dispute(&self, claim: DisputeClaim, now: DateTime<Utc>) -> Result<Dispute> {
        Dispute::open(claim, &self.disputes, now)
    }

    pub fn advance_dispute_state(
        &self,
        dispute: &mut Dispute,
        event: DisputeEvent,
        now: DateTime<Utc>,
    ) -> Result<DisputeTransition> {
        dispute.advance(event, &self.disputes, &self.tiers, now)
    }

    /// Escalate `dispute` one level on a community moderator's authority
    pub fn escalate_dispute(
        &self,
        dispute: &mut Dispute,
        moderator: &CommunityMember,
        now: DateTime<Utc>,
    ) -> Result<DisputeTransition> {
        self.check_dispute_moderator(dispute, moderator, ModeratorAction::EscalateDispute)?;
        dispute.escalate_by_moderator(&moderator.participant_id, &self.disputes, now)
    }

    /// Carry out the sanction of a resolved dispute on the sanctioned member
    pub fn enforce_dispute_sanction(
        &self,
        dispute: &Dispute,
        moderator: &CommunityMember,
        target: &mut CommunityMember,
        now: DateTime<Utc>,
    ) -> Result<SanctionEffect> {
        self.check_dispute_moderator(dispute, moderator, ModeratorAction::ResolveDispute)?;
        let Some((participant, sanction)) = dispute.applicable_sanction() else {
            return Ok(SanctionEffect::Unchanged);
        };
        if target.participant_id != participant || target.community_id != moderator.community_id {
            return Err(PolicyError::validation(format!(
                "dispute {} sanctions {}, not {}",
                dispute.id, participant, target.id
            )));
        }
        Ok(apply_sanction(
            target,
            sanction,
            &format!("dispute {}", dispute.id),
            &moderator.participant_id,
            &self.discipline,
            now,
        ))
    }

    fn check_dispute_moderator(
        &self,
        dispute: &Dispute,
        moderator: &CommunityMember,
        action: ModeratorAction,
    ) -> Result<()> {
        if dispute.community_id.as_deref() != Some(moderator.community_id.as_str()) {
            return Err(PolicyError::validation(format!(
                "dispute {} is not moderated by {}",
                dispute.id, moderator.community_id
            )));
        }
        self.action_roles
            .authorization(moderator, action)
            .into_result(action)?;
        if moderator.participant_id == dispute.raised_by
            || moderator.participant_id == dispute.against_participant
        {
            return Err(PolicyError::denied(format!(
                "{} cannot {} their own dispute {}",
                moderator.participant_id, action, dispute.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::{CommunityRole, MemberStanding};
    use crate::error::PolicyError;

    #[test]
    fn test_default_engine() {
        let engine = PolicyEngine::default();
        let stats = ParticipantStats::new(60, 4.9, 0.0, 120).unwrap();
        let tier = engine.classify_tier(&stats);

        assert_eq!(tier, TrustTier::Champion);
        assert!(engine.has_privilege(tier, TrustPrivilege::ProtocolGovernance));
        assert!(engine.next_tier(&stats).is_none());
        assert_eq!(engine.privileges_for(TrustTier::Champion).len(), TrustPrivilege::ALL.len());
    }

    #[test]
    fn test_rejects_zero_deadlines() {
        let disputes = DisputePolicy {
            mediation_hours: 0,
            ..DisputePolicy::default()
        };
        let result = PolicyEngine::new(
            TierTable::default(),
            ActionRoleTable::default(),
            disputes,
            DisciplinePolicy::default(),
        );
        assert!(matches!(result, Err(PolicyError::Validation(_))));
    }

    #[test]
    fn test_authorize_requires_good_standing() {
        let engine = PolicyEngine::default();
        let now = Utc::now();
        let founder = CommunityMember::new("c1", "f", CommunityRole::Founder, now);
        assert!(engine.authorize(&founder, ModeratorAction::RemoveMember));

        let warned = founder.with_standing(MemberStanding::Warning);
        assert!(!engine.authorize(&warned, ModeratorAction::ApproveMember));
        assert!(matches!(
            engine.authorization(&warned, ModeratorAction::ApproveMember),
            Authorization::StandingRestricted { .. }
        ));
    }

    #[test]
    fn test_vouch_uses_classified_tiers() {
        let engine = PolicyEngine::default();
        let champion = ParticipantStats::new(80, 5.0, 0.0, 365).unwrap();
        let newcomer = ParticipantStats::fresh();

        let vouch = engine
            .vouch("champ", &champion, "new", &newcomer, None, Utc::now())
            .unwrap();
        assert!(vouch.is_active);

        assert!(engine
            .vouch("new", &newcomer, "champ", &champion, None, Utc::now())
            .unwrap_err()
            .is_denial());
    }

    fn claim() -> DisputeClaim {
        DisputeClaim {
            exchange_id: "ex9".to_string(),
            community_id: Some("c1".to_string()),
            raised_by: "receiver".to_string(),
            against_participant: "provider".to_string(),
            dispute_type: crate::dispute::DisputeType::Quality,
            description: "Fence half painted".to_string(),
            statement: "Only one side was done".to_string(),
        }
    }

    #[test]
    fn test_moderator_escalates_dispute() {
        use crate::dispute::DisputeStatus;

        let engine = PolicyEngine::default();
        let now = Utc::now();
        let mut dispute = engine.open_dispute(claim(), now).unwrap();

        let member = CommunityMember::new("c1", "m", CommunityRole::Member, now);
        assert!(engine
            .escalate_dispute(&mut dispute, &member, now)
            .unwrap_err()
            .is_denial());

        let elsewhere = CommunityMember::new("c2", "mod", CommunityRole::Moderator, now);
        assert!(matches!(
            engine.escalate_dispute(&mut dispute, &elsewhere, now),
            Err(PolicyError::Validation(_))
        ));

        let party = CommunityMember::new("c1", "provider", CommunityRole::Moderator, now);
        assert!(engine
            .escalate_dispute(&mut dispute, &party, now)
            .unwrap_err()
            .is_denial());
        assert_eq!(dispute.status, DisputeStatus::SelfResolution);

        let moderator = CommunityMember::new("c1", "mod", CommunityRole::Moderator, now);
        let transition = engine.escalate_dispute(&mut dispute, &moderator, now).unwrap();
        assert_eq!(transition.to, DisputeStatus::Mediation);
    }

    #[test]
    fn test_enforces_resolved_dispute_sanction() {
        use crate::dispute::{DisputeResolution, DisputeSanction};

        let engine = PolicyEngine::default();
        let now = Utc::now();
        let mut dispute = engine.open_dispute(claim(), now).unwrap();
        let moderator = CommunityMember::new("c1", "mod", CommunityRole::Moderator, now);
        let mut provider = CommunityMember::new("c1", "provider", CommunityRole::Member, now);

        // Nothing to enforce while the dispute is open
        assert_eq!(
            engine.enforce_dispute_sanction(&dispute, &moderator, &mut provider, now).unwrap(),
            SanctionEffect::Unchanged
        );

        engine.escalate_dispute(&mut dispute, &moderator, now).unwrap();
        for event in [
            DisputeEvent::AssignMediator {
                mediator_id: "med".to_string(),
                mediator_tier: TrustTier::Verified,
            },
            DisputeEvent::ProposeMediation {
                mediator_id: "med".to_string(),
                summary: "Repaint and warn".to_string(),
                resolution: DisputeResolution::ProviderFavor,
                sanction: DisputeSanction::Warning,
                credit_adjustment: None,
            },
            DisputeEvent::RespondToMediation {
                participant_id: "receiver".to_string(),
                accept: true,
            },
            DisputeEvent::RespondToMediation {
                participant_id: "provider".to_string(),
                accept: true,
            },
        ] {
            engine.advance_dispute_state(&mut dispute, event, now).unwrap();
        }

        let mut bystander = CommunityMember::new("c1", "receiver", CommunityRole::Member, now);
        assert!(engine
            .enforce_dispute_sanction(&dispute, &moderator, &mut bystander, now)
            .is_err());

        let effect = engine
            .enforce_dispute_sanction(&dispute, &moderator, &mut provider, now)
            .unwrap();
        assert!(matches!(effect, SanctionEffect::Warned { .. }));
        assert_eq!(provider.standing, MemberStanding::Warning);
    }

    #[test]
    fn test_reinstate_requires_authority() {
        let engine = PolicyEngine::default();
        let now = Utc::now();
        let mut suspended = CommunityMember::new("c1", "p", CommunityRole::Member, now)
            .with_standing(MemberStanding::Suspended);

        let peer = CommunityMember::new("c1", "q", CommunityRole::Member, now);
        assert!(engine.reinstate(&peer, &mut suspended).unwrap_err().is_denial());
        assert_eq!(suspended.standing, MemberStanding::Suspended);

        let admin = CommunityMember::new("c1", "a", CommunityRole::Admin, now);
        assert_eq!(
            engine.reinstate(&admin, &mut suspended).unwrap(),
            MemberStanding::Suspended
        );
        assert!(suspended.is_in_good_standing());
    }

    #[test]
    fn test_award_milestones() {
        let engine = PolicyEngine::default();
        let now = Utc::now();
        let before = ParticipantStats::fresh();
        let after = ParticipantStats::new(1, 5.0, 0.0, 0).unwrap();

        let milestones = engine.award_milestones("p1", Some("c1"), &before, &after, now);
        assert!(!milestones.is_empty());
        assert!(milestones.iter().all(|m| m.participant_id == "p1"
            && m.community_id.as_deref() == Some("c1")
            && m.achieved_at == now
            && !m.celebrated));
    }
}
