//! Governance ledger - in-process orchestrator
//!
//! Holds open and closed proposals and disputes in memory and applies every
//! mutation under the record map's write lock, so each record has a single
//! writer at a time. Time comes from the injected `Clock`; nothing here
//! reads the system time directly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::audit::{ModerationEntry, ModerationEventType, ModerationLog, ModerationSeverity};
use crate::clock::Clock;
use crate::community::{CommunityMember, ModeratorAction, SanctionEffect};
use crate::dispute::{Dispute, DisputeClaim, DisputeEvent, DisputeStatus, DisputeTransition};
use crate::engine::PolicyEngine;
use crate::error::{PolicyError, Result};
use crate::governance::{
    GovernanceConfig, Proposal, ProposalDraft, ProposalStatus, VoteChoice, VoteReceipt,
};

/// A proposal together with the configuration it was opened under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub proposal: Proposal,
    pub config: GovernanceConfig,
}

/// What one deadline sweep changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub settled_proposals: Vec<(String, ProposalStatus)>,
    pub advanced_disputes: Vec<(String, DisputeTransition)>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.settled_proposals.is_empty() && self.advanced_disputes.is_empty()
    }
}

pub struct GovernanceLedger {
    engine: Arc<PolicyEngine>,
    clock: Arc<dyn Clock>,
    log: ModerationLog,

    proposals: Arc<RwLock<HashMap<String, ProposalRecord>>>,
    disputes: Arc<RwLock<HashMap<String, Dispute>>>,
}

impl GovernanceLedger {
    pub fn new(engine: Arc<PolicyEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            clock,
            log: ModerationLog::default(),
            proposals: Arc::new(RwLock::new(HashMap::new())),
            disputes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_log(mut self, log: ModerationLog) -> Self {
        self.log = log;
        self
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn log(&self) -> &ModerationLog {
        &self.log
    }

    // ========================================================================
    // Proposals
    // ========================================================================

    pub async fn open_proposal(
        &self,
        config: GovernanceConfig,
        proposer: &CommunityMember,
        draft: ProposalDraft,
        total_eligible_voters: u32,
    ) -> Result<Proposal> {
        let now = self.clock.now();
        let proposal = Proposal::open(&config, proposer, draft, total_eligible_voters, now)?;

        {
            let mut proposals = self.proposals.write().await;
            if proposals.contains_key(&proposal.id) {
                return Err(PolicyError::validation(format!(
                    "proposal {} already exists",
                    proposal.id
                )));
            }
            proposals.insert(
                proposal.id.clone(),
                ProposalRecord {
                    proposal: proposal.clone(),
                    config,
                },
            );
        }

        let entry = ModerationEntry::new(
            ModerationEventType::ProposalOpened {
                proposal_id: proposal.id.clone(),
                decision_type: proposal.decision_type,
                proposed_by: proposal.proposed_by.clone(),
            },
            ModerationSeverity::Info,
            now,
        )
        .in_community(&proposal.community_id);
        self.log.log(entry).await;

        Ok(proposal)
    }

    pub async fn cast_vote(
        &self,
        proposal_id: &str,
        voter: &CommunityMember,
        choice: VoteChoice,
    ) -> Result<VoteReceipt> {
        let now = self.clock.now();
        let (receipt, community_id) = {
            let mut proposals = self.proposals.write().await;
            let record = proposals
                .get_mut(proposal_id)
                .ok_or_else(|| unknown("proposal", proposal_id))?;
            let receipt = record.proposal.cast_vote(&record.config, voter, choice, now)?;
            (receipt, record.proposal.community_id.clone())
        };

        let entry = ModerationEntry::new(
            ModerationEventType::VoteCast {
                proposal_id: proposal_id.to_string(),
                voter: voter.participant_id.clone(),
                choice,
            },
            ModerationSeverity::Debug,
            now,
        )
        .in_community(&community_id);
        self.log.log(entry).await;

        Ok(receipt)
    }

    pub async fn resolve_proposal(&self, proposal_id: &str) -> Result<ProposalStatus> {
        let now = self.clock.now();
        let (status, community_id) = {
            let mut proposals = self.proposals.write().await;
            let record = proposals
                .get_mut(proposal_id)
                .ok_or_else(|| unknown("proposal", proposal_id))?;
            let status = self
                .engine
                .resolve_proposal(&mut record.proposal, &record.config, now)?;
            (status, record.proposal.community_id.clone())
        };

        self.log_proposal_resolved(proposal_id, &community_id, status).await;
        Ok(status)
    }

    pub async fn mark_executed(&self, proposal_id: &str) -> Result<()> {
        let now = self.clock.now();
        let mut proposals = self.proposals.write().await;
        let record = proposals
            .get_mut(proposal_id)
            .ok_or_else(|| unknown("proposal", proposal_id))?;
        record.proposal.mark_executed(now)
    }

    pub async fn proposal(&self, proposal_id: &str) -> Option<Proposal> {
        let proposals = self.proposals.read().await;
        proposals.get(proposal_id).map(|r| r.proposal.clone())
    }

    pub async fn active_proposals(&self, community_id: &str) -> Vec<Proposal> {
        let proposals = self.proposals.read().await;
        let mut active: Vec<Proposal> = proposals
            .values()
            .filter(|r| r.proposal.community_id == community_id && !r.proposal.status.is_terminal())
            .map(|r| r.proposal.clone())
            .collect();
        active.sort_by_key(|p| p.ends_at);
        active
    }

    // ========================================================================
    // Disputes
    // ========================================================================

    pub async fn open_dispute(&self, claim: DisputeClaim) -> Result<Dispute> {
        let now = self.clock.now();
        let dispute = self.engine.open_dispute(claim, now)?;

        {
            let mut disputes = self.disputes.write().await;
            if disputes.contains_key(&dispute.id) {
                return Err(PolicyError::validation(format!(
                    "dispute {} already exists",
                    dispute.id
                )));
            }
            disputes.insert(dispute.id.clone(), dispute.clone());
        }

        let mut entry = ModerationEntry::new(
            ModerationEventType::DisputeOpened {
                dispute_id: dispute.id.clone(),
                raised_by: dispute.raised_by.clone(),
                against: dispute.against_participant.clone(),
            },
            ModerationSeverity::Info,
            now,
        );
        if let Some(community_id) = &dispute.community_id {
            entry = entry.in_community(community_id);
        }
        self.log.log(entry).await;

        Ok(dispute)
    }

    pub async fn apply_dispute_event(
        &self,
        dispute_id: &str,
        event: DisputeEvent,
    ) -> Result<DisputeTransition> {
        let now = self.clock.now();
        let (transition, snapshot) = {
            let mut disputes = self.disputes.write().await;
            let dispute = disputes
                .get_mut(dispute_id)
                .ok_or_else(|| unknown("dispute", dispute_id))?;
            let transition = self.engine.advance_dispute_state(dispute, event, now)?;
            (transition, dispute.clone())
        };

        self.log_dispute_transition(&snapshot, transition).await;
        Ok(transition)
    }

    pub async fn dispute(&self, dispute_id: &str) -> Option<Dispute> {
        let disputes = self.disputes.read().await;
        disputes.get(dispute_id).cloned()
    }

    pub async fn open_disputes(&self) -> Vec<Dispute> {
        let disputes = self.disputes.read().await;
        let mut open: Vec<Dispute> = disputes
            .values()
            .filter(|d| !d.status.is_terminal())
            .cloned()
            .collect();
        open.sort_by_key(|d| d.created_at);
        open
    }

    // ========================================================================
    // Moderation
    // ========================================================================

    /// Run a moderator action and record the decision either way
    pub async fn moderate(
        &self,
        actor: &CommunityMember,
        target: &mut CommunityMember,
        action: ModeratorAction,
        reason: &str,
    ) -> Result<SanctionEffect> {
        let now = self.clock.now();
        match self.engine.moderate(actor, target, action, reason, now) {
            Ok(effect) => {
                self.log
                    .log_moderation_granted(
                        &actor.community_id,
                        &actor.participant_id,
                        action,
                        Some(&target.participant_id),
                        now,
                    )
                    .await;
                if let Some(sanction) = action.sanction() {
                    self.log
                        .log_sanction(
                            Some(&target.community_id),
                            &target.participant_id,
                            sanction,
                            reason,
                            now,
                        )
                        .await;
                }
                Ok(effect)
            }
            Err(e) => {
                self.log_refusal(actor, action, &target.participant_id, &e).await;
                Err(e)
            }
        }
    }

    /// Restore `target` to good standing and record who lifted the sanction
    pub async fn reinstate(&self, actor: &CommunityMember, target: &mut CommunityMember) -> Result<()> {
        let now = self.clock.now();
        let previous = match self.engine.reinstate(actor, target) {
            Ok(previous) => previous,
            Err(e) => {
                self.log_refusal(actor, ModeratorAction::SuspendMember, &target.participant_id, &e)
                    .await;
                return Err(e);
            }
        };

        let entry = ModerationEntry::new(
            ModerationEventType::MemberReinstated {
                participant: target.participant_id.clone(),
                by: actor.participant_id.clone(),
            },
            ModerationSeverity::Warning,
            now,
        )
        .in_community(&target.community_id)
        .with_metadata("previous_standing", previous.as_str());
        self.log.log(entry).await;
        Ok(())
    }

    /// Escalate a dispute on a community moderator's authority
    pub async fn escalate_dispute(
        &self,
        dispute_id: &str,
        moderator: &CommunityMember,
    ) -> Result<DisputeTransition> {
        let now = self.clock.now();
        let result = {
            let mut disputes = self.disputes.write().await;
            let dispute = disputes
                .get_mut(dispute_id)
                .ok_or_else(|| unknown("dispute", dispute_id))?;
            self.engine
                .escalate_dispute(dispute, moderator, now)
                .map(|transition| (transition, dispute.clone()))
        };

        match result {
            Ok((transition, snapshot)) => {
                self.log
                    .log_moderation_granted(
                        &moderator.community_id,
                        &moderator.participant_id,
                        ModeratorAction::EscalateDispute,
                        None,
                        now,
                    )
                    .await;
                self.log_dispute_transition(&snapshot, transition).await;
                Ok(transition)
            }
            Err(e) => {
                self.log_refusal(moderator, ModeratorAction::EscalateDispute, dispute_id, &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn log_refusal(
        &self,
        actor: &CommunityMember,
        action: ModeratorAction,
        target: &str,
        error: &PolicyError,
    ) {
        warn!(
            actor = %actor.participant_id,
            action = %action,
            target = %target,
            error = %error,
            "Moderation refused"
        );
        self.log
            .log_moderation_denied(
                &actor.community_id,
                &actor.participant_id,
                action,
                actor.role,
                &error.to_string(),
                self.clock.now(),
            )
            .await;
    }

    // ========================================================================
    // Deadlines
    // ========================================================================

    /// Settle every proposal whose voting has closed and advance every
    /// dispute whose current deadline has lapsed
    pub async fn sweep_deadlines(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        let mut proposal_events = Vec::new();
        let mut dispute_events = Vec::new();

        {
            let mut proposals = self.proposals.write().await;
            for (id, record) in proposals.iter_mut() {
                match record.proposal.settle_if_due(&record.config, now) {
                    Ok(Some(status)) => {
                        report.settled_proposals.push((id.clone(), status));
                        proposal_events.push((id.clone(), record.proposal.community_id.clone(), status));
                    }
                    Ok(None) => {}
                    Err(e) => warn!(proposal_id = %id, error = %e, "Failed to settle proposal"),
                }
            }
        }

        {
            let mut disputes = self.disputes.write().await;
            for (id, dispute) in disputes.iter_mut() {
                if !dispute.is_overdue(now) {
                    continue;
                }
                match self.engine.advance_dispute_state(dispute, DisputeEvent::Tick, now) {
                    Ok(transition) => {
                        report.advanced_disputes.push((id.clone(), transition));
                        dispute_events.push((dispute.clone(), transition));
                    }
                    Err(e) => warn!(dispute_id = %id, error = %e, "Failed to advance dispute"),
                }
            }
        }

        report.settled_proposals.sort_by(|a, b| a.0.cmp(&b.0));
        report.advanced_disputes.sort_by(|a, b| a.0.cmp(&b.0));

        for (id, community_id, status) in proposal_events {
            self.log_proposal_resolved(&id, &community_id, status).await;
        }
        for (dispute, transition) in dispute_events {
            self.log_dispute_transition(&dispute, transition).await;
        }

        if report.is_empty() {
            debug!("Deadline sweep found nothing due");
        } else {
            info!(
                proposals = report.settled_proposals.len(),
                disputes = report.advanced_disputes.len(),
                "Deadline sweep complete"
            );
        }
        report
    }

    async fn log_proposal_resolved(&self, proposal_id: &str, community_id: &str, status: ProposalStatus) {
        let entry = ModerationEntry::new(
            ModerationEventType::ProposalResolved {
                proposal_id: proposal_id.to_string(),
                status,
            },
            ModerationSeverity::Info,
            self.clock.now(),
        )
        .in_community(community_id);
        self.log.log(entry).await;
    }

    async fn log_dispute_transition(&self, dispute: &Dispute, transition: DisputeTransition) {
        if !transition.changed() {
            return;
        }
        let now = self.clock.now();
        let mut entry = ModerationEntry::new(
            ModerationEventType::DisputeTransitioned {
                dispute_id: dispute.id.clone(),
                from: transition.from,
                to: transition.to,
            },
            ModerationSeverity::Info,
            now,
        );
        if let Some(community_id) = &dispute.community_id {
            entry = entry.in_community(community_id);
        }
        self.log.log(entry).await;

        if transition.to == DisputeStatus::Resolved {
            if let Some((participant, sanction)) = dispute.applicable_sanction() {
                let reason = format!("dispute {}", dispute.id);
                self.log
                    .log_sanction(dispute.community_id.as_deref(), participant, sanction, &reason, now)
                    .await;
            }
        }
    }
}

fn unknown(kind: &str, id: &str) -> PolicyError {
    PolicyError::validation(format!("unknown {} {}", kind, id))
}
