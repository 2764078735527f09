//! Proposals and voting
//!
//! Ballots are kept per voter so a second vote replaces the first instead
//! of being counted twice. Tallies are always derived from the ballots.
//!
//! Resolution rule:
//!
//! ```text
//! participation = (for + against + abstain) / total_eligible_voters
//! participation <  quorum  → expired   (only once voting has closed)
//! for / (for + against) >= approval_threshold → passed, else rejected
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::config::{DecisionType, GovernanceConfig};
use crate::community::CommunityMember;
use crate::error::{PolicyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Active,
    Passed,
    Rejected,
    Expired,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: String,
    pub participant_id: String,
    pub vote: VoteChoice,
    pub voted_at: DateTime<Utc>,
}

/// Counts derived from the ballots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub votes_for: u32,
    pub votes_against: u32,
    pub votes_abstain: u32,
}

impl Tally {
    pub fn total(&self) -> u32 {
        self.votes_for + self.votes_against + self.votes_abstain
    }

    pub fn participation_rate(&self, total_eligible_voters: u32) -> f64 {
        if total_eligible_voters == 0 {
            return 0.0;
        }
        self.total() as f64 / total_eligible_voters as f64
    }

    /// Share of `for` among decisive votes; abstentions are excluded.
    /// `None` when nobody voted for or against.
    pub fn approval_ratio(&self) -> Option<f64> {
        let decisive = self.votes_for + self.votes_against;
        if decisive == 0 {
            return None;
        }
        Some(self.votes_for as f64 / decisive as f64)
    }
}

/// Caller-supplied content of a new proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub community_id: String,
    pub decision_type: DecisionType,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub community_id: String,
    pub decision_type: DecisionType,
    pub title: String,
    pub description: String,
    pub proposed_by: String,

    pub status: ProposalStatus,
    /// One ballot per participant, keyed by participant id
    pub ballots: BTreeMap<String, Vote>,
    pub total_eligible_voters: u32,

    pub created_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
}

/// Outcome of a vote submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote: VoteChoice,
    /// Earlier choice this vote replaced
    pub replaced: Option<VoteChoice>,
}

impl Proposal {
    /// Open a proposal for a decision that requires a vote
    pub fn open(
        config: &GovernanceConfig,
        proposer: &CommunityMember,
        draft: ProposalDraft,
        total_eligible_voters: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        config.validate()?;

        if proposer.community_id != draft.community_id {
            return Err(PolicyError::validation(format!(
                "{} is not a member of {}",
                proposer.participant_id, draft.community_id
            )));
        }
        if draft.title.trim().is_empty() {
            return Err(PolicyError::validation("proposal title cannot be empty"));
        }
        if total_eligible_voters == 0 {
            return Err(PolicyError::validation("proposal needs at least one eligible voter"));
        }
        if !config.requires_vote(draft.decision_type) {
            return Err(PolicyError::validation(format!(
                "{} does not require a vote in this community",
                draft.decision_type
            )));
        }
        if !config.can_propose(proposer) {
            return Err(PolicyError::denied(format!(
                "{} ({}, {}) may not propose",
                proposer.participant_id, proposer.role, proposer.standing
            )));
        }

        let ends_at = now + Duration::hours(config.voting_period_hours as i64);
        let mut proposal = Self {
            id: String::new(),
            community_id: draft.community_id,
            decision_type: draft.decision_type,
            title: draft.title,
            description: draft.description,
            proposed_by: proposer.participant_id.clone(),
            status: ProposalStatus::Active,
            ballots: BTreeMap::new(),
            total_eligible_voters,
            created_at: now,
            ends_at,
            resolved_at: None,
            executed_at: None,
        };
        proposal.id = proposal.calculate_id();

        info!(
            proposal_id = %proposal.id,
            community = %proposal.community_id,
            decision = %proposal.decision_type,
            ends_at = %proposal.ends_at,
            "Proposal opened"
        );

        Ok(proposal)
    }

    /// Content hash identifying the proposal
    pub fn calculate_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.community_id.as_bytes());
        hasher.update(self.decision_type.as_str().as_bytes());
        hasher.update(self.title.as_bytes());
        hasher.update(self.proposed_by.as_bytes());
        hasher.update(self.created_at.timestamp_millis().to_le_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn tally(&self) -> Tally {
        self.ballots.values().fold(Tally::default(), |mut tally, ballot| {
            match ballot.vote {
                VoteChoice::For => tally.votes_for += 1,
                VoteChoice::Against => tally.votes_against += 1,
                VoteChoice::Abstain => tally.votes_abstain += 1,
            }
            tally
        })
    }

    /// Voting closes once the clock is strictly past `ends_at`
    pub fn voting_closed(&self, now: DateTime<Utc>) -> bool {
        now > self.ends_at
    }

    pub fn quorum_reached(&self, config: &GovernanceConfig) -> bool {
        self.tally().participation_rate(self.total_eligible_voters) >= config.quorum_percentage
    }

    /// Record `voter`'s choice, replacing any earlier ballot of theirs
    pub fn cast_vote(
        &mut self,
        config: &GovernanceConfig,
        voter: &CommunityMember,
        choice: VoteChoice,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt> {
        config.validate()?;
        if self.status.is_terminal() {
            return Err(PolicyError::transition(format!(
                "proposal {} is already {:?}",
                self.id, self.status
            )));
        }
        if self.voting_closed(now) {
            return Err(PolicyError::transition(format!(
                "voting on proposal {} closed at {}",
                self.id, self.ends_at
            )));
        }
        if voter.community_id != self.community_id {
            return Err(PolicyError::validation(format!(
                "{} is not a member of {}",
                voter.participant_id, self.community_id
            )));
        }
        if !config.can_vote(voter) {
            debug!(
                proposal_id = %self.id,
                voter = %voter.participant_id,
                role = %voter.role,
                "Ineligible vote rejected"
            );
            return Err(PolicyError::denied(format!(
                "{} ({}, {}) may not vote",
                voter.participant_id, voter.role, voter.standing
            )));
        }
        let is_new = !self.ballots.contains_key(&voter.participant_id);
        if is_new && self.ballots.len() as u32 >= self.total_eligible_voters {
            return Err(PolicyError::validation(format!(
                "proposal {} already has a ballot from each of its {} eligible voters",
                self.id, self.total_eligible_voters
            )));
        }

        let ballot = Vote {
            proposal_id: self.id.clone(),
            participant_id: voter.participant_id.clone(),
            vote: choice,
            voted_at: now,
        };
        let replaced = self
            .ballots
            .insert(voter.participant_id.clone(), ballot)
            .map(|previous| previous.vote);

        debug!(
            proposal_id = %self.id,
            voter = %voter.participant_id,
            vote = ?choice,
            replaced = ?replaced,
            "Vote recorded"
        );

        Ok(VoteReceipt {
            vote: choice,
            replaced,
        })
    }

    /// Resolve the proposal from its current tally.
    ///
    /// With quorum met the proposal passes or is rejected at any time. With
    /// quorum unmet it expires once voting has closed; before that the
    /// request is an invalid transition.
    pub fn resolve(&mut self, config: &GovernanceConfig, now: DateTime<Utc>) -> Result<ProposalStatus> {
        config.validate()?;
        if self.status.is_terminal() {
            return Err(PolicyError::transition(format!(
                "proposal {} is already {:?}",
                self.id, self.status
            )));
        }

        let tally = self.tally();
        let participation = tally.participation_rate(self.total_eligible_voters);

        let status = if participation < config.quorum_percentage {
            if !self.voting_closed(now) {
                return Err(PolicyError::transition(format!(
                    "proposal {} has {:.2} participation, below quorum {:.2}, and is open until {}",
                    self.id, participation, config.quorum_percentage, self.ends_at
                )));
            }
            ProposalStatus::Expired
        } else {
            match tally.approval_ratio() {
                Some(ratio) if ratio >= config.approval_threshold => ProposalStatus::Passed,
                _ => ProposalStatus::Rejected,
            }
        };

        self.status = status;
        self.resolved_at = Some(now);

        info!(
            proposal_id = %self.id,
            status = ?status,
            votes_for = tally.votes_for,
            votes_against = tally.votes_against,
            votes_abstain = tally.votes_abstain,
            participation = participation,
            "Proposal resolved"
        );

        Ok(status)
    }

    /// Resolve if voting has closed; `None` while still open or already resolved
    pub fn settle_if_due(
        &mut self,
        config: &GovernanceConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<ProposalStatus>> {
        if self.status.is_terminal() || !self.voting_closed(now) {
            return Ok(None);
        }
        self.resolve(config, now).map(Some)
    }

    /// Record that a passed proposal has been carried out
    pub fn mark_executed(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != ProposalStatus::Passed {
            return Err(PolicyError::transition(format!(
                "only passed proposals can be executed, {} is {:?}",
                self.id, self.status
            )));
        }
        if self.executed_at.is_some() {
            return Err(PolicyError::transition(format!(
                "proposal {} already executed",
                self.id
            )));
        }
        self.executed_at = Some(now);
        Ok(())
    }
}

/// Resolve `proposal` under `config` at `now`
pub fn resolve_proposal(
    proposal: &mut Proposal,
    config: &GovernanceConfig,
    now: DateTime<Utc>,
) -> Result<ProposalStatus> {
    proposal.resolve(config, now)
}
