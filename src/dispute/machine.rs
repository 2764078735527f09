//! Dispute escalation state machine
//!
//! Every level has its own deadline, measured from the moment the dispute
//! entered that level. A deadline that lapses moves the dispute up one level
//! and the next level's clock starts at the lapsed deadline, so late polling
//! produces the same history as punctual polling.
//!
//! Events are applied atomically: overdue timeouts are processed first, then
//! the event itself. If the event fails, the dispute is left untouched.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::council::{
    majority_credit_adjustment, majority_decision, Council, CouncilSeat, CouncilVote, COUNCIL_SIZE,
};
use super::outcome::{
    check_credit_adjustment, DisputeOutcome, DisputeResolution, DisputeSanction, OutcomeSource,
};
use crate::clock::deadline_reached;
use crate::error::{PolicyError, Result};
use crate::trust::{require_privilege, TierTable, TrustPrivilege, TrustTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    /// Work not done
    NonCompletion,
    Quality,
    /// Hours dispute
    TimeDiscrepancy,
    /// Ghosting
    Communication,
    /// Not as described
    Misrepresentation,
    Behavior,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Level 1: parties trying to resolve
    SelfResolution,
    /// Level 2: mediator assigned
    Mediation,
    /// Level 3: champion panel
    CouncilReview,
    Resolved,
    Expired,
}

impl DisputeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DisputeStatus::Resolved | DisputeStatus::Expired)
    }

    /// Escalation level for open statuses
    pub fn level(&self) -> Option<u8> {
        match self {
            DisputeStatus::SelfResolution => Some(1),
            DisputeStatus::Mediation => Some(2),
            DisputeStatus::CouncilReview => Some(3),
            DisputeStatus::Resolved | DisputeStatus::Expired => None,
        }
    }
}

/// Deadlines and eligibility rules for disputes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputePolicy {
    pub self_resolution_hours: u32,
    pub mediation_hours: u32,
    pub council_hours: u32,
    /// Minimum tier for council members
    pub council_tier: TrustTier,
}

impl Default for DisputePolicy {
    fn default() -> Self {
        Self {
            self_resolution_hours: 48,
            mediation_hours: 5 * 24,
            council_hours: 7 * 24,
            council_tier: TrustTier::Champion,
        }
    }
}

impl DisputePolicy {
    pub fn validate(&self) -> Result<()> {
        if self.self_resolution_hours == 0 || self.mediation_hours == 0 || self.council_hours == 0 {
            return Err(PolicyError::validation("dispute deadlines must be non-zero"));
        }
        Ok(())
    }

    fn self_resolution_window(&self) -> Duration {
        Duration::hours(self.self_resolution_hours as i64)
    }

    fn mediation_window(&self) -> Duration {
        Duration::hours(self.mediation_hours as i64)
    }

    fn council_window(&self) -> Duration {
        Duration::hours(self.council_hours as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Text,
    Image,
    Document,
    Link,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeEvidence {
    pub id: String,
    pub kind: EvidenceKind,
    /// Text or URL
    pub content: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediatorProposal {
    pub summary: String,
    pub resolution: DisputeResolution,
    pub sanction: DisputeSanction,
    #[serde(default)]
    pub credit_adjustment: Option<f64>,
    pub accepted_by_raiser: Option<bool>,
    pub accepted_by_respondent: Option<bool>,
    pub proposed_at: DateTime<Utc>,
}

impl MediatorProposal {
    fn accepted_by_both(&self) -> bool {
        self.accepted_by_raiser == Some(true) && self.accepted_by_respondent == Some(true)
    }
}

/// What a participant claims when raising a dispute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeClaim {
    pub exchange_id: String,
    pub community_id: Option<String>,
    pub raised_by: String,
    pub against_participant: String,
    pub dispute_type: DisputeType,
    pub description: String,
    pub statement: String,
}

/// Inputs that drive the state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisputeEvent {
    /// Respondent's side of the story (level 1)
    Respond { participant_id: String, statement: String },
    SubmitEvidence {
        participant_id: String,
        kind: EvidenceKind,
        content: String,
    },
    /// Parties settled between themselves (level 1)
    Settle {
        resolution: DisputeResolution,
        #[serde(default)]
        credit_adjustment: Option<f64>,
    },
    /// Either party asks for the next level (levels 1 and 2)
    RequestEscalation { participant_id: String },
    /// Raising party drops the claim (levels 1 and 2)
    Withdraw { participant_id: String },
    AssignMediator {
        mediator_id: String,
        mediator_tier: TrustTier,
    },
    ProposeMediation {
        mediator_id: String,
        summary: String,
        resolution: DisputeResolution,
        sanction: DisputeSanction,
        #[serde(default)]
        credit_adjustment: Option<f64>,
    },
    RespondToMediation { participant_id: String, accept: bool },
    SeatCouncil { seats: Vec<CouncilSeat> },
    CastCouncilVote { vote: CouncilVote },
    /// Evaluate deadlines only
    Tick,
}

/// Status change produced by one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeTransition {
    pub from: DisputeStatus,
    pub to: DisputeStatus,
}

impl DisputeTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub exchange_id: String,
    pub community_id: Option<String>,

    pub raised_by: String,
    pub against_participant: String,

    pub dispute_type: DisputeType,
    pub description: String,
    pub evidence: Vec<DisputeEvidence>,

    pub raised_by_statement: String,
    pub respondent_statement: Option<String>,

    pub status: DisputeStatus,
    pub level: u8,

    /// Level 2
    pub mediator_id: Option<String>,
    pub mediator_proposal: Option<MediatorProposal>,

    /// Level 3
    pub council: Option<Council>,
    pub council_votes: Vec<CouncilVote>,

    pub outcome: Option<DisputeOutcome>,

    pub created_at: DateTime<Utc>,
    pub escalated_to_l2_at: Option<DateTime<Utc>>,
    pub escalated_to_l3_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,

    pub self_resolution_deadline: DateTime<Utc>,
    pub mediation_deadline: Option<DateTime<Utc>>,
    pub council_deadline: Option<DateTime<Utc>>,
}

impl Dispute {
    pub fn open(claim: DisputeClaim, policy: &DisputePolicy, now: DateTime<Utc>) -> Result<Self> {
        policy.validate()?;
        if claim.exchange_id.trim().is_empty() {
            return Err(PolicyError::validation("dispute must reference an exchange"));
        }
        if claim.raised_by == claim.against_participant {
            return Err(PolicyError::validation("a participant cannot dispute with themselves"));
        }

        let dispute = Self {
            id: format!(
                "dispute_{}_{}_{}",
                claim.exchange_id,
                claim.raised_by,
                now.timestamp_millis()
            ),
            exchange_id: claim.exchange_id,
            community_id: claim.community_id,
            raised_by: claim.raised_by,
            against_participant: claim.against_participant,
            dispute_type: claim.dispute_type,
            description: claim.description,
            evidence: Vec::new(),
            raised_by_statement: claim.statement,
            respondent_statement: None,
            status: DisputeStatus::SelfResolution,
            level: 1,
            mediator_id: None,
            mediator_proposal: None,
            council: None,
            council_votes: Vec::new(),
            outcome: None,
            created_at: now,
            escalated_to_l2_at: None,
            escalated_to_l3_at: None,
            closed_at: None,
            self_resolution_deadline: now + policy.self_resolution_window(),
            mediation_deadline: None,
            council_deadline: None,
        };

        info!(
            dispute_id = %dispute.id,
            exchange_id = %dispute.exchange_id,
            raised_by = %dispute.raised_by,
            dispute_type = ?dispute.dispute_type,
            "Dispute opened"
        );

        Ok(dispute)
    }

    /// Deadline of the current level, `None` once closed
    pub fn current_deadline(&self) -> Option<DateTime<Utc>> {
        match self.status {
            DisputeStatus::SelfResolution => Some(self.self_resolution_deadline),
            DisputeStatus::Mediation => self.mediation_deadline,
            DisputeStatus::CouncilReview => self.council_deadline,
            DisputeStatus::Resolved | DisputeStatus::Expired => None,
        }
    }

    /// Whether the current level's deadline has been reached at `now`
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.current_deadline()
            .map_or(false, |deadline| deadline_reached(deadline, now))
    }

    fn is_party(&self, participant_id: &str) -> bool {
        participant_id == self.raised_by || participant_id == self.against_participant
    }

    /// Participant and sanction to enforce; only for resolved disputes
    pub fn applicable_sanction(&self) -> Option<(&str, DisputeSanction)> {
        if self.status != DisputeStatus::Resolved {
            return None;
        }
        let outcome = self.outcome.as_ref()?;
        if outcome.sanction.is_none() {
            return None;
        }
        outcome
            .sanctioned_participant
            .as_deref()
            .map(|participant| (participant, outcome.sanction))
    }

    /// Check that status, level, deadlines and outcome agree
    ///
    /// Disputes arriving over the wire are checked before any event is
    /// applied to them.
    pub fn validate(&self) -> Result<()> {
        if self.raised_by == self.against_participant {
            return Err(PolicyError::validation(format!(
                "dispute {} is raised against its own raiser",
                self.id
            )));
        }

        if let Some(level) = self.status.level() {
            if self.level != level {
                return Err(PolicyError::validation(format!(
                    "dispute {} is {:?} but at level {}",
                    self.id, self.status, self.level
                )));
            }
        } else if !(1..=3).contains(&self.level) {
            return Err(PolicyError::validation(format!(
                "dispute {} has unknown level {}",
                self.id, self.level
            )));
        }

        match self.status {
            DisputeStatus::Mediation if self.mediation_deadline.is_none() => {
                return Err(PolicyError::validation(format!(
                    "dispute {} is in mediation without a mediation deadline",
                    self.id
                )));
            }
            DisputeStatus::CouncilReview if self.council_deadline.is_none() => {
                return Err(PolicyError::validation(format!(
                    "dispute {} is in council review without a council deadline",
                    self.id
                )));
            }
            _ => {}
        }

        if self.council.is_some() && self.level < 3 {
            return Err(PolicyError::validation(format!(
                "dispute {} has a council before reaching council review",
                self.id
            )));
        }

        match (&self.outcome, self.status.is_terminal()) {
            (None, true) => Err(PolicyError::validation(format!(
                "dispute {} is {:?} without an outcome",
                self.id, self.status
            ))),
            (Some(_), false) => Err(PolicyError::validation(format!(
                "dispute {} is still open but carries an outcome",
                self.id
            ))),
            (Some(outcome), true) => {
                check_credit_adjustment(outcome.resolution, outcome.credit_adjustment)
            }
            (None, false) => Ok(()),
        }
    }

    /// Apply `event` at `now`
    pub fn advance(
        &mut self,
        event: DisputeEvent,
        policy: &DisputePolicy,
        tiers: &TierTable,
        now: DateTime<Utc>,
    ) -> Result<DisputeTransition> {
        self.commit(policy, now, |next| next.apply_event(event, policy, tiers, now))
    }

    /// Move the dispute up one level on a moderator's authority
    ///
    /// Authorization for `EscalateDispute` is checked by the caller; here
    /// the moderator only has to be outside the dispute.
    pub(crate) fn escalate_by_moderator(
        &mut self,
        moderator_id: &str,
        policy: &DisputePolicy,
        now: DateTime<Utc>,
    ) -> Result<DisputeTransition> {
        self.commit(policy, now, |next| {
            next.expect_status(
                &[DisputeStatus::SelfResolution, DisputeStatus::Mediation],
                "escalate",
            )?;
            if next.is_party(moderator_id) {
                return Err(PolicyError::denied(format!(
                    "{} cannot moderate their own dispute {}",
                    moderator_id, next.id
                )));
            }
            next.escalate(policy, now);
            Ok(())
        })
    }

    /// Timeouts first, then `apply`, all on a copy that replaces `self` on success
    fn commit<F>(
        &mut self,
        policy: &DisputePolicy,
        now: DateTime<Utc>,
        apply: F,
    ) -> Result<DisputeTransition>
    where
        F: FnOnce(&mut Dispute) -> Result<()>,
    {
        self.validate()?;
        let from = self.status;
        if from.is_terminal() {
            return Err(PolicyError::transition(format!(
                "dispute {} is already {:?}",
                self.id, from
            )));
        }

        let mut next = self.clone();
        next.apply_timeouts(policy, now);
        apply(&mut next)?;
        *self = next;

        let transition = DisputeTransition {
            from,
            to: self.status,
        };
        if transition.changed() {
            info!(
                dispute_id = %self.id,
                from = ?transition.from,
                to = ?transition.to,
                level = self.level,
                "Dispute transitioned"
            );
        }
        Ok(transition)
    }

    fn apply_timeouts(&mut self, policy: &DisputePolicy, now: DateTime<Utc>) {
        while let Some(deadline) = self.current_deadline() {
            if !deadline_reached(deadline, now) {
                break;
            }
            debug!(dispute_id = %self.id, status = ?self.status, %deadline, "Dispute deadline lapsed");
            match self.status {
                DisputeStatus::SelfResolution => self.enter_mediation(policy, deadline),
                DisputeStatus::Mediation => self.enter_council_review(policy, deadline),
                DisputeStatus::CouncilReview => self.close(
                    DisputeStatus::Expired,
                    DisputeOutcome::unsanctioned(
                        DisputeResolution::Voided,
                        OutcomeSource::Timeout,
                        deadline,
                    ),
                    deadline,
                ),
                DisputeStatus::Resolved | DisputeStatus::Expired => break,
            }
        }
    }

    fn apply_event(
        &mut self,
        event: DisputeEvent,
        policy: &DisputePolicy,
        tiers: &TierTable,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match event {
            DisputeEvent::Tick => Ok(()),

            DisputeEvent::Respond {
                participant_id,
                statement,
            } => {
                self.expect_status(&[DisputeStatus::SelfResolution], "respond")?;
                if participant_id != self.against_participant {
                    return Err(PolicyError::denied(format!(
                        "only {} can respond to dispute {}",
                        self.against_participant, self.id
                    )));
                }
                self.respondent_statement = Some(statement);
                Ok(())
            }

            DisputeEvent::SubmitEvidence {
                participant_id,
                kind,
                content,
            } => {
                if !self.is_party(&participant_id) {
                    return Err(PolicyError::denied(format!(
                        "{} is not a party to dispute {}",
                        participant_id, self.id
                    )));
                }
                self.evidence.push(DisputeEvidence {
                    id: format!("evidence_{}_{}", self.id, self.evidence.len() + 1),
                    kind,
                    content,
                    submitted_by: participant_id,
                    submitted_at: now,
                });
                Ok(())
            }

            DisputeEvent::Settle {
                resolution,
                credit_adjustment,
            } => {
                self.expect_status(&[DisputeStatus::SelfResolution], "settle")?;
                check_credit_adjustment(resolution, credit_adjustment)?;
                self.close(
                    DisputeStatus::Resolved,
                    DisputeOutcome::unsanctioned(resolution, OutcomeSource::Settlement, now)
                        .with_credit_adjustment(credit_adjustment),
                    now,
                );
                Ok(())
            }

            DisputeEvent::RequestEscalation { participant_id } => {
                self.expect_status(
                    &[DisputeStatus::SelfResolution, DisputeStatus::Mediation],
                    "escalate",
                )?;
                if !self.is_party(&participant_id) {
                    return Err(PolicyError::denied(format!(
                        "{} is not a party to dispute {}",
                        participant_id, self.id
                    )));
                }
                self.escalate(policy, now);
                Ok(())
            }

            DisputeEvent::Withdraw { participant_id } => {
                self.expect_status(
                    &[DisputeStatus::SelfResolution, DisputeStatus::Mediation],
                    "withdraw",
                )?;
                if participant_id != self.raised_by {
                    return Err(PolicyError::denied(format!(
                        "only {} can withdraw dispute {}",
                        self.raised_by, self.id
                    )));
                }
                self.close(
                    DisputeStatus::Resolved,
                    DisputeOutcome::unsanctioned(
                        DisputeResolution::FullCredit,
                        OutcomeSource::Withdrawal,
                        now,
                    ),
                    now,
                );
                Ok(())
            }

            DisputeEvent::AssignMediator {
                mediator_id,
                mediator_tier,
            } => {
                self.expect_status(&[DisputeStatus::Mediation], "assign a mediator")?;
                if self.is_party(&mediator_id) {
                    return Err(PolicyError::validation(format!(
                        "{} cannot mediate their own dispute",
                        mediator_id
                    )));
                }
                if self.mediator_proposal.is_some() {
                    return Err(PolicyError::transition(format!(
                        "dispute {} already has a mediator proposal",
                        self.id
                    )));
                }
                require_privilege(tiers, mediator_tier, TrustPrivilege::DisputeMediation)?;
                self.mediator_id = Some(mediator_id);
                Ok(())
            }

            DisputeEvent::ProposeMediation {
                mediator_id,
                summary,
                resolution,
                sanction,
                credit_adjustment,
            } => {
                self.expect_status(&[DisputeStatus::Mediation], "propose mediation")?;
                check_credit_adjustment(resolution, credit_adjustment)?;
                if self.mediator_id.as_deref() != Some(mediator_id.as_str()) {
                    return Err(PolicyError::denied(format!(
                        "{} is not the mediator of dispute {}",
                        mediator_id, self.id
                    )));
                }
                self.mediator_proposal = Some(MediatorProposal {
                    summary,
                    resolution,
                    sanction,
                    credit_adjustment,
                    accepted_by_raiser: None,
                    accepted_by_respondent: None,
                    proposed_at: now,
                });
                Ok(())
            }

            DisputeEvent::RespondToMediation {
                participant_id,
                accept,
            } => {
                self.expect_status(&[DisputeStatus::Mediation], "respond to mediation")?;
                let is_raiser = participant_id == self.raised_by;
                if !self.is_party(&participant_id) {
                    return Err(PolicyError::denied(format!(
                        "{} is not a party to dispute {}",
                        participant_id, self.id
                    )));
                }
                let proposal = self.mediator_proposal.as_mut().ok_or_else(|| {
                    PolicyError::transition("no mediator proposal to respond to")
                })?;
                if is_raiser {
                    proposal.accepted_by_raiser = Some(accept);
                } else {
                    proposal.accepted_by_respondent = Some(accept);
                }

                if !accept {
                    self.enter_council_review(policy, now);
                } else if proposal.accepted_by_both() {
                    let (resolution, sanction) = (proposal.resolution, proposal.sanction);
                    let credit_adjustment = proposal.credit_adjustment;
                    let outcome = DisputeOutcome::sanctioned(
                        resolution,
                        sanction,
                        &self.against_participant,
                        OutcomeSource::Mediation,
                        now,
                    )
                    .with_credit_adjustment(credit_adjustment);
                    self.close(DisputeStatus::Resolved, outcome, now);
                }
                Ok(())
            }

            DisputeEvent::SeatCouncil { seats } => {
                self.expect_status(&[DisputeStatus::CouncilReview], "seat a council")?;
                if self.council.is_some() {
                    return Err(PolicyError::transition(format!(
                        "dispute {} already has a council",
                        self.id
                    )));
                }
                let council = Council::new(&seats, policy.council_tier)?;
                if let Some(party) = council.members().iter().find(|m| self.is_party(m)) {
                    return Err(PolicyError::InvalidCouncil(format!(
                        "{} is a party to dispute {}",
                        party, self.id
                    )));
                }
                self.council = Some(council);
                Ok(())
            }

            DisputeEvent::CastCouncilVote { vote } => {
                self.expect_status(&[DisputeStatus::CouncilReview], "cast a council vote")?;
                let council = self.council.as_ref().ok_or_else(|| {
                    PolicyError::transition("council has not been seated")
                })?;
                if council.members().len() != COUNCIL_SIZE {
                    return Err(PolicyError::InvalidCouncil(format!(
                        "dispute {} has a council of {}, expected {}",
                        self.id,
                        council.members().len(),
                        COUNCIL_SIZE
                    )));
                }
                if !council.contains(&vote.champion_id) {
                    return Err(PolicyError::denied(format!(
                        "{} is not on the council for dispute {}",
                        vote.champion_id, self.id
                    )));
                }
                if self
                    .council_votes
                    .iter()
                    .any(|v| v.champion_id == vote.champion_id)
                {
                    return Err(PolicyError::validation(format!(
                        "{} already voted on dispute {}",
                        vote.champion_id, self.id
                    )));
                }
                check_credit_adjustment(vote.resolution, vote.credit_adjustment)?;
                self.council_votes.push(vote);

                if let Some((resolution, sanction)) = majority_decision(&self.council_votes) {
                    let credit_adjustment =
                        majority_credit_adjustment(&self.council_votes, (resolution, sanction));
                    let outcome = DisputeOutcome::sanctioned(
                        resolution,
                        sanction,
                        &self.against_participant,
                        OutcomeSource::Council,
                        now,
                    )
                    .with_credit_adjustment(credit_adjustment);
                    self.close(DisputeStatus::Resolved, outcome, now);
                } else if self.council_votes.len() == COUNCIL_SIZE {
                    // Three-way split: no majority can form any more
                    self.close(
                        DisputeStatus::Expired,
                        DisputeOutcome::unsanctioned(
                            DisputeResolution::Voided,
                            OutcomeSource::Council,
                            now,
                        ),
                        now,
                    );
                }
                Ok(())
            }
        }
    }

    fn expect_status(&self, allowed: &[DisputeStatus], what: &str) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(PolicyError::transition(format!(
                "cannot {} while dispute {} is in {:?}",
                what, self.id, self.status
            )))
        }
    }

    fn escalate(&mut self, policy: &DisputePolicy, at: DateTime<Utc>) {
        match self.status {
            DisputeStatus::SelfResolution => self.enter_mediation(policy, at),
            DisputeStatus::Mediation => self.enter_council_review(policy, at),
            _ => {}
        }
    }

    fn enter_mediation(&mut self, policy: &DisputePolicy, at: DateTime<Utc>) {
        self.status = DisputeStatus::Mediation;
        self.level = 2;
        self.escalated_to_l2_at = Some(at);
        self.mediation_deadline = Some(at + policy.mediation_window());
    }

    fn enter_council_review(&mut self, policy: &DisputePolicy, at: DateTime<Utc>) {
        self.status = DisputeStatus::CouncilReview;
        self.level = 3;
        self.escalated_to_l3_at = Some(at);
        self.council_deadline = Some(at + policy.council_window());
    }

    fn close(&mut self, status: DisputeStatus, outcome: DisputeOutcome, at: DateTime<Utc>) {
        self.status = status;
        self.outcome = Some(outcome);
        self.closed_at = Some(at);
    }
}

/// Apply `event` to `dispute` at `now`
pub fn advance_dispute_state(
    dispute: &mut Dispute,
    event: DisputeEvent,
    policy: &DisputePolicy,
    tiers: &TierTable,
    now: DateTime<Utc>,
) -> Result<DisputeTransition> {
    dispute.advance(event, policy, tiers, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn claim() -> DisputeClaim {
        DisputeClaim {
            exchange_id: "ex1".to_string(),
            community_id: Some("c1".to_string()),
            raised_by: "receiver".to_string(),
            against_participant: "provider".to_string(),
            dispute_type: DisputeType::NonCompletion,
            description: "Garden work never happened".to_string(),
            statement: "Provider did not show up".to_string(),
        }
    }

    fn open() -> Dispute {
        Dispute::open(claim(), &DisputePolicy::default(), t0()).unwrap()
    }

    fn step(d: &mut Dispute, event: DisputeEvent, now: DateTime<Utc>) -> Result<DisputeTransition> {
        d.advance(event, &DisputePolicy::default(), &TierTable::default(), now)
    }

    fn seats() -> Vec<CouncilSeat> {
        ["c1", "c2", "c3"]
            .iter()
            .map(|id| CouncilSeat::new(id, TrustTier::Champion))
            .collect()
    }

    fn council_vote(id: &str, resolution: DisputeResolution, sanction: DisputeSanction) -> DisputeEvent {
        DisputeEvent::CastCouncilVote {
            vote: CouncilVote {
                champion_id: id.to_string(),
                resolution,
                sanction,
                credit_adjustment: None,
                reasoning: "reviewed evidence".to_string(),
                voted_at: t0(),
            },
        }
    }

    #[test]
    fn test_reaches_mediation_exactly_at_48h() {
        let mut d = open();
        let just_before = t0() + Duration::hours(48) - Duration::seconds(1);
        assert!(!step(&mut d, DisputeEvent::Tick, just_before).unwrap().changed());
        assert_eq!(d.status, DisputeStatus::SelfResolution);

        let t = step(&mut d, DisputeEvent::Tick, t0() + Duration::hours(48)).unwrap();
        assert_eq!(t.to, DisputeStatus::Mediation);
        assert_eq!(d.level, 2);
        assert_eq!(d.escalated_to_l2_at, Some(t0() + Duration::hours(48)));
        assert_eq!(d.mediation_deadline, Some(t0() + Duration::hours(48) + Duration::days(5)));
    }

    #[test]
    fn test_late_tick_cascades_to_expired() {
        let mut d = open();
        let t = step(&mut d, DisputeEvent::Tick, t0() + Duration::days(30)).unwrap();
        assert_eq!(t.from, DisputeStatus::SelfResolution);
        assert_eq!(t.to, DisputeStatus::Expired);

        let outcome = d.outcome.as_ref().unwrap();
        assert_eq!(outcome.resolution, DisputeResolution::Voided);
        assert_eq!(outcome.sanction, DisputeSanction::None);
        assert_eq!(d.closed_at, Some(t0() + Duration::hours(48) + Duration::days(12)));
        assert!(d.applicable_sanction().is_none());
    }

    #[test]
    fn test_settlement_at_level_one() {
        let mut d = open();
        step(
            &mut d,
            DisputeEvent::Respond {
                participant_id: "provider".to_string(),
                statement: "Rain delay".to_string(),
            },
            t0(),
        )
        .unwrap();
        let t = step(
            &mut d,
            DisputeEvent::Settle {
                resolution: DisputeResolution::PartialCredit,
                credit_adjustment: Some(1.5),
            },
            t0() + Duration::hours(1),
        )
        .unwrap();
        assert_eq!(t.to, DisputeStatus::Resolved);
        assert_eq!(d.outcome.as_ref().unwrap().credit_adjustment, Some(1.5));
        assert!(step(&mut d, DisputeEvent::Tick, t0() + Duration::days(10)).is_err());
    }

    #[test]
    fn test_only_respondent_responds() {
        let mut d = open();
        let err = step(
            &mut d,
            DisputeEvent::Respond {
                participant_id: "receiver".to_string(),
                statement: "x".to_string(),
            },
            t0(),
        )
        .unwrap_err();
        assert!(err.is_denial());
    }

    #[test]
    fn test_mediation_accepted_by_both() {
        let mut d = open();
        step(
            &mut d,
            DisputeEvent::RequestEscalation { participant_id: "provider".to_string() },
            t0(),
        )
        .unwrap();
        assert_eq!(d.status, DisputeStatus::Mediation);

        let err = step(
            &mut d,
            DisputeEvent::AssignMediator {
                mediator_id: "m1".to_string(),
                mediator_tier: TrustTier::Trusted,
            },
            t0(),
        )
        .unwrap_err();
        assert!(err.is_denial());

        step(
            &mut d,
            DisputeEvent::AssignMediator {
                mediator_id: "m1".to_string(),
                mediator_tier: TrustTier::Verified,
            },
            t0(),
        )
        .unwrap();
        step(
            &mut d,
            DisputeEvent::ProposeMediation {
                mediator_id: "m1".to_string(),
                summary: "Half the hours".to_string(),
                resolution: DisputeResolution::PartialCredit,
                sanction: DisputeSanction::Warning,
                credit_adjustment: Some(2.0),
            },
            t0(),
        )
        .unwrap();
        step(
            &mut d,
            DisputeEvent::RespondToMediation { participant_id: "receiver".to_string(), accept: true },
            t0(),
        )
        .unwrap();
        assert_eq!(d.status, DisputeStatus::Mediation);
        step(
            &mut d,
            DisputeEvent::RespondToMediation { participant_id: "provider".to_string(), accept: true },
            t0(),
        )
        .unwrap();

        assert_eq!(d.status, DisputeStatus::Resolved);
        assert_eq!(d.applicable_sanction(), Some(("provider", DisputeSanction::Warning)));
        assert_eq!(d.outcome.as_ref().unwrap().credit_adjustment, Some(2.0));
    }

    #[test]
    fn test_rejected_mediation_goes_to_council() {
        let mut d = open();
        step(&mut d, DisputeEvent::Tick, t0() + Duration::hours(48)).unwrap();
        step(
            &mut d,
            DisputeEvent::AssignMediator {
                mediator_id: "m1".to_string(),
                mediator_tier: TrustTier::Champion,
            },
            t0() + Duration::hours(49),
        )
        .unwrap();
        step(
            &mut d,
            DisputeEvent::ProposeMediation {
                mediator_id: "m1".to_string(),
                summary: "Void it".to_string(),
                resolution: DisputeResolution::Voided,
                sanction: DisputeSanction::None,
                credit_adjustment: None,
            },
            t0() + Duration::hours(50),
        )
        .unwrap();
        let t = step(
            &mut d,
            DisputeEvent::RespondToMediation { participant_id: "receiver".to_string(), accept: false },
            t0() + Duration::hours(51),
        )
        .unwrap();
        assert_eq!(t.to, DisputeStatus::CouncilReview);
        assert_eq!(d.council_deadline, Some(t0() + Duration::hours(51) + Duration::days(7)));
    }

    #[test]
    fn test_council_majority_resolves() {
        use DisputeResolution::*;

        let mut d = open();
        step(&mut d, DisputeEvent::Tick, t0() + Duration::days(8)).unwrap();
        assert_eq!(d.status, DisputeStatus::CouncilReview);

        let now = t0() + Duration::days(8);
        assert!(matches!(
            step(&mut d, council_vote("c1", FullCredit, DisputeSanction::None), now),
            Err(PolicyError::InvalidTransition(_))
        ));

        step(&mut d, DisputeEvent::SeatCouncil { seats: seats() }, now).unwrap();
        step(&mut d, council_vote("c1", FullCredit, DisputeSanction::None), now).unwrap();
        step(&mut d, council_vote("c2", PartialCredit, DisputeSanction::Warning), now).unwrap();
        assert_eq!(d.status, DisputeStatus::CouncilReview);
        step(&mut d, council_vote("c3", FullCredit, DisputeSanction::None), now).unwrap();

        assert_eq!(d.status, DisputeStatus::Resolved);
        let outcome = d.outcome.as_ref().unwrap();
        assert_eq!((outcome.resolution, outcome.sanction), (FullCredit, DisputeSanction::None));
        assert!(d.applicable_sanction().is_none());
    }

    #[test]
    fn test_council_split_expires_voided() {
        use DisputeResolution::*;

        let mut d = open();
        let now = t0() + Duration::days(8);
        step(&mut d, DisputeEvent::Tick, now).unwrap();
        step(&mut d, DisputeEvent::SeatCouncil { seats: seats() }, now).unwrap();
        step(&mut d, council_vote("c1", FullCredit, DisputeSanction::None), now).unwrap();
        step(&mut d, council_vote("c2", PartialCredit, DisputeSanction::None), now).unwrap();
        step(&mut d, council_vote("c3", Voided, DisputeSanction::None), now).unwrap();

        assert_eq!(d.status, DisputeStatus::Expired);
        assert_eq!(d.outcome.as_ref().unwrap().resolution, Voided);
    }

    #[test]
    fn test_council_validation() {
        let mut d = open();
        let now = t0() + Duration::days(8);
        step(&mut d, DisputeEvent::Tick, now).unwrap();

        let mut two = seats();
        two.pop();
        assert!(matches!(
            step(&mut d, DisputeEvent::SeatCouncil { seats: two }, now),
            Err(PolicyError::InvalidCouncil(_))
        ));

        let mut four = seats();
        four.push(CouncilSeat::new("c4", TrustTier::Champion));
        assert!(matches!(
            step(&mut d, DisputeEvent::SeatCouncil { seats: four }, now),
            Err(PolicyError::InvalidCouncil(_))
        ));

        let mut with_party = seats();
        with_party[0] = CouncilSeat::new("provider", TrustTier::Champion);
        assert!(matches!(
            step(&mut d, DisputeEvent::SeatCouncil { seats: with_party }, now),
            Err(PolicyError::InvalidCouncil(_))
        ));
        assert!(d.council.is_none());
    }

    #[test]
    fn test_council_vote_rules() {
        use DisputeResolution::*;

        let mut d = open();
        let now = t0() + Duration::days(8);
        step(&mut d, DisputeEvent::Tick, now).unwrap();
        step(&mut d, DisputeEvent::SeatCouncil { seats: seats() }, now).unwrap();

        assert!(step(&mut d, council_vote("outsider", Voided, DisputeSanction::None), now)
            .unwrap_err()
            .is_denial());

        step(&mut d, council_vote("c1", Voided, DisputeSanction::None), now).unwrap();
        assert!(matches!(
            step(&mut d, council_vote("c1", FullCredit, DisputeSanction::None), now),
            Err(PolicyError::Validation(_))
        ));
        assert_eq!(d.council_votes.len(), 1);
    }

    #[test]
    fn test_failed_event_leaves_dispute_untouched() {
        let mut d = open();
        let before = d.clone();
        // Deadline lapsed, but the event itself is invalid
        let settle = DisputeEvent::Settle {
            resolution: DisputeResolution::Voided,
            credit_adjustment: None,
        };
        let result = step(&mut d, settle, t0() + Duration::days(3));
        assert!(result.is_err());
        assert_eq!(d, before);
    }

    #[test]
    fn test_withdraw_only_by_raiser() {
        let mut d = open();
        assert!(step(&mut d, DisputeEvent::Withdraw { participant_id: "provider".to_string() }, t0())
            .unwrap_err()
            .is_denial());
        let t = step(&mut d, DisputeEvent::Withdraw { participant_id: "receiver".to_string() }, t0())
            .unwrap();
        assert_eq!(t.to, DisputeStatus::Resolved);
        assert_eq!(d.outcome.as_ref().unwrap().source, OutcomeSource::Withdrawal);
    }

    #[test]
    fn test_open_validation() {
        let mut c = claim();
        c.against_participant = c.raised_by.clone();
        assert!(matches!(
            Dispute::open(c, &DisputePolicy::default(), t0()),
            Err(PolicyError::Validation(_))
        ));
    }

    #[test]
    fn test_ids_distinguish_raisers() {
        let first = open();
        let mut counter = claim();
        counter.raised_by = "provider".to_string();
        counter.against_participant = "receiver".to_string();
        let second = Dispute::open(counter, &DisputePolicy::default(), t0()).unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_inconsistent_dispute_is_rejected() {
        let mut level_mismatch = open();
        level_mismatch.status = DisputeStatus::CouncilReview;
        level_mismatch.council_deadline = Some(t0() + Duration::days(7));

        let mut no_mediation_deadline = open();
        no_mediation_deadline.status = DisputeStatus::Mediation;
        no_mediation_deadline.level = 2;

        let mut resolved_without_outcome = open();
        resolved_without_outcome.status = DisputeStatus::Resolved;

        let mut open_with_outcome = open();
        open_with_outcome.outcome = Some(DisputeOutcome::unsanctioned(
            DisputeResolution::FullCredit,
            OutcomeSource::Settlement,
            t0(),
        ));

        let mut early_council = open();
        early_council.council = Some(Council::new(&seats(), TrustTier::Champion).unwrap());

        for mut d in [
            level_mismatch,
            no_mediation_deadline,
            resolved_without_outcome,
            open_with_outcome,
            early_council,
        ] {
            let before = d.clone();
            assert!(matches!(
                step(&mut d, DisputeEvent::Tick, t0()),
                Err(PolicyError::Validation(_))
            ));
            assert_eq!(d, before);
        }
    }

    #[test]
    fn test_credit_adjustment_needs_partial_credit() {
        let mut d = open();
        let settle = DisputeEvent::Settle {
            resolution: DisputeResolution::FullCredit,
            credit_adjustment: Some(3.0),
        };
        assert!(matches!(step(&mut d, settle, t0()), Err(PolicyError::Validation(_))));
        assert_eq!(d.status, DisputeStatus::SelfResolution);

        let settle = DisputeEvent::Settle {
            resolution: DisputeResolution::PartialCredit,
            credit_adjustment: Some(-3.0),
        };
        assert!(step(&mut d, settle, t0()).is_err());
    }

    #[test]
    fn test_council_credit_adjustment_is_averaged() {
        use DisputeResolution::*;

        let mut d = open();
        let now = t0() + Duration::days(8);
        step(&mut d, DisputeEvent::Tick, now).unwrap();
        step(&mut d, DisputeEvent::SeatCouncil { seats: seats() }, now).unwrap();

        for (id, amount) in [("c1", 2.0), ("c2", 4.0)] {
            let DisputeEvent::CastCouncilVote { mut vote } =
                council_vote(id, PartialCredit, DisputeSanction::None)
            else {
                unreachable!()
            };
            vote.credit_adjustment = Some(amount);
            step(&mut d, DisputeEvent::CastCouncilVote { vote }, now).unwrap();
        }

        let outcome = d.outcome.as_ref().unwrap();
        assert_eq!(outcome.resolution, PartialCredit);
        assert_eq!(outcome.credit_adjustment, Some(3.0));
    }

    #[test]
    fn test_moderator_escalation() {
        let policy = DisputePolicy::default();
        let mut d = open();

        assert!(d
            .escalate_by_moderator("provider", &policy, t0())
            .unwrap_err()
            .is_denial());

        let t = d.escalate_by_moderator("mod1", &policy, t0()).unwrap();
        assert_eq!(t.to, DisputeStatus::Mediation);
        d.escalate_by_moderator("mod1", &policy, t0()).unwrap();
        assert_eq!(d.status, DisputeStatus::CouncilReview);
        assert_eq!(d.level, 3);

        assert!(matches!(
            d.escalate_by_moderator("mod1", &policy, t0()),
            Err(PolicyError::InvalidTransition(_))
        ));
    }
}
