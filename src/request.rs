//! JSON evaluation requests
//!
//! One request in, one response out. Policy outcomes (denials, invalid
//! transitions) are reported inside the response; only unreadable input is
//! an error for the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::clock::Clock;
use crate::community::{Authorization, CommunityMember, ModeratorAction};
use crate::dispute::{Dispute, DisputeEvent, DisputeTransition};
use crate::engine::PolicyEngine;
use crate::error::PolicyError;
use crate::governance::{GovernanceConfig, Proposal, ProposalStatus};
use crate::trust::{ParticipantStats, TrustPrivilege, TrustTier};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EvaluationRequest {
    ClassifyTier {
        stats: ParticipantStats,
    },
    PrivilegesFor {
        tier: TrustTier,
    },
    HasPrivilege {
        tier: TrustTier,
        privilege: TrustPrivilege,
    },
    Authorize {
        member: CommunityMember,
        action: ModeratorAction,
    },
    ResolveProposal {
        proposal: Box<Proposal>,
        config: GovernanceConfig,
        /// Evaluation time; the clock's time when omitted
        #[serde(default)]
        now: Option<DateTime<Utc>>,
    },
    AdvanceDispute {
        dispute: Box<Dispute>,
        event: DisputeEvent,
        #[serde(default)]
        now: Option<DateTime<Utc>>,
    },
}

impl EvaluationRequest {
    pub fn op(&self) -> &'static str {
        match self {
            EvaluationRequest::ClassifyTier { .. } => "classify_tier",
            EvaluationRequest::PrivilegesFor { .. } => "privileges_for",
            EvaluationRequest::HasPrivilege { .. } => "has_privilege",
            EvaluationRequest::Authorize { .. } => "authorize",
            EvaluationRequest::ResolveProposal { .. } => "resolve_proposal",
            EvaluationRequest::AdvanceDispute { .. } => "advance_dispute",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EvaluationResponse {
    Tier {
        tier: TrustTier,
    },
    Privileges {
        tier: TrustTier,
        privileges: BTreeSet<TrustPrivilege>,
    },
    HasPrivilege {
        granted: bool,
    },
    Authorization {
        authorized: bool,
        decision: Authorization,
    },
    Proposal {
        status: ProposalStatus,
        proposal: Box<Proposal>,
    },
    Dispute {
        transition: DisputeTransition,
        dispute: Box<Dispute>,
    },
    Error {
        kind: String,
        message: String,
    },
}

impl From<PolicyError> for EvaluationResponse {
    fn from(err: PolicyError) -> Self {
        let kind = match &err {
            PolicyError::Validation(_) => "validation",
            PolicyError::AuthorizationDenied(_) => "authorization_denied",
            PolicyError::InvalidTransition(_) => "invalid_transition",
            PolicyError::InvalidCouncil(_) => "invalid_council",
            PolicyError::MalformedTable(_) => "malformed_table",
        };
        EvaluationResponse::Error {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }
}

/// Evaluate `request` against `engine`
pub fn evaluate(engine: &PolicyEngine, request: EvaluationRequest, clock: &dyn Clock) -> EvaluationResponse {
    debug!(op = request.op(), "Evaluating request");

    match request {
        EvaluationRequest::ClassifyTier { stats } => EvaluationResponse::Tier {
            tier: engine.classify_tier(&stats),
        },
        EvaluationRequest::PrivilegesFor { tier } => EvaluationResponse::Privileges {
            tier,
            privileges: engine.privileges_for(tier).clone(),
        },
        EvaluationRequest::HasPrivilege { tier, privilege } => EvaluationResponse::HasPrivilege {
            granted: engine.has_privilege(tier, privilege),
        },
        EvaluationRequest::Authorize { member, action } => {
            let decision = engine.authorization(&member, action);
            EvaluationResponse::Authorization {
                authorized: decision.is_granted(),
                decision,
            }
        }
        EvaluationRequest::ResolveProposal {
            mut proposal,
            config,
            now,
        } => {
            let now = now.unwrap_or_else(|| clock.now());
            match engine.resolve_proposal(&mut proposal, &config, now) {
                Ok(status) => EvaluationResponse::Proposal { status, proposal },
                Err(e) => e.into(),
            }
        }
        EvaluationRequest::AdvanceDispute {
            mut dispute,
            event,
            now,
        } => {
            let now = now.unwrap_or_else(|| clock.now());
            match engine.advance_dispute_state(&mut dispute, event, now) {
                Ok(transition) => EvaluationResponse::Dispute { transition, dispute },
                Err(e) => e.into(),
            }
        }
    }
}
