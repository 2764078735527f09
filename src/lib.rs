//! OpenEconomy Policy Engine
//!
//! Trust tiers, privileges, community moderation, governance voting and
//! dispute escalation for the OpenEconomy time-exchange protocol.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - JSON request/response entrypoint
//! ├── config.rs      - Environment configuration & table loading
//! ├── error.rs       - PolicyError
//! ├── clock.rs       - Injectable time source
//! ├── engine.rs      - PolicyEngine (validated tables + operations)
//! ├── request.rs     - Evaluation requests served by the binary
//! ├── ledger.rs      - In-memory proposal/dispute store with deadline sweeps
//! ├── audit.rs       - Moderation log
//! ├── trust/         - Tier classification
//! │   ├── tier.rs      - Tiers, statistics & the tier table
//! │   ├── privilege.rs - Privileges per tier
//! │   ├── vouch.rs     - Champion vouches for newcomers
//! │   └── milestone.rs - Milestone detection
//! ├── community/     - Community roles & moderation
//! │   ├── member.rs     - Roles, standing & warnings
//! │   ├── moderation.rs - Action-role table & authorization
//! │   └── discipline.rs - Sanctions & reinstatement
//! ├── governance/    - Decision making
//! │   ├── config.rs   - Governance models & presets
//! │   └── proposal.rs - Proposals, ballots & resolution
//! └── dispute/       - Dispute escalation
//!     ├── machine.rs - Three-level state machine
//!     ├── council.rs - Champion council & majority
//!     └── outcome.rs - Resolutions & sanctions
//! ```

pub mod audit;
pub mod clock;
pub mod community;
pub mod config;
pub mod dispute;
pub mod engine;
pub mod error;
pub mod governance;
pub mod ledger;
pub mod request;
pub mod trust;

// Re-export main types for convenience
pub use audit::{ModerationEntry, ModerationEventType, ModerationLog, ModerationSeverity};
pub use clock::{Clock, FixedClock, SystemClock};
pub use community::{
    apply_sanction, authorize, moderate, reinstate, ActionRoleTable, Authorization,
    CommunityMember, CommunityRole, DisciplinePolicy, MemberStanding, ModeratorAction,
    SanctionEffect, Warning,
};
pub use config::PolicyConfig;
pub use dispute::{
    advance_dispute_state, Council, CouncilSeat, CouncilVote, Dispute, DisputeClaim,
    DisputeEvent, DisputeOutcome, DisputePolicy, DisputeResolution, DisputeSanction,
    DisputeStatus, DisputeTransition, DisputeType,
};
pub use engine::PolicyEngine;
pub use error::{PolicyError, Result};
pub use governance::{
    resolve_proposal, DecisionType, GovernanceConfig, GovernanceModel, Proposal, ProposalDraft,
    ProposalStatus, VoteChoice,
};
pub use ledger::{GovernanceLedger, SweepReport};
pub use request::{evaluate, EvaluationRequest, EvaluationResponse};
pub use trust::{
    classify_tier, has_privilege, privileges_for, ParticipantStats, TierTable, TrustPrivilege,
    TrustTier,
};
