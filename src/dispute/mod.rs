//! Three-level dispute escalation
//!
//! ```text
//!   open                  deadline / request            deadline / rejection
//!    │                          │                               │
//!    ▼                          ▼                               ▼
//! ┌─────────────────┐     ┌───────────┐                  ┌────────────────┐
//! │ self_resolution │────►│ mediation │─────────────────►│ council_review │
//! │  (48h, L1)      │     │ (5d, L2)  │                  │  (7d, L3)      │
//! └─────────────────┘     └───────────┘                  └────────────────┘
//!    │ settle/withdraw       │ both accept / withdraw       │ 2 of 3   │ deadline
//!    ▼                       ▼                              ▼          ▼
//! ┌──────────────────────────────────────────────────────────┐  ┌─────────┐
//! │                         resolved                         │  │ expired │
//! └──────────────────────────────────────────────────────────┘  └─────────┘
//! ```
//!
//! Expired disputes are voided and carry no sanction.

mod council;
mod machine;
mod outcome;

pub use council::{
    majority_credit_adjustment, majority_decision, Council, CouncilSeat, CouncilVote,
    COUNCIL_MAJORITY, COUNCIL_SIZE,
};
pub use machine::{
    advance_dispute_state, Dispute, DisputeClaim, DisputeEvent, DisputeEvidence, DisputePolicy,
    DisputeStatus, DisputeTransition, DisputeType, EvidenceKind, MediatorProposal,
};
pub use outcome::{DisputeOutcome, DisputeResolution, DisputeSanction, OutcomeSource};
