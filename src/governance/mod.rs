//! Community governance: decision models, proposals and voting
//!
//! ```text
//!            cast_vote (replaces earlier ballot)
//!               ┌──────┐
//!               ▼      │
//!          ┌────────────┐  quorum met, ratio >= threshold  ┌────────┐
//! open ───►│   active   │─────────────────────────────────►│ passed │
//!          └────────────┘                                  └────────┘
//!             │      │    quorum met, ratio < threshold    ┌──────────┐
//!             │      └────────────────────────────────────►│ rejected │
//!             │                                            └──────────┘
//!             │   past ends_at, quorum unmet               ┌─────────┐
//!             └───────────────────────────────────────────►│ expired │
//!                                                          └─────────┘
//! ```

mod config;
mod proposal;

pub use config::{DecisionType, GovernanceConfig, GovernanceModel};
pub use proposal::{
    resolve_proposal, Proposal, ProposalDraft, ProposalStatus, Tally, Vote, VoteChoice,
    VoteReceipt,
};
