//! Trust tiers and privileges
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ ParticipantStats │────►│ TierTable   │────►│ TrustPrivilege   │
//! │ (reputation)     │     │ (classify)  │     │ (per-tier set)   │
//! └──────────────────┘     └─────────────┘     └──────────────────┘
//! ```
//!
//! Tiers are evaluated from most to least exclusive; the first satisfied
//! rule wins and the lowest tier is the fallback. Each tier grants a strict
//! superset of the privileges below it.

mod milestone;
mod privilege;
mod tier;
mod vouch;

pub use milestone::{detect_milestones, Milestone, MilestoneType};
pub use privilege::{has_privilege, privileges_for, require_privilege, TrustPrivilege};
pub use tier::{
    classify_tier, ParticipantStats, TierRequirements, TierTable, TrustTier, TrustTierRule,
    MAX_RATING,
};
pub use vouch::Vouch;
