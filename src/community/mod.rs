//! Community membership, moderation and discipline
//!
//! Roles are ordered `member < moderator < admin < founder`. Authorization
//! compares the member's role with the action's minimum role and requires
//! good standing.

mod discipline;
mod member;
mod moderation;

pub use discipline::{apply_sanction, moderate, reinstate, DisciplinePolicy, SanctionEffect};
pub use member::{CommunityMember, CommunityRole, MemberStanding, Warning};
pub use moderation::{authorize, ActionRoleTable, Authorization, ModeratorAction};
