//! Community membership, roles and standing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role within one community, ordered by authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityRole {
    Member,
    Moderator,
    Admin,
    Founder,
}

impl CommunityRole {
    pub const ALL: [CommunityRole; 4] = [
        CommunityRole::Member,
        CommunityRole::Moderator,
        CommunityRole::Admin,
        CommunityRole::Founder,
    ];

    /// Position in the hierarchy (member = 0 .. founder = 3)
    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommunityRole::Member => "member",
            CommunityRole::Moderator => "moderator",
            CommunityRole::Admin => "admin",
            CommunityRole::Founder => "founder",
        }
    }
}

impl fmt::Display for CommunityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disciplinary state, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStanding {
    Good,
    Warning,
    Suspended,
}

impl MemberStanding {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStanding::Good => "good",
            MemberStanding::Warning => "warning",
            MemberStanding::Suspended => "suspended",
        }
    }
}

impl fmt::Display for MemberStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub id: String,
    pub reason: String,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Warning {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires| now < expires)
    }
}

/// A participant's membership in one community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityMember {
    pub id: String,
    pub community_id: String,
    pub participant_id: String,
    pub role: CommunityRole,
    pub standing: MemberStanding,

    /// Stats within this community
    pub exchanges_in_community: u32,
    pub rating_in_community: f64,

    pub warnings: Vec<Warning>,
    pub suspended_until: Option<DateTime<Utc>>,

    pub joined_at: DateTime<Utc>,
    pub invited_by: Option<String>,
    pub last_active_at: DateTime<Utc>,
}

impl CommunityMember {
    pub fn new(community_id: &str, participant_id: &str, role: CommunityRole, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}:{}", community_id, participant_id),
            community_id: community_id.to_string(),
            participant_id: participant_id.to_string(),
            role,
            standing: MemberStanding::Good,
            exchanges_in_community: 0,
            rating_in_community: 0.0,
            warnings: Vec::new(),
            suspended_until: None,
            joined_at: now,
            invited_by: None,
            last_active_at: now,
        }
    }

    pub fn with_standing(mut self, standing: MemberStanding) -> Self {
        self.standing = standing;
        self
    }

    pub fn is_in_good_standing(&self) -> bool {
        self.standing == MemberStanding::Good
    }

    /// Suspended, and either indefinitely or until a time after `now`
    pub fn is_suspended_at(&self, now: DateTime<Utc>) -> bool {
        self.standing == MemberStanding::Suspended
            && self.suspended_until.map_or(true, |until| now < until)
    }

    pub fn active_warnings(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.is_active_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_hierarchy() {
        assert!(CommunityRole::Member < CommunityRole::Moderator);
        assert!(CommunityRole::Admin < CommunityRole::Founder);
        assert_eq!(CommunityRole::Founder.level(), 3);
        assert_eq!(CommunityRole::Member.level(), 0);
    }

    #[test]
    fn test_suspension_window() {
        let now = Utc::now();
        let mut member = CommunityMember::new("brooklyn", "p1", CommunityRole::Member, now)
            .with_standing(MemberStanding::Suspended);
        assert!(member.is_suspended_at(now));

        member.suspended_until = Some(now + Duration::days(30));
        assert!(member.is_suspended_at(now + Duration::days(29)));
        assert!(!member.is_suspended_at(now + Duration::days(30)));
    }

    #[test]
    fn test_active_warnings() {
        let now = Utc::now();
        let mut member = CommunityMember::new("brooklyn", "p1", CommunityRole::Member, now);
        member.warnings.push(Warning {
            id: "w1".to_string(),
            reason: "late".to_string(),
            issued_by: "mod".to_string(),
            issued_at: now,
            expires_at: Some(now + Duration::days(1)),
        });
        assert_eq!(member.active_warnings(now).count(), 1);
        assert_eq!(member.active_warnings(now + Duration::days(2)).count(), 0);
    }
}
