//! Moderation log
//!
//! Bounded in-memory record of moderation decisions and governance/dispute
//! transitions. Every entry is mirrored to tracing at its severity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::community::{CommunityRole, ModeratorAction};
use crate::dispute::{DisputeSanction, DisputeStatus};
use crate::governance::{DecisionType, ProposalStatus, VoteChoice};

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Types of moderation events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModerationEventType {
    ModerationGranted {
        actor: String,
        action: ModeratorAction,
        target: Option<String>,
    },
    ModerationDenied {
        actor: String,
        action: ModeratorAction,
        role: CommunityRole,
        reason: String,
    },
    SanctionApplied {
        participant: String,
        sanction: DisputeSanction,
        reason: String,
    },
    MemberReinstated {
        participant: String,
        by: String,
    },

    ProposalOpened {
        proposal_id: String,
        decision_type: DecisionType,
        proposed_by: String,
    },
    VoteCast {
        proposal_id: String,
        voter: String,
        choice: VoteChoice,
    },
    ProposalResolved {
        proposal_id: String,
        status: ProposalStatus,
    },

    DisputeOpened {
        dispute_id: String,
        raised_by: String,
        against: String,
    },
    DisputeTransitioned {
        dispute_id: String,
        from: DisputeStatus,
        to: DisputeStatus,
    },
}

/// Severity levels for moderation events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ModerationSeverity {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Critical = 3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub community_id: Option<String>,
    pub event_type: ModerationEventType,
    pub severity: ModerationSeverity,
    pub metadata: BTreeMap<String, String>,
}

impl ModerationEntry {
    pub fn new(
        event_type: ModerationEventType,
        severity: ModerationSeverity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("modlog_{}", Uuid::new_v4()),
            timestamp,
            community_id: None,
            event_type,
            severity,
            metadata: BTreeMap::new(),
        }
    }

    pub fn in_community(mut self, community_id: &str) -> Self {
        self.community_id = Some(community_id.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Append-only log, trimmed from the front once `max_entries` is exceeded
#[derive(Clone)]
pub struct ModerationLog {
    entries: Arc<RwLock<VecDeque<ModerationEntry>>>,
    max_entries: usize,
    min_severity: ModerationSeverity,
}

impl Default for ModerationLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ModerationLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries: max_entries.max(1),
            min_severity: ModerationSeverity::Info,
        }
    }

    pub fn with_min_severity(mut self, severity: ModerationSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    pub async fn log(&self, entry: ModerationEntry) {
        if entry.severity < self.min_severity {
            return;
        }

        match entry.severity {
            ModerationSeverity::Debug => tracing::debug!(id = %entry.id, "MODLOG: {:?}", entry.event_type),
            ModerationSeverity::Info => tracing::info!(id = %entry.id, "MODLOG: {:?}", entry.event_type),
            ModerationSeverity::Warning => tracing::warn!(id = %entry.id, "MODLOG: {:?}", entry.event_type),
            ModerationSeverity::Critical => {
                tracing::error!(id = %entry.id, "MODLOG CRITICAL: {:?}", entry.event_type)
            }
        }

        let mut entries = self.entries.write().await;
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    pub async fn log_moderation_granted(
        &self,
        community_id: &str,
        actor: &str,
        action: ModeratorAction,
        target: Option<&str>,
        at: DateTime<Utc>,
    ) {
        let entry = ModerationEntry::new(
            ModerationEventType::ModerationGranted {
                actor: actor.to_string(),
                action,
                target: target.map(str::to_string),
            },
            ModerationSeverity::Info,
            at,
        )
        .in_community(community_id);
        self.log(entry).await;
    }

    pub async fn log_moderation_denied(
        &self,
        community_id: &str,
        actor: &str,
        action: ModeratorAction,
        role: CommunityRole,
        reason: &str,
        at: DateTime<Utc>,
    ) {
        let entry = ModerationEntry::new(
            ModerationEventType::ModerationDenied {
                actor: actor.to_string(),
                action,
                role,
                reason: reason.to_string(),
            },
            ModerationSeverity::Warning,
            at,
        )
        .in_community(community_id);
        self.log(entry).await;
    }

    /// Sanctions stronger than a warning are logged as critical
    pub async fn log_sanction(
        &self,
        community_id: Option<&str>,
        participant: &str,
        sanction: DisputeSanction,
        reason: &str,
        at: DateTime<Utc>,
    ) {
        let severity = if sanction > DisputeSanction::Warning {
            ModerationSeverity::Critical
        } else {
            ModerationSeverity::Warning
        };
        let mut entry = ModerationEntry::new(
            ModerationEventType::SanctionApplied {
                participant: participant.to_string(),
                sanction,
                reason: reason.to_string(),
            },
            severity,
            at,
        );
        if let Some(community_id) = community_id {
            entry = entry.in_community(community_id);
        }
        self.log(entry).await;
    }

    pub async fn get_recent(&self, count: usize) -> Vec<ModerationEntry> {
        let entries = self.entries.read().await;
        entries.iter().rev().take(count).cloned().collect()
    }

    pub async fn get_by_severity(&self, min_severity: ModerationSeverity) -> Vec<ModerationEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.severity >= min_severity)
            .cloned()
            .collect()
    }

    pub async fn get_for_community(&self, community_id: &str) -> Vec<ModerationEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.community_id.as_deref() == Some(community_id))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_builder() {
        let entry = ModerationEntry::new(
            ModerationEventType::MemberReinstated {
                participant: "p1".to_string(),
                by: "admin".to_string(),
            },
            ModerationSeverity::Info,
            Utc::now(),
        )
        .in_community("c1")
        .with_metadata("note", "appeal upheld");

        assert!(entry.id.starts_with("modlog_"));
        assert_eq!(entry.community_id.as_deref(), Some("c1"));
        assert_eq!(entry.metadata.get("note").map(String::as_str), Some("appeal upheld"));
    }

    #[tokio::test]
    async fn test_moderation_log() {
        let log = ModerationLog::default();
        let now = Utc::now();

        log.log_moderation_granted("c1", "mod", ModeratorAction::WarnMember, Some("p1"), now)
            .await;
        log.log_moderation_denied(
            "c2",
            "p2",
            ModeratorAction::RemoveMember,
            CommunityRole::Member,
            "insufficient role",
            now,
        )
        .await;
        log.log_sanction(Some("c1"), "p1", DisputeSanction::Suspension30d, "repeat", now)
            .await;

        assert_eq!(log.len().await, 3);
        assert_eq!(log.get_for_community("c1").await.len(), 2);
        assert_eq!(log.get_by_severity(ModerationSeverity::Critical).await.len(), 1);

        let recent = log.get_recent(1).await;
        assert!(matches!(
            recent[0].event_type,
            ModerationEventType::SanctionApplied { .. }
        ));
    }

    #[tokio::test]
    async fn test_trims_oldest_entries() {
        let log = ModerationLog::new(2);
        let now = Utc::now();
        for actor in ["a", "b", "c"] {
            log.log_moderation_granted("c1", actor, ModeratorAction::ApproveMember, None, now)
                .await;
        }

        let recent = log.get_recent(10).await;
        assert_eq!(recent.len(), 2);
        assert!(matches!(
            &recent[1].event_type,
            ModerationEventType::ModerationGranted { actor, .. } if actor == "b"
        ));
    }

    #[tokio::test]
    async fn test_min_severity_filter() {
        let log = ModerationLog::default().with_min_severity(ModerationSeverity::Warning);
        log.log_moderation_granted("c1", "mod", ModeratorAction::ApproveMember, None, Utc::now())
            .await;
        assert!(log.is_empty().await);
    }
}
