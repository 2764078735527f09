//! Dispute resolutions and sanctions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PolicyError, Result};

/// How the disputed exchange is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolution {
    /// Exchange cancelled, no credit change
    Voided,
    /// Adjusted credit
    PartialCredit,
    /// Original credit stands
    FullCredit,
    ProviderFavor,
    ReceiverFavor,
}

impl DisputeResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeResolution::Voided => "voided",
            DisputeResolution::PartialCredit => "partial_credit",
            DisputeResolution::FullCredit => "full_credit",
            DisputeResolution::ProviderFavor => "provider_favor",
            DisputeResolution::ReceiverFavor => "receiver_favor",
        }
    }
}

impl fmt::Display for DisputeResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Penalty attached to a resolution, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeSanction {
    None,
    /// Note on profile
    Warning,
    /// 30-day freeze
    #[serde(rename = "suspension_30d")]
    Suspension30d,
    CommunityRemoval,
    /// Global ban
    ProtocolBan,
}

impl DisputeSanction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeSanction::None => "none",
            DisputeSanction::Warning => "warning",
            DisputeSanction::Suspension30d => "suspension_30d",
            DisputeSanction::CommunityRemoval => "community_removal",
            DisputeSanction::ProtocolBan => "protocol_ban",
        }
    }

    pub fn is_none(&self) -> bool {
        *self == DisputeSanction::None
    }
}

impl fmt::Display for DisputeSanction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who closed the dispute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    Settlement,
    Withdrawal,
    Mediation,
    Council,
    Timeout,
}

/// Final decision on a closed dispute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeOutcome {
    pub resolution: DisputeResolution,
    pub sanction: DisputeSanction,
    /// Credits granted for a `partial_credit` resolution
    #[serde(default)]
    pub credit_adjustment: Option<f64>,
    /// Set only when `sanction` is not `None`
    pub sanctioned_participant: Option<String>,
    pub source: OutcomeSource,
    pub decided_at: DateTime<Utc>,
}

impl DisputeOutcome {
    pub(crate) fn unsanctioned(
        resolution: DisputeResolution,
        source: OutcomeSource,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resolution,
            sanction: DisputeSanction::None,
            credit_adjustment: None,
            sanctioned_participant: None,
            source,
            decided_at,
        }
    }

    pub(crate) fn sanctioned(
        resolution: DisputeResolution,
        sanction: DisputeSanction,
        target: &str,
        source: OutcomeSource,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resolution,
            sanction,
            credit_adjustment: None,
            sanctioned_participant: (!sanction.is_none()).then(|| target.to_string()),
            source,
            decided_at,
        }
    }

    pub(crate) fn with_credit_adjustment(mut self, credit_adjustment: Option<f64>) -> Self {
        self.credit_adjustment = credit_adjustment;
        self
    }
}

/// A credit adjustment is only meaningful for `partial_credit` and must be a
/// finite, non-negative amount
pub(crate) fn check_credit_adjustment(
    resolution: DisputeResolution,
    credit_adjustment: Option<f64>,
) -> Result<()> {
    let Some(amount) = credit_adjustment else {
        return Ok(());
    };
    if resolution != DisputeResolution::PartialCredit {
        return Err(PolicyError::validation(format!(
            "credit adjustment only applies to partial_credit, not {}",
            resolution
        )));
    }
    if !amount.is_finite() || amount < 0.0 {
        return Err(PolicyError::validation(format!(
            "credit adjustment {} must be a finite, non-negative amount",
            amount
        )));
    }
    Ok(())
}
