//! Vouching
//!
//! Champions may vouch for newcomers. A vouch stays on record after
//! revocation so the history can be audited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::privilege::{require_privilege, TrustPrivilege};
use super::tier::{TierTable, TrustTier};
use crate::error::{PolicyError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vouch {
    pub id: String,
    pub voucher_id: String,
    pub vouchee_id: String,
    pub message: Option<String>,
    pub is_active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Vouch {
    /// Record a vouch after checking both parties' tiers
    pub fn issue(
        table: &TierTable,
        voucher_id: &str,
        voucher_tier: TrustTier,
        vouchee_id: &str,
        vouchee_tier: TrustTier,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if voucher_id == vouchee_id {
            return Err(PolicyError::validation("participants cannot vouch for themselves"));
        }
        require_privilege(table, voucher_tier, TrustPrivilege::VouchNewcomers)?;
        if vouchee_tier != table.default_tier() {
            return Err(PolicyError::denied(format!(
                "only {} participants can be vouched for, {} is {}",
                table.default_tier(),
                vouchee_id,
                vouchee_tier
            )));
        }

        Ok(Self {
            id: format!("vouch_{}_{}_{}", voucher_id, vouchee_id, now.timestamp_millis()),
            voucher_id: voucher_id.to_string(),
            vouchee_id: vouchee_id.to_string(),
            message,
            is_active: true,
            revoked_at: None,
            revoke_reason: None,
            created_at: now,
        })
    }

    pub fn revoke(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        if !self.is_active {
            return Err(PolicyError::transition(format!("vouch {} already revoked", self.id)));
        }
        self.is_active = false;
        self.revoked_at = Some(now);
        self.revoke_reason = Some(reason.into());
        Ok(())
    }
}
