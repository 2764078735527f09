use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::audit::{ModerationLog, DEFAULT_MAX_ENTRIES};
use crate::community::{ActionRoleTable, DisciplinePolicy};
use crate::dispute::DisputePolicy;
use crate::engine::PolicyEngine;
use crate::trust::TierTable;

/// Configuration for the policy engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Rule table overrides
    pub tables: TableConfig,
    /// Dispute deadlines
    pub disputes: DisputePolicy,
    /// Sanction durations
    pub discipline: DisciplinePolicy,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Moderation log retention
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// JSON tier table; built-in table when unset
    pub trust_tiers_path: Option<PathBuf>,
    /// JSON action to role map; built-in table when unset
    pub action_roles_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Emit span open/close events
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_spans: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            tables: TableConfig::default(),
            disputes: DisputePolicy::default(),
            discipline: DisciplinePolicy::default(),
            logging: LoggingConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl PolicyConfig {
    /// Load configuration from `OE_*` environment variables and validate it
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Tables
        if let Some(path) = lookup("OE_TRUST_TIERS_PATH").filter(|p| !p.trim().is_empty()) {
            config.tables.trust_tiers_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("OE_ACTION_ROLES_PATH").filter(|p| !p.trim().is_empty()) {
            config.tables.action_roles_path = Some(PathBuf::from(path));
        }

        // Dispute deadlines
        if let Some(hours) = lookup("OE_SELF_RESOLUTION_HOURS") {
            config.disputes.self_resolution_hours = hours
                .parse()
                .context("Invalid OE_SELF_RESOLUTION_HOURS value")?;
        }
        if let Some(hours) = lookup("OE_MEDIATION_HOURS") {
            config.disputes.mediation_hours =
                hours.parse().context("Invalid OE_MEDIATION_HOURS value")?;
        }
        if let Some(hours) = lookup("OE_COUNCIL_HOURS") {
            config.disputes.council_hours =
                hours.parse().context("Invalid OE_COUNCIL_HOURS value")?;
        }

        // Discipline
        if let Some(days) = lookup("OE_SUSPENSION_DAYS") {
            config.discipline.suspension_days =
                days.parse().context("Invalid OE_SUSPENSION_DAYS value")?;
        }
        if let Some(days) = lookup("OE_WARNING_EXPIRY_DAYS") {
            // "never" keeps warnings on record indefinitely
            config.discipline.warning_expiry_days = if days.eq_ignore_ascii_case("never") {
                None
            } else {
                Some(days.parse().context("Invalid OE_WARNING_EXPIRY_DAYS value")?)
            };
        }

        // Logging
        if let Some(level) = lookup("OE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(spans) = lookup("OE_LOG_SPANS") {
            config.logging.log_spans = spans.parse().context("Invalid OE_LOG_SPANS value")?;
        }

        if let Some(max) = lookup("OE_AUDIT_MAX_ENTRIES") {
            config.audit.max_entries = max.parse().context("Invalid OE_AUDIT_MAX_ENTRIES value")?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.disputes
            .validate()
            .context("Invalid dispute deadline configuration")?;

        if self.discipline.suspension_days == 0 {
            return Err(anyhow::anyhow!("Suspension length must be at least one day"));
        }
        if self.discipline.warning_expiry_days == Some(0) {
            return Err(anyhow::anyhow!(
                "Warning expiry must be at least one day, or \"never\""
            ));
        }

        const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
        if !LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(anyhow::anyhow!(
                "Unknown log level '{}', expected one of {}",
                self.logging.level,
                LEVELS.join(", ")
            ));
        }

        if self.audit.max_entries == 0 {
            return Err(anyhow::anyhow!("Moderation log must retain at least one entry"));
        }

        Ok(())
    }

    /// Load the rule tables and build the engine. Malformed tables abort here.
    pub fn build_engine(&self) -> Result<PolicyEngine> {
        let tiers = match &self.tables.trust_tiers_path {
            Some(path) => load_tier_table(path)?,
            None => TierTable::default(),
        };
        let action_roles = match &self.tables.action_roles_path {
            Some(path) => load_action_roles(path)?,
            None => ActionRoleTable::default(),
        };

        let engine = PolicyEngine::new(tiers, action_roles, self.disputes, self.discipline)
            .context("Invalid policy engine configuration")?;

        info!(
            custom_tiers = self.tables.trust_tiers_path.is_some(),
            custom_action_roles = self.tables.action_roles_path.is_some(),
            self_resolution_hours = self.disputes.self_resolution_hours,
            mediation_hours = self.disputes.mediation_hours,
            council_hours = self.disputes.council_hours,
            "Policy engine configured"
        );
        if self.discipline.warning_expiry_days.is_none() {
            warn!("Warnings are configured to never expire");
        }

        Ok(engine)
    }

    pub fn moderation_log(&self) -> ModerationLog {
        ModerationLog::new(self.audit.max_entries)
    }
}

pub fn load_tier_table(path: &Path) -> Result<TierTable> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read tier table {}", path.display()))?;
    TierTable::from_json(&json)
        .with_context(|| format!("Malformed tier table {}", path.display()))
}

pub fn load_action_roles(path: &Path) -> Result<ActionRoleTable> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read action role table {}", path.display()))?;
    ActionRoleTable::from_json(&json)
        .with_context(|| format!("Malformed action role table {}", path.display()))
}
