//! Configuration (TOML). Every field has a default so an empty file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;
use crate::pipeline::RetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    pub schedule: ScheduleConfig,
    pub reminders: ReminderConfig,
    pub retry: RetryConfig,
    pub lock: LockConfig,
    pub links: LinksConfig,
    pub mail: MailConfig,
}

/// Daily trigger time, UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub hour: u32,
    pub minute: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { hour: 8, minute: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    pub lookahead_days: i64,
    pub suppression_hours: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 7,
            suppression_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delays_secs: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays_secs: vec![60, 300, 3600],
        }
    }
}

impl ReminderConfig {
    pub const MAX_LOOKAHEAD_DAYS: i64 = 365;
    pub const MAX_SUPPRESSION_HOURS: i64 = 24 * 365;

    pub fn lookahead(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_days(self.lookahead_days).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "reminders.lookahead_days {} is out of range",
                self.lookahead_days
            ))
        })
    }

    pub fn suppression(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_hours(self.suppression_hours).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "reminders.suppression_hours {} is out of range",
                self.suppression_hours
            ))
        })
    }
}

impl RetryConfig {
    pub const MAX_ATTEMPTS: u32 = 20;
    pub const MAX_DELAY_SECS: u64 = 24 * 60 * 60;

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            self.delays_secs.iter().copied().map(Duration::from_secs).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub ttl_secs: i64,
    /// Directory for file-backed leases; in-process lock when unset.
    pub dir: Option<PathBuf>,
}

impl LockConfig {
    pub const MAX_TTL_SECS: i64 = 7 * 24 * 60 * 60;

    pub fn ttl(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_seconds(self.ttl_secs).ok_or_else(|| {
            ConfigError::Invalid(format!("lock.ttl_secs {} is out of range", self.ttl_secs))
        })
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 7200,
            dir: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    pub base_url: String,
    pub signing_secret: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            signing_secret: "change-me".into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "Nudge <no-reply@example.com>".into(),
            smtp_host: None,
            smtp_port: 587,
            username: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for LinksConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinksConfig")
            .field("base_url", &self.base_url)
            .field("signing_secret", &"***")
            .finish()
    }
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("from", &self.from)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl NudgeConfig {
    /// Load and validate. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.hour > 23 || self.schedule.minute > 59 {
            return Err(ConfigError::Invalid(format!(
                "schedule {:02}:{:02} is not a time of day",
                self.schedule.hour, self.schedule.minute
            )));
        }
        let reminders = &self.reminders;
        if !(1..=ReminderConfig::MAX_LOOKAHEAD_DAYS).contains(&reminders.lookahead_days) {
            return Err(ConfigError::Invalid(format!(
                "reminders.lookahead_days must be within 1..={}",
                ReminderConfig::MAX_LOOKAHEAD_DAYS
            )));
        }
        if !(0..=ReminderConfig::MAX_SUPPRESSION_HOURS).contains(&reminders.suppression_hours) {
            return Err(ConfigError::Invalid(format!(
                "reminders.suppression_hours must be within 0..={}",
                ReminderConfig::MAX_SUPPRESSION_HOURS
            )));
        }
        if !(1..=RetryConfig::MAX_ATTEMPTS).contains(&self.retry.max_attempts) {
            return Err(ConfigError::Invalid(format!(
                "retry.max_attempts must be within 1..={}",
                RetryConfig::MAX_ATTEMPTS
            )));
        }
        if self.retry.delays_secs.is_empty() {
            return Err(ConfigError::Invalid("retry.delays_secs must not be empty".into()));
        }
        if self.retry.delays_secs.iter().any(|&d| d > RetryConfig::MAX_DELAY_SECS) {
            return Err(ConfigError::Invalid(format!(
                "retry.delays_secs entries must be <= {}",
                RetryConfig::MAX_DELAY_SECS
            )));
        }
        if !(1..=LockConfig::MAX_TTL_SECS).contains(&self.lock.ttl_secs) {
            return Err(ConfigError::Invalid(format!(
                "lock.ttl_secs must be within 1..={}",
                LockConfig::MAX_TTL_SECS
            )));
        }
        if self.links.signing_secret.is_empty() {
            return Err(ConfigError::Invalid("links.signing_secret must not be empty".into()));
        }
        Ok(())
    }
}
