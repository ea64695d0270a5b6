//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Per-agent behaviour switches for the sales reply pipeline.
///
/// Owned by the surrounding service and passed by value on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Send positive-intent replies automatically after the thinking delay.
    pub autopilot: bool,
    /// Allow bump follow-ups when a lead goes quiet (scheduled outside the core).
    pub allow_followups: bool,
    /// Draft replies to out-of-office auto responses instead of skipping them.
    #[serde(rename = "handleOOO")]
    pub handle_ooo: bool,
    /// Attempt to answer soft rejections (handled outside the core).
    pub handle_objections: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            autopilot: true,
            allow_followups: true,
            handle_ooo: true,
            handle_objections: true,
        }
    }
}

/// Longest accepted thinking time, one day.
pub const MAX_THINKING_MINUTES: u64 = 24 * 60;

/// Bounds of the randomized "thinking time" before an autopilot reply.
///
/// Only constructible through [`ThinkingTime::new`], so `min <= max <= one day`
/// always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingTime {
    min_minutes: u64,
    max_minutes: u64,
}

impl ThinkingTime {
    pub fn new(min_minutes: u64, max_minutes: u64) -> Result<Self, ConfigError> {
        if min_minutes > max_minutes {
            return Err(ConfigError::InvalidValue {
                key: "thinking_time".into(),
                message: format!("min ({min_minutes}) exceeds max ({max_minutes})"),
            });
        }
        if max_minutes > MAX_THINKING_MINUTES {
            return Err(ConfigError::InvalidValue {
                key: "thinking_time".into(),
                message: format!("max ({max_minutes}) exceeds {MAX_THINKING_MINUTES} minutes"),
            });
        }
        Ok(Self {
            min_minutes,
            max_minutes,
        })
    }

    pub fn min_minutes(&self) -> u64 {
        self.min_minutes
    }

    pub fn max_minutes(&self) -> u64 {
        self.max_minutes
    }

    pub fn min(&self) -> Duration {
        Duration::from_secs(self.min_minutes * 60)
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max_minutes * 60)
    }
}

impl Default for ThinkingTime {
    fn default() -> Self {
        Self {
            min_minutes: 5,
            max_minutes: 15,
        }
    }
}

/// Process-level settings for the outreach core.
#[derive(Debug, Clone)]
pub struct OutreachConfig {
    /// Agent switches used when a caller has none of its own.
    pub agent: AgentConfig,
    pub thinking_time: ThinkingTime,
    /// Upper bound on one sentiment analysis; past it the reply goes to a human.
    pub sentiment_timeout: Duration,
    /// Upper bound on a single dispatch call.
    pub dispatch_timeout: Duration,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            thinking_time: ThinkingTime::default(),
            sentiment_timeout: Duration::from_secs(60),
            dispatch_timeout: Duration::from_secs(60),
        }
    }
}

impl OutreachConfig {
    /// Read overrides from `OUTREACH_*` environment variables.
    ///
    /// Unset variables keep their defaults; malformed ones are rejected.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let agent = AgentConfig {
            autopilot: parse_var(&lookup, "OUTREACH_AUTOPILOT", parse_bool)?
                .unwrap_or(defaults.agent.autopilot),
            allow_followups: parse_var(&lookup, "OUTREACH_ALLOW_FOLLOWUPS", parse_bool)?
                .unwrap_or(defaults.agent.allow_followups),
            handle_ooo: parse_var(&lookup, "OUTREACH_HANDLE_OOO", parse_bool)?
                .unwrap_or(defaults.agent.handle_ooo),
            handle_objections: parse_var(&lookup, "OUTREACH_HANDLE_OBJECTIONS", parse_bool)?
                .unwrap_or(defaults.agent.handle_objections),
        };

        let min = parse_var(&lookup, "OUTREACH_THINKING_MIN_MINUTES", parse_u64)?
            .unwrap_or(defaults.thinking_time.min_minutes());
        let max = parse_var(&lookup, "OUTREACH_THINKING_MAX_MINUTES", parse_u64)?
            .unwrap_or(defaults.thinking_time.max_minutes());

        let sentiment_timeout = parse_var(&lookup, "OUTREACH_SENTIMENT_TIMEOUT_SECS", parse_u64)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.sentiment_timeout);

        let dispatch_timeout = parse_var(&lookup, "OUTREACH_DISPATCH_TIMEOUT_SECS", parse_u64)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.dispatch_timeout);

        Ok(Self {
            agent,
            thinking_time: ThinkingTime::new(min, max)?,
            sentiment_timeout,
            dispatch_timeout,
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => parse(raw.trim())
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("cannot parse '{raw}'"),
            }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u64(raw: &str) -> Option<u64> {
    raw.parse().ok()
}
