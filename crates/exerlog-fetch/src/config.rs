//! `exerlog.toml` client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::{DEFAULT_FOLLOW, DEFAULT_USER_AGENT, RequestInit};

pub const DEFAULT_TIMESTAMP_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid duration {0:?} (expected e.g. \"500ms\", \"5s\", \"1m\")")]
    InvalidDuration(String),
}

/// Defaults applied to every request the client issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    pub user_agent: Option<String>,
    pub follow: Option<u32>,
    pub compress: Option<bool>,
    /// Transport and body timeout, e.g. `"5s"`. `"0"` disables it.
    pub timeout: Option<String>,
    /// Body byte cap; 0 disables it.
    pub size: Option<u64>,
    pub timestamp_url: Option<String>,
}

impl FetchConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FetchConfig = toml::from_str(content)?;
        config.timeout()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn follow(&self) -> u32 {
        self.follow.unwrap_or(DEFAULT_FOLLOW)
    }

    pub fn compress(&self) -> bool {
        self.compress.unwrap_or(true)
    }

    /// The configured timeout; `None` when unset or zero.
    pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        match self.timeout.as_deref() {
            None => Ok(None),
            Some(raw) => parse_duration(raw)
                .map(|d| Some(d).filter(|d| !d.is_zero()))
                .ok_or_else(|| ConfigError::InvalidDuration(raw.to_owned())),
        }
    }

    pub fn size(&self) -> u64 {
        self.size.unwrap_or(0)
    }

    pub fn timestamp_url(&self) -> &str {
        self.timestamp_url.as_deref().unwrap_or(DEFAULT_TIMESTAMP_URL)
    }

    /// A [`RequestInit`] seeded with these defaults.
    pub fn request_init(&self) -> Result<RequestInit, ConfigError> {
        let mut init = RequestInit::new()
            .header("User-Agent", self.user_agent())
            .follow(self.follow())
            .compress(self.compress())
            .size(self.size());
        if let Some(timeout) = self.timeout()? {
            init = init.timeout(timeout);
        }
        Ok(init)
    }
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is
/// seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
