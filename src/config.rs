// src/config.rs
//
// Repository configuration
//
// PRINCIPLES:
// - Every field has a default; an empty JSON object is a valid config
// - Parsing happens once, at load time; consumers get typed values

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::domain::post::status;
use crate::error::{AppError, AppResult};

/// Settings shared by the SQLite executor and the repositories built on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Database file; `None` means the platform data directory
    pub database_path: Option<PathBuf>,

    /// Maximum pooled connections
    pub pool_size: u32,

    /// Site timezone as a UTC offset, e.g. `"+09:00"`
    pub utc_offset: String,

    /// Statuses a query returns when no `status` filter is applied
    pub visible_statuses: Vec<String>,

    /// Page size applied to fresh repositories; `None` returns everything
    pub default_per_page: Option<u32>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            pool_size: 8,
            utc_offset: "+00:00".to_string(),
            visible_statuses: vec![status::PUBLISH.to_string()],
            default_per_page: None,
        }
    }
}

impl RepositoryConfig {
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.pool_size == 0 {
            return Err(AppError::Config("pool_size must be at least 1".to_string()));
        }
        if self.visible_statuses.is_empty() {
            return Err(AppError::Config(
                "visible_statuses cannot be empty".to_string(),
            ));
        }
        if self.default_per_page == Some(0) {
            return Err(AppError::Config(
                "default_per_page must be positive when set".to_string(),
            ));
        }
        self.offset()?;
        Ok(())
    }

    /// The parsed site offset
    pub fn offset(&self) -> AppResult<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }

    /// Builder-style override, used mostly by tests
    pub fn with_utc_offset(mut self, offset: impl Into<String>) -> Self {
        self.utc_offset = offset.into();
        self
    }
}

/// Parses `Z`, `+HH:MM`, `-HH:MM`, `+HHMM` or `+HH`
pub fn parse_utc_offset(raw: &str) -> AppResult<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| AppError::Config("invalid UTC offset".to_string()));
    }

    let invalid = || AppError::Config(format!("invalid UTC offset '{}'", raw));

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        4 => (
            digits[..2].parse::<i32>().map_err(|_| invalid())?,
            digits[2..].parse::<i32>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
