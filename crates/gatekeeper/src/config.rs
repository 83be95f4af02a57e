//! Configuration management for Gatekeeper.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use gatekeeper_common::{ChallengeRecord, GatekeeperError};
use gatekeeper_common::constants::{
    DEFAULT_COOLDOWN_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_PREMIUM_COOLDOWN_SECS, DEFAULT_WINDOW_MS,
};
use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Session validity window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Wrong answers allowed before removal
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Role identifiers
    #[serde(default)]
    pub roles: RolesConfig,

    /// Staff log channel; console-only logging when unset
    #[serde(default)]
    pub log_channel: Option<String>,

    /// Fixed captcha catalog
    #[serde(default = "default_catalog")]
    pub catalog: Vec<ChallengeRecord>,

    /// Stock distribution settings
    #[serde(default)]
    pub stock: StockConfig,
}

/// Role identifiers the bot manages or checks
#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    /// Granted on successful verification
    #[serde(default = "default_verified_role")]
    pub verified: String,

    /// May publish the panel and administer stock
    #[serde(default = "default_publisher_role")]
    pub publisher: String,

    /// Shorter generator cooldown
    #[serde(default = "default_premium_role")]
    pub premium: String,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            verified: default_verified_role(),
            publisher: default_publisher_role(),
            premium: default_premium_role(),
        }
    }
}

/// Stock cooldown settings
#[derive(Debug, Clone, Deserialize)]
pub struct StockConfig {
    /// Generator cooldown for standard members, seconds
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Generator cooldown for premium members, seconds
    #[serde(default = "default_premium_cooldown")]
    pub premium_cooldown_secs: u64,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
            premium_cooldown_secs: default_premium_cooldown(),
        }
    }
}

// Default value functions
fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_verified_role() -> String {
    "member".to_string()
}
fn default_publisher_role() -> String {
    "developer".to_string()
}
fn default_premium_role() -> String {
    "premium".to_string()
}
fn default_cooldown() -> u64 {
    DEFAULT_COOLDOWN_SECS
}
fn default_premium_cooldown() -> u64 {
    DEFAULT_PREMIUM_COOLDOWN_SECS
}

/// The pre-baked record set shipped with the bot
fn default_catalog() -> Vec<ChallengeRecord> {
    const CODES: [&str; 7] = [
        "kymedp", "blsryt", "sldwhm", "vcptei", "qvqfgk", "pqkvdm", "gihmsn",
    ];
    CODES
        .iter()
        .enumerate()
        .map(|(idx, code)| ChallengeRecord {
            code: code.to_string(),
            image_ref: format!("assets/captcha/captcha-{idx}.png"),
        })
        .collect()
}

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(window_ms) = args.window_ms {
            config.window_ms = window_ms;
        }
        if let Some(max_attempts) = args.max_attempts {
            config.max_attempts = max_attempts;
        }

        if config.max_attempts == 0 {
            return Err(GatekeeperError::Config(
                "max_attempts must be at least 1".to_string(),
            )
            .into());
        }
        if config.catalog.is_empty() {
            tracing::warn!("Challenge catalog is empty; verification will refuse to start sessions");
        }

        Ok(config)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.stock.cooldown_secs)
    }

    pub fn premium_cooldown(&self) -> Duration {
        Duration::from_secs(self.stock.premium_cooldown_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_attempts: default_max_attempts(),
            roles: RolesConfig::default(),
            log_channel: None,
            catalog: default_catalog(),
            stock: StockConfig::default(),
        }
    }
}
