//! Core types shared across Gatekeeper components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque platform user identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Opaque platform role identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

/// Opaque platform channel identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for RoleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One pre-baked captcha record from the fixed catalog.
///
/// Immutable after load; `code` is stored lowercase and compared
/// case-insensitively against user answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    /// Expected answer (lowercase comparison key)
    pub code: String,

    /// Reference to the image shown to the user
    pub image_ref: String,
}

/// Public snapshot of a live verification session, safe to display.
///
/// Never exposes the expected code.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    /// Image the user must read
    pub image_ref: String,

    /// Seconds until the session expires
    pub seconds_remaining: u64,

    /// Wrong answers submitted so far
    pub attempts_used: u32,

    /// Wrong answers still allowed
    pub attempts_remaining: u32,

    /// True for a brand-new session, false for a resumed one
    pub fresh: bool,
}

/// Account services the stock module distributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Roblox,
    Epic,
    Steam,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Roblox, Service::Epic, Service::Steam];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roblox => "roblox",
            Self::Epic => "epic",
            Self::Steam => "steam",
        }
    }

    /// Human-facing label for embeds and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Roblox => "Roblox",
            Self::Epic => "Epic Games",
            Self::Steam => "Steam",
        }
    }
}

impl FromStr for Service {
    type Err = crate::GatekeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "roblox" => Ok(Self::Roblox),
            "epic" => Ok(Self::Epic),
            "steam" => Ok(Self::Steam),
            other => Err(crate::GatekeeperError::InvalidInput(format!(
                "unknown service: {other}"
            ))),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a [`Notice`], mapped to embed colors by adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Structured, embed-like notification payload.
///
/// The core never formats platform markup directly; it emits `Notice`
/// values and the platform adapter renders them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub body: String,

    /// Name/value detail pairs ("Session Details", etc.)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<(String, String)>,

    /// Optional image to display (challenge captcha)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    /// Footer label
    pub footer: String,

    /// Emission timestamp
    pub at: chrono::DateTime<chrono::Utc>,
}

impl Notice {
    pub fn new(kind: NoticeKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            fields: Vec::new(),
            image_ref: None,
            footer: crate::constants::FOOTER_LABEL.to_string(),
            at: chrono::Utc::now(),
        }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, title, body)
    }

    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, title, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Warning, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, title, body)
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_parses_case_insensitively() {
        assert!(matches!("Roblox".parse(), Ok(Service::Roblox)));
        assert!(matches!("EPIC".parse(), Ok(Service::Epic)));
        assert!(matches!("steam".parse(), Ok(Service::Steam)));
        assert!("origin".parse::<Service>().is_err());
    }

    #[test]
    fn notice_builder_accumulates_fields() {
        let notice = Notice::info("Title", "Body")
            .with_field("Time left", "90s")
            .with_image("captcha-3.png");

        assert_eq!(notice.kind, NoticeKind::Info);
        assert_eq!(notice.fields.len(), 1);
        assert_eq!(notice.image_ref.as_deref(), Some("captcha-3.png"));
    }
}
