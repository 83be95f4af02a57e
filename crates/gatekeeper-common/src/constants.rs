//! Shared constants for Gatekeeper components.

/// Default verification window in milliseconds (2 minutes)
pub const DEFAULT_WINDOW_MS: u64 = 120_000;

/// Maximum wrong answers before a session is exhausted
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Generator cooldown for standard members (60 minutes)
pub const DEFAULT_COOLDOWN_SECS: u64 = 3600;

/// Generator cooldown for premium members (15 minutes)
pub const DEFAULT_PREMIUM_COOLDOWN_SECS: u64 = 900;

/// Maximum accepted length of a captcha answer
pub const MAX_ANSWER_LEN: usize = 20;

/// Footer label attached to every notice
pub const FOOTER_LABEL: &str = "Verification System | Powered by Gatekeeper";

/// Component identifiers carried on buttons and modals.
///
/// Decoded once at the boundary into intent values; the raw strings never
/// reach the verification core.
pub mod component_ids {
    /// "Verify" button on the panel
    pub const VERIFY_START: &str = "verify:start";

    /// "Help" button on the panel
    pub const VERIFY_HELP: &str = "verify:help";

    /// "Answer" button on a challenge
    pub const VERIFY_ANSWER: &str = "verify:answer";

    /// Answer modal submission
    pub const VERIFY_MODAL: &str = "verify:modal";
}
