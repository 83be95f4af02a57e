//! # Gatekeeper Common
//!
//! Shared types, errors, and constants used across Gatekeeper components.
//!
//! ## Modules
//! - `types` - Core data structures (UserId, ChallengeRecord, Notice, etc.)
//! - `error` - Common error types
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::GatekeeperError;
pub use types::*;
