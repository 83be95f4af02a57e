//! Platform boundary: the capability set the core needs from the host
//! chat platform.
//!
//! The verification core and the stock module never talk to a concrete
//! chat API. They call [`ChatPlatform`], and an adapter renders notices
//! and performs role/member operations against the real host.

use async_trait::async_trait;
use gatekeeper_common::{ChannelId, Notice, RoleId, UserId};
use thiserror::Error;

mod console;
mod memory;

pub use console::run_console_loop;
pub use memory::{Delivery, MemoryPlatform};

/// A permission the bot's own account may or may not hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// May grant/revoke roles
    ManageRoles,
    /// May remove members from the community
    KickMembers,
}

/// Failure of a single platform call.
///
/// Callers in the core never let these escape; they are folded into
/// structured outcomes at the executor boundary.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("member not found: {0}")]
    MemberNotFound(String),

    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("operation rejected: {0}")]
    Rejected(String),
}

/// Abstract host-platform capability set: identity, messaging, role
/// management, removal.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Membership test: does `user` currently hold `role`?
    async fn member_has_role(&self, user: &UserId, role: &RoleId) -> Result<bool, PlatformError>;

    /// Rank of a role, or `None` when the role does not exist
    async fn role_rank(&self, role: &RoleId) -> Result<Option<u32>, PlatformError>;

    /// The bot's own effective rank
    async fn bot_rank(&self) -> Result<u32, PlatformError>;

    /// Does the bot's own account hold `cap`?
    async fn bot_has(&self, cap: Capability) -> Result<bool, PlatformError>;

    /// Assign `role` to `user`
    async fn grant_role(&self, user: &UserId, role: &RoleId) -> Result<(), PlatformError>;

    /// Remove `user` from the community
    async fn kick(&self, user: &UserId, reason: &str) -> Result<(), PlatformError>;

    /// Private notification to a user (best-effort at call sites)
    async fn dm(&self, user: &UserId, notice: &Notice) -> Result<(), PlatformError>;

    /// Notification into a channel (best-effort at call sites)
    async fn send(&self, channel: &ChannelId, notice: &Notice) -> Result<(), PlatformError>;
}
