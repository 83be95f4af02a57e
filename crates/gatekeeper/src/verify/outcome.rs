//! Outcome executor: the only component that performs platform side
//! effects for terminal verification outcomes.
//!
//! Both operations capture every platform failure into a structured
//! outcome; nothing escapes to the caller as an error.

use std::sync::Arc;

use gatekeeper_common::{Notice, RoleId, UserId};

use crate::logsink::EventLog;
use crate::platform::{Capability, ChatPlatform};

/// Result of the grant path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Role assigned; DM delivery was best-effort
    Granted,

    /// Configured verified role does not exist on the platform
    RoleMissing,

    /// Bot lacks role management permission
    PermissionMissing,

    /// Bot's rank is not strictly above the target role's rank
    HierarchyError,

    /// Checks passed but the assignment call failed; at-most-once, no retry
    AssignFailed(String),

    /// A pre-check platform call itself failed
    CheckFailed(String),
}

/// Result of the removal path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,

    /// Bot lacks kick permission; logged, no attempt made
    PermissionMissing,

    KickFailed(String),

    CheckFailed(String),
}

/// Performs role grants and removals with ordered pre-checks and
/// best-effort notifications.
pub struct OutcomeExecutor {
    platform: Arc<dyn ChatPlatform>,
    verified_role: RoleId,
    log: Arc<EventLog>,
}

impl OutcomeExecutor {
    pub fn new(platform: Arc<dyn ChatPlatform>, verified_role: RoleId, log: Arc<EventLog>) -> Self {
        Self {
            platform,
            verified_role,
            log,
        }
    }

    /// Grant the verified role.
    ///
    /// Checks in order: role exists, bot may manage roles, bot ranks
    /// strictly above the role. Any failing check short-circuits without
    /// attempting the assignment. On success the user is DMed best-effort;
    /// a failed DM never reverses the grant.
    pub async fn grant(&self, user: &UserId) -> GrantOutcome {
        let rank = match self.platform.role_rank(&self.verified_role).await {
            Ok(Some(rank)) => rank,
            Ok(None) => {
                tracing::error!(role = %self.verified_role, "Verified role not found");
                self.log
                    .emit(Notice::error(
                        "Role Missing",
                        format!("Verified role {} was not found.", self.verified_role),
                    ))
                    .await;
                return GrantOutcome::RoleMissing;
            }
            Err(error) => return self.check_failed("role lookup", error.to_string()).await,
        };

        match self.platform.bot_has(Capability::ManageRoles).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!("Bot lacks role management permission");
                self.log
                    .emit(Notice::error(
                        "Permission Missing",
                        "Bot lacks the role management permission; cannot grant the verified role.",
                    ))
                    .await;
                return GrantOutcome::PermissionMissing;
            }
            Err(error) => return self.check_failed("permission check", error.to_string()).await,
        }

        match self.platform.bot_rank().await {
            Ok(bot_rank) if bot_rank > rank => {}
            Ok(bot_rank) => {
                tracing::error!(bot_rank, role_rank = rank, "Bot ranks at or below the verified role");
                self.log
                    .emit(Notice::error(
                        "Role Hierarchy Issue",
                        "Bot's rank must be above the verified role to assign it.",
                    ))
                    .await;
                return GrantOutcome::HierarchyError;
            }
            Err(error) => return self.check_failed("rank lookup", error.to_string()).await,
        }

        if let Err(error) = self.platform.grant_role(user, &self.verified_role).await {
            tracing::error!(user = %user, error = %error, "Role assignment failed");
            self.log
                .emit(
                    Notice::error(
                        "Role Assignment Failed",
                        "Failed to assign the verified role after a successful challenge.",
                    )
                    .with_field("User", user.to_string()),
                )
                .await;
            return GrantOutcome::AssignFailed(error.to_string());
        }

        // Best-effort congratulation; failure is only traced
        let dm = Notice::success(
            "Verification Complete",
            "You have successfully completed verification. Welcome!",
        );
        if let Err(error) = self.platform.dm(user, &dm).await {
            tracing::debug!(user = %user, error = %error, "Success DM not delivered");
        }

        self.log
            .emit(
                Notice::success("Verification Completed", "Member verified and role granted.")
                    .with_field("User", user.to_string()),
            )
            .await;
        tracing::info!(user = %user, role = %self.verified_role, "Verified role granted");
        GrantOutcome::Granted
    }

    /// Remove a user who exhausted their attempts.
    ///
    /// Kick permission is checked first; the DM goes out before the kick
    /// so the user can still receive it.
    pub async fn remove(&self, user: &UserId) -> RemoveOutcome {
        match self.platform.bot_has(Capability::KickMembers).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(user = %user, "Kick permission missing; removal not attempted");
                self.log
                    .emit(
                        Notice::warning(
                            "Kick Not Performed",
                            "Bot lacks the kick permission; the member was not removed.",
                        )
                        .with_field("User", user.to_string()),
                    )
                    .await;
                return RemoveOutcome::PermissionMissing;
            }
            Err(error) => {
                tracing::warn!(user = %user, error = %error, "Kick permission check failed");
                return RemoveOutcome::CheckFailed(error.to_string());
            }
        }

        let dm = Notice::error(
            "Removed from Server",
            "You have been removed after exceeding the maximum number of verification attempts.",
        );
        if let Err(error) = self.platform.dm(user, &dm).await {
            tracing::debug!(user = %user, error = %error, "Removal DM not delivered");
        }

        if let Err(error) = self.platform.kick(user, "Exceeded verification attempts").await {
            tracing::warn!(user = %user, error = %error, "Kick failed");
            self.log
                .emit(
                    Notice::error("Kick Error", "Failed to remove the member.")
                        .with_field("User", user.to_string()),
                )
                .await;
            return RemoveOutcome::KickFailed(error.to_string());
        }

        self.log
            .emit(
                Notice::error(
                    "Member Removed",
                    "Member removed after exhausting verification attempts.",
                )
                .with_field("User", user.to_string()),
            )
            .await;
        tracing::info!(user = %user, "Member removed after exhausted verification");
        RemoveOutcome::Removed
    }

    async fn check_failed(&self, stage: &str, error: String) -> GrantOutcome {
        tracing::error!(stage, error = %error, "Grant pre-check failed");
        GrantOutcome::CheckFailed(error)
    }
}
