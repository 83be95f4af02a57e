//! Common error types for Gatekeeper components.

use thiserror::Error;

/// Common errors across Gatekeeper components
#[derive(Debug, Error)]
pub enum GatekeeperError {
    /// Configuration error (empty catalog, bad config file, missing role id)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configured role does not exist on the platform
    #[error("Role missing: {0}")]
    RoleMissing(String),

    /// The bot lacks a required permission
    #[error("Permission missing: {0}")]
    PermissionMissing(String),

    /// The bot's rank is not above the role it tried to manage
    #[error("Role hierarchy error: {0}")]
    Hierarchy(String),

    /// Platform call failed (fetch, send, grant, kick)
    #[error("Platform error: {0}")]
    Platform(String),

    /// Invalid input/request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatekeeperError {
    /// True when the failure is a deployment problem staff must fix,
    /// not something the user caused.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::RoleMissing(_) | Self::PermissionMissing(_) | Self::Hierarchy(_)
        )
    }

    /// True when retrying the same call later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Platform(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_predicate_covers_staff_errors() {
        assert!(GatekeeperError::RoleMissing("member".into()).is_configuration());
        assert!(GatekeeperError::Hierarchy("below target".into()).is_configuration());
        assert!(!GatekeeperError::Platform("timeout".into()).is_configuration());
    }
}
