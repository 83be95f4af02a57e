//! Inbound intents, decoded once at the boundary.
//!
//! Button and modal identifiers arrive as strings; they are translated
//! here into one exhaustive enum so the rest of the bot dispatches on
//! variants, never on raw identifiers.

use gatekeeper_common::Service;
use gatekeeper_common::constants::component_ids;

/// Everything a user action can ask the bot to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// "Verify" button: start or resume a verification session
    StartVerification,

    /// "Answer" button: open the answer prompt if a session is live
    ShowAnswerModal,

    /// Answer modal submission
    SubmitAnswer { answer: String },

    /// "Help" button
    ShowHelp,

    /// Publish the verification panel (publisher role required)
    PublishPanel,

    /// Liveness check
    Ping,

    /// Show per-service stock counts
    ViewStock,

    /// Append credentials to a service (publisher role required)
    AddStock {
        service: Service,
        entries: Vec<String>,
    },

    /// Pop one credential from a service
    Generate { service: Service },

    /// Drop a service's stock, or all of it (publisher role required)
    ClearStock { service: Option<Service> },

    /// Snapshot all stock lists (publisher role required)
    BackupStock,
}

impl Intent {
    /// Decode a button press by its component identifier
    pub fn from_component(custom_id: &str) -> Option<Self> {
        match custom_id {
            component_ids::VERIFY_START => Some(Self::StartVerification),
            component_ids::VERIFY_ANSWER => Some(Self::ShowAnswerModal),
            component_ids::VERIFY_HELP => Some(Self::ShowHelp),
            _ => None,
        }
    }

    /// Decode a modal submission by its identifier and text input
    pub fn from_modal(custom_id: &str, input: &str) -> Option<Self> {
        match custom_id {
            component_ids::VERIFY_MODAL => Some(Self::SubmitAnswer {
                answer: input.to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_buttons_decode() {
        assert_eq!(
            Intent::from_component("verify:start"),
            Some(Intent::StartVerification)
        );
        assert_eq!(
            Intent::from_component("verify:answer"),
            Some(Intent::ShowAnswerModal)
        );
        assert_eq!(Intent::from_component("verify:help"), Some(Intent::ShowHelp));
    }

    #[test]
    fn unknown_identifiers_decode_to_none() {
        assert_eq!(Intent::from_component("verify:unknown"), None);
        assert_eq!(Intent::from_modal("other:modal", "abc"), None);
    }

    #[test]
    fn modal_submission_carries_the_answer() {
        assert_eq!(
            Intent::from_modal("verify:modal", "AbC1"),
            Some(Intent::SubmitAnswer {
                answer: "AbC1".to_string()
            })
        );
    }
}
