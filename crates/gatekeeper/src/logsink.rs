//! Staff-facing event log: channel delivery with console fallback.

use std::sync::Arc;

use gatekeeper_common::{ChannelId, Notice};

use crate::platform::ChatPlatform;

/// Append-only event stream for staff.
///
/// Delivery is best-effort: when no log channel is configured or the send
/// fails, the record falls back to the process log and nothing propagates.
pub struct EventLog {
    platform: Arc<dyn ChatPlatform>,
    channel: Option<ChannelId>,
}

impl EventLog {
    pub fn new(platform: Arc<dyn ChatPlatform>, channel: Option<ChannelId>) -> Self {
        Self { platform, channel }
    }

    pub async fn emit(&self, notice: Notice) {
        match &self.channel {
            Some(channel) => {
                if let Err(error) = self.platform.send(channel, &notice).await {
                    tracing::warn!(
                        channel = %channel,
                        error = %error,
                        title = %notice.title,
                        "log channel delivery failed, falling back to console"
                    );
                }
            }
            None => {
                tracing::info!(title = %notice.title, body = %notice.body, "staff log");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryPlatform;

    #[tokio::test]
    async fn emits_to_configured_channel() {
        let platform = Arc::new(MemoryPlatform::new());
        let log = EventLog::new(platform.clone(), Some(ChannelId::from("staff-log")));

        log.emit(Notice::info("Event", "details")).await;

        let deliveries = platform.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].1.title, "Event");
    }

    #[tokio::test]
    async fn send_failure_does_not_propagate() {
        let platform = Arc::new(MemoryPlatform::new());
        platform.fail_channel_sends(true);
        let log = EventLog::new(platform.clone(), Some(ChannelId::from("staff-log")));

        // Must not panic or error; fallback goes to the process log
        log.emit(Notice::error("Event", "details")).await;
        assert!(platform.deliveries().is_empty());
    }
}
