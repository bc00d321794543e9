/// Dispatch Router
///
/// Given a freshly persisted push item, decide where it goes:
///
/// | priority | live connection | mobile wake | sound hint               |
/// |----------|-----------------|-------------|--------------------------|
/// | 1        | attempt         | attempt     | untouched                |
/// | 2        | attempt         | attempt     | cleared on live delivery |
/// | 3        | never           | attempt     | untouched                |
///
/// The router never blocks on a slow client and never surfaces delivery
/// failures to the submitter. Live and mobile delivery are independent.
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::gateway::MobilePushGateway;
use crate::connection::handler::short_token;
use crate::connection::{ConnectionRegistry, EnqueueOutcome};
use crate::metrics;
use crate::models::PushItem;
use crate::store::Store;

/// What happened to the live half of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveDelivery {
    /// Priority forbids live delivery
    Skipped,
    /// No live connection registered for the token
    NotConnected,
    Enqueued(EnqueueOutcome),
    /// The item could not be rendered as a frame
    EncodeFailed,
}

impl LiveDelivery {
    pub fn delivered(&self) -> bool {
        matches!(self, LiveDelivery::Enqueued(EnqueueOutcome::Queued))
    }

    fn label(&self) -> &'static str {
        match self {
            LiveDelivery::Skipped => "skipped",
            LiveDelivery::NotConnected => "not_connected",
            LiveDelivery::Enqueued(outcome) => outcome.as_str(),
            LiveDelivery::EncodeFailed => "encode_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub live: LiveDelivery,
    /// The sound hint was cleared and persisted
    pub sound_cleared: bool,
    /// Number of identifiers handed to the mobile gateway
    pub mobile_recipients: usize,
}

pub struct DispatchRouter {
    registry: ConnectionRegistry,
    store: Arc<dyn Store>,
    gateway: Arc<dyn MobilePushGateway>,
}

impl DispatchRouter {
    pub fn new(
        registry: ConnectionRegistry,
        store: Arc<dyn Store>,
        gateway: Arc<dyn MobilePushGateway>,
    ) -> Self {
        Self {
            registry,
            store,
            gateway,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub async fn route(&self, item: &PushItem) -> DispatchOutcome {
        let live = self.deliver_live(item).await;
        metrics::record_live_delivery(live.label());

        let mut sound_cleared = false;
        if live.delivered() && item.priority.silences_on_live_delivery() {
            match self.store.mark_delivered(item).await {
                Ok(()) => sound_cleared = true,
                Err(e) => error!(item_id = item.id, "Failed to clear sound hint: {}", e),
            }
        }

        let mobile_recipients = self.wake_mobile(item).await;

        debug!(
            item_id = item.id,
            token = %short_token(&item.token),
            live = live.label(),
            mobile_recipients,
            "Push item dispatched"
        );

        DispatchOutcome {
            live,
            sound_cleared,
            mobile_recipients,
        }
    }

    async fn deliver_live(&self, item: &PushItem) -> LiveDelivery {
        if !item.priority.allows_live_delivery() {
            return LiveDelivery::Skipped;
        }

        let Some(handle) = self.registry.lookup(&item.token).await else {
            return LiveDelivery::NotConnected;
        };

        let line = match item.to_frame_line() {
            Ok(line) => line,
            Err(e) => {
                error!(item_id = item.id, "Failed to encode delivery frame: {}", e);
                return LiveDelivery::EncodeFailed;
            }
        };

        let outcome = handle.try_deliver(line);
        if outcome == EnqueueOutcome::QueueFull {
            warn!(
                item_id = item.id,
                token = %short_token(&item.token),
                "Outbound queue full, dropping live delivery"
            );
        }
        LiveDelivery::Enqueued(outcome)
    }

    async fn wake_mobile(&self, item: &PushItem) -> usize {
        let recipients = match self.store.mobile_recipients(&item.token).await {
            Ok(recipients) => recipients,
            Err(e) => {
                error!(item_id = item.id, "Failed to load mobile recipients: {}", e);
                return 0;
            }
        };

        if recipients.is_empty() {
            return 0;
        }

        let count = recipients.len();
        self.gateway.notify(recipients);
        count
    }
}
