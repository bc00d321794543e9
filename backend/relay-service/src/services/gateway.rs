/// Mobile push gateway seam
///
/// The relay core only ever hands a batch of recipient identifiers over and
/// moves on. Delivery, retries and failure reporting belong to the gateway.
use std::sync::Arc;

use gcm_shared::GcmClient;
use tracing::{debug, error, info, warn};

use crate::metrics;

pub trait MobilePushGateway: Send + Sync {
    /// Wake the given recipients. Must not block the caller.
    fn notify(&self, identifiers: Vec<String>);
}

/// Gateway backed by the GCM HTTP API
pub struct GcmGateway {
    client: Arc<GcmClient>,
}

impl GcmGateway {
    pub fn new(client: GcmClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl MobilePushGateway for GcmGateway {
    fn notify(&self, identifiers: Vec<String>) {
        if identifiers.is_empty() {
            return;
        }

        let client = self.client.clone();
        tokio::spawn(async move {
            match client.send_ping(&identifiers).await {
                Ok(result) => {
                    for (old_id, new_id) in &result.canonical_ids {
                        info!(old_id = %old_id, new_id = %new_id, "GCM returned canonical id");
                    }
                    for (id, reason) in &result.failed {
                        warn!(gcm_id = %id, reason = %reason, "GCM rejected recipient");
                    }
                    debug!(
                        success = result.success_count,
                        failure = result.failure_count,
                        attempts = result.attempts,
                        "GCM ping sent"
                    );
                    metrics::record_mobile_wake(if result.failed.is_empty() {
                        "sent"
                    } else {
                        "partial"
                    });
                }
                Err(e) => {
                    error!(recipients = identifiers.len(), "Error sending GCM ping: {}", e);
                    metrics::record_mobile_wake("failed");
                }
            }
        });
    }
}

/// Used when no gateway credentials are configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGateway;

impl MobilePushGateway for DisabledGateway {
    fn notify(&self, identifiers: Vec<String>) {
        debug!(
            recipients = identifiers.len(),
            "Mobile gateway disabled, skipping wake"
        );
        metrics::record_mobile_wake("disabled");
    }
}
