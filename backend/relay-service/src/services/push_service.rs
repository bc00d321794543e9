/// Push Service
///
/// Entry point for producers and non-live clients:
/// - submission persists an item and then routes it
/// - pending retrieval hands back and soft-deletes stored items
/// - mobile registration binds a gateway identifier to a token
/// - token issuance mints the identifier clients hand over in their handshake
use std::sync::Arc;

use tracing::info;

use super::dispatch_router::{DispatchOutcome, DispatchRouter};
use crate::connection::handler::short_token;
use crate::error::Result;
use crate::models::{NewPushItem, PushItem};
use crate::store::Store;

pub struct PushService {
    store: Arc<dyn Store>,
    router: Arc<DispatchRouter>,
}

impl PushService {
    pub fn new(store: Arc<dyn Store>, router: Arc<DispatchRouter>) -> Self {
        Self { store, router }
    }

    /// Persist then route. Validation failures return before anything is routed.
    pub async fn submit(&self, item: NewPushItem) -> Result<(PushItem, DispatchOutcome)> {
        let mut item = self.store.save_item(item).await?;
        info!(
            item_id = item.id,
            token = %short_token(&item.token),
            priority = item.priority.as_i16(),
            "Push item saved"
        );

        let outcome = self.router.route(&item).await;
        if outcome.sound_cleared {
            item.sound = false;
        }
        Ok((item, outcome))
    }

    pub async fn issue_token(&self) -> Result<String> {
        let token = self.store.issue_token().await?;
        info!(token = %short_token(&token), "Token issued");
        Ok(token)
    }

    pub async fn retrieve_pending(&self, token: &str) -> Result<Vec<PushItem>> {
        let items = self.store.take_pending(token).await?;
        if !items.is_empty() {
            info!(
                token = %short_token(token),
                count = items.len(),
                "Pending items retrieved"
            );
        }
        Ok(items)
    }

    pub async fn register_mobile_client(&self, gcm_id: &str, token: &str) -> Result<()> {
        self.store.register_mobile_client(gcm_id, token).await?;
        info!(token = %short_token(token), "Mobile client registered");
        Ok(())
    }

    pub async fn is_live(&self, token: &str) -> bool {
        self.router.registry().is_connected(token).await
    }

    pub async fn live_connection_count(&self) -> usize {
        self.router.registry().connection_count().await
    }
}
