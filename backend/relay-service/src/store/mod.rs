/// Persistence boundary of the relay
///
/// The relay core only needs token lookups, item creation, mobile recipient
/// lookups and the sound-hint update. Token issuance, pending-item retrieval
/// and mobile client registration serve the HTTP front door.
use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewPushItem, PushItem};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Existence check only; no credential semantics.
    async fn token_exists(&self, token: &str) -> Result<bool>;

    /// Mint and persist a fresh token a client can hand over in its handshake.
    async fn issue_token(&self) -> Result<String>;

    /// Validate, normalize and persist a submission.
    ///
    /// Fails with `Validation` for an empty title or token and with
    /// `UnknownToken` when the token is not registered.
    async fn save_item(&self, item: NewPushItem) -> Result<PushItem>;

    /// Mobile gateway identifiers registered for the token.
    async fn mobile_recipients(&self, token: &str) -> Result<Vec<String>>;

    /// Persist the cleared sound hint of an item delivered over a live connection.
    async fn mark_delivered(&self, item: &PushItem) -> Result<()>;

    /// Return every live (not deleted) item for the token in creation order,
    /// marking each accessed and soft-deleting it.
    async fn take_pending(&self, token: &str) -> Result<Vec<PushItem>>;

    /// Bind a mobile gateway identifier to a token, moving it away from any
    /// token it was bound to before.
    async fn register_mobile_client(&self, gcm_id: &str, token: &str) -> Result<()>;
}

/// Token format expected by the 36 byte handshake frame.
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().to_string()
}
