/// GCM Shared Library
///
/// HTTP client for the mobile push gateway used by the relay to wake
/// devices that are not holding a live connection.
///
/// It handles:
/// - Data-only "ping" messages addressed to a batch of registration ids
/// - Server API key authentication
/// - Bounded retries with exponential backoff for transient failures

pub mod client;
pub mod models;
pub mod errors;

pub use client::{GcmClient, DEFAULT_ENDPOINT, DEFAULT_RETRY_COUNT};
pub use models::GcmSendResult;
pub use errors::GcmError;
