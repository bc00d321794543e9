use serde::{Deserialize, Serialize};

/// Per-result error the gateway reports for a device that should be retried.
pub const UNAVAILABLE: &str = "Unavailable";

/// Downstream message body
#[derive(Debug, Serialize)]
pub struct GcmMessage<'a> {
    pub registration_ids: &'a [String],
    pub data: PingData,
}

/// Data payload: a bare "check for new items" ping, no item content
#[derive(Debug, Serialize)]
pub struct PingData {
    pub message: &'static str,
}

impl Default for PingData {
    fn default() -> Self {
        Self { message: "ping" }
    }
}

/// Gateway API response
#[derive(Debug, Deserialize)]
pub struct GcmApiResponse {
    #[serde(default)]
    pub multicast_id: i64,
    #[serde(default)]
    pub success: usize,
    #[serde(default)]
    pub failure: usize,
    #[serde(default)]
    pub canonical_ids: usize,
    #[serde(default)]
    pub results: Vec<GcmResultEntry>,
}

/// One entry per registration id, in request order
#[derive(Debug, Clone, Deserialize)]
pub struct GcmResultEntry {
    pub message_id: Option<String>,
    pub registration_id: Option<String>,
    pub error: Option<String>,
}

/// Outcome of a ping across all attempts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GcmSendResult {
    pub success_count: usize,
    pub failure_count: usize,
    /// Registration ids the gateway reported a newer canonical id for
    pub canonical_ids: Vec<(String, String)>,
    /// Registration ids that failed permanently, with the gateway's error
    pub failed: Vec<(String, String)>,
    pub attempts: u32,
}
