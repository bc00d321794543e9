use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::GcmError;
use crate::models::*;

/// Legacy HTTP send endpoint
pub const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Retries after the first attempt
pub const DEFAULT_RETRY_COUNT: u32 = 2;

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Mobile push gateway client
///
/// Sends data-only "ping" messages to a batch of registration ids. The
/// message carries no item content; a woken device is expected to fetch
/// its pending items on its own.
pub struct GcmClient {
    api_key: String,
    endpoint: String,
    retry_count: u32,
    initial_backoff: Duration,
    http_client: reqwest::Client,
}

impl GcmClient {
    /// Create new client authenticating with the server API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry_count: DEFAULT_RETRY_COUNT,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Wake every device in `registration_ids`
    ///
    /// Network errors and 5xx responses resend the whole batch; a 200 response
    /// with per-device `Unavailable` errors resends only those devices. Both
    /// share the same retry budget and exponential backoff.
    pub async fn send_ping(&self, registration_ids: &[String]) -> Result<GcmSendResult, GcmError> {
        if registration_ids.is_empty() {
            return Err(GcmError::NoRecipients);
        }

        let max_attempts = self.retry_count + 1;
        let mut pending = registration_ids.to_vec();
        let mut result = GcmSendResult::default();
        let mut backoff = self.initial_backoff;

        for attempt in 1..=max_attempts {
            result.attempts = attempt;
            let can_retry = attempt < max_attempts;

            match self.send_once(&pending).await {
                Ok(response) => {
                    let mut retry = Vec::new();
                    for (i, id) in pending.iter().enumerate() {
                        let entry = response.results.get(i);
                        match entry.and_then(|e| e.error.as_deref()) {
                            None if entry.is_some() => {
                                result.success_count += 1;
                                if let Some(canonical) =
                                    entry.and_then(|e| e.registration_id.clone())
                                {
                                    result.canonical_ids.push((id.clone(), canonical));
                                }
                            }
                            None => {
                                result.failure_count += 1;
                                result.failed.push((id.clone(), "MissingResult".to_string()));
                            }
                            Some(UNAVAILABLE) if can_retry => retry.push(id.clone()),
                            Some(err) => {
                                result.failure_count += 1;
                                result.failed.push((id.clone(), err.to_string()));
                            }
                        }
                    }

                    if retry.is_empty() {
                        debug!(
                            "GCM ping done: {} succeeded, {} failed after {} attempt(s)",
                            result.success_count, result.failure_count, attempt
                        );
                        return Ok(result);
                    }
                    debug!("{} registration id(s) unavailable, retrying", retry.len());
                    pending = retry;
                }
                Err(e) if e.is_retryable() && can_retry => {
                    warn!("GCM attempt {} failed, retrying: {}", attempt, e);
                }
                Err(e) if e.is_retryable() => {
                    return Err(GcmError::RetriesExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }

        Ok(result)
    }

    async fn send_once(&self, registration_ids: &[String]) -> Result<GcmApiResponse, GcmError> {
        let message = GcmMessage {
            registration_ids,
            data: PingData::default(),
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&message)
            .send()
            .await
            .map_err(|e| GcmError::SendRequestError(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::OK => response
                .json::<GcmApiResponse>()
                .await
                .map_err(|e| GcmError::ResponseParseError(e.to_string())),
            reqwest::StatusCode::UNAUTHORIZED => Err(GcmError::Unauthorized),
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());

                Err(GcmError::ApiError(status.as_u16(), error_text))
            }
        }
    }
}
