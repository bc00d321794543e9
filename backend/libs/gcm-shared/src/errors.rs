use thiserror::Error;

/// GCM Client Error Types
#[derive(Error, Debug)]
pub enum GcmError {
    #[error("No registration ids given")]
    NoRecipients,

    #[error("GCM send request failed: {0}")]
    SendRequestError(String),

    #[error("Failed to parse GCM response: {0}")]
    ResponseParseError(String),

    #[error("GCM API error: {0} - {1}")]
    ApiError(u16, String),

    #[error("GCM rejected the server API key")]
    Unauthorized,

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl GcmError {
    /// Whether the whole request may be sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            GcmError::SendRequestError(_) => true,
            GcmError::ApiError(status, _) => *status >= 500,
            _ => false,
        }
    }
}

impl From<GcmError> for String {
    fn from(err: GcmError) -> Self {
        err.to_string()
    }
}
