/// HTTP front door of the relay
use actix_web::web;
use serde::Serialize;

pub mod devices;
pub mod live;
pub mod pool;
pub mod push;
pub mod tokens;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Treat an absent or empty form field the same way
pub(crate) fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    tokens::register_routes(cfg);
    push::register_routes(cfg);
    pool::register_routes(cfg);
    devices::register_routes(cfg);
    live::register_routes(cfg);
}
