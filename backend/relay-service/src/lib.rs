pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use connection::{ConnectionHandler, ConnectionRegistry, KeepAliveConfig, OutboundHandle};
pub use error::{AppError, Result};
pub use services::*;
pub use store::{MemoryStore, PgStore, Store};
