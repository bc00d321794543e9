pub mod dispatch_router;
pub mod gateway;
pub mod push_service;

pub use dispatch_router::{DispatchOutcome, DispatchRouter, LiveDelivery};
pub use gateway::{DisabledGateway, GcmGateway, MobilePushGateway};
pub use push_service::PushService;
