/// Live connection subsystem
///
/// Architecture:
/// 1. protocol: line-based handshake, notices and PING/PONG frames
/// 2. registry: token -> bounded outbound queue, at most one per token
/// 3. handler: per-connection Handshaking -> Active -> Closed state machine
/// 4. listener: TCP accept loop, one task per connection

pub mod handler;
pub mod listener;
pub mod protocol;
pub mod registry;

pub use handler::{CloseReason, ConnectionHandler, ConnectionOutcome, ConnectionState, HandshakeError};
pub use listener::serve;
pub use protocol::{KeepAliveConfig, Notice};
pub use registry::{ConnectionRegistry, EnqueueOutcome, OutboundHandle, RegistryError};
