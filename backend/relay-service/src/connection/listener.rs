use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use super::handler::ConnectionHandler;

/// Accept live connections forever, one task per connection.
///
/// Tasks are independent: a failing connection never affects the others
/// or the accept loop.
pub async fn serve(listener: TcpListener, handler: Arc<ConnectionHandler>) -> std::io::Result<()> {
    info!("Listening for live connections on {}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(peer = %peer, "Failed to set TCP_NODELAY: {}", e);
                }
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler.handle(stream, peer.to_string()).await;
                });
            }
            Err(e) => warn!("Failed to accept connection: {}", e),
        }
    }
}
