/// Per-connection state machine
///
/// `Handshaking -> Active -> Closed`, never re-entered. While Active, one
/// wait point multiplexes the outbound queue, the liveness timer and the
/// socket read side, so neither relay nor liveness can starve the other.
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use super::protocol::{
    generate_nonce, line_frame, parse_token_frame, ping_frame, pong_frame, KeepAliveConfig,
    Notice, TOKEN_FRAME_LEN,
};
use super::registry::{ConnectionRegistry, OutboundHandle};
use crate::error::AppError;
use crate::metrics;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Handshaking,
    Active,
    Closed,
}

/// Why a connection never became Active
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("no token frame within the handshake deadline")]
    Timeout,

    #[error("short token frame: {0}")]
    ShortFrame(std::io::Error),

    #[error("token not found")]
    UnknownToken,

    #[error("client already listening for this token")]
    AlreadyRegistered,

    #[error("store unavailable: {0}")]
    Store(AppError),
}

impl HandshakeError {
    pub fn notice(&self) -> Notice {
        match self {
            HandshakeError::Timeout | HandshakeError::ShortFrame(_) => Notice::Timeout,
            HandshakeError::UnknownToken => Notice::TokenNotFound,
            HandshakeError::AlreadyRegistered => Notice::AlreadyListening,
            HandshakeError::Store(_) => Notice::InternalError,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            HandshakeError::Timeout => "timeout",
            HandshakeError::ShortFrame(_) => "short_frame",
            HandshakeError::UnknownToken => "unknown_token",
            HandshakeError::AlreadyRegistered => "already_registered",
            HandshakeError::Store(_) => "store",
        }
    }
}

/// Why an Active connection was closed
#[derive(Debug)]
pub enum CloseReason {
    ClientDisconnected,
    UnsolicitedData(usize),
    ReadFailed(std::io::Error),
    WriteFailed(std::io::Error),
    PongTimeout,
    PongMismatch,
    QueueClosed,
}

impl CloseReason {
    pub fn label(&self) -> &'static str {
        match self {
            CloseReason::ClientDisconnected => "client_disconnected",
            CloseReason::UnsolicitedData(_) => "unsolicited_data",
            CloseReason::ReadFailed(_) => "read_failed",
            CloseReason::WriteFailed(_) => "write_failed",
            CloseReason::PongTimeout => "pong_timeout",
            CloseReason::PongMismatch => "pong_mismatch",
            CloseReason::QueueClosed => "queue_closed",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::UnsolicitedData(n) => write!(f, "unsolicited data ({} bytes)", n),
            CloseReason::ReadFailed(e) => write!(f, "read failed: {}", e),
            CloseReason::WriteFailed(e) => write!(f, "write failed: {}", e),
            other => f.write_str(other.label()),
        }
    }
}

/// How a connection ended
#[derive(Debug)]
pub enum ConnectionOutcome {
    Rejected(HandshakeError),
    Closed(CloseReason),
}

/// Handles every accepted connection of one relay process
pub struct ConnectionHandler {
    registry: ConnectionRegistry,
    store: Arc<dyn Store>,
    config: KeepAliveConfig,
}

impl ConnectionHandler {
    pub fn new(registry: ConnectionRegistry, store: Arc<dyn Store>, config: KeepAliveConfig) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    pub fn config(&self) -> &KeepAliveConfig {
        &self.config
    }

    /// Drive one connection from accept to close
    pub async fn handle<S>(&self, stream: S, peer: String) -> ConnectionOutcome
    where
        S: AsyncRead + AsyncWrite + Send,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut state = ConnectionState::Handshaking;
        debug!(peer = %peer, state = ?state, "Connection accepted");

        let (handle, mut outbound) = OutboundHandle::channel(self.config.queue_capacity);

        let token = match self.handshake(&mut reader, handle).await {
            Ok(token) => token,
            Err(e) => {
                warn!(peer = %peer, "Handshake rejected: {}", e);
                metrics::inc_handshake_rejected(e.label());
                let _ = writer.write_all(e.notice().as_bytes()).await;
                let _ = writer.shutdown().await;
                state = ConnectionState::Closed;
                debug!(peer = %peer, state = ?state, "Connection closed");
                return ConnectionOutcome::Rejected(e);
            }
        };

        state = ConnectionState::Active;
        info!(peer = %peer, token = %short_token(&token), state = ?state, "Live connection registered");

        let reason = self.run_active(&mut reader, &mut writer, &mut outbound).await;

        // Closed: runs on every exit path out of Active.
        state = ConnectionState::Closed;
        self.registry.unregister(&token).await;
        outbound.close();
        let _ = writer.shutdown().await;
        metrics::inc_connection_closed(reason.label());
        info!(
            peer = %peer,
            token = %short_token(&token),
            state = ?state,
            "Live connection closed: {}",
            reason
        );

        ConnectionOutcome::Closed(reason)
    }

    async fn handshake<R>(&self, reader: &mut R, handle: OutboundHandle) -> Result<String, HandshakeError>
    where
        R: AsyncRead + Unpin,
    {
        let mut frame = [0u8; TOKEN_FRAME_LEN];
        match timeout(self.config.handshake_timeout, reader.read_exact(&mut frame)).await {
            Err(_) => return Err(HandshakeError::Timeout),
            Ok(Err(e)) => return Err(HandshakeError::ShortFrame(e)),
            Ok(Ok(_)) => {}
        }

        let token = parse_token_frame(&frame).ok_or(HandshakeError::UnknownToken)?;

        match self.store.token_exists(&token).await {
            Ok(true) => {}
            Ok(false) => return Err(HandshakeError::UnknownToken),
            Err(e) => return Err(HandshakeError::Store(e)),
        }

        self.registry
            .register(&token, handle)
            .await
            .map_err(|_| HandshakeError::AlreadyRegistered)?;

        Ok(token)
    }

    async fn run_active<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        outbound: &mut mpsc::Receiver<String>,
    ) -> CloseReason
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut next_ping = Instant::now() + self.config.ping_interval;
        let mut scratch = [0u8; 64];

        loop {
            tokio::select! {
                line = outbound.recv() => match line {
                    Some(line) => {
                        if let Err(e) = write_frame(writer, &line_frame(&line)).await {
                            return CloseReason::WriteFailed(e);
                        }
                    }
                    None => return CloseReason::QueueClosed,
                },
                _ = sleep_until(next_ping) => {
                    if let Err(reason) = self.exchange_ping(reader, writer).await {
                        return reason;
                    }
                    next_ping = Instant::now() + self.config.ping_interval;
                }
                read = reader.read(&mut scratch) => {
                    return match read {
                        Ok(0) => CloseReason::ClientDisconnected,
                        Ok(n) => CloseReason::UnsolicitedData(n),
                        Err(e) => CloseReason::ReadFailed(e),
                    };
                }
            }
        }
    }

    async fn exchange_ping<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<(), CloseReason>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let nonce = generate_nonce();
        write_frame(writer, ping_frame(&nonce).as_bytes())
            .await
            .map_err(CloseReason::WriteFailed)?;

        let expected = pong_frame(&nonce);
        let mut reply = vec![0u8; expected.len()];
        match timeout(self.config.ping_timeout, reader.read_exact(&mut reply)).await {
            Err(_) => Err(CloseReason::PongTimeout),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(CloseReason::ClientDisconnected)
            }
            Ok(Err(e)) => Err(CloseReason::ReadFailed(e)),
            Ok(Ok(_)) if reply == expected.as_bytes() => Ok(()),
            Ok(Ok(_)) => Err(CloseReason::PongMismatch),
        }
    }
}

async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Tokens are bearer secrets; log only a prefix.
pub(crate) fn short_token(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;
    use tokio::io::{duplex, BufReader, AsyncBufReadExt, DuplexStream};
    use tokio::task::JoinHandle;

    const TOKEN: &str = "3c9d1e2f-4a5b-4c6d-8e7f-9a0b1c2d3e4f";

    fn fast_config() -> KeepAliveConfig {
        KeepAliveConfig {
            handshake_timeout: Duration::from_millis(200),
            ping_interval: Duration::from_millis(50),
            ping_timeout: Duration::from_millis(200),
            queue_capacity: 8,
        }
    }

    async fn setup(config: KeepAliveConfig) -> (Arc<ConnectionHandler>, ConnectionRegistry) {
        let store = MemoryStore::new();
        store.insert_token(TOKEN).await;
        let registry = ConnectionRegistry::new();
        let handler = Arc::new(ConnectionHandler::new(registry.clone(), Arc::new(store), config));
        (handler, registry)
    }

    fn spawn_connection(handler: &Arc<ConnectionHandler>) -> (DuplexStream, JoinHandle<ConnectionOutcome>) {
        let (client, server) = duplex(1024);
        let handler = handler.clone();
        let task = tokio::spawn(async move { handler.handle(server, "test-peer".into()).await });
        (client, task)
    }

    async fn wait_until_connected(registry: &ConnectionRegistry, token: &str) {
        for _ in 0..100 {
            if registry.is_connected(token).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("token never became live");
    }

    async fn read_all(client: &mut DuplexStream) -> String {
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_handshake_timeout_sends_notice() {
        let (handler, registry) = setup(fast_config()).await;
        let (mut client, task) = spawn_connection(&handler);

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, ConnectionOutcome::Rejected(HandshakeError::Timeout)));
        assert_eq!(read_all(&mut client).await, "Timeout\n");
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_short_frame_is_rejected() {
        let (handler, _registry) = setup(fast_config()).await;
        let (mut client, task) = spawn_connection(&handler);

        client.write_all(b"too-short").await.unwrap();
        client.shutdown().await.unwrap();

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, ConnectionOutcome::Rejected(HandshakeError::ShortFrame(_))));
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let (handler, registry) = setup(fast_config()).await;
        let (mut client, task) = spawn_connection(&handler);

        client
            .write_all(b"ffffffff-ffff-4fff-8fff-ffffffffffff")
            .await
            .unwrap();

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, ConnectionOutcome::Rejected(HandshakeError::UnknownToken)));
        assert_eq!(read_all(&mut client).await, "Token not found!\n");
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_relays_queued_lines_in_order() {
        let (handler, registry) = setup(KeepAliveConfig {
            ping_interval: Duration::from_secs(60),
            ..fast_config()
        })
        .await;
        let (client, task) = spawn_connection(&handler);
        let mut client = BufReader::new(client);

        client.get_mut().write_all(TOKEN.as_bytes()).await.unwrap();
        wait_until_connected(&registry, TOKEN).await;

        let outbound = registry.lookup(TOKEN).await.unwrap();
        for i in 0..3 {
            outbound.try_deliver(format!("{{\"n\":{}}}", i));
        }

        for i in 0..3 {
            let mut line = String::new();
            client.read_line(&mut line).await.unwrap();
            assert_eq!(line, format!("{{\"n\":{}}}\n", i));
        }

        drop(client);
        let outcome = task.await.unwrap();
        assert!(matches!(
            outcome,
            ConnectionOutcome::Closed(CloseReason::ClientDisconnected)
        ));
        assert!(!registry.is_connected(TOKEN).await);
    }

    #[tokio::test]
    async fn test_survives_many_ping_cycles() {
        let (handler, registry) = setup(fast_config()).await;
        let (client, task) = spawn_connection(&handler);
        let mut client = BufReader::new(client);

        client.get_mut().write_all(TOKEN.as_bytes()).await.unwrap();

        for _ in 0..4 {
            let mut line = String::new();
            client.read_line(&mut line).await.unwrap();
            let nonce = line.strip_prefix(":PING ").unwrap().trim_end();
            client
                .get_mut()
                .write_all(pong_frame(nonce).as_bytes())
                .await
                .unwrap();
        }

        assert!(registry.is_connected(TOKEN).await);
        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test]
    async fn test_wrong_nonce_closes_and_unregisters() {
        let (handler, registry) = setup(fast_config()).await;
        let (client, task) = spawn_connection(&handler);
        let mut client = BufReader::new(client);

        client.get_mut().write_all(TOKEN.as_bytes()).await.unwrap();

        let mut line = String::new();
        client.read_line(&mut line).await.unwrap();
        assert!(line.starts_with(":PING "));
        client.get_mut().write_all(b":PONG WRONG\n").await.unwrap();

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, ConnectionOutcome::Closed(CloseReason::PongMismatch)));
        assert!(!registry.is_connected(TOKEN).await);
    }

    #[tokio::test]
    async fn test_missing_pong_closes_and_unregisters() {
        let (handler, registry) = setup(fast_config()).await;
        let (client, task) = spawn_connection(&handler);
        let mut client = BufReader::new(client);

        client.get_mut().write_all(TOKEN.as_bytes()).await.unwrap();

        let mut line = String::new();
        client.read_line(&mut line).await.unwrap();
        assert!(line.starts_with(":PING "));

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, ConnectionOutcome::Closed(CloseReason::PongTimeout)));
        assert!(!registry.is_connected(TOKEN).await);
    }

    #[tokio::test]
    async fn test_unsolicited_data_closes() {
        let (handler, registry) = setup(KeepAliveConfig {
            ping_interval: Duration::from_secs(60),
            ..fast_config()
        })
        .await;
        let (mut client, task) = spawn_connection(&handler);

        client.write_all(TOKEN.as_bytes()).await.unwrap();
        wait_until_connected(&registry, TOKEN).await;
        client.write_all(b"hello?\n").await.unwrap();

        let outcome = task.await.unwrap();
        assert!(matches!(
            outcome,
            ConnectionOutcome::Closed(CloseReason::UnsolicitedData(_))
        ));
        assert!(!registry.is_connected(TOKEN).await);
    }

    #[tokio::test]
    async fn test_duplicate_handshake_leaves_first_connection() {
        let (handler, registry) = setup(KeepAliveConfig {
            ping_interval: Duration::from_secs(60),
            ..fast_config()
        })
        .await;

        let (first, first_task) = spawn_connection(&handler);
        let mut first = BufReader::new(first);
        first.get_mut().write_all(TOKEN.as_bytes()).await.unwrap();
        wait_until_connected(&registry, TOKEN).await;

        let (mut second, second_task) = spawn_connection(&handler);
        second.write_all(TOKEN.as_bytes()).await.unwrap();
        let outcome = second_task.await.unwrap();
        assert!(matches!(
            outcome,
            ConnectionOutcome::Rejected(HandshakeError::AlreadyRegistered)
        ));
        assert_eq!(
            read_all(&mut second).await,
            "Client already listening for this token\n"
        );

        let outbound = registry.lookup(TOKEN).await.unwrap();
        outbound.try_deliver("after-duplicate".into());
        let mut line = String::new();
        first.read_line(&mut line).await.unwrap();
        assert_eq!(line, "after-duplicate\n");
        assert!(!first_task.is_finished());
        first_task.abort();
    }

    #[test]
    fn test_short_token() {
        assert_eq!(short_token(TOKEN), "3c9d1e2f");
        assert_eq!(short_token("abc"), "abc");
    }
}
