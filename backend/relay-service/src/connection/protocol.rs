/// KeepAlive protocol frames
///
/// The protocol is server-to-client only once the handshake is done. The
/// client sends exactly two kinds of bytes: the fixed-length token frame
/// right after connecting, and PONG replies to the server's PINGs.
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;

/// The token frame is the literal token string: no delimiter, no length prefix.
pub const TOKEN_FRAME_LEN: usize = 36;

pub const NONCE_LEN: usize = 5;

/// `:PING ` + nonce + `\n`
pub const PING_FRAME_LEN: usize = 6 + NONCE_LEN + 1;

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Timing and buffering of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveConfig {
    pub handshake_timeout: Duration,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Text notices written to a client right before the server closes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Timeout,
    TokenNotFound,
    AlreadyListening,
    InternalError,
}

impl Notice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Notice::Timeout => "Timeout\n",
            Notice::TokenNotFound => "Token not found!\n",
            Notice::AlreadyListening => "Client already listening for this token\n",
            Notice::InternalError => "Internal error\n",
        }
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

/// Interpret a token frame; a frame that is not UTF-8 can't name a token.
pub fn parse_token_frame(frame: &[u8]) -> Option<String> {
    std::str::from_utf8(frame).ok().map(str::to_owned)
}

pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

pub fn ping_frame(nonce: &str) -> String {
    format!(":PING {}\n", nonce)
}

pub fn pong_frame(nonce: &str) -> String {
    format!(":PONG {}\n", nonce)
}

/// Frame one outbound line
pub fn line_frame(line: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(line.len() + 1);
    frame.extend_from_slice(line.as_bytes());
    frame.push(b'\n');
    frame
}
