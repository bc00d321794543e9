use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::connection::KeepAliveConfig;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub tcp: TcpConfig,
    pub database: Option<DatabaseConfig>,
    pub gcm: GcmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Live connection listener and keepalive timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    pub handshake_timeout_secs: u64,
    pub ping_interval_secs: u64,
    pub ping_timeout_secs: u64,
    pub outbound_queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcmConfig {
    /// Mobile wakes are disabled when no key is configured
    pub api_key: Option<String>,
    pub endpoint: String,
    pub retry_count: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database = match non_empty_var("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            }),
            None => None,
        };

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("HTTP_PORT", 8080)?,
                log_format: env_or("LOG_FORMAT", LogFormat::Text)?,
            },
            tcp: TcpConfig {
                host: std::env::var("TCP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("TCP_PORT", 8081)?,
                handshake_timeout_secs: env_or("HANDSHAKE_TIMEOUT_SECS", 60)?,
                ping_interval_secs: env_or("PING_INTERVAL_SECS", 120)?,
                ping_timeout_secs: env_or("PING_TIMEOUT_SECS", 20)?,
                outbound_queue_capacity: env_or("OUTBOUND_QUEUE_CAPACITY", 100)?,
            },
            database,
            gcm: GcmConfig {
                api_key: non_empty_var("GCM_API_KEY"),
                endpoint: std::env::var("GCM_ENDPOINT")
                    .unwrap_or_else(|_| gcm_shared::DEFAULT_ENDPOINT.to_string()),
                retry_count: env_or("GCM_RETRY_COUNT", gcm_shared::DEFAULT_RETRY_COUNT)?,
            },
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }

    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.tcp.host, self.tcp.port)
    }

    pub fn keepalive(&self) -> KeepAliveConfig {
        KeepAliveConfig {
            handshake_timeout: Duration::from_secs(self.tcp.handshake_timeout_secs),
            ping_interval: Duration::from_secs(self.tcp.ping_interval_secs),
            ping_timeout: Duration::from_secs(self.tcp.ping_timeout_secs),
            queue_capacity: self.tcp.outbound_queue_capacity,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_env_or_falls_back_when_unset() {
        let value: u64 = env_or("RELAY_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        std::env::set_var("RELAY_TEST_BAD_PORT", "eighty");
        let result: Result<u16> = env_or("RELAY_TEST_BAD_PORT", 80);
        assert!(matches!(result, Err(AppError::Config(_))));
        std::env::remove_var("RELAY_TEST_BAD_PORT");
    }

    #[test]
    fn test_keepalive_from_tcp_config() {
        let config = Config {
            app: AppConfig {
                env: "test".into(),
                host: "127.0.0.1".into(),
                port: 8080,
                log_format: LogFormat::Text,
            },
            tcp: TcpConfig {
                host: "127.0.0.1".into(),
                port: 8081,
                handshake_timeout_secs: 60,
                ping_interval_secs: 120,
                ping_timeout_secs: 20,
                outbound_queue_capacity: 100,
            },
            database: None,
            gcm: GcmConfig {
                api_key: None,
                endpoint: gcm_shared::DEFAULT_ENDPOINT.into(),
                retry_count: 2,
            },
        };

        let keepalive = config.keepalive();
        assert_eq!(keepalive.handshake_timeout, Duration::from_secs(60));
        assert_eq!(keepalive.ping_interval, Duration::from_secs(120));
        assert_eq!(keepalive.ping_timeout, Duration::from_secs(20));
        assert_eq!(keepalive.queue_capacity, 100);
        assert_eq!(config.tcp_addr(), "127.0.0.1:8081");
    }
}
