//! Configuration types for trade-relay

use crate::feed::BINANCE_WS_URL;
use crate::telemetry::LogFormat;
use crate::ws::ReconnectPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub kafka: KafkaConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Exchange feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Symbols to subscribe to, one stream each
    pub symbols: Vec<String>,

    /// Stream base URL; `<symbol>@trade` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,

    /// How long shutdown waits for accepted events to reach the broker
    #[serde(default = "default_flush_timeout_secs")]
    pub flush_timeout_secs: u64,
}

fn default_base_url() -> String {
    BINANCE_WS_URL.to_string()
}
fn default_connect_timeout_secs() -> u64 {
    20
}
fn default_ping_interval_secs() -> u64 {
    20
}
fn default_pong_timeout_secs() -> u64 {
    10
}
fn default_flush_timeout_secs() -> u64 {
    10
}

impl FeedConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

/// Kafka configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub topic: String,

    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Where a new consumer group starts
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,

    #[serde(default = "default_producer_retries")]
    pub producer_retries: u32,

    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Total time the producer may spend delivering one message, retries included
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
}

fn default_group_id() -> String {
    "crypto_consumer_group".to_string()
}
fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}
fn default_producer_retries() -> u32 {
    5
}
fn default_linger_ms() -> u64 {
    100
}
fn default_batch_size() -> u32 {
    16_384
}
fn default_message_timeout_ms() -> u64 {
    30_000
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "crypto_prices".to_string(),
            group_id: default_group_id(),
            auto_offset_reset: default_auto_offset_reset(),
            producer_retries: default_producer_retries(),
            linger_ms: default_linger_ms(),
            batch_size: default_batch_size(),
            message_timeout_ms: default_message_timeout_ms(),
        }
    }
}

/// Trade store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Postgres connection string
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Create the trade table on consumer startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    20
}
fn default_acquire_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// Consumer worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Independent workers in the consumer group
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bounded wait of one broker poll
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Pause before retrying a message whose persistence failed
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Consecutive store-unavailable failures before the worker gives up (0 = never)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_workers() -> usize {
    1
}
fn default_poll_timeout_ms() -> u64 {
    1_000
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_max_consecutive_failures() -> u32 {
    10
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_timeout_ms: default_poll_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl ConsumerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus listener port; metrics are not exported when unset
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
