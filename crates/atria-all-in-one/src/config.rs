use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // HTTP server configuration
    /// Bind host for the ingest + realtime HTTP server
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// Bind port for the ingest + realtime HTTP server
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    // MQTT ingress configuration
    /// MQTT broker host
    #[serde(default = "default_mqtt_broker_host")]
    pub mqtt_broker_host: String,

    /// MQTT broker port
    #[serde(default = "default_mqtt_broker_port")]
    pub mqtt_broker_port: u16,

    /// Client identifier presented to the broker
    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    /// Delay between MQTT reconnect attempts in seconds
    #[serde(default = "default_mqtt_retry_delay_secs")]
    pub mqtt_retry_delay_secs: u64,

    // Registry configuration
    /// Base URL of the device/tenant registry
    #[serde(default = "default_registry_base_url")]
    pub registry_base_url: String,

    /// Timeout for registry lookups in seconds
    #[serde(default = "default_registry_timeout_secs")]
    pub registry_timeout_secs: u64,

    /// Identity cache TTL in seconds; 0 keeps entries until restart
    #[serde(default = "default_resolver_cache_ttl_secs")]
    pub resolver_cache_ttl_secs: u64,

    // Pipeline configuration
    /// Timeout for each realtime publish call in seconds
    #[serde(default = "default_broadcast_timeout_secs")]
    pub broadcast_timeout_secs: u64,

    /// Frames buffered per realtime subscriber before dropping
    #[serde(default = "default_realtime_channel_capacity")]
    pub realtime_channel_capacity: usize,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum connections in the PostgreSQL pool
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

// HTTP defaults
fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5102
}

// MQTT defaults
fn default_mqtt_broker_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_broker_port() -> u16 {
    1883
}

fn default_mqtt_client_id() -> String {
    "atria-ingest".to_string()
}

fn default_mqtt_retry_delay_secs() -> u64 {
    10
}

// Registry defaults
fn default_registry_base_url() -> String {
    "http://localhost:5101".to_string()
}

fn default_registry_timeout_secs() -> u64 {
    10
}

fn default_resolver_cache_ttl_secs() -> u64 {
    0
}

// Pipeline defaults
fn default_broadcast_timeout_secs() -> u64 {
    5
}

fn default_realtime_channel_capacity() -> usize {
    32
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "atria".to_string()
}

fn default_postgres_username() -> String {
    "atria".to_string()
}

fn default_postgres_password() -> String {
    "atria".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("ATRIA"))
            .build()?
            .try_deserialize()
    }
}
