//! # Configuration Management Module
//!
//! Central configuration for the gateway, loaded from a TOML file and
//! passed explicitly into the pipeline at construction — there are no
//! ambient globals. Sections:
//!
//! - [`GatewayConfig`] — polling cadence, clock correction, modem ceiling
//! - [`ModemConfig`] — serial device settings
//! - [`ApiConfig`] — telemetry endpoint and credentials
//! - [`StorageConfig`] — outbox location
//! - `[stations]` — identity → sensor-layout assignments
//! - [`LoggingConfig`] — level and optional log file
//! - [`DisplayConfig`] — status display toggle
//!
//! ## Configuration File Format
//!
//! ```toml
//! [gateway]
//! poll_interval_secs = 10
//! clock_offset_hours = 1
//! modem_message_limit = 20
//!
//! [modem]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [api]
//! base_url = "https://telemetry.example.org"
//! username = "gateway"
//! password = "secret"
//!
//! [stations]
//! "+628115013798" = "climatology"
//! "+628115113495" = "floating-station"
//! ```

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::sensor::Mode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub modem: ModemConfig,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    /// Identity → sensor-layout assignments. Identities absent here
    /// decode under the generic layout.
    #[serde(default)]
    pub stations: HashMap<String, Mode>,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Seconds between polling cycles.
    pub poll_interval_secs: u64,
    /// Seconds to back off after a cycle-level error.
    #[serde(default = "default_error_retry_secs")]
    pub error_retry_secs: u64,
    /// Correction between the modem's reported network time and gateway
    /// local time, in whole hours. May be zero or negative.
    #[serde(default = "default_clock_offset_hours")]
    pub clock_offset_hours: i64,
    /// Bulk-delete modem storage once it holds this many messages.
    pub modem_message_limit: usize,
}

fn default_error_retry_secs() -> u64 {
    10
}

fn default_clock_offset_hours() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Serial read timeout per syscall (ms).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Pause after each init command (ms).
    #[serde(default = "default_command_settle_ms")]
    pub command_settle_ms: u64,
    /// Wait before collecting a command's response (ms). List responses
    /// at 115200 baud take a beat to start.
    #[serde(default = "default_response_wait_ms")]
    pub response_wait_ms: u64,
    /// Exit at startup when the modem cannot be opened. When false the
    /// gateway starts anyway and keeps retrying each cycle.
    #[serde(default)]
    pub require_device_at_startup: bool,
}

fn default_read_timeout_ms() -> u64 {
    500
}

fn default_command_settle_ms() -> u64 {
    1000
}

fn default_response_wait_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme + host of the telemetry service.
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,
    pub username: String,
    pub password: String,
    /// Request timeout in seconds.
    #[serde(default = "default_api_timeout_seconds")]
    pub timeout_seconds: u32,
    /// Skip TLS certificate verification. Needed for field deployments
    /// whose endpoint certificate the device cannot validate.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_login_path() -> String {
    "/api/login".to_string()
}

fn default_telemetry_path() -> String {
    "/api/telemetry".to_string()
}

fn default_api_timeout_seconds() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root data directory; the outbox lives at `<data_dir>/outbox`.
    pub data_dir: String,
}

impl StorageConfig {
    pub fn outbox_dir(&self) -> String {
        format!("{}/outbox", self.data_dir.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub enabled: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut stations = HashMap::new();
        // Deployment's explicitly assigned field units; everything else
        // falls back to the generic station layout.
        stations.insert("+628115013798".to_string(), Mode::Climatology);
        stations.insert("+628115113495".to_string(), Mode::FloatingStation);
        stations.insert("+6282195431503".to_string(), Mode::FloatingStation);

        Config {
            gateway: GatewayConfig {
                poll_interval_secs: 10,
                error_retry_secs: 10,
                clock_offset_hours: 1,
                modem_message_limit: 20,
            },
            modem: ModemConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: 115200,
                read_timeout_ms: 500,
                command_settle_ms: 1000,
                response_wait_ms: 3000,
                require_device_at_startup: false,
            },
            api: ApiConfig {
                base_url: "https://telemetry.example.org".to_string(),
                login_path: "/api/login".to_string(),
                telemetry_path: "/api/telemetry".to_string(),
                username: "gateway".to_string(),
                password: "".to_string(),
                timeout_seconds: 10,
                accept_invalid_certs: false,
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            stations,
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("smsgate.log".to_string()),
            },
            display: DisplayConfig::default(),
        }
    }
}
