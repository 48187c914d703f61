//! Gateway configuration schema.
//!
//! The configuration file is TOML. Every field has a default, so an empty
//! file (or no file at all) yields a working configuration that talks to a
//! lircd on `localhost:8765`:
//!
//! ```toml
//! log_level = "info"
//! key_mapping_file = "key-mapping.json"
//!
//! [lirc]
//! host = "raspberrypi.local"
//! port = 8765
//!
//! [neeo]
//! brain_ip = "192.168.1.20"
//! callback_port = 6336
//!
//! [keys.VOL_UP]
//! name = "VOLUME UP"
//! ```
//!
//! Loading from disk lives in `infrastructure::storage`; this module only
//! defines the shape, the defaults and the conversions into the settings the
//! other layers consume.

use std::path::PathBuf;
use std::time::Duration;

use lirc_core::{protocol::DEFAULT_PORT, DeviceStyle, KeyMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configuration value that parses but cannot be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid configuration: {field}: {reason}")]
pub struct InvalidConfig {
    pub field: &'static str,
    pub reason: String,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// JSON file with raw command overrides, merged under `[keys]`.
    ///
    /// Relative paths are resolved against the directory of the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_mapping_file: Option<PathBuf>,
    #[serde(default)]
    pub lirc: LircSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub neeo: NeeoSection,
    #[serde(default)]
    pub device: DeviceSection,
    /// Inline overrides keyed by raw command.
    #[serde(default)]
    pub keys: KeyMap,
}

/// Where lircd listens and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LircSection {
    #[serde(default = "default_lirc_host")]
    pub host: String,
    #[serde(default = "default_lirc_port")]
    pub port: u16,
    /// Upper bound for one request's complete reply.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconnectSection {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    /// Consecutive failed attempts before giving up; `0` retries forever.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Hub-side settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NeeoSection {
    /// Brain address; auto-discovered when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brain_ip: Option<String>,
    /// Address the brain should use to reach the callback server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_ip: Option<String>,
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

/// Static attributes of every published device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSection {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    #[serde(default = "default_search_tokens")]
    pub search_tokens: Vec<String>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_lirc_host() -> String {
    "localhost".to_string()
}
fn default_lirc_port() -> u16 {
    DEFAULT_PORT
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_multiplier() -> u32 {
    2
}
fn default_max_retries() -> u32 {
    10
}
fn default_callback_port() -> u16 {
    6336
}
fn default_server_name() -> String {
    "lirc-gateway".to_string()
}
fn default_name_prefix() -> String {
    DeviceStyle::default().name_prefix
}
fn default_manufacturer() -> String {
    DeviceStyle::default().manufacturer
}
fn default_device_type() -> String {
    DeviceStyle::default().device_type
}
fn default_search_tokens() -> Vec<String> {
    DeviceStyle::default().search_tokens
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            key_mapping_file: None,
            lirc: LircSection::default(),
            reconnect: ReconnectSection::default(),
            neeo: NeeoSection::default(),
            device: DeviceSection::default(),
            keys: KeyMap::new(),
        }
    }
}

impl Default for LircSection {
    fn default() -> Self {
        Self {
            host: default_lirc_host(),
            port: default_lirc_port(),
            request_timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for NeeoSection {
    fn default() -> Self {
        Self {
            brain_ip: None,
            callback_ip: None,
            callback_port: default_callback_port(),
            server_name: default_server_name(),
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            manufacturer: default_manufacturer(),
            device_type: default_device_type(),
            search_tokens: default_search_tokens(),
        }
    }
}

// ── Validation and conversions ────────────────────────────────────────────────

impl GatewayConfig {
    /// Rejects values that would make the gateway misbehave at runtime.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let invalid = |field: &'static str, reason: &str| {
            Err(InvalidConfig {
                field,
                reason: reason.to_string(),
            })
        };

        if self.lirc.host.trim().is_empty() {
            return invalid("lirc.host", "must not be empty");
        }
        if self.lirc.port == 0 {
            return invalid("lirc.port", "must not be 0");
        }
        if self.lirc.request_timeout_ms == 0 {
            return invalid("lirc.request_timeout_ms", "must be greater than 0");
        }
        if self.lirc.connect_timeout_ms == 0 {
            return invalid("lirc.connect_timeout_ms", "must be greater than 0");
        }
        if self.reconnect.initial_delay_ms == 0 {
            return invalid("reconnect.initial_delay_ms", "must be greater than 0");
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            return invalid("reconnect.max_delay_ms", "must not be below initial_delay_ms");
        }
        if self.reconnect.multiplier == 0 {
            return invalid("reconnect.multiplier", "must be at least 1");
        }
        if self.device.name_prefix.trim().is_empty() {
            return invalid("device.name_prefix", "must not be empty");
        }
        Ok(())
    }

    pub fn device_style(&self) -> DeviceStyle {
        DeviceStyle {
            name_prefix: self.device.name_prefix.clone(),
            manufacturer: self.device.manufacturer.clone(),
            device_type: self.device.device_type.clone(),
            search_tokens: self.device.search_tokens.clone(),
        }
    }

    /// Base URL the brain uses for callbacks, if a callback address is pinned.
    pub fn callback_base_url(&self) -> Option<String> {
        self.neeo
            .callback_ip
            .as_ref()
            .map(|ip| format!("http://{}:{}", ip, self.neeo.callback_port))
    }
}

impl LircSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
