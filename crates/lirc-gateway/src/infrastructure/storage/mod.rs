//! Storage infrastructure: reading the config and key-mapping files.
//!
//! The gateway never writes configuration; everything here is read once at
//! startup.

pub mod config;

pub use config::{effective_key_map, load_config, load_key_mapping, ConfigError, DEFAULT_CONFIG_FILE};
