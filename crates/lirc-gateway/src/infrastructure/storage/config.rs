//! Loading the gateway configuration and key-mapping files.
//!
//! # Sources and precedence
//!
//! 1. Built-in defaults (see [`GatewayConfig`]).
//! 2. The TOML config file. A missing *default* file is fine; a missing file
//!    the user named explicitly is an error.
//! 3. The JSON key-mapping file, if configured. Entries under `[keys]` in the
//!    TOML file win over entries from this file.
//!
//! CLI flags are applied on top by `main.rs`.
//!
//! # Key-mapping file format
//!
//! ```json
//! {
//!   "VOL_UP":   { "name": "VOLUME UP", "label": "Louder" },
//!   "BTN_MENU": { "name": "MENU" }
//! }
//! ```

use std::path::{Path, PathBuf};

use lirc_core::KeyMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{GatewayConfig, InvalidConfig};

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named file does not exist.
    #[error("config file {path} not found")]
    NotFound { path: PathBuf },

    /// A file system I/O error occurred.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The key-mapping JSON could not be parsed.
    #[error("failed to parse key mapping {path}: {source}")]
    KeyMapping {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration parsed but holds unusable values.
    #[error(transparent)]
    Invalid(#[from] InvalidConfig),
}

/// Reads and validates the TOML config at `path`.
///
/// `explicit` says whether the user named the file. A relative
/// `key_mapping_file` is resolved against the config file's directory.
///
/// # Errors
///
/// [`ConfigError::NotFound`] for a missing explicit file, [`ConfigError::Io`],
/// [`ConfigError::Parse`] or [`ConfigError::Invalid`] otherwise.
pub fn load_config(path: &Path, explicit: bool) -> Result<GatewayConfig, ConfigError> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: GatewayConfig =
                toml::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            info!("loaded configuration from {}", path.display());
            config
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if explicit {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            warn!("no config file at {}; using defaults", path.display());
            GatewayConfig::default()
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if let Some(mapping) = config.key_mapping_file.take() {
        config.key_mapping_file = Some(resolve_relative(path, mapping));
    }
    config.validate()?;
    Ok(config)
}

/// Reads a key-mapping JSON file.
///
/// # Errors
///
/// [`ConfigError::NotFound`], [`ConfigError::Io`] or [`ConfigError::KeyMapping`].
pub fn load_key_mapping(path: &Path) -> Result<KeyMap, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let keys: KeyMap = serde_json::from_str(&content).map_err(|source| ConfigError::KeyMapping {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("loaded {} key mapping(s) from {}", keys.len(), path.display());
    Ok(keys)
}

/// Combines the key-mapping file (`override_file` if given, else the
/// configured one) with the inline `[keys]` table.
///
/// # Errors
///
/// Any error from [`load_key_mapping`].
pub fn effective_key_map(
    config: &GatewayConfig,
    override_file: Option<&Path>,
) -> Result<KeyMap, ConfigError> {
    let file = override_file.or(config.key_mapping_file.as_deref());
    let mut keys = match file {
        Some(path) => load_key_mapping(path)?,
        None => KeyMap::new(),
    };
    keys.extend(config.keys.iter().map(|(raw, rule)| (raw.clone(), rule.clone())));
    Ok(keys)
}

fn resolve_relative(config_path: &Path, file: PathBuf) -> PathBuf {
    if file.is_absolute() {
        return file;
    }
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(file),
        _ => file,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
