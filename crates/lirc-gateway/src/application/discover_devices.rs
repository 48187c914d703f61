//! Discovery use case: turn lircd's remote inventory into a [`DeviceSet`].
//!
//! # Sequence
//!
//! ```text
//! VERSION            handshake; any failure ends discovery
//! LIST               remote names, one per data line
//! LIST <remote>      for every remote: "<code> <command>" data lines
//! ```
//!
//! Each command line is parsed and mapped with the naming rules from
//! `lirc_core::domain::naming`. Malformed lines and unmappable commands are
//! logged and skipped; one missing button never fails a device. Two commands
//! mapping to the same button name on one remote fail the whole discovery,
//! because publishing an ambiguous device would send the wrong IR code.
//!
//! Discovery always builds a fresh set. Publishing it is the caller's job.

use lirc_core::{
    map_raw_command, protocol::parse_command_line, DeviceSet, DeviceSetBuilder, KeyMap,
    RawCommand, RegistryError, RemoteName, Request,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::command_channel::{CommandChannel, LircError};

/// Why discovery stopped.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// lircd answered `VERSION` with an error or an empty reply.
    #[error("lircd handshake failed: {0}")]
    Handshake(String),

    /// `LIST` was rejected or malformed.
    #[error("listing remotes failed: {0}")]
    ListRemotes(#[source] LircError),

    /// `LIST <remote>` was rejected or malformed.
    #[error("listing commands of remote {remote} failed: {source}")]
    ListCommands {
        remote: RemoteName,
        #[source]
        source: LircError,
    },

    /// The inventory maps to an ambiguous device model.
    #[error("mapping error: {0}")]
    Mapping(#[from] RegistryError),

    /// The connection dropped or timed out; discovery reruns on reconnect.
    #[error("discovery interrupted during {stage}: {source}")]
    Interrupted {
        stage: &'static str,
        #[source]
        source: LircError,
    },
}

impl DiscoveryError {
    /// `true` when the next connection should simply try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, DiscoveryError::Interrupted { .. })
    }
}

/// Why a command line did not become a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The line has no `<code> <command>` shape.
    Malformed,
    /// No override and no `KEY_`/`SRC_` prefix.
    Unmappable,
}

/// A command line left out of the device model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCommand {
    pub remote: RemoteName,
    pub line: String,
    pub reason: SkipReason,
}

/// Outcome of one successful discovery cycle.
#[derive(Debug)]
pub struct Discovery {
    /// lircd's version string from the handshake.
    pub version: String,
    pub devices: DeviceSet,
    pub skipped: Vec<SkippedCommand>,
}

/// Queries lircd and builds a new device set.
///
/// # Errors
///
/// See [`DiscoveryError`]. Transport failures surface as
/// [`DiscoveryError::Interrupted`]; error replies and malformed replies as the
/// stage-specific variants.
pub async fn discover_devices(
    channel: &dyn CommandChannel,
    keys: &KeyMap,
) -> Result<Discovery, DiscoveryError> {
    // ── Handshake ─────────────────────────────────────────────────────────────
    let version = channel
        .call(Request::version())
        .await
        .map_err(|e| classify(e, "handshake", |e| DiscoveryError::Handshake(e.to_string())))?;
    let version = version
        .data
        .first()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DiscoveryError::Handshake("empty VERSION reply".to_string()))?;
    info!(version = %version, "connected to lircd");

    // ── Remotes ───────────────────────────────────────────────────────────────
    let remotes: Vec<RemoteName> = channel
        .call(Request::list_remotes())
        .await
        .map_err(|e| classify(e, "LIST", DiscoveryError::ListRemotes))?
        .data
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(RemoteName::new)
        .collect();
    if remotes.is_empty() {
        warn!("lircd reports no remotes; there is nothing to publish");
    } else {
        info!(count = remotes.len(), "lircd remotes: {}", join(&remotes));
    }

    // ── Commands per remote ───────────────────────────────────────────────────
    let mut builder = DeviceSetBuilder::new();
    let mut skipped = Vec::new();
    for remote in remotes {
        let lines = channel
            .call(Request::list_commands(remote.as_str()))
            .await
            .map_err(|e| {
                let remote = remote.clone();
                classify(e, "LIST <remote>", move |source| {
                    DiscoveryError::ListCommands { remote, source }
                })
            })?
            .data;

        let handle = builder.register_device(remote.clone())?;
        for line in lines {
            let raw = match parse_command_line(&line) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(remote = %remote, line = %line, "skipping command line: {e}");
                    skipped.push(SkippedCommand {
                        remote: remote.clone(),
                        line,
                        reason: SkipReason::Malformed,
                    });
                    continue;
                }
            };
            let Some(mapping) = map_raw_command(raw, keys) else {
                warn!(
                    remote = %remote,
                    command = raw,
                    "command could not be mapped; add a key mapping or use the KEY_/SRC_ prefixes"
                );
                skipped.push(SkippedCommand {
                    remote: remote.clone(),
                    line: raw.to_string(),
                    reason: SkipReason::Unmappable,
                });
                continue;
            };
            debug!(
                remote = %remote,
                command = raw,
                button = %mapping.name,
                label = %mapping.label,
                "mapped command"
            );
            builder.add_button(handle, mapping.name, mapping.label, RawCommand::new(raw))?;
        }
    }

    let devices = builder.build();
    info!(
        devices = devices.len(),
        buttons = devices.button_count(),
        skipped = skipped.len(),
        "discovery complete"
    );
    Ok(Discovery {
        version,
        devices,
        skipped,
    })
}

/// Splits transport failures (retry on reconnect) from contract violations.
fn classify(
    error: LircError,
    stage: &'static str,
    fatal: impl FnOnce(LircError) -> DiscoveryError,
) -> DiscoveryError {
    if error.is_transient() {
        DiscoveryError::Interrupted {
            stage,
            source: error,
        }
    } else {
        fatal(error)
    }
}

fn join(remotes: &[RemoteName]) -> String {
    remotes
        .iter()
        .map(RemoteName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
