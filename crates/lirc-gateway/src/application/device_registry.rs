//! Device registry: the live device set and button activation.
//!
//! # Atomic swap
//!
//! The registry holds an `Arc<DeviceSet>` behind a `RwLock`. Readers clone
//! the `Arc` and release the lock immediately, so an activation works on one
//! complete set for its whole duration. Rediscovery builds a new set off to
//! the side and [`DeviceRegistry::publish`] replaces the `Arc` in one write.
//! Nobody ever observes a half-built set, and nothing inside a published set
//! is mutated.

use std::sync::Arc;

use lirc_core::{DeviceSet, RawCommand, RemoteName, Request};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::application::command_channel::{CommandChannel, LircError};

/// Why a button press did not result in an IR transmission.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// No published device carries this external id.
    #[error("no device for remote {0:?}")]
    UnknownDevice(String),

    /// The device exists but has no button with this name.
    #[error("remote {remote} has no button named {name:?}")]
    NotFound { remote: RemoteName, name: String },

    /// `SEND_ONCE` failed.
    #[error("sending {command} on remote {remote} failed: {source}")]
    Send {
        remote: RemoteName,
        command: RawCommand,
        #[source]
        source: LircError,
    },
}

/// Holds the current device set and sends IR commands for button presses.
pub struct DeviceRegistry {
    current: RwLock<Arc<DeviceSet>>,
    channel: Arc<dyn CommandChannel>,
}

impl DeviceRegistry {
    /// Creates a registry with an empty device set.
    pub fn new(channel: Arc<dyn CommandChannel>) -> Self {
        Self {
            current: RwLock::new(Arc::new(DeviceSet::empty())),
            channel,
        }
    }

    /// Replaces the whole device set and returns the new snapshot.
    pub async fn publish(&self, devices: DeviceSet) -> Arc<DeviceSet> {
        let devices = Arc::new(devices);
        let previous = {
            let mut guard = self.current.write().await;
            std::mem::replace(&mut *guard, Arc::clone(&devices))
        };
        info!(
            devices = devices.len(),
            buttons = devices.button_count(),
            replaced = previous.len(),
            "published device set"
        );
        devices
    }

    /// The set activations currently resolve against.
    pub async fn snapshot(&self) -> Arc<DeviceSet> {
        Arc::clone(&*self.current.read().await)
    }

    /// Sends the raw command behind button `name` of device `remote`.
    ///
    /// Issues exactly one `SEND_ONCE` and never retries.
    ///
    /// # Errors
    ///
    /// [`ActivationError::UnknownDevice`] / [`ActivationError::NotFound`] if the
    /// lookup fails, [`ActivationError::Send`] if lircd could not be reached or
    /// rejected the command.
    pub async fn activate(&self, remote: &str, name: &str) -> Result<RawCommand, ActivationError> {
        let devices = self.snapshot().await;
        let device = devices
            .get(remote)
            .ok_or_else(|| ActivationError::UnknownDevice(remote.to_string()))?;
        let command = device
            .raw_command(name)
            .cloned()
            .ok_or_else(|| ActivationError::NotFound {
                remote: device.remote().clone(),
                name: name.to_string(),
            })?;

        debug!(remote = %device.remote(), button = name, command = %command, "sending IR command");
        self.channel
            .call(Request::send_once(device.remote().as_str(), command.as_str()))
            .await
            .map_err(|source| ActivationError::Send {
                remote: device.remote().clone(),
                command: command.clone(),
                source,
            })?;
        Ok(command)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
