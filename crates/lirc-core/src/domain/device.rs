//! Virtual devices: one per lircd remote, with the button name → raw command
//! reverse map used when a hub button is pressed.
//!
//! # Lifecycle
//!
//! Devices are built through a [`DeviceSetBuilder`] during discovery and
//! frozen into a [`DeviceSet`] by [`DeviceSetBuilder::build`]. A finished set
//! has no mutating methods: buttons are never added or removed after
//! publication. Rediscovery builds a brand-new set and the registry swaps it
//! in whole.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Name of one remote as lircd knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RemoteName(String);

impl RemoteName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RemoteName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of one IR command as lircd knows it, scoped to a remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RawCommand(String);

impl RawCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised while assembling a [`DeviceSet`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two raw commands of one remote map to the same button name.
    #[error(
        "duplicate button name {name:?} on remote {remote}: \
         {rejected} collides with {existing}"
    )]
    DuplicateName {
        remote: RemoteName,
        name: String,
        existing: RawCommand,
        rejected: RawCommand,
    },

    /// The same remote was registered twice in one discovery cycle.
    #[error("remote {0} registered twice")]
    DuplicateRemote(RemoteName),

    /// A handle from a different builder was used.
    #[error("unknown device handle {0}")]
    UnknownHandle(usize),
}

// ── Devices ───────────────────────────────────────────────────────────────────

/// One button as published to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub name: String,
    pub label: String,
    pub command: RawCommand,
}

/// All buttons of one remote, in discovery order, plus the reverse map.
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    remote: RemoteName,
    buttons: Vec<Button>,
    by_name: HashMap<String, usize>,
}

impl VirtualDevice {
    fn new(remote: RemoteName) -> Self {
        Self {
            remote,
            buttons: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn remote(&self) -> &RemoteName {
        &self.remote
    }

    /// Buttons in the order their raw commands were listed by lircd.
    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    /// Looks up the raw command behind a button name.
    pub fn raw_command(&self, name: &str) -> Option<&RawCommand> {
        self.by_name.get(name).map(|&i| &self.buttons[i].command)
    }

    /// Builds the descriptor handed to the hub for registration.
    pub fn descriptor(&self, style: &DeviceStyle) -> DeviceDescriptor {
        DeviceDescriptor {
            name: format!("{} {}", style.name_prefix, self.remote.as_str().replace('_', " ")),
            manufacturer: style.manufacturer.clone(),
            device_type: style.device_type.clone(),
            search_tokens: style.search_tokens.clone(),
            remote: self.remote.clone(),
            buttons: self
                .buttons
                .iter()
                .map(|b| ButtonDescriptor {
                    name: b.name.clone(),
                    label: b.label.clone(),
                })
                .collect(),
        }
    }

    fn add_button(&mut self, button: Button) -> Result<(), RegistryError> {
        if let Some(&existing) = self.by_name.get(&button.name) {
            return Err(RegistryError::DuplicateName {
                remote: self.remote.clone(),
                name: button.name,
                existing: self.buttons[existing].command.clone(),
                rejected: button.command,
            });
        }
        self.by_name.insert(button.name.clone(), self.buttons.len());
        self.buttons.push(button);
        Ok(())
    }
}

/// Immutable collection of devices produced by one discovery cycle.
#[derive(Debug, Clone, Default)]
pub struct DeviceSet {
    devices: Vec<Arc<VirtualDevice>>,
    by_remote: HashMap<RemoteName, usize>,
}

impl DeviceSet {
    /// An empty set; what the registry holds before the first discovery.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, remote: &str) -> Option<&Arc<VirtualDevice>> {
        self.by_remote.get(remote).map(|&i| &self.devices[i])
    }

    /// Devices in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<VirtualDevice>> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Total number of buttons across all devices.
    pub fn button_count(&self) -> usize {
        self.devices.iter().map(|d| d.buttons.len()).sum()
    }

    pub fn descriptors(&self, style: &DeviceStyle) -> Vec<DeviceDescriptor> {
        self.devices.iter().map(|d| d.descriptor(style)).collect()
    }
}

/// Opaque reference to a device inside a [`DeviceSetBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle(usize);

/// Accumulates devices and buttons for one discovery cycle.
#[derive(Debug, Default)]
pub struct DeviceSetBuilder {
    devices: Vec<VirtualDevice>,
}

impl DeviceSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty device for `remote`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateRemote`] if `remote` is already registered.
    pub fn register_device(&mut self, remote: RemoteName) -> Result<DeviceHandle, RegistryError> {
        if self.devices.iter().any(|d| d.remote == remote) {
            return Err(RegistryError::DuplicateRemote(remote));
        }
        self.devices.push(VirtualDevice::new(remote));
        Ok(DeviceHandle(self.devices.len() - 1))
    }

    /// Appends a button to the device behind `handle`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateName`] if the device already has a button
    /// named `name`; the existing button is left untouched.
    pub fn add_button(
        &mut self,
        handle: DeviceHandle,
        name: impl Into<String>,
        label: impl Into<String>,
        command: RawCommand,
    ) -> Result<(), RegistryError> {
        let device = self
            .devices
            .get_mut(handle.0)
            .ok_or(RegistryError::UnknownHandle(handle.0))?;
        device.add_button(Button {
            name: name.into(),
            label: label.into(),
            command,
        })
    }

    pub fn build(self) -> DeviceSet {
        let by_remote = self
            .devices
            .iter()
            .enumerate()
            .map(|(i, d)| (d.remote.clone(), i))
            .collect();
        DeviceSet {
            devices: self.devices.into_iter().map(Arc::new).collect(),
            by_remote,
        }
    }
}

// ── Hub descriptors ───────────────────────────────────────────────────────────

/// Static attributes shared by every published device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStyle {
    pub name_prefix: String,
    pub manufacturer: String,
    pub device_type: String,
    pub search_tokens: Vec<String>,
}

impl Default for DeviceStyle {
    fn default() -> Self {
        Self {
            name_prefix: "gateway".to_string(),
            manufacturer: "LIRC".to_string(),
            device_type: "MEDIAPLAYER".to_string(),
            search_tokens: vec!["SDK".to_string(), "irsend".to_string()],
        }
    }
}

/// One button entry of a [`DeviceDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonDescriptor {
    pub name: String,
    pub label: String,
}

/// Everything the hub needs to register one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub manufacturer: String,
    pub device_type: String,
    pub search_tokens: Vec<String>,
    /// Used as the external device id in button callbacks.
    pub remote: RemoteName,
    pub buttons: Vec<ButtonDescriptor>,
}
