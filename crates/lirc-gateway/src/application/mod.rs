//! Application layer use cases for the gateway.
//!
//! # What use cases does the gateway have?
//!
//! - **`discover_devices`** – Asks lircd for its remotes and their commands
//!   and maps every raw command to a hub button. Produces a complete
//!   `DeviceSet` or nothing.
//!
//! - **`device_registry`** – Holds the published `DeviceSet` and turns a
//!   button activation into exactly one `SEND_ONCE`.
//!
//! - **`dispatch_button`** – The entry point for hub button presses.
//!
//! - **`run_gateway`** – Reacts to connection events: discovery on connect
//!   and on lircd `SIGHUP`, hub registration, fatal error classification.
//!
//! The seams to the outside world are traits: `CommandChannel`
//! (`command_channel`) for lircd and `DeviceHub` (`device_hub`) for the hub.
//! Their implementations live in `infrastructure`.

pub mod command_channel;
pub mod device_hub;
pub mod device_registry;
pub mod discover_devices;
pub mod dispatch_button;
pub mod run_gateway;
