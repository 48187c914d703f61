//! # lirc-core
//!
//! Shared library for the LIRC gateway: the lircd text protocol and the
//! device model built from a lircd inventory.
//!
//! The crate has no dependencies on sockets, async runtimes or the hub. The
//! gateway binary (`lirc-gateway`) owns all of that and uses this crate for
//! the parts that can be tested as plain functions.
//!
//! # Architecture overview (for beginners)
//!
//! [lircd](https://www.lirc.org) is the Linux daemon that drives infrared
//! transmitters. It exposes a small line-oriented protocol over TCP. The
//! gateway asks lircd which remotes it knows and which commands each remote
//! has, turns every remote into a *virtual device* for the home-automation
//! hub, and sends `SEND_ONCE` when a hub button is pressed.
//!
//! - **`protocol`** – The lircd vocabulary (`VERSION`, `LIST`, `SEND_ONCE`),
//!   request encoding and an incremental parser for reply blocks, `SIGHUP`
//!   broadcasts and receive events.
//!
//! - **`domain`** – Naming rules that turn `KEY_VOLUME_UP` into the button
//!   `VOLUME UP` labelled `Volume Up`, and the immutable device set holding the
//!   button name → raw command reverse map.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `lirc_core::DeviceSet` instead of `lirc_core::domain::device::DeviceSet`.
pub use domain::device::{
    Button, ButtonDescriptor, DeviceDescriptor, DeviceHandle, DeviceSet, DeviceSetBuilder,
    DeviceStyle, RawCommand, RegistryError, RemoteName, VirtualDevice,
};
pub use domain::naming::{map_raw_command, title_case, ButtonMapping, KeyMap, MappingRule};
pub use protocol::codec::{encode_request, ProtocolError, ReplyParser};
pub use protocol::messages::{ButtonEvent, Frame, Reply, ReplyStatus, Request, Verb};
