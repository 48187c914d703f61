//! Domain model of the gateway: how lircd commands become hub buttons.
//!
//! Nothing in here performs I/O. The gateway crate feeds it what lircd
//! reported and publishes what it produces.
//!
//! - [`naming`] translates one raw command into a button name and label.
//! - [`device`] groups buttons into one virtual device per remote and keeps
//!   the reverse map consulted when a button is pressed.

pub mod device;
pub mod naming;
