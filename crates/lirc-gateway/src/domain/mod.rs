//! Domain types owned by the gateway binary.
//!
//! The device model itself lives in `lirc_core::domain`; what remains here is
//! the configuration schema.

pub mod config;

pub use config::{GatewayConfig, InvalidConfig};
