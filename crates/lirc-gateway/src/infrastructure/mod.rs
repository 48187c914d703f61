//! Infrastructure layer for the gateway.
//!
//! Contains the I/O-facing adapters: the lircd TCP connection, the hub
//! callback server and the configuration files.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `lirc_core`, but MUST NOT be imported by the `application` or domain layers.
//!
//! # Sub-modules
//!
//! - **`lirc_conn`** – the single lircd connection: line transport, FIFO
//!   request correlation and reconnect with backoff. Provides `LircClient`,
//!   the production `CommandChannel`.
//!
//! - **`hub`** – `DeviceHub` implementations: the line-JSON callback server
//!   and an in-memory recording hub for tests.
//!
//! - **`storage`** – TOML config and JSON key-mapping loading.

pub mod hub;
pub mod lirc_conn;
pub mod storage;
