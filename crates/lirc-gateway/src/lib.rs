//! lirc-gateway library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does lirc-gateway do? (for beginners)
//!
//! lircd is the Linux infrared daemon. It knows a set of *remotes* (one per
//! physical remote control it can imitate), each with a list of raw IR
//! commands such as `KEY_POWER` or `SRC_HDMI1`, and it transmits a command
//! when a client sends `SEND_ONCE <remote> <command>` over TCP.
//!
//! The gateway makes those remotes usable from a NEEO home-automation hub:
//!
//! 1. Connects to lircd and keeps the connection alive, reconnecting with
//!    exponential backoff.
//! 2. Discovers every remote and its commands and maps each raw command to a
//!    hub button (`KEY_VOLUME_UP` becomes `VOLUME UP` / "Volume Up").
//! 3. Registers one virtual device per remote with the hub.
//! 4. Turns every hub button press back into the raw command and sends it.
//! 5. Rediscovers when lircd reloads its configuration (`SIGHUP`).
//!
//! # Layers
//!
//! - `domain` – configuration schema.
//! - `application` – use cases, written against the `CommandChannel` and
//!   `DeviceHub` traits.
//! - `infrastructure` – the lircd connection, the hub server and config files.

/// Application layer: use cases of the gateway.
pub mod application;

/// Domain layer: configuration types.
pub mod domain;

/// Infrastructure layer: lircd connection, hub server, config loading.
pub mod infrastructure;
