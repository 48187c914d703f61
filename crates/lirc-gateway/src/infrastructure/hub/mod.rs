//! [`DeviceHub`](crate::application::device_hub::DeviceHub) implementations.
//!
//! - **`callback_server`** – [`JsonLineHub`], the line-JSON TCP server the
//!   binary runs.
//! - **`messages`** – its wire messages.
//! - **`recording`** – [`RecordingHub`], an in-memory hub for tests.

pub mod callback_server;
pub mod messages;
pub mod recording;

pub use callback_server::JsonLineHub;
pub use recording::RecordingHub;
