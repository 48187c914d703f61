//! JSON messages of the hub callback protocol.
//!
//! One JSON object per line, discriminated by a `"type"` field:
//!
//! ```json
//! {"type":"ButtonPressed","device_id":"livingroom","button":"POWER"}
//! {"type":"ListDevices"}
//! ```
//!
//! The server answers every request line with exactly one response line.

use lirc_core::DeviceDescriptor;
use serde::{Deserialize, Serialize};

/// Lines the hub sends to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HubRequest {
    /// A button of a registered device was activated.
    ButtonPressed {
        /// External device id; the remote name.
        device_id: String,
        /// Button name as registered.
        button: String,
    },
    /// Asks for the currently registered devices.
    ListDevices,
}

/// Lines the gateway sends back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum HubResponse {
    /// The request was accepted. Button presses are acknowledged before the
    /// IR command is sent.
    Ack,
    /// Reply to [`HubRequest::ListDevices`].
    Devices { devices: Vec<DeviceDescriptor> },
    /// The request line could not be understood.
    Error { message: String },
}
