//! Button dispatch: the entry point the hub calls when a button is pressed.
//!
//! The hub identifies a press by the external device id (the remote name the
//! device was registered with) and the button name. Dispatch resolves it via
//! the [`DeviceRegistry`] and logs the outcome. The hub gets no result back;
//! a failed press is visible in the log only.

use std::sync::Arc;

use async_trait::async_trait;
use lirc_core::RawCommand;
use tracing::{error, info, warn};

use crate::application::device_registry::{ActivationError, DeviceRegistry};

/// One button press reported by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPress {
    /// External id of the device; the remote name.
    pub device_id: String,
    /// Button name as registered with the hub.
    pub button: String,
}

/// Receiver of hub button presses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ButtonHandler: Send + Sync {
    async fn button_pressed(&self, press: ButtonPress);
}

/// Forwards button presses to the registry.
pub struct ButtonDispatcher {
    registry: Arc<DeviceRegistry>,
}

impl ButtonDispatcher {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// Activates the pressed button and logs the outcome.
    ///
    /// # Errors
    ///
    /// The [`ActivationError`] from the registry, after it has been logged.
    pub async fn dispatch(&self, press: &ButtonPress) -> Result<RawCommand, ActivationError> {
        let result = self.registry.activate(&press.device_id, &press.button).await;
        match &result {
            Ok(command) => info!(
                device = %press.device_id,
                button = %press.button,
                command = %command,
                "button pressed: sent IR command"
            ),
            Err(e @ (ActivationError::UnknownDevice(_) | ActivationError::NotFound { .. })) => {
                warn!(device = %press.device_id, button = %press.button, "button pressed: {e}")
            }
            Err(e @ ActivationError::Send { .. }) => {
                error!(device = %press.device_id, button = %press.button, "button pressed: {e}")
            }
        }
        result
    }
}

#[async_trait]
impl ButtonHandler for ButtonDispatcher {
    async fn button_pressed(&self, press: ButtonPress) {
        // The outcome is already logged by `dispatch`.
        let _ = self.dispatch(&press).await;
    }
}
