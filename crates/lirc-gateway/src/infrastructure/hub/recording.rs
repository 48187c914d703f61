//! In-memory [`DeviceHub`] that records every call.
//!
//! Integration tests drive the gateway against it and simulate button
//! presses with [`RecordingHub::press`].

use std::sync::Arc;

use async_trait::async_trait;
use lirc_core::DeviceDescriptor;
use tokio::sync::{Mutex, Notify};

use crate::application::device_hub::{DeviceHub, HubError, ServerOptions};
use crate::application::dispatch_button::{ButtonHandler, ButtonPress};

/// Records registrations and server starts; never touches the network.
#[derive(Default)]
pub struct RecordingHub {
    brain: Option<String>,
    registrations: Mutex<Vec<Vec<DeviceDescriptor>>>,
    server: Mutex<Option<(ServerOptions, Arc<dyn ButtonHandler>)>>,
    changed: Notify,
}

impl RecordingHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub whose brain discovery succeeds with `brain`.
    pub fn with_brain(brain: impl Into<String>) -> Self {
        Self {
            brain: Some(brain.into()),
            ..Self::default()
        }
    }

    /// Every device list registered so far, oldest first.
    pub async fn registrations(&self) -> Vec<Vec<DeviceDescriptor>> {
        self.registrations.lock().await.clone()
    }

    /// Options of the started server, if any.
    pub async fn server_options(&self) -> Option<ServerOptions> {
        self.server.lock().await.as_ref().map(|(options, _)| options.clone())
    }

    /// Waits until at least `count` registrations were recorded.
    pub async fn wait_for_registrations(&self, count: usize) -> Vec<Vec<DeviceDescriptor>> {
        loop {
            let notified = self.changed.notified();
            {
                let registrations = self.registrations.lock().await;
                if registrations.len() >= count {
                    return registrations.clone();
                }
            }
            notified.await;
        }
    }

    /// Delivers a button press the way the hub would.
    ///
    /// # Errors
    ///
    /// [`HubError::Registration`] if the server was never started.
    pub async fn press(&self, device_id: &str, button: &str) -> Result<(), HubError> {
        let handler = self
            .server
            .lock()
            .await
            .as_ref()
            .map(|(_, handler)| Arc::clone(handler))
            .ok_or_else(|| HubError::Registration("server not started".to_string()))?;
        handler
            .button_pressed(ButtonPress {
                device_id: device_id.to_string(),
                button: button.to_string(),
            })
            .await;
        Ok(())
    }
}

#[async_trait]
impl DeviceHub for RecordingHub {
    async fn discover_brain(&self) -> Result<String, HubError> {
        self.brain
            .clone()
            .ok_or_else(|| HubError::BrainDiscovery("no brain on this network".to_string()))
    }

    async fn register_devices(&self, devices: Vec<DeviceDescriptor>) -> Result<(), HubError> {
        self.registrations.lock().await.push(devices);
        self.changed.notify_waiters();
        Ok(())
    }

    async fn start_server(
        &self,
        options: ServerOptions,
        handler: Arc<dyn ButtonHandler>,
    ) -> Result<(), HubError> {
        *self.server.lock().await = Some((options, handler));
        self.changed.notify_waiters();
        Ok(())
    }
}
