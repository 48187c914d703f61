//! The hub seam: device registration, brain discovery and the callback server.
//!
//! The application layer only knows this trait. `infrastructure::hub`
//! provides the line-JSON callback server used in production and a recording
//! hub for tests.

use std::sync::Arc;

use async_trait::async_trait;
use lirc_core::DeviceDescriptor;
use thiserror::Error;

use crate::application::dispatch_button::ButtonHandler;

/// Errors reported by a [`DeviceHub`].
#[derive(Debug, Error)]
pub enum HubError {
    /// No brain address was configured and none could be discovered.
    #[error("could not discover a NEEO brain: {0}")]
    BrainDiscovery(String),

    /// The callback server could not bind its port.
    #[error("failed to start callback server on port {port}: {source}")]
    ServerStart {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The hub refused the device list.
    #[error("device registration failed: {0}")]
    Registration(String),
}

/// Parameters of [`DeviceHub::start_server`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Brain address the server registers with.
    pub brain: String,
    /// Local port for button callbacks.
    pub port: u16,
    /// Callback URL announced to the brain; `None` lets the hub choose.
    pub base_url: Option<String>,
    /// Server name shown on the brain.
    pub name: String,
}

/// The home-automation hub as seen by the gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceHub: Send + Sync {
    /// Finds a brain on the network when none is configured.
    async fn discover_brain(&self) -> Result<String, HubError>;

    /// Replaces the published device list.
    async fn register_devices(&self, devices: Vec<DeviceDescriptor>) -> Result<(), HubError>;

    /// Starts serving button callbacks to `handler`. Called once.
    async fn start_server(
        &self,
        options: ServerOptions,
        handler: Arc<dyn ButtonHandler>,
    ) -> Result<(), HubError>;
}
