//! Gateway lifecycle: reacts to connection events with discovery and
//! publication.
//!
//! # Event handling
//!
//! | event            | action                                               |
//! |------------------|------------------------------------------------------|
//! | `Connected`      | discover, publish, register with the hub             |
//! | `ConfigReloaded` | same as `Connected`, on the existing connection      |
//! | `Disconnected`   | log; the connection task reconnects on its own       |
//! | `Unreachable`    | fatal                                                |
//!
//! The hub callback server is started once, after the first successful
//! discovery. Later discoveries only republish the device list.
//!
//! A discovery interrupted by a dropped connection is abandoned without
//! publishing anything; the next `Connected` event starts over.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use lirc_core::{DeviceStyle, KeyMap};
use thiserror::Error;
use tokio::{sync::mpsc, time::timeout};
use tracing::{error, info, warn};

use crate::application::{
    command_channel::{ChannelEvent, CommandChannel},
    device_hub::{DeviceHub, HubError, ServerOptions},
    device_registry::DeviceRegistry,
    discover_devices::{discover_devices, DiscoveryError},
    dispatch_button::{ButtonDispatcher, ButtonHandler},
};

/// Fatal gateway conditions, each with its own process exit code.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// lircd stayed unreachable through every reconnect attempt.
    #[error("lircd unreachable after {attempts} reconnect attempts")]
    Unreachable { attempts: u32 },

    /// The lircd connection task stopped without reporting why.
    #[error("lircd connection task stopped")]
    ConnectionClosed,

    /// Discovery failed for a reason a reconnect will not fix.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Brain discovery, registration or the callback server failed.
    #[error(transparent)]
    Hub(#[from] HubError),
}

impl GatewayError {
    /// Process exit status for this failure.
    ///
    /// | code | meaning                               |
    /// |------|---------------------------------------|
    /// | 2    | lircd unreachable                     |
    /// | 3    | lircd violated the protocol contract  |
    /// | 4    | ambiguous button mapping              |
    /// | 5    | hub failure                           |
    pub fn exit_code(&self) -> u8 {
        match self {
            GatewayError::Unreachable { .. } | GatewayError::ConnectionClosed => 2,
            GatewayError::Discovery(DiscoveryError::Mapping(_)) => 4,
            GatewayError::Discovery(DiscoveryError::Interrupted { .. }) => 2,
            GatewayError::Discovery(_) => 3,
            GatewayError::Hub(_) => 5,
        }
    }
}

/// Static settings of the gateway service.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub keys: KeyMap,
    pub style: DeviceStyle,
    /// Brain address from CLI or config; discovered through the hub if `None`.
    pub brain: Option<String>,
    pub callback_port: u16,
    pub base_url: Option<String>,
    pub server_name: String,
}

/// Drives discovery and publication from connection events.
pub struct GatewayService {
    channel: Arc<dyn CommandChannel>,
    registry: Arc<DeviceRegistry>,
    hub: Arc<dyn DeviceHub>,
    settings: GatewaySettings,
    server_started: bool,
}

impl GatewayService {
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        hub: Arc<dyn DeviceHub>,
        settings: GatewaySettings,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new(Arc::clone(&channel)));
        Self {
            channel,
            registry,
            hub,
            settings,
            server_started: false,
        }
    }

    pub fn registry(&self) -> Arc<DeviceRegistry> {
        Arc::clone(&self.registry)
    }

    /// Processes connection events until `running` is cleared or a fatal
    /// condition occurs.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`]; see [`GatewayError::exit_code`].
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ChannelEvent>,
        running: Arc<AtomicBool>,
    ) -> Result<(), GatewayError> {
        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping gateway");
                return Ok(());
            }

            // Wake up periodically to observe the shutdown flag.
            match timeout(Duration::from_millis(200), events.recv()).await {
                Ok(Some(event)) => self.handle_event(event).await?,
                Ok(None) => return Err(GatewayError::ConnectionClosed),
                Err(_) => {}
            }
        }
    }

    /// Reacts to one connection event.
    ///
    /// # Errors
    ///
    /// Fatal conditions only; transient discovery failures are logged.
    pub async fn handle_event(&mut self, event: ChannelEvent) -> Result<(), GatewayError> {
        match event {
            ChannelEvent::Connected { addr } => {
                info!("lircd connection to {addr} ready; discovering remotes");
                self.refresh().await
            }
            ChannelEvent::ConfigReloaded => {
                info!("lircd reloaded its configuration; rediscovering remotes");
                self.refresh().await
            }
            ChannelEvent::Disconnected { reason } => {
                warn!("lircd connection lost ({reason}); reconnect in progress");
                Ok(())
            }
            ChannelEvent::Unreachable { attempts } => {
                error!("giving up on lircd after {attempts} reconnect attempts");
                Err(GatewayError::Unreachable { attempts })
            }
        }
    }

    async fn refresh(&mut self) -> Result<(), GatewayError> {
        let discovery = match discover_devices(&*self.channel, &self.settings.keys).await {
            Ok(discovery) => discovery,
            Err(e) if e.is_transient() => {
                warn!("{e}; waiting for the next connection");
                return Ok(());
            }
            Err(e) => {
                error!("{e}");
                return Err(e.into());
            }
        };

        let devices = self.registry.publish(discovery.devices).await;
        let descriptors = devices.descriptors(&self.settings.style);
        if descriptors.is_empty() {
            warn!("no devices to register with the hub");
        }
        self.hub.register_devices(descriptors).await?;

        if !self.server_started {
            self.start_server().await?;
            self.server_started = true;
        }
        Ok(())
    }

    async fn start_server(&self) -> Result<(), GatewayError> {
        let brain = match &self.settings.brain {
            Some(brain) => {
                info!("using configured NEEO brain {brain}");
                brain.clone()
            }
            None => {
                info!("discovering a NEEO brain");
                let brain = self.hub.discover_brain().await?;
                info!("brain discovered at {brain}");
                brain
            }
        };

        let options = ServerOptions {
            brain,
            port: self.settings.callback_port,
            base_url: self.settings.base_url.clone(),
            name: self.settings.server_name.clone(),
        };
        let handler: Arc<dyn ButtonHandler> =
            Arc::new(ButtonDispatcher::new(Arc::clone(&self.registry)));
        self.hub.start_server(options, handler).await?;
        info!("READY: search for \"{}\" in the NEEO app", self.settings.style.name_prefix);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::command_channel::{LircError, MockCommandChannel};
    use crate::application::device_hub::MockDeviceHub;
    use lirc_core::{ProtocolError, Reply, ReplyStatus, Request};
    use mockall::predicate::eq;

    fn settings(brain: Option<&str>) -> GatewaySettings {
        GatewaySettings {
            keys: KeyMap::new(),
            style: DeviceStyle::default(),
            brain: brain.map(str::to_string),
            callback_port: 6336,
            base_url: None,
            server_name: "lirc-gateway".to_string(),
        }
    }

    fn ok(request: &Request, data: &[&str]) -> Result<Reply, LircError> {
        Ok(Reply {
            command: request.command_line(),
            status: ReplyStatus::Success,
            data: data.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// lircd with one remote `tv` exposing KEY_POWER.
    fn tv_channel() -> MockCommandChannel {
        let mut channel = MockCommandChannel::new();
        channel.expect_call().returning(|r| match r {
            r if r == Request::version() => ok(&r, &["0.10.1"]),
            r if r == Request::list_remotes() => ok(&r, &["tv"]),
            r => ok(&r, &["0 KEY_POWER"]),
        });
        channel
    }

    #[tokio::test]
    async fn test_connected_publishes_and_starts_server_once() {
        // Arrange
        let mut hub = MockDeviceHub::new();
        hub.expect_register_devices()
            .times(2)
            .withf(|devices| devices.len() == 1 && devices[0].buttons[0].name == "POWER")
            .returning(|_| Ok(()));
        hub.expect_discover_brain().never();
        hub.expect_start_server()
            .times(1)
            .withf(|options, _| options.brain == "10.0.0.2" && options.port == 6336)
            .returning(|_, _| Ok(()));
        let mut service = GatewayService::new(
            Arc::new(tv_channel()),
            Arc::new(hub),
            settings(Some("10.0.0.2")),
        );

        // Act
        service
            .handle_event(ChannelEvent::Connected { addr: "pi:8765".into() })
            .await
            .unwrap();
        service.handle_event(ChannelEvent::ConfigReloaded).await.unwrap();

        // Assert
        assert_eq!(service.registry().snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_brain_is_discovered_through_hub() {
        let mut hub = MockDeviceHub::new();
        hub.expect_register_devices().returning(|_| Ok(()));
        hub.expect_discover_brain()
            .times(1)
            .returning(|| Ok("192.168.1.9".to_string()));
        hub.expect_start_server()
            .withf(|options, _| options.brain == "192.168.1.9")
            .times(1)
            .returning(|_, _| Ok(()));
        let mut service = GatewayService::new(Arc::new(tv_channel()), Arc::new(hub), settings(None));

        service
            .handle_event(ChannelEvent::Connected { addr: "pi:8765".into() })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_brain_discovery_failure_exits_with_hub_code() {
        let mut hub = MockDeviceHub::new();
        hub.expect_register_devices().returning(|_| Ok(()));
        hub.expect_discover_brain()
            .returning(|| Err(HubError::BrainDiscovery("none found".into())));
        let mut service = GatewayService::new(Arc::new(tv_channel()), Arc::new(hub), settings(None));

        let err = service
            .handle_event(ChannelEvent::Connected { addr: "pi:8765".into() })
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 5);
    }

    #[tokio::test]
    async fn test_interrupted_discovery_publishes_nothing() {
        // Arrange
        let mut channel = MockCommandChannel::new();
        channel
            .expect_call()
            .returning(|_| Err(LircError::Connection("closed".into())));
        let mut hub = MockDeviceHub::new();
        hub.expect_register_devices().never();
        hub.expect_start_server().never();
        let mut service = GatewayService::new(Arc::new(channel), Arc::new(hub), settings(Some("b")));

        // Act
        let result = service
            .handle_event(ChannelEvent::Connected { addr: "pi:8765".into() })
            .await;

        // Assert
        assert!(result.is_ok());
        assert!(service.registry().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_handshake_contract_violation_is_fatal() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_call()
            .with(eq(Request::version()))
            .returning(|_| Err(LircError::Parse(ProtocolError::InvalidCount("?".into()))));
        let hub = MockDeviceHub::new();
        let mut service = GatewayService::new(Arc::new(channel), Arc::new(hub), settings(Some("b")));

        let err = service
            .handle_event(ChannelEvent::Connected { addr: "pi:8765".into() })
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_disconnected_is_not_fatal() {
        let mut service = GatewayService::new(
            Arc::new(MockCommandChannel::new()),
            Arc::new(MockDeviceHub::new()),
            settings(None),
        );

        let result = service
            .handle_event(ChannelEvent::Disconnected { reason: "eof".into() })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_is_fatal_with_code_two() {
        let mut service = GatewayService::new(
            Arc::new(MockCommandChannel::new()),
            Arc::new(MockDeviceHub::new()),
            settings(None),
        );

        let err = service
            .handle_event(ChannelEvent::Unreachable { attempts: 10 })
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_when_running_flag_is_cleared() {
        // Arrange
        let service = GatewayService::new(
            Arc::new(MockCommandChannel::new()),
            Arc::new(MockDeviceHub::new()),
            settings(None),
        );
        let (_tx, rx) = mpsc::channel(8);
        let running = Arc::new(AtomicBool::new(false));

        // Act
        let result = service.run(rx, running).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_fails_when_event_source_closes() {
        let service = GatewayService::new(
            Arc::new(MockCommandChannel::new()),
            Arc::new(MockDeviceHub::new()),
            settings(None),
        );
        let (tx, rx) = mpsc::channel(8);
        drop(tx);

        let err = service
            .run(rx, Arc::new(AtomicBool::new(true)))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::ConnectionClosed));
    }

    #[test]
    fn test_mapping_error_exit_code() {
        let err = GatewayError::Discovery(DiscoveryError::Mapping(
            lirc_core::RegistryError::DuplicateRemote(lirc_core::RemoteName::new("tv")),
        ));
        assert_eq!(err.exit_code(), 4);
    }
}
