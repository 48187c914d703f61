//! Line-JSON hub callback server.
//!
//! The hub connects over TCP and sends one [`HubRequest`] per line. Every
//! line gets one [`HubResponse`] line back. Button presses are acknowledged
//! first and then handed to the [`ButtonHandler`], in the order they arrived
//! on the session.
//!
//! The accept loop polls a shared `running` flag every 200 ms, so the server
//! stops together with the rest of the gateway on Ctrl-C.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lirc_core::DeviceDescriptor;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::device_hub::{DeviceHub, HubError, ServerOptions};
use crate::application::dispatch_button::{ButtonHandler, ButtonPress};
use crate::infrastructure::hub::messages::{HubRequest, HubResponse};

/// [`DeviceHub`] speaking newline-delimited JSON over TCP.
pub struct JsonLineHub {
    bind_host: String,
    devices: Arc<RwLock<Vec<DeviceDescriptor>>>,
    local_addr: OnceLock<SocketAddr>,
    running: Arc<AtomicBool>,
}

impl JsonLineHub {
    /// `bind_host` is the interface the callback server listens on.
    pub fn new(bind_host: impl Into<String>, running: Arc<AtomicBool>) -> Self {
        Self {
            bind_host: bind_host.into(),
            devices: Arc::new(RwLock::new(Vec::new())),
            local_addr: OnceLock::new(),
            running,
        }
    }

    /// Address the server is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }
}

#[async_trait]
impl DeviceHub for JsonLineHub {
    async fn discover_brain(&self) -> Result<String, HubError> {
        Err(HubError::BrainDiscovery(
            "network discovery is not available; set --brain-ip or neeo.brain_ip".to_string(),
        ))
    }

    async fn register_devices(&self, devices: Vec<DeviceDescriptor>) -> Result<(), HubError> {
        for device in &devices {
            debug!(
                device = %device.name,
                remote = %device.remote,
                buttons = device.buttons.len(),
                "registering device"
            );
        }
        let count = devices.len();
        *self.devices.write().await = devices;
        info!("registered {count} device(s) with the hub");
        Ok(())
    }

    async fn start_server(
        &self,
        options: ServerOptions,
        handler: Arc<dyn ButtonHandler>,
    ) -> Result<(), HubError> {
        let listener = TcpListener::bind((self.bind_host.as_str(), options.port))
            .await
            .map_err(|source| HubError::ServerStart {
                port: options.port,
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| HubError::ServerStart {
            port: options.port,
            source,
        })?;
        if self.local_addr.set(addr).is_err() {
            warn!("hub callback server started twice");
        }

        let base_url = options
            .base_url
            .clone()
            .unwrap_or_else(|| format!("http://{addr}"));
        info!(
            brain = %options.brain,
            server = %options.name,
            "hub callback server listening on {addr}, announced as {base_url}"
        );

        tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.devices),
            handler,
            Arc::clone(&self.running),
        ));
        Ok(())
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop(
    listener: TcpListener,
    devices: Arc<RwLock<Vec<DeviceDescriptor>>>,
    handler: Arc<dyn ButtonHandler>,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping hub callback server");
            break;
        }

        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                debug!("hub connected from {peer}");
                let devices = Arc::clone(&devices);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    match run_session(stream, devices, handler).await {
                        Ok(()) => debug!("hub session {peer} closed"),
                        Err(e) => warn!("hub session {peer} closed with error: {e:#}"),
                    }
                });
            }
            Ok(Err(e)) => error!("hub accept error: {e}"),
            Err(_) => {}
        }
    }
}

async fn run_session(
    stream: TcpStream,
    devices: Arc<RwLock<Vec<DeviceDescriptor>>>,
    handler: Arc<dyn ButtonHandler>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await.context("reading hub request")? {
        if line.trim().is_empty() {
            continue;
        }

        let (response, press) = match serde_json::from_str::<HubRequest>(&line) {
            Ok(HubRequest::ButtonPressed { device_id, button }) => {
                (HubResponse::Ack, Some(ButtonPress { device_id, button }))
            }
            Ok(HubRequest::ListDevices) => (
                HubResponse::Devices {
                    devices: devices.read().await.clone(),
                },
                None,
            ),
            Err(e) => {
                warn!("invalid hub request {line:?}: {e}");
                (
                    HubResponse::Error {
                        message: e.to_string(),
                    },
                    None,
                )
            }
        };

        let mut out = serde_json::to_string(&response).context("encoding hub response")?;
        out.push('\n');
        writer
            .write_all(out.as_bytes())
            .await
            .context("writing hub response")?;

        if let Some(press) = press {
            handler.button_pressed(press).await;
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatch_button::MockButtonHandler;
    use lirc_core::{ButtonDescriptor, RemoteName};
    use tokio::io::{BufReader, Lines};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    fn options() -> ServerOptions {
        ServerOptions {
            brain: "127.0.0.1".to_string(),
            port: 0,
            base_url: None,
            name: "lirc-gateway".to_string(),
        }
    }

    fn descriptor(remote: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            name: format!("gateway {remote}"),
            manufacturer: "LIRC".to_string(),
            device_type: "MEDIAPLAYER".to_string(),
            search_tokens: vec!["SDK".to_string()],
            remote: RemoteName::new(remote),
            buttons: vec![ButtonDescriptor {
                name: "POWER".to_string(),
                label: "Power".to_string(),
            }],
        }
    }

    async fn started(handler: MockButtonHandler) -> (JsonLineHub, Arc<AtomicBool>) {
        let running = Arc::new(AtomicBool::new(true));
        let hub = JsonLineHub::new("127.0.0.1", Arc::clone(&running));
        hub.start_server(options(), Arc::new(handler)).await.unwrap();
        (hub, running)
    }

    async fn connect(hub: &JsonLineHub) -> (Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
        let stream = TcpStream::connect(hub.local_addr().unwrap()).await.unwrap();
        let (reader, writer) = stream.into_split();
        (BufReader::new(reader).lines(), writer)
    }

    #[tokio::test]
    async fn test_button_press_is_acked_and_dispatched() {
        // Arrange
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut handler = MockButtonHandler::new();
        handler.expect_button_pressed().times(1).returning(move |press| {
            tx.send(press).unwrap();
        });
        let (hub, running) = started(handler).await;
        let (mut lines, mut writer) = connect(&hub).await;

        // Act
        writer
            .write_all(b"{\"type\":\"ButtonPressed\",\"device_id\":\"tv\",\"button\":\"POWER\"}\n")
            .await
            .unwrap();
        let response = lines.next_line().await.unwrap().unwrap();
        let press = rx.recv().await.unwrap();

        // Assert
        assert_eq!(response, r#"{"type":"Ack"}"#);
        assert_eq!(
            press,
            ButtonPress {
                device_id: "tv".to_string(),
                button: "POWER".to_string(),
            }
        );
        running.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn test_list_devices_returns_latest_registration() {
        // Arrange
        let (hub, running) = started(MockButtonHandler::new()).await;
        hub.register_devices(vec![descriptor("tv")]).await.unwrap();
        hub.register_devices(vec![descriptor("amp"), descriptor("tv")])
            .await
            .unwrap();
        let (mut lines, mut writer) = connect(&hub).await;

        // Act
        writer.write_all(b"{\"type\":\"ListDevices\"}\n").await.unwrap();
        let response = lines.next_line().await.unwrap().unwrap();

        // Assert
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(value["type"], "Devices");
        assert_eq!(value["devices"].as_array().unwrap().len(), 2);
        assert_eq!(value["devices"][0]["remote"], "amp");
        running.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn test_garbage_line_gets_error_and_session_survives() {
        // Arrange
        let (hub, running) = started(MockButtonHandler::new()).await;
        let (mut lines, mut writer) = connect(&hub).await;

        // Act
        writer.write_all(b"not json\n{\"type\":\"ListDevices\"}\n").await.unwrap();
        let first = lines.next_line().await.unwrap().unwrap();
        let second = lines.next_line().await.unwrap().unwrap();

        // Assert
        assert!(first.starts_with(r#"{"type":"Error""#));
        assert!(second.starts_with(r#"{"type":"Devices""#));
        running.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn test_discover_brain_asks_for_explicit_address() {
        let hub = JsonLineHub::new("127.0.0.1", Arc::new(AtomicBool::new(true)));

        let err = hub.discover_brain().await.unwrap_err();

        assert!(matches!(err, HubError::BrainDiscovery(ref m) if m.contains("--brain-ip")));
    }

    #[tokio::test]
    async fn test_port_in_use_is_a_server_start_error() {
        // Arrange
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let hub = JsonLineHub::new("127.0.0.1", Arc::new(AtomicBool::new(true)));

        // Act
        let err = hub
            .start_server(
                ServerOptions { port, ..options() },
                Arc::new(MockButtonHandler::new()),
            )
            .await
            .unwrap_err();

        // Assert
        assert!(matches!(err, HubError::ServerStart { port: p, .. } if p == port));
    }
}
