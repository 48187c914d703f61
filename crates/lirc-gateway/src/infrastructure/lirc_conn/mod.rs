//! The single TCP connection to lircd.
//!
//! - **`transport`** – line framing of one stream into request/reply pairs.
//! - **`correlator`** – the actor owning the socket and the [`LircClient`]
//!   handle that queues requests onto it.
//! - **`backoff`** – reconnect timing.
//!
//! [`spawn_connection`] wires the three together and is the only entry point
//! the binary uses.

pub mod backoff;
pub mod correlator;
pub mod transport;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::application::command_channel::ChannelEvent;
use crate::domain::GatewayConfig;

pub use backoff::{Backoff, ReconnectPolicy};
pub use correlator::{ConnectionActor, LircClient, PendingRequest};
pub use transport::LircTransport;

/// Queue depth for callers waiting on the connection.
const REQUEST_QUEUE_DEPTH: usize = 64;
/// Buffered lifecycle events.
const EVENT_QUEUE_DEPTH: usize = 128;

/// Everything the connection actor needs.
#[derive(Debug, Clone)]
pub struct LircConnectionConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl LircConnectionConfig {
    /// `host:port` as passed to `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&GatewayConfig> for LircConnectionConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.lirc.host.clone(),
            port: config.lirc.port,
            request_timeout: config.lirc.request_timeout(),
            connect_timeout: config.lirc.connect_timeout(),
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(config.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(config.reconnect.max_delay_ms),
                multiplier: config.reconnect.multiplier,
                max_retries: config.reconnect.max_retries,
            },
        }
    }
}

/// Spawns the connection actor.
///
/// Returns the request handle and the receiver for connection lifecycle
/// events. The actor stops once every clone of the handle is dropped.
pub fn spawn_connection(config: LircConnectionConfig) -> (LircClient, mpsc::Receiver<ChannelEvent>) {
    let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let actor = ConnectionActor::new(config, request_rx, event_tx);
    tokio::spawn(actor.run());
    (LircClient::new(request_tx), event_rx)
}
