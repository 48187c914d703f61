//! Request correlation and the connection actor.
//!
//! # How replies find their caller (for beginners)
//!
//! lircd replies carry no request id. The only thing tying a reply to its
//! request is order, so at most one request may be on the wire at a time.
//!
//! Every [`LircClient::call`] packs its request together with a `oneshot`
//! sender into a [`PendingRequest`] and pushes it onto an `mpsc` queue. A
//! single [`ConnectionActor`] task owns the socket. It takes one pending
//! request, writes it, reads until the matching reply block is complete and
//! fires the oneshot. Only then does it take the next request. Callers see
//! ordinary `async fn` calls; the actor guarantees FIFO single-flight.
//!
//! Between requests the actor keeps reading so that `SIGHUP` broadcasts are
//! noticed even when nobody is pressing buttons.
//!
//! # Reconnect
//!
//! When the connection is lost the actor emits
//! [`ChannelEvent::Disconnected`] and reconnects with exponential backoff.
//! Requests arriving while it is disconnected or still connecting fail
//! immediately. Once the backoff is exhausted it emits
//! [`ChannelEvent::Unreachable`] and stops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lirc_core::protocol::{RequestId, RequestIds};
use lirc_core::{Frame, Reply, Request};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::application::command_channel::{ChannelEvent, CommandChannel, LircError};
use crate::infrastructure::lirc_conn::backoff::Backoff;
use crate::infrastructure::lirc_conn::transport::LircTransport;
use crate::infrastructure::lirc_conn::LircConnectionConfig;

// ── Pending requests ──────────────────────────────────────────────────────────

/// A request waiting in the queue together with the slot for its reply.
#[derive(Debug)]
pub struct PendingRequest {
    pub id: RequestId,
    pub request: Request,
    reply_tx: oneshot::Sender<Result<Reply, LircError>>,
}

impl PendingRequest {
    /// Hands the outcome to the caller. A caller that gave up is not an error.
    fn complete(self, result: Result<Reply, LircError>) {
        match &result {
            Ok(_) => debug!(id = %self.id, request = %self.request, "lircd request completed"),
            Err(e) => debug!(id = %self.id, request = %self.request, "lircd request failed: {e}"),
        }
        if self.reply_tx.send(result).is_err() {
            debug!(id = %self.id, "caller dropped before the reply arrived");
        }
    }
}

// ── Client handle ─────────────────────────────────────────────────────────────

/// Cloneable handle for submitting requests to the connection actor.
#[derive(Debug, Clone)]
pub struct LircClient {
    requests: mpsc::Sender<PendingRequest>,
    ids: Arc<RequestIds>,
}

impl LircClient {
    pub fn new(requests: mpsc::Sender<PendingRequest>) -> Self {
        Self {
            requests,
            ids: Arc::new(RequestIds::new()),
        }
    }
}

#[async_trait]
impl CommandChannel for LircClient {
    async fn call(&self, request: Request) -> Result<Reply, LircError> {
        let id = self.ids.next();
        let (reply_tx, reply_rx) = oneshot::channel();
        debug!(%id, request = %request, "queueing lircd request");

        self.requests
            .send(PendingRequest {
                id,
                request,
                reply_tx,
            })
            .await
            .map_err(|_| LircError::Connection("lircd connection task has stopped".to_string()))?;

        reply_rx.await.map_err(|_| {
            LircError::Connection("lircd connection task dropped the request".to_string())
        })?
    }
}

// ── Connection actor ──────────────────────────────────────────────────────────

/// Why a connected session ended.
#[derive(Debug)]
enum SessionEnd {
    /// Every [`LircClient`] was dropped.
    Shutdown,
    /// The connection broke; the string says how.
    Lost(String),
}

/// Owns the lircd socket and serializes all traffic on it.
pub struct ConnectionActor {
    config: LircConnectionConfig,
    requests: mpsc::Receiver<PendingRequest>,
    events: mpsc::Sender<ChannelEvent>,
}

impl ConnectionActor {
    pub fn new(
        config: LircConnectionConfig,
        requests: mpsc::Receiver<PendingRequest>,
        events: mpsc::Sender<ChannelEvent>,
    ) -> Self {
        Self {
            config,
            requests,
            events,
        }
    }

    /// Connects, serves and reconnects until every client handle is dropped
    /// or the reconnect budget is exhausted.
    pub async fn run(mut self) {
        let addr = self.config.addr();
        let mut backoff = Backoff::new(self.config.reconnect.clone());

        loop {
            match self.connect(&addr).await {
                Ok(None) => {
                    info!("all lircd clients dropped while connecting");
                    return;
                }
                Ok(Some(stream)) => {
                    backoff.reset();
                    info!("connected to lircd at {addr}");
                    self.emit(ChannelEvent::Connected { addr: addr.clone() }).await;

                    let transport = LircTransport::new(stream, self.config.request_timeout);
                    match self.serve(transport).await {
                        SessionEnd::Shutdown => {
                            info!("all lircd clients dropped; closing connection");
                            return;
                        }
                        SessionEnd::Lost(reason) => {
                            warn!("lircd connection lost: {reason}");
                            self.emit(ChannelEvent::Disconnected { reason }).await;
                        }
                    }
                }
                Err(e) => warn!("could not connect to lircd at {addr}: {e}"),
            }

            let Some(delay) = backoff.next_delay() else {
                let attempts = backoff.attempts();
                error!("lircd at {addr} unreachable after {attempts} reconnect attempts");
                self.emit(ChannelEvent::Unreachable { attempts }).await;
                return;
            };
            info!(
                "reconnecting to lircd in {delay:?} (attempt {})",
                backoff.attempts()
            );
            if !self.wait_disconnected(delay).await {
                return;
            }
        }
    }

    /// Attempts one connect, failing requests that arrive meanwhile.
    /// Returns `Ok(None)` if every client handle was dropped.
    async fn connect(&mut self, addr: &str) -> Result<Option<TcpStream>, LircError> {
        let attempt = timeout(self.config.connect_timeout, TcpStream::connect(addr));
        tokio::pin!(attempt);
        loop {
            tokio::select! {
                result = &mut attempt => return match result {
                    Ok(Ok(stream)) => Ok(Some(stream)),
                    Ok(Err(e)) => Err(LircError::Connection(e.to_string())),
                    Err(_) => Err(LircError::Connection(format!(
                        "connect timed out after {:?}",
                        self.config.connect_timeout
                    ))),
                },
                pending = self.requests.recv() => match pending {
                    Some(pending) => reject(pending),
                    None => return Ok(None),
                },
            }
        }
    }

    async fn serve<S>(&mut self, mut transport: LircTransport<S>) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite,
    {
        loop {
            tokio::select! {
                pending = self.requests.recv() => {
                    let Some(pending) = pending else {
                        return SessionEnd::Shutdown;
                    };
                    debug!(id = %pending.id, request = %pending.request, "sending lircd request");
                    let result = transport.send(&pending.request).await;
                    let lost = match &result {
                        Err(e) if e.requires_reconnect() => Some(e.to_string()),
                        _ => None,
                    };
                    pending.complete(result);
                    for frame in transport.take_side_frames() {
                        self.on_frame(frame).await;
                    }
                    if let Some(reason) = lost {
                        return SessionEnd::Lost(reason);
                    }
                }
                frame = transport.next_frame() => match frame {
                    Ok(Some(frame)) => self.on_frame(frame).await,
                    Ok(None) => return SessionEnd::Lost("lircd closed the connection".to_string()),
                    Err(LircError::Parse(e)) => warn!("ignoring unparseable line from lircd: {e}"),
                    Err(e) => return SessionEnd::Lost(e.to_string()),
                },
            }
        }
    }

    async fn on_frame(&self, frame: Frame) {
        match frame {
            Frame::Sighup => {
                info!("lircd broadcast SIGHUP");
                self.emit(ChannelEvent::ConfigReloaded).await;
            }
            Frame::ButtonEvent(event) => debug!(
                remote = %event.remote,
                button = %event.button,
                repeat = event.repeat,
                "IR receive event"
            ),
            Frame::Reply(reply) => {
                warn!(command = %reply.command, "discarding reply nobody asked for")
            }
        }
    }

    /// Sleeps for `delay`, failing requests that arrive meanwhile.
    /// Returns `false` if every client handle was dropped.
    async fn wait_disconnected(&mut self, delay: Duration) -> bool {
        let deadline = sleep(delay);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => return true,
                pending = self.requests.recv() => match pending {
                    Some(pending) => reject(pending),
                    None => return false,
                },
            }
        }
    }

    async fn emit(&self, event: ChannelEvent) {
        if self.events.send(event).await.is_err() {
            debug!("no listener for lircd connection events");
        }
    }
}

fn reject(pending: PendingRequest) {
    pending.complete(Err(LircError::Connection(
        "not connected to lircd".to_string(),
    )));
}

// ── Tests ─────────────────────────────────────────────────────────────────────
