//! The request/response seam between the use cases and the lircd connection.
//!
//! Use cases never touch sockets. They hold an `Arc<dyn CommandChannel>` and
//! `await` one [`call`](CommandChannel::call) per request. The production
//! implementation (`infrastructure::lirc_conn::LircClient`) queues calls in
//! FIFO order onto the single lircd connection; unit tests use the mockall
//! generated `MockCommandChannel`.

use std::time::Duration;

use async_trait::async_trait;
use lirc_core::{ProtocolError, Reply, Request};
use thiserror::Error;

/// Errors a [`CommandChannel::call`] can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LircError {
    /// The socket is down, closed mid-request, or was never established.
    #[error("lircd connection error: {0}")]
    Connection(String),

    /// lircd answered with `ERROR`.
    #[error("lircd rejected {command:?}: {message}")]
    Protocol { command: String, message: String },

    /// No complete reply arrived in time.
    #[error("no reply from lircd to {command:?} within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The reply stream could not be framed.
    #[error("malformed reply from lircd: {0}")]
    Parse(#[from] ProtocolError),

    /// The reply block echoes a different request.
    #[error("reply echoes {got:?}, expected {expected:?}")]
    UnexpectedReply { expected: String, got: String },

    /// The request cannot be written as a single protocol line.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LircError {
    /// The connection is unusable after this error and must be re-established.
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            LircError::Connection(_)
                | LircError::Timeout { .. }
                | LircError::Parse(_)
                | LircError::UnexpectedReply { .. }
        )
    }

    /// The failure says nothing about lircd itself; a later attempt on a
    /// fresh connection may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LircError::Connection(_) | LircError::Timeout { .. })
    }
}

/// One awaitable lircd request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Sends `request` and resolves with lircd's `SUCCESS` reply.
    ///
    /// # Errors
    ///
    /// [`LircError::Protocol`] for an `ERROR` reply; every other variant for
    /// transport failures. Calls are never retried.
    async fn call(&self, request: Request) -> Result<Reply, LircError>;
}

/// Connection lifecycle signals emitted by the lircd connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A connection was established and is ready for requests.
    Connected { addr: String },
    /// The connection was lost; a reconnect is scheduled.
    Disconnected { reason: String },
    /// lircd broadcast `SIGHUP`: its remote inventory may have changed.
    ConfigReloaded,
    /// Reconnect attempts are exhausted; the task has stopped.
    Unreachable { attempts: u32 },
}
