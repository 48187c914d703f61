//! Line transport over one lircd stream.
//!
//! [`LircTransport`] writes request lines and turns the incoming line stream
//! into [`Frame`]s with a [`ReplyParser`]. It knows nothing about queueing:
//! the caller must not start a second [`send`](LircTransport::send) before
//! the first one resolved.
//!
//! # Unsolicited frames
//!
//! lircd interleaves `SIGHUP` broadcasts and receive events with replies.
//! Frames that arrive while `send` waits for its reply are kept aside and
//! handed out by [`next_frame`](LircTransport::next_frame) afterwards.

use std::collections::VecDeque;
use std::time::Duration;

use lirc_core::{encode_request, Frame, Reply, ReplyParser, Request};
use tokio::io::{
    split, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, ReadHalf,
    WriteHalf,
};
use tokio::time::timeout;
use tracing::trace;

use crate::application::command_channel::LircError;

/// Request/reply framing over any byte stream.
pub struct LircTransport<S> {
    lines: Lines<BufReader<ReadHalf<S>>>,
    writer: WriteHalf<S>,
    parser: ReplyParser,
    request_timeout: Duration,
    side_frames: VecDeque<Frame>,
}

impl<S: AsyncRead + AsyncWrite> LircTransport<S> {
    pub fn new(stream: S, request_timeout: Duration) -> Self {
        let (reader, writer) = split(stream);
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
            parser: ReplyParser::new(),
            request_timeout,
            side_frames: VecDeque::new(),
        }
    }

    /// Writes `request` and waits for its reply block.
    ///
    /// # Errors
    ///
    /// - [`LircError::InvalidRequest`] if the request cannot be encoded; nothing is written.
    /// - [`LircError::Timeout`] if no reply completes within the request timeout.
    /// - [`LircError::UnexpectedReply`] if the reply echoes another command.
    /// - [`LircError::Protocol`] for an `ERROR` reply.
    /// - [`LircError::Connection`] / [`LircError::Parse`] for stream failures.
    pub async fn send(&mut self, request: &Request) -> Result<Reply, LircError> {
        let line = encode_request(request).map_err(|e| LircError::InvalidRequest(e.to_string()))?;
        let command = request.command_line();

        trace!(line = %command, "lircd >");
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| LircError::Connection(format!("write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| LircError::Connection(format!("flush failed: {e}")))?;

        let reply = match timeout(self.request_timeout, self.read_reply()).await {
            Ok(reply) => reply?,
            Err(_) => {
                return Err(LircError::Timeout {
                    command,
                    timeout: self.request_timeout,
                })
            }
        };

        if !request.matches_echo(&reply.command) {
            return Err(LircError::UnexpectedReply {
                expected: command,
                got: reply.command,
            });
        }
        if !reply.is_success() {
            return Err(LircError::Protocol {
                command,
                message: reply.error_message(),
            });
        }
        Ok(reply)
    }

    /// Next unsolicited frame; `Ok(None)` once lircd closed the stream.
    ///
    /// Cancel safe: a partially read block stays in the parser and is
    /// completed by the next call.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, LircError> {
        if let Some(frame) = self.side_frames.pop_front() {
            return Ok(Some(frame));
        }
        self.read_frame().await
    }

    /// Drains frames received while a `send` was in flight.
    pub fn take_side_frames(&mut self) -> Vec<Frame> {
        self.side_frames.drain(..).collect()
    }

    async fn read_reply(&mut self) -> Result<Reply, LircError> {
        loop {
            match self.read_frame().await? {
                Some(Frame::Reply(reply)) => return Ok(reply),
                Some(frame) => self.side_frames.push_back(frame),
                None => {
                    return Err(LircError::Connection(
                        "lircd closed the connection before replying".to_string(),
                    ))
                }
            }
        }
    }

    async fn read_frame(&mut self) -> Result<Option<Frame>, LircError> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(e) => return Err(LircError::Connection(format!("read failed: {e}"))),
            };
            trace!(line = %line, "lircd <");
            if let Some(frame) = self.parser.feed(&line)? {
                return Ok(Some(frame));
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use lirc_core::ProtocolError;
    use tokio::io::duplex;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_send_returns_data_lines_in_order() {
        // Arrange
        let stream = Builder::new()
            .write(b"LIST\n")
            .read(b"BEGIN\nLIST\nSUCCESS\nDATA\n2\nlivingroom\nbedroom\nEND\n")
            .build();
        let mut transport = LircTransport::new(stream, TIMEOUT);

        // Act
        let reply = transport.send(&Request::list_remotes()).await.unwrap();

        // Assert
        assert_eq!(reply.data, vec!["livingroom", "bedroom"]);
    }

    #[tokio::test]
    async fn test_send_handles_reply_split_across_reads() {
        let stream = Builder::new()
            .write(b"VERSION\n")
            .read(b"BEGIN\nVERS")
            .read(b"ION\nSUCCESS\nDATA\n1\n0.10")
            .read(b".1\nEND\n")
            .build();
        let mut transport = LircTransport::new(stream, TIMEOUT);

        let reply = transport.send(&Request::version()).await.unwrap();

        assert_eq!(reply.data, vec!["0.10.1"]);
    }

    #[tokio::test]
    async fn test_error_reply_maps_to_protocol_error() {
        // Arrange
        let stream = Builder::new()
            .write(b"SEND_ONCE tv KEY_FOO\n")
            .read(b"BEGIN\nSEND_ONCE tv KEY_FOO\nERROR\nDATA\n1\nunknown command: \"KEY_FOO\"\nEND\n")
            .build();
        let mut transport = LircTransport::new(stream, TIMEOUT);

        // Act
        let err = transport
            .send(&Request::send_once("tv", "KEY_FOO"))
            .await
            .unwrap_err();

        // Assert
        assert_eq!(
            err,
            LircError::Protocol {
                command: "SEND_ONCE tv KEY_FOO".into(),
                message: "unknown command: \"KEY_FOO\"".into(),
            }
        );
        assert!(!err.requires_reconnect());
    }

    #[tokio::test]
    async fn test_sighup_during_request_is_kept_aside() {
        // Arrange
        let stream = Builder::new()
            .write(b"VERSION\n")
            .read(b"BEGIN\nSIGHUP\nEND\nBEGIN\nVERSION\nSUCCESS\nDATA\n1\n0.9.0\nEND\n")
            .build();
        let mut transport = LircTransport::new(stream, TIMEOUT);

        // Act
        let reply = transport.send(&Request::version()).await.unwrap();
        let side = transport.take_side_frames();

        // Assert
        assert_eq!(reply.data, vec!["0.9.0"]);
        assert_eq!(side, vec![Frame::Sighup]);
    }

    #[tokio::test]
    async fn test_mismatched_echo_is_rejected() {
        let stream = Builder::new()
            .write(b"VERSION\n")
            .read(b"BEGIN\nLIST\nSUCCESS\nEND\n")
            .build();
        let mut transport = LircTransport::new(stream, TIMEOUT);

        let err = transport.send(&Request::version()).await.unwrap_err();

        assert!(matches!(err, LircError::UnexpectedReply { .. }));
        assert!(err.requires_reconnect());
    }

    #[tokio::test]
    async fn test_malformed_block_is_a_parse_error() {
        let stream = Builder::new()
            .write(b"LIST\n")
            .read(b"BEGIN\nLIST\nSUCCESS\nDATA\nmany\n")
            .build();
        let mut transport = LircTransport::new(stream, TIMEOUT);

        let err = transport.send(&Request::list_remotes()).await.unwrap_err();

        assert!(matches!(err, LircError::Parse(ProtocolError::InvalidCount(_))));
    }

    #[tokio::test]
    async fn test_invalid_request_writes_nothing() {
        // Arrange: the mock fails the test on any unexpected write
        let stream = Builder::new().build();
        let mut transport = LircTransport::new(stream, TIMEOUT);

        // Act
        let err = transport
            .send(&Request::send_once("tv", "KEY POWER"))
            .await
            .unwrap_err();

        // Assert
        assert!(matches!(err, LircError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        // Arrange: the peer end stays open but never answers
        let (ours, _peer) = duplex(1024);
        let mut transport = LircTransport::new(ours, Duration::from_millis(50));

        // Act
        let err = transport.send(&Request::version()).await.unwrap_err();

        // Assert
        assert_eq!(
            err,
            LircError::Timeout {
                command: "VERSION".into(),
                timeout: Duration::from_millis(50),
            }
        );
    }

    #[tokio::test]
    async fn test_close_before_reply_is_a_connection_error() {
        // Arrange
        let (ours, peer) = duplex(1024);
        let mut transport = LircTransport::new(ours, TIMEOUT);
        drop(peer);

        // Act
        let err = transport.send(&Request::version()).await.unwrap_err();

        // Assert
        assert!(matches!(err, LircError::Connection(_)));
    }

    #[tokio::test]
    async fn test_next_frame_reports_broadcasts_and_eof() {
        // Arrange
        let (ours, mut peer) = duplex(1024);
        let mut transport = LircTransport::new(ours, TIMEOUT);
        peer.write_all(b"BEGIN\nSIGHUP\nEND\n0000000000f40bf0 00 KEY_UP livingroom\n")
            .await
            .unwrap();
        drop(peer);

        // Act
        let first = transport.next_frame().await.unwrap();
        let second = transport.next_frame().await.unwrap();
        let third = transport.next_frame().await.unwrap();

        // Assert
        assert_eq!(first, Some(Frame::Sighup));
        assert!(matches!(second, Some(Frame::ButtonEvent(ref e)) if e.button == "KEY_UP"));
        assert_eq!(third, None);
    }
}
