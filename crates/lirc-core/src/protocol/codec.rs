//! Text codec for the lircd protocol.
//!
//! Encoding is trivial (one line per request). Decoding is incremental: TCP
//! delivers lines at arbitrary boundaries, so [`ReplyParser`] is fed one line
//! at a time and keeps its position inside a reply block between calls. It
//! yields a [`Frame`] whenever a block (or a free-standing receive line) is
//! complete.
//!
//! The parser never performs I/O, which keeps it usable from the async
//! transport and from plain unit tests alike.

use thiserror::Error;

use crate::protocol::messages::{
    ButtonEvent, Frame, Reply, ReplyStatus, Request, BEGIN, DATA, END, ERROR, SIGHUP, SUCCESS,
};

/// Errors raised while encoding a request or framing a reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A request argument is empty or contains whitespace/control characters,
    /// which would corrupt the single-line request.
    #[error("invalid argument {argument:?} for {verb}")]
    InvalidArgument { verb: &'static str, argument: String },

    /// A line arrived that is not legal at the parser's current position.
    #[error("unexpected line {line:?}, expected {expected}")]
    UnexpectedLine { expected: &'static str, line: String },

    /// The line after `DATA` was not a decimal line count.
    #[error("invalid data line count {0:?}")]
    InvalidCount(String),

    /// A `LIST <remote>` data line lacks the `<code> <name>` separator.
    #[error("malformed command line {0:?}")]
    MalformedCommandLine(String),
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes `request` as a newline-terminated request line.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidArgument`] if an argument is empty or
/// contains whitespace or control characters.
///
/// # Examples
///
/// ```rust
/// use lirc_core::protocol::{encode_request, Request};
///
/// let line = encode_request(&Request::send_once("tv", "KEY_POWER")).unwrap();
/// assert_eq!(line, "SEND_ONCE tv KEY_POWER\n");
/// ```
pub fn encode_request(request: &Request) -> Result<String, ProtocolError> {
    for arg in &request.args {
        let invalid =
            arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c.is_control());
        if invalid {
            return Err(ProtocolError::InvalidArgument {
                verb: request.verb.as_str(),
                argument: arg.clone(),
            });
        }
    }
    let mut line = request.command_line();
    line.push('\n');
    Ok(line)
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Position of the parser inside a block.
#[derive(Debug, Default)]
enum State {
    /// Between blocks.
    #[default]
    Idle,
    /// Saw `BEGIN`, expecting the echoed command.
    Command,
    /// Expecting `SUCCESS`/`ERROR` (or `END` for a `SIGHUP` broadcast).
    Status { command: String },
    /// Expecting `DATA` or `END`.
    DataOrEnd { command: String, status: ReplyStatus },
    /// Expecting the data line count.
    Count { command: String, status: ReplyStatus },
    /// Collecting data lines.
    Data {
        command: String,
        status: ReplyStatus,
        remaining: usize,
        data: Vec<String>,
    },
    /// All data read, expecting `END`.
    End {
        command: String,
        status: ReplyStatus,
        data: Vec<String>,
    },
}

/// Incremental parser turning inbound lines into [`Frame`]s.
///
/// On error the parser resets to the between-blocks state, so the caller can
/// decide whether to keep reading or drop the connection.
#[derive(Debug, Default)]
pub struct ReplyParser {
    state: State,
}

impl ReplyParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while the parser is inside a block.
    pub fn in_block(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    /// Feeds one line (without its newline; a trailing `\r` is tolerated).
    ///
    /// Returns `Ok(Some(frame))` when `line` completed a frame, `Ok(None)` when
    /// more lines are needed.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] when `line` is not legal at the current
    /// position. The partially parsed block is discarded.
    pub fn feed(&mut self, line: &str) -> Result<Option<Frame>, ProtocolError> {
        let line = line.trim_end_matches('\r');
        let state = std::mem::take(&mut self.state);
        match self.advance(state, line) {
            Ok((next, frame)) => {
                self.state = next;
                Ok(frame)
            }
            Err(e) => {
                self.state = State::Idle;
                Err(e)
            }
        }
    }

    fn advance(&self, state: State, line: &str) -> Result<(State, Option<Frame>), ProtocolError> {
        let next = match state {
            State::Idle => {
                if line == BEGIN {
                    State::Command
                } else if line.trim().is_empty() {
                    State::Idle
                } else {
                    let event = parse_button_event(line).ok_or_else(|| unexpected(BEGIN, line))?;
                    return Ok((State::Idle, Some(Frame::ButtonEvent(event))));
                }
            }
            State::Command => State::Status {
                command: line.to_string(),
            },
            State::Status { command } => match line {
                SUCCESS => State::DataOrEnd {
                    command,
                    status: ReplyStatus::Success,
                },
                ERROR => State::DataOrEnd {
                    command,
                    status: ReplyStatus::Error,
                },
                END if command == SIGHUP => return Ok((State::Idle, Some(Frame::Sighup))),
                _ => return Err(unexpected("SUCCESS or ERROR", line)),
            },
            State::DataOrEnd { command, status } => match line {
                DATA => State::Count { command, status },
                END => return Ok((State::Idle, Some(reply(command, status, Vec::new())))),
                _ => return Err(unexpected("DATA or END", line)),
            },
            State::Count { command, status } => {
                let count: usize = line
                    .trim()
                    .parse()
                    .map_err(|_| ProtocolError::InvalidCount(line.to_string()))?;
                if count == 0 {
                    State::End {
                        command,
                        status,
                        data: Vec::new(),
                    }
                } else {
                    State::Data {
                        command,
                        status,
                        remaining: count,
                        data: Vec::new(),
                    }
                }
            }
            State::Data {
                command,
                status,
                remaining,
                mut data,
            } => {
                data.push(line.to_string());
                if remaining == 1 {
                    State::End {
                        command,
                        status,
                        data,
                    }
                } else {
                    State::Data {
                        command,
                        status,
                        remaining: remaining - 1,
                        data,
                    }
                }
            }
            State::End {
                command,
                status,
                data,
            } => {
                if line == END {
                    return Ok((State::Idle, Some(reply(command, status, data))));
                }
                return Err(unexpected(END, line));
            }
        };
        Ok((next, None))
    }
}

/// Parses every complete frame in `input`.
///
/// Convenience wrapper over [`ReplyParser`] for callers that already hold the
/// whole text (tests, benchmarks, captured sessions).
///
/// # Errors
///
/// Returns the first [`ProtocolError`] encountered.
pub fn decode_frames(input: &str) -> Result<Vec<Frame>, ProtocolError> {
    let mut parser = ReplyParser::new();
    let mut frames = Vec::new();
    for line in input.lines() {
        if let Some(frame) = parser.feed(line)? {
            frames.push(frame);
        }
    }
    Ok(frames)
}

/// Extracts the command name from one `LIST <remote>` data line.
///
/// lircd formats these as `<code> <name>`; only the name is kept.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedCommandLine`] if the line has no second
/// token.
pub fn parse_command_line(line: &str) -> Result<&str, ProtocolError> {
    line.split_whitespace()
        .nth(1)
        .ok_or_else(|| ProtocolError::MalformedCommandLine(line.to_string()))
}

fn parse_button_event(line: &str) -> Option<ButtonEvent> {
    let mut tokens = line.split_whitespace();
    let code = tokens.next()?;
    let repeat = u32::from_str_radix(tokens.next()?, 16).ok()?;
    let button = tokens.next()?;
    let remote = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }
    Some(ButtonEvent {
        code: code.to_string(),
        repeat,
        button: button.to_string(),
        remote: remote.to_string(),
    })
}

fn reply(command: String, status: ReplyStatus, data: Vec<String>) -> Frame {
    Frame::Reply(Reply {
        command,
        status,
        data,
    })
}

fn unexpected(expected: &'static str, line: &str) -> ProtocolError {
    ProtocolError::UnexpectedLine {
        expected,
        line: line.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
