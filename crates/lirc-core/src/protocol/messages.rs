//! lircd protocol vocabulary: requests, reply blocks and broadcast frames.
//!
//! lircd speaks a line-oriented text protocol over TCP (default port 8765).
//! A client writes one request line and lircd answers with a reply block:
//!
//! ```text
//! BEGIN
//! LIST livingroom          <- echo of the request line
//! SUCCESS                  <- or ERROR
//! DATA                     <- optional
//! 2                        <- number of data lines that follow
//! 0000000000000001 KEY_POWER
//! 0000000000000002 SRC_HDMI1
//! END
//! ```
//!
//! Besides replies, lircd pushes two kinds of unsolicited traffic to every
//! connected client:
//!
//! - a `BEGIN / SIGHUP / END` block after it reloaded its configuration, and
//! - free-standing receive lines (`<code> <repeat> <button> <remote>`) when an
//!   IR receiver decoded a button press.

use std::fmt;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Default TCP port lircd listens on when started with `--listen`.
pub const DEFAULT_PORT: u16 = 8765;

/// First line of every reply or broadcast block.
pub const BEGIN: &str = "BEGIN";
/// Last line of every reply or broadcast block.
pub const END: &str = "END";
/// Marker announcing that a data line count follows.
pub const DATA: &str = "DATA";
/// Status sentinel for a successful request.
pub const SUCCESS: &str = "SUCCESS";
/// Status sentinel for a failed request.
pub const ERROR: &str = "ERROR";
/// Command slot of the broadcast block lircd emits after a configuration reload.
pub const SIGHUP: &str = "SIGHUP";

// ── Requests ──────────────────────────────────────────────────────────────────

/// Request verbs the gateway sends to lircd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Handshake: asks lircd for its version string.
    Version,
    /// Without arguments lists remotes; with a remote name lists its commands.
    List,
    /// Transmits one IR command once.
    SendOnce,
}

impl Verb {
    /// The verb exactly as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Version => "VERSION",
            Verb::List => "LIST",
            Verb::SendOnce => "SEND_ONCE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request line: a verb plus zero or more whitespace-free arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub verb: Verb,
    pub args: Vec<String>,
}

impl Request {
    /// `VERSION`
    pub fn version() -> Self {
        Self {
            verb: Verb::Version,
            args: Vec::new(),
        }
    }

    /// `LIST` (all remotes)
    pub fn list_remotes() -> Self {
        Self {
            verb: Verb::List,
            args: Vec::new(),
        }
    }

    /// `LIST <remote>` (all commands of one remote)
    pub fn list_commands(remote: impl Into<String>) -> Self {
        Self {
            verb: Verb::List,
            args: vec![remote.into()],
        }
    }

    /// `SEND_ONCE <remote> <command>`
    pub fn send_once(remote: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            verb: Verb::SendOnce,
            args: vec![remote.into(), command.into()],
        }
    }

    /// The request line without its trailing newline.
    ///
    /// lircd echoes this text back as the second line of the reply block.
    pub fn command_line(&self) -> String {
        let mut line = self.verb.as_str().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Returns `true` if `echo` (the command slot of a reply block) names this
    /// request.
    ///
    /// The comparison is token-wise and ignores the verb's letter case, since
    /// lircd accepts verbs in any case and echoes whatever it was sent.
    pub fn matches_echo(&self, echo: &str) -> bool {
        let mut tokens = echo.split_whitespace();
        let verb_matches = tokens
            .next()
            .is_some_and(|verb| verb.eq_ignore_ascii_case(self.verb.as_str()));
        verb_matches && tokens.eq(self.args.iter().map(String::as_str))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

// ── Replies ───────────────────────────────────────────────────────────────────

/// Outcome sentinel of a reply block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Success,
    Error,
}

/// A complete reply block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The echoed request line.
    pub command: String,
    pub status: ReplyStatus,
    /// Data lines in the order lircd sent them. Empty if the block had no
    /// `DATA` section.
    pub data: Vec<String>,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }

    /// lircd puts its error text in the data section of an `ERROR` reply.
    pub fn error_message(&self) -> String {
        if self.data.is_empty() {
            "no error text".to_string()
        } else {
            self.data.join(" ")
        }
    }
}

/// A decoded IR button press pushed by lircd.
///
/// Wire form: `<code> <repeat> <button> <remote>`, e.g.
/// `0000000000f40bf0 00 KEY_UP livingroom`. The repeat count is hexadecimal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonEvent {
    pub code: String,
    pub repeat: u32,
    pub button: String,
    pub remote: String,
}

/// Anything the reply parser can produce from the inbound line stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Reply to the request currently in flight.
    Reply(Reply),
    /// lircd reloaded its configuration; the remote inventory may have changed.
    Sighup,
    /// Unsolicited receive event from an IR receiver.
    ButtonEvent(ButtonEvent),
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_wire_names() {
        assert_eq!(Verb::Version.as_str(), "VERSION");
        assert_eq!(Verb::List.as_str(), "LIST");
        assert_eq!(Verb::SendOnce.as_str(), "SEND_ONCE");
    }

    #[test]
    fn test_command_line_without_args_is_bare_verb() {
        assert_eq!(Request::version().command_line(), "VERSION");
        assert_eq!(Request::list_remotes().command_line(), "LIST");
    }

    #[test]
    fn test_command_line_joins_args_with_single_spaces() {
        let req = Request::send_once("livingroom", "KEY_POWER");
        assert_eq!(req.command_line(), "SEND_ONCE livingroom KEY_POWER");
        assert_eq!(req.to_string(), "SEND_ONCE livingroom KEY_POWER");
    }

    #[test]
    fn test_matches_echo_accepts_exact_echo() {
        let req = Request::list_commands("livingroom");
        assert!(req.matches_echo("LIST livingroom"));
    }

    #[test]
    fn test_matches_echo_ignores_verb_case_and_extra_spacing() {
        let req = Request::send_once("tv", "KEY_MUTE");
        assert!(req.matches_echo("send_once  tv KEY_MUTE"));
    }

    #[test]
    fn test_matches_echo_rejects_different_arguments() {
        let req = Request::list_commands("livingroom");
        assert!(!req.matches_echo("LIST bedroom"));
        assert!(!req.matches_echo("LIST"));
        assert!(!req.matches_echo("LIST livingroom extra"));
    }

    #[test]
    fn test_matches_echo_rejects_different_verb() {
        assert!(!Request::version().matches_echo("LIST"));
    }

    #[test]
    fn test_error_message_joins_data_lines() {
        let reply = Reply {
            command: "SEND_ONCE tv KEY_FOO".to_string(),
            status: ReplyStatus::Error,
            data: vec!["unknown command:".to_string(), "\"KEY_FOO\"".to_string()],
        };
        assert!(!reply.is_success());
        assert_eq!(reply.error_message(), "unknown command: \"KEY_FOO\"");
    }

    #[test]
    fn test_error_message_without_data_is_placeholder() {
        let reply = Reply {
            command: "VERSION".to_string(),
            status: ReplyStatus::Error,
            data: Vec::new(),
        };
        assert_eq!(reply.error_message(), "no error text");
    }
}
