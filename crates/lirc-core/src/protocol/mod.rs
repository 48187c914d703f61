//! lircd wire protocol: message vocabulary, line codec and request ids.

pub mod codec;
pub mod messages;
pub mod sequence;

pub use codec::{decode_frames, encode_request, parse_command_line, ProtocolError, ReplyParser};
pub use messages::*;
pub use sequence::{RequestId, RequestIds};
