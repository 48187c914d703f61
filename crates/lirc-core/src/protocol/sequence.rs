//! Request identifiers used to correlate log lines with replies.
//!
//! lircd replies carry no identifier of their own; the gateway matches them to
//! requests purely by order. Each request still gets a local [`RequestId`] so
//! that the "sent" and "completed" log lines of one request can be tied
//! together when several callers are queued.
//!
//! The generator is an `AtomicU64`, so any number of cloned client handles
//! can draw ids concurrently without a lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one request submitted to the lircd connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Thread-safe, monotonically increasing source of [`RequestId`]s.
///
/// Ids start at 1 and wrap around at `u64::MAX` without panicking.
///
/// # Examples
///
/// ```rust
/// use lirc_core::protocol::{RequestId, RequestIds};
///
/// let ids = RequestIds::new();
/// assert_eq!(ids.next(), RequestId(1));
/// assert_eq!(ids.next(), RequestId(2));
/// ```
#[derive(Debug)]
pub struct RequestIds {
    inner: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(1),
        }
    }

    /// Returns the next id. `Relaxed` suffices: ids order log lines, not memory.
    pub fn next(&self) -> RequestId {
        RequestId(self.inner.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}
