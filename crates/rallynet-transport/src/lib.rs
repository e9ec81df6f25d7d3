//! Transport layer for Rallynet: newline-framed text over TCP.
//!
//! The whole protocol is line-oriented, so the transport exposes
//! exactly two operations on a connection — read one line, write one
//! line — and hides the socket split, buffering, and write
//! serialization behind [`LineConnection`]. [`TcpLineTransport`] is
//! the listening side used by the session host.

mod error;
mod line;

pub use error::TransportError;
pub use line::{LineConnection, TcpLineTransport};

use std::fmt;

/// Opaque identifier for a connection, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }
}
