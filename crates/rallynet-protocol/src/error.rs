//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire lines.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A line does not match any recognized grammar: wrong token
    /// count, a non-integer field, an unrecognized rotation token, or
    /// an empty card name.
    ///
    /// Handlers and listeners recover from this locally — the line is
    /// dropped and logged, the connection stays open.
    #[error("cannot decode {line:?}: {reason}")]
    Decode {
        /// The offending line (or token), as received.
        line: String,
        /// Why it failed to parse.
        reason: &'static str,
    },

    /// A line violates the session protocol rather than the card
    /// grammar — e.g. a non-numeric handshake line, or a stream that
    /// ends in the middle of the join handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Shorthand for the decode-error kind.
    pub fn decode(line: impl Into<String>, reason: &'static str) -> Self {
        ProtocolError::Decode {
            line: line.into(),
            reason,
        }
    }
}
