//! Unified error type for the Rallynet meta crate.

use rallynet_protocol::ProtocolError;
use rallynet_session::SessionError;
use rallynet_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// When using the `rallynet` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant auto-generates `From` impls, so
/// the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RallyError {
    /// A transport-level error (bind, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (decode, malformed handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (registry, selections, barrier).
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::decode("garbage", "missing distance");
        let rally_err: RallyError = err.into();
        assert!(matches!(rally_err, RallyError::Protocol(_)));
        assert!(rally_err.to_string().contains("garbage"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::ResolutionInProgress;
        let rally_err: RallyError = err.into();
        assert!(matches!(rally_err, RallyError::Session(_)));
    }
}
