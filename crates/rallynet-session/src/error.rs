//! Error types for the session layer.

use rallynet_protocol::ParticipantId;

/// Errors that can occur while mutating session state or operating
/// the turn barrier.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The participant number is already taken by a live connection.
    /// Numbers are never reused while their connection is open.
    #[error("participant {0} is already registered")]
    AlreadyRegistered(ParticipantId),

    /// No live participant with this number exists — it never joined,
    /// or it already quit.
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    /// The participant already has a full selection set queued.
    /// Selections past the fifth are rejected, never stored.
    #[error("selection set for participant {0} is already full")]
    SelectionSetFull(ParticipantId),

    /// A turn resolution is already in flight; the resolve-gate opens
    /// at most once per round-group.
    #[error("turn resolution already in progress")]
    ResolutionInProgress,

    /// The turn-resolution routine has gone away; its signal channel
    /// is closed.
    #[error("turn resolution routine unavailable")]
    ResolverUnavailable,
}
