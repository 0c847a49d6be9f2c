//! Error types for the session layer.

use avatar_relay_protocol::ParticipantId;

/// Errors that can occur while tracking participant sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The login frame did not hold a valid participant id.
    #[error("invalid login: {0}")]
    InvalidLogin(String),

    /// No session exists for the given participant.
    #[error("session not found for participant {0}")]
    NotFound(ParticipantId),

    /// The participant already has a session. One connection per
    /// participant; a second login with the same id is rejected.
    #[error("participant {0} is already connected")]
    AlreadyConnected(ParticipantId),

    /// The participant's outbound queue is gone: its writer task has
    /// exited and the connection is closing.
    #[error("outbound queue closed for participant {0}")]
    QueueClosed(ParticipantId),
}
