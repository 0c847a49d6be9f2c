//! Unified error type for Avatar Relay.

use avatar_relay_protocol::{ProtocolError, RegistryError};
use avatar_relay_session::SessionError;
use avatar_relay_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates a `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame or message could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The channel table is inconsistent.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A session-level error (login, duplicate participant).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
