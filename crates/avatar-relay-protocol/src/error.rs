//! Error types for the protocol layer.
//!
//! Every error here is local and non-fatal: it lowers what the relay
//! *understands* about a message, never whether the message is delivered.
//! The engine catches these, logs them, and forwards the raw bytes anyway.

/// Errors that can occur while decoding a relay message.
///
/// `PartialEq` is derived so tests can compare errors directly with
/// `assert_eq!` instead of `matches!` gymnastics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The message is shorter than the fixed 20-byte header
    /// (4-byte opcode + 16-byte participant id).
    #[error("message too short for header: {len} bytes")]
    HeaderTooShort {
        /// Actual length of the message.
        len: usize,
    },

    /// A varint kept its continuation bit set past the 5-byte limit.
    ///
    /// The cap also bounds how much a hostile client can make us read.
    #[error("varint is too big (more than 5 bytes)")]
    MalformedVarInt,

    /// A string length prefix was negative or above 32767.
    #[error("invalid string length: {0}")]
    InvalidStringLength(i32),

    /// The stream ended before a field could be read completely.
    #[error("truncated stream: needed {needed} bytes, {available} available")]
    TruncatedStream {
        /// Bytes the field required.
        needed: usize,
        /// Bytes that were left in the buffer.
        available: usize,
    },

    /// The variant-specific tail of a message could not be decoded.
    ///
    /// Wraps the lower-level error so logs show both the opcode and
    /// what exactly went wrong in the tail.
    #[error("payload decode failed for opcode {opcode}: {source}")]
    PayloadDecodeFailed {
        /// Opcode read from the header.
        opcode: i32,
        /// The underlying codec error.
        #[source]
        source: Box<ProtocolError>,
    },
}

/// Errors raised while building a [`ChannelRegistry`](crate::ChannelRegistry)
/// from a custom descriptor table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two descriptors share the same channel name.
    #[error("channel {0} is registered twice")]
    DuplicateChannel(String),

    /// A descriptor names a reply channel that is not in the table.
    #[error("channel {channel} replies on unknown channel {reply}")]
    UnknownReplyChannel {
        /// The inbound channel carrying the remap.
        channel: String,
        /// The missing reply channel.
        reply: String,
    },

    /// A descriptor names a reply channel that only accepts inbound traffic.
    #[error("channel {channel} replies on inbound-only channel {reply}")]
    ReplyChannelNotOutbound {
        /// The inbound channel carrying the remap.
        channel: String,
        /// The reply channel that cannot be sent on.
        reply: String,
    },
}
