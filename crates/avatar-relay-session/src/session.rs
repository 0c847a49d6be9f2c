//! Session types: the server's record of one connected participant.
//!
//! A session tracks:
//! - WHO the participant is (`ParticipantId`)
//! - WHICH channels it declared interest in
//! - HOW to reach it (the sending half of its outbound queue)

use std::collections::HashSet;

use avatar_relay_protocol::ParticipantId;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Outbound queue
// ---------------------------------------------------------------------------

/// One message waiting to be written to a participant's connection.
///
/// The channel name stays separate from the payload until the writer task
/// frames it, so the engine never deals with framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub channel: String,
    pub payload: Vec<u8>,
}

impl OutboundFrame {
    pub fn new(channel: &str, payload: &[u8]) -> Self {
        Self {
            channel: channel.to_string(),
            payload: payload.to_vec(),
        }
    }
}

/// Sending half of a participant's outbound queue.
///
/// Unbounded so that a send from the engine never waits on a slow socket;
/// the per-connection writer task drains the other end.
pub type FrameSender = mpsc::UnboundedSender<OutboundFrame>;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single participant's session on the relay.
///
/// Created when a connection logs in; removed when it closes. There is no
/// reconnect window: a participant that comes back starts a new session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Which participant this session belongs to.
    pub participant: ParticipantId,

    /// Channel names the participant registered. Empty until the client
    /// sends its first registration.
    pub channels: HashSet<String>,

    pub(crate) sender: FrameSender,
}

impl Session {
    pub fn new(participant: ParticipantId, sender: FrameSender) -> Self {
        Self {
            participant,
            channels: HashSet::new(),
            sender,
        }
    }

    /// Whether the participant registered `channel`. A participant that
    /// registered nothing, or unregistered everything, listens on nothing.
    pub fn is_listening(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }
}
