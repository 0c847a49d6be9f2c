//! [`SessionHost`]: the engine's [`Host`] backed by the session registry.

use std::sync::{Mutex, MutexGuard, PoisonError};

use avatar_relay_engine::Host;
use avatar_relay_protocol::ParticipantId;
use avatar_relay_session::{FrameSender, OutboundFrame, SessionError, SessionRegistry};

/// Connected participants, shared by every connection task and the engine.
///
/// The engine calls into the host synchronously (including from scheduled
/// tasks), so the registry sits behind a `std::sync::Mutex`. Every method
/// locks for one registry call and never across an `.await`.
#[derive(Debug, Default)]
pub struct SessionHost {
    sessions: Mutex<SessionRegistry>,
}

impl SessionHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionRegistry> {
        // Each registry call leaves the map consistent, so a panic in
        // another holder does not invalidate it.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a logged-in participant and its outbound queue.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the id is already in use.
    pub fn connect(
        &self,
        participant: ParticipantId,
        sender: FrameSender,
    ) -> Result<(), SessionError> {
        self.lock().connect(participant, sender).map(|_| ())
    }

    /// Removes a participant. Dropping its session closes its queue.
    pub fn disconnect(&self, participant: ParticipantId) -> Result<(), SessionError> {
        self.lock().disconnect(participant).map(|_| ())
    }

    pub fn register_channels(
        &self,
        participant: ParticipantId,
        channels: &[String],
    ) -> Result<usize, SessionError> {
        self.lock()
            .register_channels(participant, channels.iter().map(String::as_str))
    }

    pub fn unregister_channels(
        &self,
        participant: ParticipantId,
        channels: &[String],
    ) -> Result<usize, SessionError> {
        self.lock()
            .unregister_channels(participant, channels.iter().map(String::as_str))
    }

    /// Queues a frame for one participant, outside the engine.
    pub fn send_frame(
        &self,
        participant: ParticipantId,
        frame: OutboundFrame,
    ) -> Result<(), SessionError> {
        self.lock().send(participant, frame)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Host for SessionHost {
    fn send_raw(&self, participant: ParticipantId, channel: &str, bytes: &[u8]) {
        if let Err(e) = self.send_frame(participant, OutboundFrame::new(channel, bytes)) {
            // The participant is leaving; its disconnect cleanup follows.
            tracing::debug!(%participant, channel, error = %e, "dropping outbound message");
        }
    }

    /// Always answers: the registry knows every channel a client
    /// registered, so an empty set means listening on nothing.
    fn is_listening(&self, participant: ParticipantId, channel: &str) -> Option<bool> {
        Some(self.lock().is_listening(participant, channel))
    }

    fn enumerate_connected(&self) -> Vec<ParticipantId> {
        self.lock().connected()
    }

    fn is_connected(&self, participant: ParticipantId) -> bool {
        self.lock().contains(participant)
    }
}
