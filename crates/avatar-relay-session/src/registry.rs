//! The session registry: every connected participant and what it listens to.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself; it is a plain
//! `HashMap`. The host wraps it in a mutex and holds the lock only for the
//! duration of one call, so no lock is ever held across an `.await`.

use std::collections::HashMap;

use avatar_relay_protocol::ParticipantId;

use crate::{FrameSender, OutboundFrame, Session, SessionError};

/// Tracks connected participants.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ register_channels() / unregister_channels() ──→ disconnect()
///                         │
///                         ▼
///                is_listening() / send()
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ParticipantId, Session>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly logged-in participant.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the participant already has a
    /// session. The existing session is left untouched.
    pub fn connect(
        &mut self,
        participant: ParticipantId,
        sender: FrameSender,
    ) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&participant) {
            return Err(SessionError::AlreadyConnected(participant));
        }

        tracing::info!(%participant, "session created");
        Ok(self
            .sessions
            .entry(participant)
            .or_insert_with(|| Session::new(participant, sender)))
    }

    /// Removes a participant's session and returns it.
    ///
    /// Dropping the returned session drops its sender, which ends the
    /// connection's writer task once the queue is drained.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the participant has no session.
    pub fn disconnect(&mut self, participant: ParticipantId) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&participant)
            .ok_or(SessionError::NotFound(participant))?;
        tracing::info!(%participant, "session removed");
        Ok(session)
    }

    /// Adds channel names to a participant's interests. Returns how many
    /// were not already registered. Empty names are skipped.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the participant has no session.
    pub fn register_channels<'a, I>(
        &mut self,
        participant: ParticipantId,
        channels: I,
    ) -> Result<usize, SessionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let session = self.session_mut(participant)?;
        let mut added = 0;
        for channel in channels.into_iter().filter(|c| !c.is_empty()) {
            if session.channels.insert(channel.to_string()) {
                added += 1;
            }
        }
        tracing::debug!(%participant, added, total = session.channels.len(), "channels registered");
        Ok(added)
    }

    /// Removes channel names from a participant's interests. Returns how
    /// many were actually registered.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the participant has no session.
    pub fn unregister_channels<'a, I>(
        &mut self,
        participant: ParticipantId,
        channels: I,
    ) -> Result<usize, SessionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let session = self.session_mut(participant)?;
        let removed = channels
            .into_iter()
            .filter(|c| session.channels.remove(*c))
            .count();
        tracing::debug!(%participant, removed, total = session.channels.len(), "channels unregistered");
        Ok(removed)
    }

    /// Whether `participant` is connected and registered `channel`.
    pub fn is_listening(&self, participant: ParticipantId, channel: &str) -> bool {
        self.sessions
            .get(&participant)
            .is_some_and(|session| session.is_listening(channel))
    }

    /// A snapshot of connected participant ids, in no particular order.
    pub fn connected(&self) -> Vec<ParticipantId> {
        self.sessions.keys().copied().collect()
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.sessions.contains_key(&participant)
    }

    /// Queues `frame` on the participant's outbound queue. Never blocks.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if the participant has no session.
    /// - [`SessionError::QueueClosed`] if its writer task has exited.
    pub fn send(
        &self,
        participant: ParticipantId,
        frame: OutboundFrame,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get(&participant)
            .ok_or(SessionError::NotFound(participant))?;
        session
            .sender
            .send(frame)
            .map_err(|_| SessionError::QueueClosed(participant))
    }

    /// Returns the number of connected participants.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn session_mut(&mut self, participant: ParticipantId) -> Result<&mut Session, SessionError> {
        self.sessions
            .get_mut(&participant)
            .ok_or(SessionError::NotFound(participant))
    }
}

// =========================================================================
// Tests
// =========================================================================
