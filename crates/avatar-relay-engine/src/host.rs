//! What the engine needs from the process hosting it.
//!
//! The engine never owns sockets, sessions, or timers. It calls out to a
//! [`Host`] to learn who is connected and to deliver bytes, and to a
//! [`Scheduler`] to run the one delayed task it needs (join-time sync).
//! The reference WebSocket host lives in the `avatar-relay` crate; tests
//! plug in recording fakes.

use std::time::Duration;

use avatar_relay_protocol::ParticipantId;
use tokio::runtime::Handle;

/// The hosting runtime, as seen by the engine.
///
/// ## Trait bounds
///
/// `Send + Sync + 'static` because one host is shared by every connection
/// task and by scheduled callbacks, which may run on any worker thread.
pub trait Host: Send + Sync + 'static {
    /// Delivers `bytes` to `participant` on `channel`.
    ///
    /// Fire-and-forget: the engine neither waits for nor learns about
    /// delivery failures. Implementations must not block.
    fn send_raw(&self, participant: ParticipantId, channel: &str, bytes: &[u8]);

    /// Whether `participant` has declared interest in `channel`.
    ///
    /// Return `None` when the host cannot tell. The engine then assumes
    /// the participant IS listening: a participant believed capable is
    /// never silently skipped.
    fn is_listening(&self, participant: ParticipantId, channel: &str) -> Option<bool>;

    /// A point-in-time list of connected participants.
    fn enumerate_connected(&self) -> Vec<ParticipantId>;

    /// Whether `participant` is connected right now.
    fn is_connected(&self, participant: ParticipantId) -> bool {
        self.enumerate_connected().contains(&participant)
    }
}

/// A boxed task handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once after a delay. No repetition, no cancellation.
///
/// Tasks that depend on state which may change during the delay (such as
/// "is this participant still connected?") must check it when they run.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule_once(&self, delay: Duration, task: Task);
}

/// A [`Scheduler`] backed by `tokio::time::sleep` on a runtime handle.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedules onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedules onto the runtime the caller is running in.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime, like
    /// [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}
