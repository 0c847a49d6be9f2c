//! Participant session tracking for Avatar Relay.
//!
//! This crate answers the questions the relay engine asks its host:
//!
//! 1. **Who is connected?** ([`SessionRegistry::connected`])
//! 2. **Who listens on which channel?** Clients declare interest by
//!    registering channel names ([`SessionRegistry::register_channels`]).
//! 3. **How do bytes reach them?** Each session holds the sending half of
//!    its connection's outbound queue ([`FrameSender`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)   ← asks "connected?", "listening?", "send this"
//!     ↕
//! Session Layer (this crate)  ← participant identity and channel interests
//!     ↕
//! Protocol Layer (below)  ← provides ParticipantId
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{FrameSender, OutboundFrame, Session};
