//! # Avatar Relay
//!
//! A relay for avatar-model plugin messages. Clients connect over
//! WebSocket, say who they are, and from then on every message they send
//! on a known channel is forwarded to the other participants. The relay
//! remembers each participant's selected model so late joiners see
//! everyone correctly.
//!
//! ## Wire format
//!
//! - First frame: the participant's UUID as text.
//! - Every later frame: `[varint len][channel][payload]`.
//! - `minecraft:register` / `minecraft:unregister` frames carry
//!   NUL-separated channel names the client wants (or no longer wants).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use avatar_relay::prelude::*;
//!
//! # async fn start() -> Result<(), RelayError> {
//! let server = RelayServer::builder()
//!     .bind("0.0.0.0:25580")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
pub mod frame;
mod handler;
mod host;
mod server;

pub use config::{ConfigError, RelayConfig};
pub use error::RelayError;
pub use host::SessionHost;
pub use server::{Engine, RelayServer, RelayServerBuilder};

/// Everything needed to configure and run a relay.
pub mod prelude {
    pub use avatar_relay_engine::{Dispatch, EngineConfig, TraceConfig};
    pub use avatar_relay_protocol::{ChannelRegistry, ParticipantId};

    pub use crate::frame::{REGISTER_CHANNEL, UNREGISTER_CHANNEL};
    pub use crate::{ConfigError, RelayConfig, RelayError, RelayServer, RelayServerBuilder};
}
