//! Wire protocol for Avatar Relay.
//!
//! This crate knows how to read just enough of a client message to route
//! it, and how to write the one message the relay ever synthesizes:
//!
//! - **Wire primitives** ([`wire`]): big-endian integers, varints, and
//!   varint-prefixed strings.
//! - **Channel registry** ([`ChannelRegistry`]): which channels exist,
//!   which [`ProtocolVariant`] each speaks, and where replies go.
//! - **Packets** ([`decode_header`], [`decode_payload`],
//!   [`encode_model_sync`]): the shared header, the variant-specific tail,
//!   and model-sync synthesis.
//! - **Errors** ([`ProtocolError`], [`RegistryError`]).
//!
//! # Architecture
//!
//! ```text
//! Host (channel name + bytes) → Protocol (header / payload) → Engine (cache, broadcast)
//! ```
//!
//! Nothing here does I/O or holds state; everything operates on byte
//! slices the host has already received in full.

mod error;
mod packet;
mod registry;
mod types;
pub mod wire;

pub use error::{ProtocolError, RegistryError};
pub use packet::{
    decode_header, decode_payload, decode_tail, encode_model_sync, tail_layout,
    ParsedHeader, ParsedPayload, TailLayout, HEADER_LEN,
};
pub use registry::{
    ChannelDescriptor, ChannelRegistry, Direction, ProtocolVariant, LEGACY_C2S,
    LEGACY_PACK, LEGACY_S2C, MMDSKIN_NETWORK, MMDSKIN_PACK,
};
pub use types::{opcode, ParticipantId};
