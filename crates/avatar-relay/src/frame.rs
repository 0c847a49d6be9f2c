//! Framing for plugin messages on a WebSocket.
//!
//! Each binary frame carries exactly one plugin message:
//!
//! ```text
//! [varint len][channel name][payload ...]
//! ```
//!
//! The payload is passed to the engine untouched.
//!
//! Two channels never reach the engine: `minecraft:register` and
//! `minecraft:unregister` carry NUL-separated channel names and update the
//! sender's declared interests.

use avatar_relay_protocol::wire::{self, Reader};
use avatar_relay_protocol::ProtocolError;

/// Adds channel names to the sender's interests.
pub const REGISTER_CHANNEL: &str = "minecraft:register";

/// Removes channel names from the sender's interests.
pub const UNREGISTER_CHANNEL: &str = "minecraft:unregister";

/// Builds a frame carrying `payload` on `channel`.
pub fn encode_frame(channel: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(wire::MAX_VAR_INT_BYTES + channel.len() + payload.len());
    wire::write_string(&mut out, channel);
    out.extend_from_slice(payload);
    out
}

/// Splits a frame into its channel name and payload.
///
/// # Errors
/// Whatever [`Reader::read_string`] reports when the channel name is
/// missing or truncated.
pub fn decode_frame(frame: &[u8]) -> Result<(String, &[u8]), ProtocolError> {
    let mut r = Reader::new(frame);
    let channel = r.read_string()?;
    Ok((channel, &frame[r.position()..]))
}

/// Parses a register/unregister payload. Empty names are dropped.
pub fn parse_channel_list(payload: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(payload)
        .split('\0')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds a register/unregister payload.
pub fn encode_channel_list<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<u8> {
    names.into_iter().collect::<Vec<_>>().join("\0").into_bytes()
}
