//! The channel registry: which logical channels exist, which wire layout
//! each one speaks, and where replies to each one go.
//!
//! Channels are named lanes in the host's messaging layer. Each client
//! generation registers its own names, so the registry is the single place
//! that knows how to talk to every generation at once.

use std::collections::{HashMap, HashSet};

use crate::RegistryError;

// ---------------------------------------------------------------------------
// Descriptor types
// ---------------------------------------------------------------------------

/// The binary layout a channel's messages use after the common header.
///
/// A closed set on purpose: supporting a new client generation means
/// adding a variant here and a row in
/// [`tail_layout`](crate::packet::tail_layout), not new control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    /// Every message carries `int_arg`, `entity_id`, and a string, whatever
    /// the opcode.
    FixedFields,

    /// The tail depends on the opcode: nothing, a string, an int32, or
    /// int32 + string.
    Sparse,
}

/// Which way traffic may flow on a channel, from the relay's viewpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Clients send on it; the relay never sends on it.
    Inbound,
    /// The relay sends on it; clients never send on it.
    Outbound,
    /// Combined channel used in both directions.
    Both,
}

impl Direction {
    pub fn accepts_inbound(self) -> bool {
        matches!(self, Self::Inbound | Self::Both)
    }

    pub fn accepts_outbound(self) -> bool {
        matches!(self, Self::Outbound | Self::Both)
    }
}

/// One row of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// The host-level channel name, e.g. `mmdskin:network`.
    pub name: String,
    /// Wire layout of messages on this channel.
    pub variant: ProtocolVariant,
    /// Allowed traffic direction.
    pub direction: Direction,
    /// Channel that traffic received here is forwarded on. `None` means
    /// the channel itself.
    pub reply_channel: Option<String>,
}

impl ChannelDescriptor {
    /// A combined channel: inbound and outbound on the same name.
    pub fn combined(name: &str, variant: ProtocolVariant) -> Self {
        Self {
            name: name.to_string(),
            variant,
            direction: Direction::Both,
            reply_channel: None,
        }
    }

    /// The client → server half of a split pair. Forwards on `reply`.
    pub fn inbound(name: &str, variant: ProtocolVariant, reply: &str) -> Self {
        Self {
            name: name.to_string(),
            variant,
            direction: Direction::Inbound,
            reply_channel: Some(reply.to_string()),
        }
    }

    /// The server → client half of a split pair.
    pub fn outbound(name: &str, variant: ProtocolVariant) -> Self {
        Self {
            name: name.to_string(),
            variant,
            direction: Direction::Outbound,
            reply_channel: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Known channels
// ---------------------------------------------------------------------------

/// Newest generation, fixed-field layout.
pub const MMDSKIN_NETWORK: &str = "mmdskin:network";
/// Newest generation, sparse layout.
pub const MMDSKIN_PACK: &str = "mmdskin:network_pack";
/// Legacy generation, combined channel.
pub const LEGACY_PACK: &str = "3d-skin:network_pack";
/// Legacy generation, client → server half of the split pair.
pub const LEGACY_C2S: &str = "3d-skin:network_c2s";
/// Legacy generation, server → client half of the split pair.
pub const LEGACY_S2C: &str = "3d-skin:network_s2c";

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Read-only table of channel descriptors.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it
/// after the relay starts accepting traffic.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    /// Descriptors in priority order (newest generation first).
    channels: Vec<ChannelDescriptor>,
    /// Name → index into `channels`.
    index: HashMap<String, usize>,
}

impl ChannelRegistry {
    /// Builds a registry from a custom descriptor table.
    ///
    /// Table order is priority order for [`preferred_outbound`](Self::preferred_outbound).
    ///
    /// # Errors
    /// - [`RegistryError::DuplicateChannel`] if a name appears twice.
    /// - [`RegistryError::UnknownReplyChannel`] if a reply channel is missing.
    /// - [`RegistryError::ReplyChannelNotOutbound`] if a reply channel is
    ///   inbound-only.
    pub fn new(channels: Vec<ChannelDescriptor>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::with_capacity(channels.len());
        for desc in &channels {
            if !seen.insert(desc.name.as_str()) {
                return Err(RegistryError::DuplicateChannel(desc.name.clone()));
            }
        }

        let registry = Self::from_table(channels);
        for desc in &registry.channels {
            let Some(reply) = &desc.reply_channel else {
                continue;
            };
            let target = registry
                .get(reply)
                .ok_or_else(|| RegistryError::UnknownReplyChannel {
                    channel: desc.name.clone(),
                    reply: reply.clone(),
                })?;
            if !target.direction.accepts_outbound() {
                return Err(RegistryError::ReplyChannelNotOutbound {
                    channel: desc.name.clone(),
                    reply: reply.clone(),
                });
            }
        }

        Ok(registry)
    }

    /// Indexes `channels` as given. Callers guarantee the table is valid.
    fn from_table(channels: Vec<ChannelDescriptor>) -> Self {
        let index = channels
            .iter()
            .enumerate()
            .map(|(i, desc)| (desc.name.clone(), i))
            .collect();
        Self { channels, index }
    }

    /// Looks up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ChannelDescriptor> {
        self.index.get(name).map(|&i| &self.channels[i])
    }

    /// Returns the channel that traffic received on `inbound` is forwarded
    /// on. Identity for every channel except a split pair's inbound half.
    pub fn resolve_outbound<'a>(&'a self, inbound: &'a str) -> &'a str {
        self.get(inbound)
            .and_then(|d| d.reply_channel.as_deref())
            .unwrap_or(inbound)
    }

    /// The wire layout of `name`, or `None` if the channel is unknown (and
    /// its messages must not be interpreted).
    pub fn variant_of(&self, name: &str) -> Option<ProtocolVariant> {
        self.get(name).map(|d| d.variant)
    }

    /// Returns `true` if clients may send on `name`.
    pub fn accepts_inbound(&self, name: &str) -> bool {
        self.get(name).is_some_and(|d| d.direction.accepts_inbound())
    }

    /// Channels the relay pushes unsolicited sync messages on, newest
    /// generation first.
    pub fn preferred_outbound(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.channels
            .iter()
            .filter(|d| d.direction.accepts_outbound())
    }

    /// Names clients may send on, in priority order.
    pub fn inbound_channels(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|d| d.direction.accepts_inbound())
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Names the relay may send on, in priority order.
    pub fn outbound_channels(&self) -> Vec<&str> {
        self.preferred_outbound().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// The channels of every client generation the relay knows about.
impl Default for ChannelRegistry {
    fn default() -> Self {
        // Checked against `new` in `test_default_table_passes_validation`.
        Self::from_table(builtin_table())
    }
}

fn builtin_table() -> Vec<ChannelDescriptor> {
    use ProtocolVariant::{FixedFields, Sparse};

    vec![
        ChannelDescriptor::combined(MMDSKIN_NETWORK, FixedFields),
        ChannelDescriptor::combined(MMDSKIN_PACK, Sparse),
        ChannelDescriptor::combined(LEGACY_PACK, Sparse),
        ChannelDescriptor::inbound(LEGACY_C2S, Sparse, LEGACY_S2C),
        ChannelDescriptor::outbound(LEGACY_S2C, Sparse),
    ]
}
