//! The relay engine: decode → cache → broadcast.
//!
//! Three entry points, driven by the host's event dispatch:
//!
//! ```text
//! on_message(channel, sender, bytes) ──→ header ──→ opcode 10? ──→ reply to sender only
//!                                          │             │
//!                                          │ (fails)     └──→ opcode 3? ──→ update cache
//!                                          ▼                                   │
//!                                   forward raw bytes  ◄───────────────────────┘
//!
//! on_join(id)       ──(after delay, if still connected)──→ push cached models to id
//! on_disconnect(id) ──→ drop id's cache entry ──→ announce empty model for id
//! ```
//!
//! The golden rule: whatever goes wrong while *understanding* a message,
//! the original bytes still reach everyone who should get them.

use std::sync::Arc;

use avatar_relay_protocol::{
    decode_header, decode_payload, encode_model_sync, opcode, ChannelRegistry,
    ParsedHeader, ParticipantId, ProtocolVariant,
};

use crate::config::hex_preview;
use crate::{EngineConfig, Host, ModelCache, Scheduler};

/// Longest stage string shown in a trace before it is cut off.
const STAGE_PREVIEW_CHARS: usize = 200;

/// What [`RelayEngine::on_message`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The channel is not one clients may send on. Nothing was sent.
    Ignored,

    /// The raw message was broadcast. `recipients` counts participants,
    /// not deliveries.
    Forwarded { recipients: usize },

    /// A model request was answered directly; nothing was broadcast.
    Replied { messages: usize },
}

/// Why models are being pushed to a participant. Only used for traces.
#[derive(Debug, Clone, Copy)]
enum SyncReason {
    Join,
    Request,
}

impl SyncReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join-sync",
            Self::Request => "op10-sync",
        }
    }
}

/// Forwards messages between participants and keeps the model cache.
///
/// One engine per relay. It exclusively owns its [`ModelCache`]; the
/// registry is shared read-only. Every method takes `&self`, so the engine
/// is shared across connection tasks behind an `Arc`.
pub struct RelayEngine<H: Host, S: Scheduler> {
    host: Arc<H>,
    scheduler: S,
    registry: Arc<ChannelRegistry>,
    cache: ModelCache,
    config: EngineConfig,
}

impl<H: Host, S: Scheduler> RelayEngine<H, S> {
    /// Creates an engine with an empty cache.
    pub fn new(
        host: Arc<H>,
        scheduler: S,
        registry: Arc<ChannelRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            host,
            scheduler,
            registry,
            cache: ModelCache::new(),
            config,
        }
    }

    /// Read access to the model cache (for tests and diagnostics).
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------

    /// Handles one message received from `sender` on `channel`.
    pub fn on_message(&self, channel: &str, sender: ParticipantId, raw: &[u8]) -> Dispatch {
        if !self.registry.accepts_inbound(channel) {
            tracing::debug!(channel, %sender, "ignoring message on unregistered channel");
            return Dispatch::Ignored;
        }

        let outbound = self.registry.resolve_outbound(channel);

        let header = match decode_header(raw) {
            Ok(header) => header,
            Err(e) => {
                // Too short to route on, but still a valid message as far
                // as the receiving clients are concerned.
                tracing::warn!(
                    channel,
                    %sender,
                    len = raw.len(),
                    error = %e,
                    "forwarding payload with unreadable header"
                );
                self.trace_message("RECV", channel, outbound, sender, None, raw, None);
                let recipients = self.broadcast(outbound, raw, &[sender]);
                self.trace_message("FWD", channel, outbound, sender, None, raw, Some(recipients));
                return Dispatch::Forwarded { recipients };
            }
        };

        self.trace_message("RECV", channel, outbound, sender, Some(&header), raw, None);

        // The channel accepted inbound traffic, so it is registered and
        // has a variant.
        let variant = self.registry.variant_of(channel);

        match header.opcode {
            opcode::MODEL_REQUEST => {
                if self.config.trace.enabled {
                    tracing::info!(%sender, channel, "op10 model request");
                }
                let messages = self.sync_models_to(sender, SyncReason::Request);
                return Dispatch::Replied { messages };
            }
            opcode::MODEL_SELECT => {
                if let Some(variant) = variant {
                    self.record_model(channel, sender, variant, raw);
                }
            }
            op if opcode::STAGE.contains(&op) && self.config.trace.enabled => {
                if let Some(variant) = variant {
                    trace_stage_string(variant, op, raw);
                }
            }
            _ => {}
        }

        let recipients = self.broadcast(outbound, raw, &[sender]);
        self.trace_message("FWD", channel, outbound, sender, Some(&header), raw, Some(recipients));
        Dispatch::Forwarded { recipients }
    }

    /// Schedules the join-time model push for `participant`.
    ///
    /// Takes `self: &Arc<Self>` because the scheduled task outlives this
    /// call and needs its own handle to the engine.
    pub fn on_join(self: &Arc<Self>, participant: ParticipantId) {
        let engine = Arc::clone(self);
        self.scheduler.schedule_once(
            self.config.join_sync_delay,
            Box::new(move || {
                // Checked now, not at schedule time: the participant may
                // have left during the delay.
                if !engine.host.is_connected(participant) {
                    tracing::debug!(%participant, "skipping join sync, participant left");
                    return;
                }
                let sent = engine.sync_models_to(participant, SyncReason::Join);
                tracing::debug!(%participant, sent, "join sync delivered");
            }),
        );
    }

    /// Forgets `participant`'s model and tells everyone else to drop it.
    ///
    /// Returns the number of clear messages delivered.
    pub fn on_disconnect(&self, participant: ParticipantId) -> usize {
        self.cache.remove(participant);

        let mut delivered = 0;
        for desc in self.registry.preferred_outbound() {
            let bytes = encode_model_sync(desc.variant, participant, "");
            let forwarded = self.broadcast(&desc.name, &bytes, &[participant]);
            if self.config.trace.enabled {
                tracing::info!(%participant, via = %desc.name, forwarded, "quit-clear");
            }
            delivered += forwarded;
        }
        delivered
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Applies a model-select message to the cache. A decode failure only
    /// costs the cache update; the caller still forwards the message.
    fn record_model(
        &self,
        channel: &str,
        sender: ParticipantId,
        variant: ProtocolVariant,
        raw: &[u8],
    ) {
        match decode_payload(variant, raw) {
            Ok(parsed) => {
                let model = parsed.string_arg.unwrap_or_default();
                // Keyed on the id inside the payload, not the connection.
                self.cache.upsert(parsed.participant, &model);
                if self.config.trace.enabled {
                    tracing::info!(participant = %parsed.participant, model = %model, "cached model op3");
                }
            }
            Err(e) => {
                tracing::debug!(channel, %sender, error = %e, "model select payload not decoded");
            }
        }
    }

    /// Sends one model-sync per cache entry to `participant`, on every
    /// preferred outbound channel it listens to. Returns messages sent.
    fn sync_models_to(&self, participant: ParticipantId, reason: SyncReason) -> usize {
        let entries = self.cache.snapshot();
        let mut sent = 0;

        for desc in self.registry.preferred_outbound() {
            if !self.listening(participant, &desc.name) {
                continue;
            }
            for (id, model) in &entries {
                let bytes = encode_model_sync(desc.variant, *id, model);
                self.host.send_raw(participant, &desc.name, &bytes);
                sent += 1;
                if self.config.trace.enabled {
                    tracing::info!(
                        to = %participant,
                        via = %desc.name,
                        participant = %id,
                        model = %model,
                        "{}",
                        reason.as_str()
                    );
                }
            }
        }
        sent
    }

    /// Sends `bytes` on `channel` to every connected participant not in
    /// `exclude` that listens on it. Returns the number of recipients.
    fn broadcast(&self, channel: &str, bytes: &[u8], exclude: &[ParticipantId]) -> usize {
        let mut recipients = 0;
        for participant in self.host.enumerate_connected() {
            if exclude.contains(&participant) || !self.listening(participant, channel) {
                continue;
            }
            self.host.send_raw(participant, channel, bytes);
            recipients += 1;
            if self.config.trace.enabled && self.config.trace.log_recipients {
                tracing::info!(%participant, channel, "  -> recipient");
            }
        }
        recipients
    }

    /// Unknown capability counts as listening.
    fn listening(&self, participant: ParticipantId, channel: &str) -> bool {
        self.host.is_listening(participant, channel).unwrap_or(true)
    }

    /// Emits a RECV/FWD trace line when verbose tracing is on.
    #[allow(clippy::too_many_arguments)]
    fn trace_message(
        &self,
        tag: &str,
        channel: &str,
        outbound: &str,
        sender: ParticipantId,
        header: Option<&ParsedHeader>,
        raw: &[u8],
        forwarded: Option<usize>,
    ) {
        let trace = &self.config.trace;
        if !trace.enabled {
            return;
        }
        let (op, participant) = match header {
            Some(h) => (h.opcode.to_string(), h.participant.to_string()),
            None => ("?".to_string(), "?".to_string()),
        };
        let hex = hex_preview(raw, trace.payload_hex_max_bytes).unwrap_or_default();
        tracing::info!(
            tag,
            channel,
            outbound,
            from = %sender,
            op = %op,
            participant = %participant,
            len = raw.len(),
            header_ok = header.is_some(),
            forwarded = ?forwarded,
            hex = %hex,
            "relay message"
        );
    }
}

/// Logs a preview of a stage opcode's string argument.
fn trace_stage_string(variant: ProtocolVariant, op: i32, raw: &[u8]) {
    match decode_payload(variant, raw) {
        Ok(parsed) => {
            let preview = stage_preview(&parsed.string_arg.unwrap_or_default());
            tracing::info!(op, string = %preview, "stage payload");
        }
        Err(e) => {
            tracing::info!(op, error = %e, "stage payload string not decoded");
        }
    }
}

/// The first [`STAGE_PREVIEW_CHARS`] characters of `s`, with `...` appended
/// when anything was cut.
fn stage_preview(s: &str) -> String {
    let mut chars = s.chars();
    let mut preview: String = chars.by_ref().take(STAGE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_preview_short_string_unchanged() {
        assert_eq!(stage_preview(""), "");
        assert_eq!(stage_preview("motion/dance.vmd"), "motion/dance.vmd");
    }

    #[test]
    fn test_stage_preview_exactly_limit_has_no_suffix() {
        let s = "x".repeat(STAGE_PREVIEW_CHARS);
        assert_eq!(stage_preview(&s), s);
    }

    #[test]
    fn test_stage_preview_long_string_cut_with_suffix() {
        let s = "y".repeat(STAGE_PREVIEW_CHARS + 1);

        let preview = stage_preview(&s);

        assert_eq!(preview, format!("{}...", "y".repeat(STAGE_PREVIEW_CHARS)));
    }

    #[test]
    fn test_stage_preview_counts_chars_not_bytes() {
        let s = "\u{3042}".repeat(STAGE_PREVIEW_CHARS + 10);

        let preview = stage_preview(&s);

        assert_eq!(preview.chars().count(), STAGE_PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
        assert!(preview.starts_with('\u{3042}'));
    }
}
