//! Header and payload decoding, plus model-sync synthesis.
//!
//! Decoding is split in two on purpose:
//!
//! 1. [`decode_header`] reads only the 20 bytes every variant shares. It is
//!    attempted on every message and is all the relay needs for routing.
//! 2. [`decode_payload`] reads the variant-specific tail, and only for the
//!    opcodes the relay interprets. Tail layouts drift between client
//!    generations, so a failure here must never stop a message from being
//!    forwarded.

use crate::types::opcode;
use crate::wire::{self, Reader};
use crate::{ParticipantId, ProtocolError, ProtocolVariant};

/// Size of the shared header: 4-byte opcode + 16-byte participant id.
pub const HEADER_LEN: usize = 4 + 16;

// ---------------------------------------------------------------------------
// Parsed types
// ---------------------------------------------------------------------------

/// The variant-independent prefix of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHeader {
    pub opcode: i32,
    pub participant: ParticipantId,
}

/// A fully decoded message, produced only for opcodes the relay needs to
/// interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPayload {
    pub opcode: i32,
    /// The id carried inside the message. The engine keys the model cache
    /// on this, not on the connection the message arrived from.
    pub participant: ParticipantId,
    pub string_arg: Option<String>,
    pub int_arg: Option<i32>,
}

// ---------------------------------------------------------------------------
// Tail layouts
// ---------------------------------------------------------------------------

/// Shape of the bytes after the header, for one (variant, opcode) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailLayout {
    /// `int_arg`, `entity_id` (discarded), then a string.
    FixedFields,
    /// A single string.
    Str,
    /// A single int32.
    Int,
    /// An int32 followed by a string.
    IntThenStr,
    /// Empty, a string, or an int32. Model requests shipped with both
    /// encodings across client generations, so try the string first.
    StrOrInt,
}

/// The decode table: which tail layout a variant uses for an opcode.
pub fn tail_layout(variant: ProtocolVariant, op: i32) -> TailLayout {
    match variant {
        ProtocolVariant::FixedFields => TailLayout::FixedFields,
        ProtocolVariant::Sparse => match op {
            op if opcode::STRING_BEARING.contains(&op) => TailLayout::Str,
            opcode::MODEL_REQUEST => TailLayout::StrOrInt,
            op if opcode::ENTITY_TAGGED.contains(&op) => TailLayout::IntThenStr,
            _ => TailLayout::Int,
        },
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Reads the opcode and participant id from the front of `raw`.
///
/// # Errors
/// [`ProtocolError::HeaderTooShort`] if `raw` is shorter than
/// [`HEADER_LEN`].
pub fn decode_header(raw: &[u8]) -> Result<ParsedHeader, ProtocolError> {
    if raw.len() < HEADER_LEN {
        return Err(ProtocolError::HeaderTooShort { len: raw.len() });
    }
    read_header(&mut Reader::new(raw))
}

fn read_header(r: &mut Reader<'_>) -> Result<ParsedHeader, ProtocolError> {
    let opcode = r.read_i32()?;
    let most = r.read_u64()?;
    let least = r.read_u64()?;
    Ok(ParsedHeader {
        opcode,
        participant: ParticipantId::from_halves(most, least),
    })
}

/// Decodes the whole message (header and tail) using `variant`'s layout.
///
/// # Errors
/// - [`ProtocolError::HeaderTooShort`] if the header itself is incomplete.
/// - [`ProtocolError::PayloadDecodeFailed`] wrapping whatever went wrong in
///   the tail.
pub fn decode_payload(
    variant: ProtocolVariant,
    raw: &[u8],
) -> Result<ParsedPayload, ProtocolError> {
    let header = decode_header(raw)?;
    let tail = &raw[HEADER_LEN..];
    let (string_arg, int_arg) =
        decode_tail(tail_layout(variant, header.opcode), tail).map_err(|source| {
            ProtocolError::PayloadDecodeFailed {
                opcode: header.opcode,
                source: Box::new(source),
            }
        })?;

    Ok(ParsedPayload {
        opcode: header.opcode,
        participant: header.participant,
        string_arg,
        int_arg,
    })
}

/// Decodes the bytes after the header according to `layout`.
///
/// Trailing bytes beyond the layout are ignored, matching how clients
/// read their own messages.
pub fn decode_tail(
    layout: TailLayout,
    tail: &[u8],
) -> Result<(Option<String>, Option<i32>), ProtocolError> {
    let mut r = Reader::new(tail);
    match layout {
        TailLayout::FixedFields => {
            let int_arg = r.read_i32()?;
            let _entity_id = r.read_i32()?;
            let s = r.read_string()?;
            Ok((Some(s), Some(int_arg)))
        }
        TailLayout::Str => Ok((Some(r.read_string()?), None)),
        TailLayout::Int => Ok((None, Some(r.read_i32()?))),
        TailLayout::IntThenStr => {
            let int_arg = r.read_i32()?;
            let s = r.read_string()?;
            Ok((Some(s), Some(int_arg)))
        }
        TailLayout::StrOrInt => {
            if r.remaining() == 0 {
                return Ok((Some(String::new()), None));
            }
            let mark = r.position();
            match r.read_string() {
                Ok(s) => Ok((Some(s), None)),
                Err(_) => {
                    r.rewind(mark);
                    Ok((None, Some(r.read_i32()?)))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Builds an opcode-3 (model select) message for `participant` in the
/// layout `variant` expects.
///
/// `FixedFields` destinations get two zero int32 placeholders before the
/// name; `Sparse` destinations must not. An empty `model` is meaningful:
/// receivers drop whatever they were showing for that participant.
pub fn encode_model_sync(
    variant: ProtocolVariant,
    participant: ParticipantId,
    model: &str,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 8 + wire::MAX_VAR_INT_BYTES + model.len());
    out.extend_from_slice(&opcode::MODEL_SELECT.to_be_bytes());
    let (most, least) = participant.halves();
    out.extend_from_slice(&most.to_be_bytes());
    out.extend_from_slice(&least.to_be_bytes());

    if variant == ProtocolVariant::FixedFields {
        out.extend_from_slice(&0i32.to_be_bytes()); // int_arg
        out.extend_from_slice(&0i32.to_be_bytes()); // entity_id
    }

    wire::write_string(&mut out, model);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{encode_string, write_string};

    fn pid() -> ParticipantId {
        ParticipantId::from_halves(0x1111_2222_3333_4444, 0x5555_6666_7777_8888)
    }

    /// Builds a raw message: header followed by `tail`.
    fn message(op: i32, tail: &[u8]) -> Vec<u8> {
        let mut out = op.to_be_bytes().to_vec();
        let (most, least) = pid().halves();
        out.extend_from_slice(&most.to_be_bytes());
        out.extend_from_slice(&least.to_be_bytes());
        out.extend_from_slice(tail);
        out
    }

    // =====================================================================
    // Header
    // =====================================================================

    #[test]
    fn test_decode_header_reads_opcode_and_id() {
        let raw = message(42, &[]);
        let header = decode_header(&raw).expect("20 bytes is enough");
        assert_eq!(header.opcode, 42);
        assert_eq!(header.participant, pid());
    }

    #[test]
    fn test_decode_header_ignores_tail() {
        let raw = message(3, b"\xFF\xFF\xFF garbage");
        assert_eq!(decode_header(&raw).unwrap().opcode, 3);
    }

    #[test]
    fn test_decode_header_too_short() {
        let raw = [0u8; 19];
        assert_eq!(
            decode_header(&raw),
            Err(ProtocolError::HeaderTooShort { len: 19 })
        );
        assert_eq!(
            decode_header(&[]),
            Err(ProtocolError::HeaderTooShort { len: 0 })
        );
    }

    // =====================================================================
    // Tail layout table
    // =====================================================================

    #[test]
    fn test_tail_layout_table() {
        use ProtocolVariant::{FixedFields, Sparse};

        for op in [0, 1, 3, 4, 10, 99] {
            assert_eq!(tail_layout(FixedFields, op), TailLayout::FixedFields);
        }
        for op in [1, 3, 6, 7, 8, 9] {
            assert_eq!(tail_layout(Sparse, op), TailLayout::Str, "opcode {op}");
        }
        assert_eq!(tail_layout(Sparse, 10), TailLayout::StrOrInt);
        assert_eq!(tail_layout(Sparse, 4), TailLayout::IntThenStr);
        assert_eq!(tail_layout(Sparse, 5), TailLayout::IntThenStr);
        for op in [0, 2, 11, -1] {
            assert_eq!(tail_layout(Sparse, op), TailLayout::Int, "opcode {op}");
        }
    }

    // =====================================================================
    // Payloads: fixed-field variant
    // =====================================================================

    #[test]
    fn test_fixed_fields_payload() {
        let mut tail = 7i32.to_be_bytes().to_vec();
        tail.extend_from_slice(&99i32.to_be_bytes());
        write_string(&mut tail, "Miku");
        let raw = message(3, &tail);

        let parsed = decode_payload(ProtocolVariant::FixedFields, &raw).unwrap();
        assert_eq!(parsed.opcode, 3);
        assert_eq!(parsed.participant, pid());
        assert_eq!(parsed.string_arg.as_deref(), Some("Miku"));
        assert_eq!(parsed.int_arg, Some(7));
    }

    #[test]
    fn test_fixed_fields_payload_missing_string_fails() {
        let raw = message(3, &[0; 8]);
        let err = decode_payload(ProtocolVariant::FixedFields, &raw).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::PayloadDecodeFailed { opcode: 3, .. }
        ));
    }

    #[test]
    fn test_sparse_layout_on_fixed_channel_fails() {
        // A sparse-encoded model select sent on a fixed-field channel: the
        // first 8 bytes get eaten as ints and the string is gone.
        let raw = message(3, &encode_string("Miku"));
        assert!(decode_payload(ProtocolVariant::FixedFields, &raw).is_err());
    }

    // =====================================================================
    // Payloads: sparse variant
    // =====================================================================

    #[test]
    fn test_sparse_string_opcode() {
        let raw = message(3, &encode_string("Miku"));
        let parsed = decode_payload(ProtocolVariant::Sparse, &raw).unwrap();
        assert_eq!(parsed.string_arg.as_deref(), Some("Miku"));
        assert_eq!(parsed.int_arg, None);
    }

    #[test]
    fn test_sparse_int_opcode() {
        let raw = message(2, &123i32.to_be_bytes());
        let parsed = decode_payload(ProtocolVariant::Sparse, &raw).unwrap();
        assert_eq!(parsed.string_arg, None);
        assert_eq!(parsed.int_arg, Some(123));
    }

    #[test]
    fn test_sparse_entity_tagged_opcode() {
        let mut tail = 55i32.to_be_bytes().to_vec();
        write_string(&mut tail, "maid.pmx");
        let raw = message(4, &tail);

        let parsed = decode_payload(ProtocolVariant::Sparse, &raw).unwrap();
        assert_eq!(parsed.int_arg, Some(55));
        assert_eq!(parsed.string_arg.as_deref(), Some("maid.pmx"));
    }

    #[test]
    fn test_sparse_int_opcode_truncated() {
        let raw = message(2, &[0, 1]);
        let err = decode_payload(ProtocolVariant::Sparse, &raw).unwrap_err();
        match err {
            ProtocolError::PayloadDecodeFailed { opcode, source } => {
                assert_eq!(opcode, 2);
                assert!(matches!(*source, ProtocolError::TruncatedStream { .. }));
            }
            other => panic!("expected PayloadDecodeFailed, got {other:?}"),
        }
    }

    // =====================================================================
    // Model request (opcode 10): two historical encodings
    // =====================================================================

    #[test]
    fn test_model_request_with_empty_tail() {
        let raw = message(10, &[]);
        let parsed = decode_payload(ProtocolVariant::Sparse, &raw).unwrap();
        assert_eq!(parsed.string_arg.as_deref(), Some(""));
        assert_eq!(parsed.int_arg, None);
    }

    #[test]
    fn test_model_request_with_string() {
        let raw = message(10, &encode_string("all"));
        let parsed = decode_payload(ProtocolVariant::Sparse, &raw).unwrap();
        assert_eq!(parsed.string_arg.as_deref(), Some("all"));
    }

    #[test]
    fn test_model_request_falls_back_to_int() {
        // FF FF FF F0: four varint continuation bytes and then nothing, so
        // the string read fails and the int read takes over.
        let raw = message(10, &(-16i32).to_be_bytes());
        let parsed = decode_payload(ProtocolVariant::Sparse, &raw).unwrap();
        assert_eq!(parsed.string_arg, None);
        assert_eq!(parsed.int_arg, Some(-16));
    }

    #[test]
    fn test_model_request_int_fallback_truncated_fails() {
        // Not a valid string (length 0x7F > 2 bytes left) and too short for
        // an int either.
        let raw = message(10, &[0x7F, 0x01]);
        assert!(decode_payload(ProtocolVariant::Sparse, &raw).is_err());
    }

    // =====================================================================
    // Model-sync synthesis
    // =====================================================================

    #[test]
    fn test_model_sync_sparse_layout() {
        let bytes = encode_model_sync(ProtocolVariant::Sparse, pid(), "Miku");
        assert_eq!(bytes, message(3, &encode_string("Miku")));
    }

    #[test]
    fn test_model_sync_fixed_layout_has_placeholders() {
        let bytes = encode_model_sync(ProtocolVariant::FixedFields, pid(), "Miku");
        let mut tail = vec![0u8; 8];
        tail.extend_from_slice(&encode_string("Miku"));
        assert_eq!(bytes, message(3, &tail));
    }

    #[test]
    fn test_model_sync_round_trips_through_matching_decoder() {
        let long = "x".repeat(32767);
        let names = ["", "Miku", "初音ミク", long.as_str()];
        for variant in [ProtocolVariant::FixedFields, ProtocolVariant::Sparse] {
            for name in names {
                let bytes = encode_model_sync(variant, pid(), name);
                let parsed = decode_payload(variant, &bytes).unwrap();
                assert_eq!(parsed.opcode, opcode::MODEL_SELECT);
                assert_eq!(parsed.participant, pid());
                assert_eq!(parsed.string_arg.as_deref(), Some(name));
            }
        }
    }
}
