//! Core protocol types: participant identity and the opcodes the relay
//! interprets.
//!
//! Every relay message starts with the same 20-byte prefix regardless of
//! client generation:
//!
//! ```text
//! ┌──────────────┬───────────────────────────────────┐
//! │ opcode (i32) │ participant id (2 × i64, 16 bytes) │  ← header
//! ├──────────────┴───────────────────────────────────┤
//! │ variant- and opcode-specific tail                 │  ← payload
//! └──────────────────────────────────────────────────┘
//! ```

use std::fmt;

use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A participant's stable 128-bit identifier.
///
/// Newtype over [`Uuid`] so a participant id can't be confused with any
/// other UUID floating around the host (connection ids, session ids).
/// On the wire it is two big-endian 64-bit halves, most significant first,
/// which is exactly the big-endian byte order `Uuid` stores internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// Builds an id from its two wire halves.
    pub fn from_halves(most: u64, least: u64) -> Self {
        Self(Uuid::from_u64_pair(most, least))
    }

    /// Returns the two wire halves `(most, least)`.
    pub fn halves(&self) -> (u64, u64) {
        self.0.as_u64_pair()
    }

    /// Generates a random id. Handy in tests and demos.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for ParticipantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Prints the canonical hyphenated UUID form, which is what operators
/// will grep for in server logs.
impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

/// Opcode constants. The relay only acts on a few of them; every other
/// opcode is opaque pass-through traffic.
pub mod opcode {
    /// A participant selected a model. Updates the model cache.
    pub const MODEL_SELECT: i32 = 3;

    /// Stage start. Only looked at for verbose traces.
    pub const STAGE_START: i32 = 7;

    /// Stage audio cue. Only looked at for verbose traces.
    pub const STAGE_AUDIO: i32 = 8;

    /// Stage end. Only looked at for verbose traces.
    pub const STAGE_END: i32 = 9;

    /// A client asks for every known model. Answered directly, never
    /// broadcast.
    pub const MODEL_REQUEST: i32 = 10;

    /// Opcodes whose sparse-variant tail is a single string.
    pub const STRING_BEARING: [i32; 6] = [1, MODEL_SELECT, 6, STAGE_START, STAGE_AUDIO, STAGE_END];

    /// Opcodes whose sparse-variant tail is an int32 followed by a string.
    pub const ENTITY_TAGGED: [i32; 2] = [4, 5];

    /// Opcodes whose string argument is worth previewing in traces.
    pub const STAGE: [i32; 3] = [STAGE_START, STAGE_AUDIO, STAGE_END];
}
