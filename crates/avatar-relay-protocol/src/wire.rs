//! Low-level wire primitives: big-endian integers, base-128 varints, and
//! varint-prefixed UTF-8 strings.
//!
//! Decoding always happens over a buffer the transport has already fully
//! received, so [`Reader`] is a plain cursor over a borrowed slice. It
//! never copies the input and never blocks.

use crate::ProtocolError;

/// Longest varint we accept. Five groups of 7 bits cover 32 bits; a sixth
/// byte means the sender is broken or hostile.
pub const MAX_VAR_INT_BYTES: usize = 5;

/// Largest string length prefix a client may send.
pub const MAX_STRING_LEN: i32 = 32767;

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// A forward-only cursor over a byte slice.
///
/// The lifetime `'a` ties the reader to the buffer it borrows from: the
/// reader can't outlive the message it is decoding.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Starts reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current offset into the buffer. Pass it to [`Reader::rewind`] to
    /// retry a read with a different layout.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor back to an earlier [`Reader::position`].
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    /// Takes exactly `n` bytes or fails without moving the cursor.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::TruncatedStream {
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a fixed-size array. The `N` is inferred from the call site.
    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    /// Reads a base-128 varint: low 7-bit group first, high bit set on
    /// every byte except the last.
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedVarInt`] if a sixth byte would be needed.
    /// - [`ProtocolError::TruncatedStream`] if the buffer ends mid-varint.
    pub fn read_var_int(&mut self) -> Result<i32, ProtocolError> {
        let mut result: u32 = 0;
        let mut num_read = 0;
        loop {
            let byte = self.read_u8()?;
            // Bits that land above bit 31 in the fifth group are dropped,
            // the same as a 32-bit accumulator would.
            result |= u32::from(byte & 0x7F) << (7 * num_read);
            num_read += 1;
            if byte & 0x80 == 0 {
                return Ok(result as i32);
            }
            if num_read >= MAX_VAR_INT_BYTES {
                return Err(ProtocolError::MalformedVarInt);
            }
        }
    }

    /// Reads a varint length followed by that many UTF-8 bytes.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD rather than rejected. The
    /// relay never hands decoded strings back to clients, so lossy decode
    /// only affects logs and cache keys.
    ///
    /// # Errors
    /// - [`ProtocolError::InvalidStringLength`] for lengths outside `0..=32767`.
    /// - [`ProtocolError::TruncatedStream`] if fewer bytes remain.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_var_int()?;
        if !(0..=MAX_STRING_LEN).contains(&len) {
            return Err(ProtocolError::InvalidStringLength(len));
        }
        let bytes = self.take(len as usize)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Appends the minimal varint encoding of `value`.
///
/// Negative numbers are encoded as their unsigned 32-bit pattern, which
/// always takes five bytes.
pub fn write_var_int(out: &mut Vec<u8>, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !0x7F == 0 {
            out.push(v as u8);
            return;
        }
        out.push((v & 0x7F) as u8 | 0x80);
        v >>= 7;
    }
}

/// Appends a varint byte length followed by the UTF-8 bytes of `value`.
pub fn write_string(out: &mut Vec<u8>, value: &str) {
    write_var_int(out, value.len() as i32);
    out.extend_from_slice(value.as_bytes());
}

/// Convenience for `write_var_int` into a fresh buffer.
pub fn encode_var_int(value: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VAR_INT_BYTES);
    write_var_int(&mut out, value);
    out
}

/// Convenience for `write_string` into a fresh buffer.
pub fn encode_string(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VAR_INT_BYTES + value.len());
    write_string(&mut out, value);
    out
}
