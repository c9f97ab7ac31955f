//! Binary codec for metadata attribute frames
//!
//! Every attribute is stored as a self-describing frame:
//!
//! ```text
//! +------------------+
//! | Type Code        | (u16 BE)
//! +------------------+
//! | Payload Length   | (u32 BE)
//! +------------------+
//! | Payload          | (type-specific layout)
//! +------------------+
//! ```
//!
//! Multi-attribute metadata encodes frames in canonical order by type code,
//! so byte-level comparison of two encodings is meaningful for deduplication.

mod errors;

pub use errors::{CodecError, CodecResult};

/// Byte-buffer encoder with fixed-width big-endian and varint primitives.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consumes the encoder and returns the accumulated bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns the number of bytes encoded so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been encoded yet
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append a single byte
    pub fn add_u8(&mut self, val: u8) -> &mut Self {
        self.buf.push(val);
        self
    }

    /// Append an unsigned 16-bit integer, big endian
    pub fn add_u16(&mut self, val: u16) -> &mut Self {
        self.buf.extend_from_slice(&val.to_be_bytes());
        self
    }

    /// Append an unsigned 32-bit integer, big endian
    pub fn add_u32(&mut self, val: u32) -> &mut Self {
        self.buf.extend_from_slice(&val.to_be_bytes());
        self
    }

    /// Append an unsigned 64-bit integer, big endian
    pub fn add_u64(&mut self, val: u64) -> &mut Self {
        self.buf.extend_from_slice(&val.to_be_bytes());
        self
    }

    /// Append a signed 64-bit integer, big endian two's complement
    pub fn add_i64(&mut self, val: i64) -> &mut Self {
        self.buf.extend_from_slice(&val.to_be_bytes());
        self
    }

    /// Append an IEEE754 double, big endian
    pub fn add_f64(&mut self, val: f64) -> &mut Self {
        self.buf.extend_from_slice(&val.to_bits().to_be_bytes());
        self
    }

    /// Append an unsigned integer as a varint (7 bits per byte, LSB first,
    /// high bit set on continuation bytes)
    pub fn add_varint(&mut self, mut val: u64) -> &mut Self {
        while val > 0x7F {
            self.buf.push((val as u8 & 0x7F) | 0x80);
            val >>= 7;
        }
        self.buf.push(val as u8 & 0x7F);
        self
    }

    /// Append raw bytes
    pub fn add_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append a varint length followed by the string bytes
    pub fn add_string(&mut self, s: &str) -> &mut Self {
        self.add_varint(s.len() as u64);
        self.add_bytes(s.as_bytes())
    }
}

/// Bounds-checked decoder over a byte slice.
///
/// Every pop names what it is parsing so framing violations carry context.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the given bytes
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the number of bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns the current position in the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    fn ensure(&self, req: usize, what: &str) -> CodecResult<()> {
        if self.remaining() < req {
            return Err(CodecError::malformed(format!(
                "cannot parse {}: {} bytes remaining but {} needed",
                what,
                self.remaining(),
                req
            )));
        }
        Ok(())
    }

    /// Pop a single byte
    pub fn pop_u8(&mut self, what: &str) -> CodecResult<u8> {
        self.ensure(1, what)?;
        let val = self.buf[self.pos];
        self.pos += 1;
        Ok(val)
    }

    /// Pop an unsigned 16-bit integer, big endian
    pub fn pop_u16(&mut self, what: &str) -> CodecResult<u16> {
        self.ensure(2, what)?;
        let val = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(val)
    }

    /// Pop an unsigned 32-bit integer, big endian
    pub fn pop_u32(&mut self, what: &str) -> CodecResult<u32> {
        self.ensure(4, what)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_be_bytes(raw))
    }

    /// Pop an unsigned 64-bit integer, big endian
    pub fn pop_u64(&mut self, what: &str) -> CodecResult<u64> {
        self.ensure(8, what)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(u64::from_be_bytes(raw))
    }

    /// Pop a signed 64-bit integer, big endian two's complement
    pub fn pop_i64(&mut self, what: &str) -> CodecResult<i64> {
        self.ensure(8, what)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(i64::from_be_bytes(raw))
    }

    /// Pop an IEEE754 double, big endian
    pub fn pop_f64(&mut self, what: &str) -> CodecResult<f64> {
        let bits = self.pop_u64(what)?;
        Ok(f64::from_bits(bits))
    }

    /// Pop a varint-encoded unsigned integer
    pub fn pop_varint(&mut self, what: &str) -> CodecResult<u64> {
        let mut val: u64 = 0;
        for count in 0..10 {
            if self.remaining() == 0 {
                return Err(CodecError::malformed(format!(
                    "cannot parse {}: varint truncated",
                    what
                )));
            }
            let byte = self.buf[self.pos];
            self.pos += 1;
            val |= ((byte & 0x7F) as u64) << (7 * count);
            if byte & 0x80 == 0 {
                return Ok(val);
            }
        }
        Err(CodecError::malformed(format!(
            "cannot parse {}: varint too long",
            what
        )))
    }

    /// Pop `size` raw bytes
    pub fn pop_bytes(&mut self, size: usize, what: &str) -> CodecResult<&'a [u8]> {
        self.ensure(size, what)?;
        let val = &self.buf[self.pos..self.pos + size];
        self.pos += size;
        Ok(val)
    }

    /// Pop a varint length followed by that many UTF-8 bytes
    pub fn pop_string(&mut self, what: &str) -> CodecResult<String> {
        let len = self.pop_varint(what)? as usize;
        let raw = self.pop_bytes(len, what)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| CodecError::malformed(format!("cannot parse {}: invalid UTF-8", what)))
    }
}

/// Writes a `[code][length][payload]` envelope around an already encoded payload
pub fn encode_envelope(enc: &mut Encoder, code: u16, payload: &[u8]) {
    enc.add_u16(code);
    enc.add_u32(payload.len() as u32);
    enc.add_bytes(payload);
}

/// Reads the next `[code][length][payload]` envelope.
///
/// Fails with `MalformedRecord` if the declared length exceeds the
/// remaining bytes.
pub fn decode_envelope<'a>(dec: &mut Decoder<'a>) -> CodecResult<(u16, &'a [u8])> {
    let code = dec.pop_u16("attribute envelope code")?;
    let len = dec.pop_u32("attribute envelope length")? as usize;
    if len > dec.remaining() {
        return Err(CodecError::malformed(format!(
            "attribute envelope declares {} payload bytes but only {} remain",
            len,
            dec.remaining()
        )));
    }
    let payload = dec.pop_bytes(len, "attribute envelope payload")?;
    Ok((code, payload))
}
