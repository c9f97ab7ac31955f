//! On-disk index log records
//!
//! The index file is an append-only log of checksummed records:
//!
//! ```text
//! [record length (u32 BE)] [body] [crc32 of length+body (u32 BE)]
//! ```
//!
//! The body carries a kind byte, an insertion sequence number, the unique
//! key bytes and, for inserts, the record's position in the segment plus
//! the full metadata encoding. A tombstone names only the key it kills.
//! Replaying the log in order rebuilds the in-memory index state; a
//! checksum mismatch or truncated frame marks the corruption point, and
//! everything before it stays usable.

use crate::codec::{CodecError, Decoder, Encoder};

use super::errors::{IndexError, IndexResult};

const KIND_INSERT: u8 = 0;
const KIND_TOMBSTONE: u8 = 1;

/// One replayable index log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A committed insert
    Insert {
        /// Insertion sequence number
        seq: u64,
        /// Unique key bytes
        key: Vec<u8>,
        /// Record offset in the segment
        offset: u64,
        /// Record size in the segment
        size: u64,
        /// Full metadata encoding
        metadata: Vec<u8>,
    },
    /// Removal of a previously inserted key
    Tombstone {
        /// Insertion sequence number
        seq: u64,
        /// Unique key bytes of the entry being removed
        key: Vec<u8>,
    },
}

impl LogRecord {
    /// Serializes the record with its length prefix and checksum
    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Encoder::new();
        match self {
            LogRecord::Insert {
                seq,
                key,
                offset,
                size,
                metadata,
            } => {
                body.add_u8(KIND_INSERT)
                    .add_u64(*seq)
                    .add_varint(key.len() as u64)
                    .add_bytes(key)
                    .add_u64(*offset)
                    .add_u64(*size)
                    .add_varint(metadata.len() as u64)
                    .add_bytes(metadata);
            }
            LogRecord::Tombstone { seq, key } => {
                body.add_u8(KIND_TOMBSTONE)
                    .add_u64(*seq)
                    .add_varint(key.len() as u64)
                    .add_bytes(key);
            }
        }
        let body = body.into_bytes();

        let len = (body.len() + 8) as u32;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&len.to_be_bytes());
        hasher.update(&body);
        let checksum = hasher.finalize();

        let mut record = Encoder::new();
        record.add_u32(len).add_bytes(&body).add_u32(checksum);
        record.into_bytes()
    }

    /// Deserializes one record from the front of `data`.
    ///
    /// Returns the record and the number of bytes consumed, or a
    /// corruption error with the failure offset relative to `data`.
    pub fn deserialize(data: &[u8]) -> IndexResult<(LogRecord, usize)> {
        let corrupt = |message: &str| IndexError::Corruption {
            offset: 0,
            message: message.to_string(),
        };

        if data.len() < 4 {
            return Err(corrupt("truncated record length"));
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if len < 8 + 9 {
            return Err(corrupt("record length too small"));
        }
        if data.len() < len {
            return Err(corrupt("truncated record"));
        }

        let checksum_offset = len - 4;
        let stored = u32::from_be_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        let computed = crc32fast::hash(&data[..checksum_offset]);
        if computed != stored {
            return Err(corrupt(&format!(
                "checksum mismatch: computed {:08x}, stored {:08x}",
                computed, stored
            )));
        }

        let body = &data[4..checksum_offset];
        let record = Self::decode_body(body).map_err(|e| corrupt(&e.to_string()))?;
        Ok((record, len))
    }

    fn decode_body(body: &[u8]) -> Result<LogRecord, CodecError> {
        let mut dec = Decoder::new(body);
        let kind = dec.pop_u8("record kind")?;
        let seq = dec.pop_u64("sequence number")?;
        let key_len = dec.pop_varint("key length")? as usize;
        let key = dec.pop_bytes(key_len, "unique key")?.to_vec();
        match kind {
            KIND_INSERT => {
                let offset = dec.pop_u64("segment offset")?;
                let size = dec.pop_u64("record size")?;
                let md_len = dec.pop_varint("metadata length")? as usize;
                let metadata = dec.pop_bytes(md_len, "metadata encoding")?.to_vec();
                Ok(LogRecord::Insert {
                    seq,
                    key,
                    offset,
                    size,
                    metadata,
                })
            }
            KIND_TOMBSTONE => Ok(LogRecord::Tombstone { seq, key }),
            other => Err(CodecError::malformed(format!(
                "unknown index record kind {}",
                other
            ))),
        }
    }
}
