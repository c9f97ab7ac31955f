//! Metadata: the ordered set of typed attributes describing one record
//!
//! A metadata item holds at most one attribute per type code, an optional
//! source describing where the raw bytes live, and a list of annotation
//! notes. Binary encoding is canonical: attributes are framed in type-code
//! order so two equal metadata items produce identical bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::codec::{decode_envelope, encode_envelope, CodecError, CodecResult, Decoder, Encoder};
use crate::structured::Emitter;
use crate::types::{Attribute, Code};

/// Where the raw bytes of a record live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Bytes stored in a segment file
    Blob {
        /// Record format name ("grib", "bufr", "vm2", ...)
        format: String,
        /// Dataset root directory; set when the metadata is read, not encoded
        basedir: PathBuf,
        /// Segment path relative to the dataset root
        filename: PathBuf,
        /// Byte offset of the record inside the segment
        offset: u64,
        /// Byte size of the record
        size: u64,
    },
    /// Bytes carried inline with the metadata
    Inline {
        /// Record format name
        format: String,
        /// The raw record bytes
        data: Vec<u8>,
    },
    /// Bytes reachable through a URL
    Url {
        /// Record format name
        format: String,
        /// Location of the record
        url: String,
    },
}

impl Source {
    /// Creates a blob source
    pub fn blob(
        format: impl Into<String>,
        basedir: impl Into<PathBuf>,
        filename: impl Into<PathBuf>,
        offset: u64,
        size: u64,
    ) -> Self {
        Source::Blob {
            format: format.into(),
            basedir: basedir.into(),
            filename: filename.into(),
            offset,
            size,
        }
    }

    /// Absolute pathname of a blob source: join(basedir, filename)
    pub fn absolute_path(&self) -> Option<PathBuf> {
        match self {
            Source::Blob {
                basedir, filename, ..
            } => Some(basedir.join(filename)),
            _ => None,
        }
    }

    /// The record format name
    pub fn format(&self) -> &str {
        match self {
            Source::Blob { format, .. } => format,
            Source::Inline { format, .. } => format,
            Source::Url { format, .. } => format,
        }
    }

    fn encode_payload(&self, enc: &mut Encoder) {
        match self {
            Source::Blob {
                format,
                filename,
                offset,
                size,
                ..
            } => {
                enc.add_u8(1);
                enc.add_string(format);
                enc.add_string(&filename.to_string_lossy());
                enc.add_u64(*offset);
                enc.add_u64(*size);
            }
            Source::Inline { format, data } => {
                enc.add_u8(2);
                enc.add_string(format);
                enc.add_varint(data.len() as u64);
                enc.add_bytes(data);
            }
            Source::Url { format, url } => {
                enc.add_u8(3);
                enc.add_string(format);
                enc.add_string(url);
            }
        }
    }

    fn decode_payload(payload: &[u8]) -> CodecResult<Source> {
        let mut dec = Decoder::new(payload);
        let source = match dec.pop_u8("source style")? {
            1 => {
                let format = dec.pop_string("source format")?;
                let filename = PathBuf::from(dec.pop_string("source filename")?);
                let offset = dec.pop_u64("source offset")?;
                let size = dec.pop_u64("source size")?;
                Source::Blob {
                    format,
                    basedir: PathBuf::new(),
                    filename,
                    offset,
                    size,
                }
            }
            2 => {
                let format = dec.pop_string("source format")?;
                let len = dec.pop_varint("source inline size")? as usize;
                let data = dec.pop_bytes(len, "source inline data")?.to_vec();
                Source::Inline { format, data }
            }
            3 => Source::Url {
                format: dec.pop_string("source format")?,
                url: dec.pop_string("source url")?,
            },
            style => {
                return Err(CodecError::UnknownStyle {
                    attribute: "source",
                    style,
                })
            }
        };
        if dec.remaining() > 0 {
            return Err(CodecError::malformed("source payload has trailing bytes"));
        }
        Ok(source)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Blob {
                format,
                filename,
                offset,
                size,
                ..
            } => write!(
                f,
                "BLOB({}:{}:{}+{})",
                format,
                filename.display(),
                offset,
                size
            ),
            Source::Inline { format, data } => write!(f, "INLINE({}:{})", format, data.len()),
            Source::Url { format, url } => write!(f, "URL({}:{})", format, url),
        }
    }
}

/// Ordered set of typed attributes, with at most one instance per code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    items: BTreeMap<Code, Attribute>,
    source: Option<Source>,
    notes: Vec<String>,
}

impl Metadata {
    /// Creates an empty metadata item
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any previous attribute with the same code.
    ///
    /// Notes accumulate instead of replacing; use [`Metadata::add_note`].
    pub fn set(&mut self, attr: Attribute) {
        match attr {
            Attribute::Note(text) => self.notes.push(text),
            other => {
                self.items.insert(other.code(), other);
            }
        }
    }

    /// Get the attribute for a code, if present
    pub fn get(&self, code: Code) -> Option<&Attribute> {
        self.items.get(&code)
    }

    /// Returns true if an attribute with this code is present
    pub fn has(&self, code: Code) -> bool {
        self.items.contains_key(&code)
    }

    /// Remove the attribute for a code
    pub fn unset(&mut self, code: Code) {
        self.items.remove(&code);
    }

    /// Iterate attributes in canonical (type-code) order
    pub fn iter(&self) -> impl Iterator<Item = (&Code, &Attribute)> {
        self.items.iter()
    }

    /// The reference time, if set
    pub fn reftime(&self) -> Option<NaiveDateTime> {
        match self.items.get(&Code::Reftime) {
            Some(Attribute::Reftime(time)) => Some(*time),
            _ => None,
        }
    }

    /// The source, if set
    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Set the source
    pub fn set_source(&mut self, source: Source) {
        self.source = Some(source);
    }

    /// Drop the source
    pub fn unset_source(&mut self) {
        self.source = None;
    }

    /// Append an annotation note
    pub fn add_note(&mut self, text: impl Into<String>) {
        self.notes.push(text.into());
    }

    /// The annotation notes, in insertion order
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Encode to the canonical binary form.
    ///
    /// Attributes are framed in type-code order; notes follow, then the
    /// source if present. `decode_binary(encode_binary(md)) == md` except
    /// for the blob base directory, which is runtime state.
    pub fn encode_binary(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        for (code, attr) in &self.items {
            let mut payload = Encoder::new();
            attr.encode_payload(&mut payload);
            encode_envelope(&mut enc, *code as u16, &payload.into_bytes());
        }
        for note in &self.notes {
            encode_envelope(&mut enc, Code::Note as u16, note.as_bytes());
        }
        if let Some(source) = &self.source {
            let mut payload = Encoder::new();
            source.encode_payload(&mut payload);
            encode_envelope(&mut enc, Code::Source as u16, &payload.into_bytes());
        }
        enc.into_bytes()
    }

    /// Encode only the attributes named by `codes`, in canonical order.
    ///
    /// This is the index unique-key encoding: equal keys mean the records
    /// collide on the configured unique attribute tuple.
    pub fn encode_key(&self, codes: &std::collections::BTreeSet<Code>) -> Vec<u8> {
        let mut enc = Encoder::new();
        for code in codes {
            if let Some(attr) = self.items.get(code) {
                let mut payload = Encoder::new();
                attr.encode_payload(&mut payload);
                encode_envelope(&mut enc, *code as u16, &payload.into_bytes());
            }
        }
        enc.into_bytes()
    }

    /// Decode metadata from its canonical binary form
    pub fn decode_binary(bytes: &[u8]) -> CodecResult<Metadata> {
        let mut dec = Decoder::new(bytes);
        let mut md = Metadata::new();
        while dec.remaining() > 0 {
            let (raw_code, payload) = decode_envelope(&mut dec)?;
            let code = Code::from_u16(raw_code)?;
            match code {
                Code::Source => md.source = Some(Source::decode_payload(payload)?),
                Code::Note => {
                    let text = String::from_utf8(payload.to_vec())
                        .map_err(|_| CodecError::malformed("note text is not valid UTF-8"))?;
                    md.notes.push(text);
                }
                other => {
                    let attr = Attribute::decode_payload(other, payload)?;
                    md.items.insert(other, attr);
                }
            }
        }
        Ok(md)
    }

    /// Serialize to a structured sink
    pub fn emit(&self, emitter: &mut dyn Emitter) {
        emitter.start_mapping();
        for (code, attr) in &self.items {
            emitter.add_key(code.name());
            emitter.add_string(&attr.to_string());
        }
        if !self.notes.is_empty() {
            emitter.add_key("notes");
            emitter.start_list();
            for note in &self.notes {
                emitter.add_string(note);
            }
            emitter.end_list();
        }
        if let Some(source) = &self.source {
            emitter.add_key("source");
            emitter.add_string(&source.to_string());
        }
        emitter.end_mapping();
    }
}
