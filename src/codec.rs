//! Metadata codec: the `<morlock>` header inside a media container.
//!
//! # On-disk layout
//!
//! ```text
//! [header region][payload]
//! ```
//!
//! The payload starts at the first occurrence of the container's sync marker
//! (`ID3` for MP3) and is copied byte-for-byte on every save. Everything
//! before the marker is the header region, read one byte per character.
//! When it holds `<morlock>{json}</morlock>` the JSON is the embedded
//! [`Document`]; otherwise the default document applies.
//!
//! # Recovery
//!
//! Some encoders leave garbage in front of the JSON. Decoding drops leading
//! characters one at a time until the remainder parses; if nothing parses the
//! default document is used. This is lossy by nature and is kept exactly as
//! is because existing files rely on it.
//!
//! # Encoding
//!
//! Encoded headers are pure ASCII: non-ASCII characters, `<`, `>` and the
//! sync marker are written as `\uXXXX` escapes inside JSON strings, so a
//! header can never be mistaken for a tag boundary or for the start of the
//! payload.

use std::io;

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter};
use serde_json::Value;
use thiserror::Error;

use crate::document::{Document, Header, ShapeError};

/// Opening tag of the embedded document.
pub const OPEN_TAG: &str = "<morlock>";
/// Closing tag of the embedded document.
pub const CLOSE_TAG: &str = "</morlock>";
/// Sync marker that starts an MP3 payload (ID3v2 tag).
pub const MP3_SYNC_MARKER: &[u8] = b"ID3";

/// Error type for header decoding and encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The header holds JSON that is not a valid document.
    #[error("embedded document is corrupted: {0}")]
    Corrupted(#[from] ShapeError),

    /// The document could not be serialized.
    #[error("failed to serialize document: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Decoded contents of a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Embedded document, or the default one when the header has none.
    pub document: Document,
    /// Bytes from the sync marker onward, untouched.
    pub payload: Vec<u8>,
    /// Whether a `<morlock>` header was found at all.
    pub embedded: bool,
}

/// Header codec for one container type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    marker: Vec<u8>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::mp3()
    }
}

impl Codec {
    /// Codec for MP3 files, whose payload starts at `ID3`.
    #[must_use]
    pub fn mp3() -> Self {
        Self::with_marker(MP3_SYNC_MARKER)
    }

    /// Codec for a container whose payload starts at `marker`.
    ///
    /// An empty marker would match at offset zero, leaving no header region.
    #[must_use]
    pub fn with_marker(marker: &[u8]) -> Self {
        Self {
            marker: marker.to_vec(),
        }
    }

    /// The sync marker this codec splits on.
    #[must_use]
    pub fn marker(&self) -> &[u8] {
        &self.marker
    }

    /// Split raw file bytes into the embedded document and the payload.
    ///
    /// A file without the sync marker is treated as payload only: its header
    /// region is empty and the default document applies. That keeps tagless
    /// media intact on save instead of swallowing it as header text.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Corrupted`] when the header holds JSON that is
    /// not a `{name, password, data}` object.
    pub fn decode(&self, raw: &[u8]) -> Result<Decoded, CodecError> {
        // Everything before the first sync marker is header territory
        let split = find_marker(raw, &self.marker).unwrap_or(0);
        let (header, payload) = raw.split_at(split);

        // One byte, one character: the header is Latin-1, never UTF-8.
        let header: String = header.iter().map(|&b| char::from(b)).collect();

        // Untagged files get a fresh document
        let Some(candidate) = extract_tagged(&header) else {
            log::debug!("No embedded header found, using default document");
            return Ok(Decoded {
                document: Document::default(),
                payload: payload.to_vec(),
                embedded: false,
            });
        };

        // Skip leading noise up to the first parseable JSON value
        let document = match recover_json(&candidate) {
            Some((skipped, value)) => {
                if skipped > 0 {
                    log::warn!("Dropped {} leading character(s) from embedded header", skipped);
                }
                Document::from_value(value)?
            }
            None => {
                log::debug!("Embedded header holds no JSON, using default document");
                Document::default()
            }
        };

        Ok(Decoded {
            document,
            payload: payload.to_vec(),
            embedded: true,
        })
    }

    /// Serialize a header for writing in front of the payload.
    ///
    /// A wiped header encodes to nothing, which removes it from the file.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialize`] if serialization fails.
    pub fn encode(&self, header: &Header) -> Result<Vec<u8>, CodecError> {
        let Header::Present(document) = header else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(OPEN_TAG.len() + CLOSE_TAG.len() + 64);
        out.extend_from_slice(OPEN_TAG.as_bytes());
        {
            let formatter = HeaderFormatter::new(&self.marker);
            let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
            document.serialize(&mut ser).map_err(CodecError::Serialize)?;
        }
        out.extend_from_slice(CLOSE_TAG.as_bytes());
        Ok(out)
    }

    /// Full file contents for a header and a preserved payload.
    ///
    /// # Errors
    ///
    /// Propagates [`Codec::encode`] failures.
    pub fn assemble(&self, header: &Header, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut bytes = self.encode(header)?;
        bytes.extend_from_slice(payload);
        Ok(bytes)
    }
}

fn find_marker(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() {
        return Some(0);
    }
    haystack
        .windows(marker.len())
        .position(|window| window == marker)
}

/// Text between the first opening tag and the last closing tag, with every
/// tag literal removed. `None` when the tags are absent or out of order.
fn extract_tagged(header: &str) -> Option<String> {
    let start = header.find(OPEN_TAG)?;
    let end = header.rfind(CLOSE_TAG)? + CLOSE_TAG.len();
    if end < start + OPEN_TAG.len() + CLOSE_TAG.len() {
        return None;
    }
    Some(
        header[start..end]
            .replace(OPEN_TAG, "")
            .replace(CLOSE_TAG, ""),
    )
}

/// Drop leading characters until the rest parses as JSON.
///
/// Returns how many characters were dropped along with the parsed value.
fn recover_json(candidate: &str) -> Option<(usize, Value)> {
    candidate
        .char_indices()
        .enumerate()
        .find_map(|(skipped, (offset, _))| {
            serde_json::from_str::<Value>(&candidate[offset..])
                .ok()
                .map(|value| (skipped, value))
        })
}

/// Compact JSON that stays ASCII and never spells out a tag or the marker.
struct HeaderFormatter<'a> {
    inner: CompactFormatter,
    marker: &'a [u8],
}

impl<'a> HeaderFormatter<'a> {
    fn new(marker: &'a [u8]) -> Self {
        Self {
            inner: CompactFormatter,
            marker,
        }
    }

    fn must_escape(&self, rest: &str) -> bool {
        match rest.chars().next() {
            Some(c) if !c.is_ascii() || c == '<' || c == '>' => true,
            Some(_) => !self.marker.is_empty() && rest.as_bytes().starts_with(self.marker),
            None => false,
        }
    }
}

impl Formatter for HeaderFormatter<'_> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut plain_start = 0;
        for (offset, c) in fragment.char_indices() {
            if !self.must_escape(&fragment[offset..]) {
                continue;
            }
            self.inner
                .write_string_fragment(writer, &fragment[plain_start..offset])?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            plain_start = offset + c.len_utf8();
        }
        self.inner
            .write_string_fragment(writer, &fragment[plain_start..])
    }
}
