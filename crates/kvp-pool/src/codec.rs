//! Fixed-width slot codec.
//!
//! Text is 7-bit ASCII without NUL; NUL is reserved for padding. Keys are
//! validated and never truncated. Values longer than [`VALUE_SIZE`] keep
//! their first `VALUE_SIZE` bytes, since a partial value reaching the host
//! beats none.

use crate::error::EncodingError;
use crate::{KEY_SIZE, SLOT_SIZE, VALUE_SIZE};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One decoded key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvpRecord {
    pub key: String,
    pub value: String,
}

impl KvpRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Decoded contents of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// All-zero slot.
    Empty,
    /// Slot holding a record.
    Record(KvpRecord),
}

impl Slot {
    /// Consume the slot, returning the record if present.
    pub fn into_record(self) -> Option<KvpRecord> {
        match self {
            Slot::Empty => None,
            Slot::Record(record) => Some(record),
        }
    }
}

/// Encode a key/value pair into one slot.
pub fn encode(key: &str, value: &str) -> Result<[u8; SLOT_SIZE], EncodingError> {
    if key.is_empty() {
        return Err(EncodingError::EmptyKey);
    }
    check_charset("key", key)?;
    if key.len() > KEY_SIZE {
        return Err(EncodingError::KeyTooLong {
            len: key.len(),
            max: KEY_SIZE,
        });
    }
    check_charset("value", value)?;

    // ASCII only, so byte offsets are char boundaries.
    let value = if value.len() > VALUE_SIZE {
        debug!(
            key,
            len = value.len(),
            max = VALUE_SIZE,
            "Truncating over-length KVP value"
        );
        &value[..VALUE_SIZE]
    } else {
        value
    };

    let mut slot = [0u8; SLOT_SIZE];
    slot[..key.len()].copy_from_slice(key.as_bytes());
    slot[KEY_SIZE..KEY_SIZE + value.len()].copy_from_slice(value.as_bytes());
    Ok(slot)
}

/// Decode one slot.
///
/// A slot with data but no key is an error, matching [`encode`].
pub fn decode(slot: &[u8; SLOT_SIZE]) -> Result<Slot, EncodingError> {
    if slot.iter().all(|&b| b == 0) {
        return Ok(Slot::Empty);
    }
    let key = decode_field("key", &slot[..KEY_SIZE])?;
    if key.is_empty() {
        return Err(EncodingError::EmptyKey);
    }
    let value = decode_field("value", &slot[KEY_SIZE..])?;
    Ok(Slot::Record(KvpRecord { key, value }))
}

/// Decode a byte buffer that must be exactly one slot wide.
pub fn decode_bytes(bytes: &[u8]) -> Result<Slot, EncodingError> {
    let slot: &[u8; SLOT_SIZE] = bytes.try_into().map_err(|_| EncodingError::SlotLength {
        expected: SLOT_SIZE,
        actual: bytes.len(),
    })?;
    decode(slot)
}

fn check_charset(field: &'static str, text: &str) -> Result<(), EncodingError> {
    match text.char_indices().find(|&(_, ch)| !ch.is_ascii() || ch == '\0') {
        Some((offset, ch)) => Err(EncodingError::UnsupportedCharacter { field, ch, offset }),
        None => Ok(()),
    }
}

/// Field text runs up to the first NUL; the rest is padding.
fn decode_field(field: &'static str, bytes: &[u8]) -> Result<String, EncodingError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = &bytes[..end];
    if let Some(offset) = text.iter().position(|b| !b.is_ascii()) {
        return Err(EncodingError::UnsupportedByte {
            field,
            byte: text[offset],
            offset,
        });
    }
    // Every byte is ASCII at this point.
    Ok(text.iter().map(|&b| b as char).collect())
}
