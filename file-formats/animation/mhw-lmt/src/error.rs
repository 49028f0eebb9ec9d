//! Error handling for LMT decoding and encoding

use std::io;
use thiserror::Error;

/// Errors that can occur when working with LMT containers and animation blocks
#[derive(Error, Debug)]
pub enum LmtError {
    /// I/O error during reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Container or record header that cannot be interpreted
    #[error("Malformed header at offset {offset:#x}: {reason}")]
    MalformedHeader { offset: u64, reason: String },

    /// An offset (plus the size read from it) points outside the buffer
    #[error("{field} at offset {offset:#x} (+{size} bytes) lies outside the {len}-byte buffer")]
    OffsetOutOfRange {
        field: &'static str,
        offset: u64,
        size: u64,
        len: u64,
    },

    /// Keyframe encoding tag outside the valid set
    #[error("Unknown keyframe encoding tag {tag} at offset {offset:#x}")]
    UnknownEncodingTag { tag: u8, offset: u64 },

    /// Declared data length exceeds what is actually there
    #[error("Truncated {field} at offset {offset:#x}: needs {needed} bytes, {available} available")]
    TruncatedBuffer {
        field: &'static str,
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// JSON interchange document missing fields or carrying wrong lengths
    #[error("Schema mismatch in {field}: {reason}")]
    SchemaMismatch { field: String, reason: String },

    /// Integer does not fit the bit field it is encoded into
    #[error("Value {value} for {field} exceeds the maximum of {max}")]
    ValueOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// Keyframe value kind does not match what the encoding stores
    #[error("Encoding tag {tag} cannot store a {kind} value")]
    ValueKindMismatch { tag: u8, kind: &'static str },

    /// Container slot index past the offset table
    #[error("Entry {id} is outside the {count}-entry offset table")]
    EntryOutOfRange { id: usize, count: usize },
}

impl LmtError {
    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type using LmtError
pub type Result<T> = std::result::Result<T, LmtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LmtError::UnknownEncodingTag {
            tag: 8,
            offset: 0x60,
        };
        assert_eq!(
            format!("{error}"),
            "Unknown keyframe encoding tag 8 at offset 0x60"
        );

        let error = LmtError::OffsetOutOfRange {
            field: "bounds",
            offset: 0x100,
            size: 32,
            len: 0x110,
        };
        assert_eq!(
            format!("{error}"),
            "bounds at offset 0x100 (+32 bytes) lies outside the 272-byte buffer"
        );
    }
}
