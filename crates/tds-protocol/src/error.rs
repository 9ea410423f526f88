//! Protocol-level error types.

use thiserror::Error;

use crate::prelude::*;

/// Errors produced while parsing or encoding the TDS wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A packet or token was truncated before we had enough bytes.
    #[error("incomplete TDS data: expected at least {expected} bytes, got {actual}")]
    IncompletePacket {
        /// Bytes required to parse this structure.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },
    /// Ran out of bytes mid-field with no more specific context available.
    #[error("unexpected end of TDS data")]
    UnexpectedEof,
    /// An unrecognized packet type byte.
    #[error("invalid TDS packet type byte: {0:#04x}")]
    InvalidPacketType(u8),
    /// An unrecognized packet status byte.
    #[error("invalid TDS packet status byte: {0:#04x}")]
    InvalidPacketStatus(u8),
    /// An unrecognized token type byte.
    #[error("invalid TDS token type byte: {0:#04x}")]
    InvalidTokenType(u8),
    /// A ROW or NBCROW token arrived before any COLMETADATA established the
    /// result set's column layout.
    #[error("row data token arrived without prior column metadata")]
    MissingColumnMetadata,
    /// An unrecognized pre-login option type byte.
    #[error("invalid pre-login option byte: {0:#04x}")]
    InvalidPreloginOption(u8),
    /// A field held a value outside its valid domain.
    #[error("invalid value {value} for field `{field}`")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The value that was rejected.
        value: u32,
    },
    /// A length-prefixed string's bytes could not be decoded.
    #[error("string encoding error: {0}")]
    StringEncoding(String),
    /// The message is malformed in a way not covered by a more specific variant.
    #[error("malformed TDS message: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        let err = ProtocolError::IncompletePacket {
            expected: 8,
            actual: 3,
        };
        assert!(err.to_string().contains("8"));
        assert!(err.to_string().contains('3'));
    }
}
