//! Codec-layer error types.

use std::sync::Arc;

use thiserror::Error;

/// Errors produced while framing TDS packets over a byte stream.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Underlying transport I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    /// A packet header's length field was smaller than the header itself.
    #[error("invalid TDS packet header")]
    InvalidHeader,

    /// A packet declared a length larger than the negotiated maximum.
    #[error("packet size {size} exceeds maximum {max}")]
    PacketTooLarge {
        /// The declared packet size.
        size: usize,
        /// The negotiated maximum packet size.
        max: usize,
    },

    /// A lower-level protocol parse failed while decoding a packet header.
    #[error("protocol error: {0}")]
    Protocol(#[from] tds_protocol::error::ProtocolError),

    /// The connection was closed before a complete message arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// An SMP sub-session referenced a `sid` with no matching MARS session.
    #[error("unknown MARS sub-session id {0}")]
    UnknownSubSession(u16),

    /// An SMP frame's `seqnum` didn't match the sub-session's expected value.
    #[error("MARS sub-session {sid} sequence mismatch: expected {expected}, got {got}")]
    SequenceMismatch {
        /// The sub-session this frame was addressed to.
        sid: u16,
        /// The sequence number the sub-session expected next.
        expected: u32,
        /// The sequence number the frame actually carried.
        got: u32,
    },

    /// An SMP header carried a flags byte with no recognized bit set.
    #[error("invalid SMP flags byte: {0:#04x}")]
    InvalidSmpFlags(u8),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl PartialEq for CodecError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (Self::InvalidHeader, Self::InvalidHeader) => true,
            (Self::PacketTooLarge { size: s1, max: m1 }, Self::PacketTooLarge { size: s2, max: m2 }) => {
                s1 == s2 && m1 == m2
            }
            (Self::Protocol(a), Self::Protocol(b)) => a == b,
            (Self::ConnectionClosed, Self::ConnectionClosed) => true,
            (Self::UnknownSubSession(a), Self::UnknownSubSession(b)) => a == b,
            (
                Self::SequenceMismatch {
                    sid: s1,
                    expected: e1,
                    got: g1,
                },
                Self::SequenceMismatch {
                    sid: s2,
                    expected: e2,
                    got: g2,
                },
            ) => s1 == s2 && e1 == e2 && g1 == g2,
            (Self::InvalidSmpFlags(a), Self::InvalidSmpFlags(b)) => a == b,
            _ => false,
        }
    }
}
