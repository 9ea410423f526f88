//! SMP (Session Multiplex Protocol) framing, the outer envelope MARS uses to
//! carry several logical TDS sessions over one transport.
//!
//! An SMP header wraps a complete TDS packet (itself starting with an
//! ordinary [`crate::packet::PacketHeader`]) whenever MARS is negotiated
//! during pre-login. The reactor's framing loop peeks the first byte of
//! every message: `0x53` ('S') means SMP, anything else is a bare TDS
//! packet belonging to the main session.

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// SMP header size in bytes.
pub const SMP_HEADER_SIZE: usize = 16;

/// The fixed `smid` byte identifying an SMP packet.
pub const SMP_SMID: u8 = 0x53;

/// SMP message flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SmpFlags {
    /// Opens a new MARS sub-session.
    Syn = 0x01,
    /// Acknowledges receipt, advancing the send window.
    Ack = 0x02,
    /// Closes a MARS sub-session.
    Fin = 0x04,
    /// Carries an embedded TDS packet.
    Data = 0x08,
}

impl SmpFlags {
    /// Parse a raw flags byte.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x01 => Ok(Self::Syn),
            0x02 => Ok(Self::Ack),
            0x04 => Ok(Self::Fin),
            0x08 => Ok(Self::Data),
            other => Err(ProtocolError::InvalidField {
                field: "smp_flags",
                value: other as u32,
            }),
        }
    }
}

/// A parsed SMP header.
///
/// Wire layout (all integers little-endian, matching TDS convention for
/// everything past the outer big-endian packet length):
/// `{smid: u8, flags: u8, sid: u16, length: u32, seqnum: u32, wndw: u32}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmpHeader {
    /// Message flags (SYN/ACK/FIN/DATA).
    pub flags: SmpFlags,
    /// Sub-session id this frame belongs to.
    pub sid: u16,
    /// Total length of this SMP frame, including the 16-byte header.
    pub length: u32,
    /// Sequence number of this frame (DATA frames only; 0 for SYN).
    pub seqnum: u32,
    /// Receive window the sender advertises: how many more sequence
    /// numbers beyond the last ACK it is willing to accept.
    pub wndw: u32,
}

impl SmpHeader {
    /// Decode a header from the front of `src` without consuming the
    /// trailing payload. Returns `None` if fewer than
    /// [`SMP_HEADER_SIZE`] bytes are available.
    pub fn parse(src: &mut impl Buf) -> Result<Option<Self>, ProtocolError> {
        if src.remaining() < SMP_HEADER_SIZE {
            return Ok(None);
        }

        let smid = src.get_u8();
        if smid != SMP_SMID {
            return Err(ProtocolError::InvalidField {
                field: "smid",
                value: smid as u32,
            });
        }

        let flags = SmpFlags::from_u8(src.get_u8())?;
        let sid = src.get_u16_le();
        let length = src.get_u32_le();
        let seqnum = src.get_u32_le();
        let wndw = src.get_u32_le();

        Ok(Some(Self {
            flags,
            sid,
            length,
            seqnum,
            wndw,
        }))
    }

    /// Encode the header to `dst`.
    pub fn write(&self, dst: &mut impl BufMut) {
        dst.put_u8(SMP_SMID);
        dst.put_u8(self.flags as u8);
        dst.put_u16_le(self.sid);
        dst.put_u32_le(self.length);
        dst.put_u32_le(self.seqnum);
        dst.put_u32_le(self.wndw);
    }

    /// Build a SYN header opening sub-session `sid` with the given
    /// initial receive window.
    #[must_use]
    pub fn syn(sid: u16, initial_window: u32) -> Self {
        Self {
            flags: SmpFlags::Syn,
            sid,
            length: SMP_HEADER_SIZE as u32,
            seqnum: 0,
            wndw: initial_window,
        }
    }

    /// Build a FIN header closing sub-session `sid`.
    #[must_use]
    pub fn fin(sid: u16, last_seqnum: u32, wndw: u32) -> Self {
        Self {
            flags: SmpFlags::Fin,
            sid,
            length: SMP_HEADER_SIZE as u32,
            seqnum: last_seqnum,
            wndw,
        }
    }

    /// Build an ACK header advancing the receive window.
    #[must_use]
    pub fn ack(sid: u16, seqnum: u32, wndw: u32) -> Self {
        Self {
            flags: SmpFlags::Ack,
            sid,
            length: SMP_HEADER_SIZE as u32,
            seqnum,
            wndw,
        }
    }

    /// Build a DATA header wrapping `payload_len` bytes of embedded TDS packet.
    #[must_use]
    pub fn data(sid: u16, seqnum: u32, wndw: u32, payload_len: u32) -> Self {
        Self {
            flags: SmpFlags::Data,
            sid,
            length: SMP_HEADER_SIZE as u32 + payload_len,
            seqnum,
            wndw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_syn() {
        let header = SmpHeader::syn(1, 4);
        let mut buf = BytesMut::new();
        header.write(&mut buf);
        assert_eq!(buf.len(), SMP_HEADER_SIZE);

        let mut slice = &buf[..];
        let parsed = SmpHeader::parse(&mut slice).unwrap().unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn rejects_wrong_smid() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x00; SMP_HEADER_SIZE]);
        let mut slice = &buf[..];
        assert!(SmpHeader::parse(&mut slice).is_err());
    }

    #[test]
    fn returns_none_when_truncated() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[SMP_SMID, 0x01, 0x00]);
        let mut slice = &buf[..];
        assert_eq!(SmpHeader::parse(&mut slice).unwrap(), None);
    }

    #[test]
    fn data_header_length_includes_payload() {
        let header = SmpHeader::data(2, 7, 4, 100);
        assert_eq!(header.length, SMP_HEADER_SIZE as u32 + 100);
    }
}
