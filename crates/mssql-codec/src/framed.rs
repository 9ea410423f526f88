//! Framed packet stream for async I/O.
//!
//! This module provides both combined and split stream types:
//! - `PacketStream<T>` - Combined read/write stream for bidirectional I/O
//! - `PacketReader<T>` - Read-only stream for receiving packets
//! - `PacketWriter<T>` - Write-only sink for sending packets
//!
//! The split types are used by `Connection` for cancellation safety (ADR-005).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures_core::Stream;
use futures_util::Sink;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, FramedRead, FramedWrite};

use crate::error::CodecError;
use crate::packet_codec::{Packet, TdsCodec};

pin_project! {
    /// A framed packet stream over an async I/O transport.
    ///
    /// This wraps a tokio-util `Framed` codec and provides a higher-level
    /// interface for sending and receiving TDS packets.
    pub struct PacketStream<T> {
        #[pin]
        inner: Framed<T, TdsCodec>,
    }
}

impl<T> PacketStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Create a new packet stream over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: Framed::new(transport, TdsCodec::new()),
        }
    }

    /// Create a new packet stream with a custom codec.
    pub fn with_codec(transport: T, codec: TdsCodec) -> Self {
        Self {
            inner: Framed::new(transport, codec),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Get a reference to the codec.
    pub fn codec(&self) -> &TdsCodec {
        self.inner.codec()
    }

    /// Get a mutable reference to the codec.
    pub fn codec_mut(&mut self) -> &mut TdsCodec {
        self.inner.codec_mut()
    }

    /// Consume the stream and return the underlying transport.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Get a reference to the read buffer.
    pub fn read_buffer(&self) -> &BytesMut {
        self.inner.read_buffer()
    }

    /// Get a mutable reference to the read buffer.
    pub fn read_buffer_mut(&mut self) -> &mut BytesMut {
        self.inner.read_buffer_mut()
    }
}

impl<T> Stream for PacketStream<T>
where
    T: AsyncRead + Unpin,
{
    type Item = Result<Packet, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

impl<T> Sink<Packet> for PacketStream<T>
where
    T: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Packet) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}

impl<T> std::fmt::Debug for PacketStream<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketStream")
            .field("transport", self.inner.get_ref())
            .finish()
    }
}

// =============================================================================
// Split stream types for cancellation safety (ADR-005)
// =============================================================================

pin_project! {
    /// A read-only packet stream for receiving TDS packets.
    ///
    /// This is used for the read half of a split connection, enabling
    /// cancellation safety per ADR-005.
    pub struct PacketReader<T> {
        #[pin]
        inner: FramedRead<T, TdsCodec>,
    }
}

impl<T> PacketReader<T>
where
    T: AsyncRead,
{
    /// Create a new packet reader over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: FramedRead::new(transport, TdsCodec::new()),
        }
    }

    /// Create a new packet reader with a custom codec.
    pub fn with_codec(transport: T, codec: TdsCodec) -> Self {
        Self {
            inner: FramedRead::new(transport, codec),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Get a reference to the codec.
    pub fn codec(&self) -> &TdsCodec {
        self.inner.decoder()
    }

    /// Get a mutable reference to the codec.
    pub fn codec_mut(&mut self) -> &mut TdsCodec {
        self.inner.decoder_mut()
    }

    /// Get a reference to the read buffer.
    pub fn read_buffer(&self) -> &BytesMut {
        self.inner.read_buffer()
    }

    /// Get a mutable reference to the read buffer.
    pub fn read_buffer_mut(&mut self) -> &mut BytesMut {
        self.inner.read_buffer_mut()
    }
}

impl<T> Stream for PacketReader<T>
where
    T: AsyncRead + Unpin,
{
    type Item = Result<Packet, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

impl<T> std::fmt::Debug for PacketReader<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketReader")
            .field("transport", self.inner.get_ref())
            .finish()
    }
}

pin_project! {
    /// A write-only packet sink for sending TDS packets.
    ///
    /// This is used for the write half of a split connection, enabling
    /// cancellation safety per ADR-005.
    pub struct PacketWriter<T> {
        #[pin]
        inner: FramedWrite<T, TdsCodec>,
    }
}

impl<T> PacketWriter<T>
where
    T: AsyncWrite,
{
    /// Create a new packet writer over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: FramedWrite::new(transport, TdsCodec::new()),
        }
    }

    /// Create a new packet writer with a custom codec.
    pub fn with_codec(transport: T, codec: TdsCodec) -> Self {
        Self {
            inner: FramedWrite::new(transport, codec),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Get a reference to the codec.
    pub fn codec(&self) -> &TdsCodec {
        self.inner.encoder()
    }

    /// Get a mutable reference to the codec.
    pub fn codec_mut(&mut self) -> &mut TdsCodec {
        self.inner.encoder_mut()
    }
}

impl<T> Sink<Packet> for PacketWriter<T>
where
    T: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Packet) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}

impl<T> std::fmt::Debug for PacketWriter<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketWriter")
            .field("transport", self.inner.get_ref())
            .finish()
    }
}

// =============================================================================
// MARS (SMP) demux: a codec layer on top of `TdsCodec` that also recognizes
// the 16-byte SMP envelope MARS sub-sessions are wrapped in.
// =============================================================================

use tds_protocol::smp::{SMP_HEADER_SIZE, SMP_SMID, SmpHeader};
use tokio_util::codec::{Decoder, Encoder};

/// One demultiplexed unit read off the wire: either a bare main-session TDS
/// packet, an SMP control frame (SYN/ACK/FIN, no embedded packet), or an SMP
/// DATA frame carrying a complete embedded TDS packet for a MARS sub-session.
#[derive(Debug)]
pub enum Frame {
    /// A plain TDS packet belonging to the main session (sid 0).
    Main(Packet),
    /// An SMP SYN, ACK, or FIN frame with no embedded packet.
    Control(SmpHeader),
    /// An SMP DATA frame wrapping one TDS packet for a MARS sub-session.
    Data {
        /// The SMP envelope.
        header: SmpHeader,
        /// The embedded TDS packet.
        packet: Packet,
    },
}

/// The outbound counterpart of [`Frame`]: what to write for a main-session
/// packet, a bare SMP control frame, or an SMP-wrapped sub-session packet.
#[derive(Debug)]
pub enum MarsOutgoing {
    /// Write `packet` with no SMP envelope.
    Main(Packet),
    /// Write a bare SMP control frame (SYN/ACK/FIN).
    Control(SmpHeader),
    /// Write an SMP envelope immediately followed by its embedded packet.
    Data {
        /// The SMP envelope (flags must be `Data`).
        header: SmpHeader,
        /// The embedded TDS packet.
        packet: Packet,
    },
}

/// Wraps [`TdsCodec`] to additionally recognize the SMP envelope used to
/// multiplex MARS sub-sessions over the same byte stream (`spec.md §4.1`'s
/// "if outer byte is `0x53`, parse SMP header" framing-loop rule).
#[derive(Default)]
pub struct MarsCodec {
    inner: TdsCodec,
}

impl MarsCodec {
    /// Create a new MARS-aware codec wrapping a fresh [`TdsCodec`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: TdsCodec::new(),
        }
    }

    /// Wrap an existing [`TdsCodec`] (e.g. one with a negotiated max packet
    /// size already set).
    #[must_use]
    pub fn with_codec(inner: TdsCodec) -> Self {
        Self { inner }
    }
}

impl Decoder for MarsCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src[0] != SMP_SMID {
            return Ok(self.inner.decode(src)?.map(Frame::Main));
        }

        if src.len() < SMP_HEADER_SIZE {
            return Ok(None);
        }

        // The `length` field (total SMP frame size, header included) sits at
        // byte offset 4, little-endian.
        let length = u32::from_le_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if length < SMP_HEADER_SIZE {
            return Err(CodecError::InvalidHeader);
        }
        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(length);
        let mut header_slice = &frame[..SMP_HEADER_SIZE];
        let header = SmpHeader::parse(&mut header_slice)?.ok_or(CodecError::InvalidHeader)?;
        let mut embedded = frame.split_off(SMP_HEADER_SIZE);

        match header.flags {
            tds_protocol::smp::SmpFlags::Data => {
                let packet = self
                    .inner
                    .decode(&mut embedded)?
                    .ok_or(CodecError::InvalidHeader)?;
                Ok(Some(Frame::Data { header, packet }))
            }
            _ => Ok(Some(Frame::Control(header))),
        }
    }
}

impl Encoder<MarsOutgoing> for MarsCodec {
    type Error = CodecError;

    fn encode(&mut self, item: MarsOutgoing, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            MarsOutgoing::Main(packet) => self.inner.encode(packet, dst),
            MarsOutgoing::Control(header) => {
                dst.reserve(SMP_HEADER_SIZE);
                header.write(dst);
                Ok(())
            }
            MarsOutgoing::Data { header, packet } => {
                dst.reserve(SMP_HEADER_SIZE);
                header.write(dst);
                self.inner.encode(packet, dst)
            }
        }
    }
}

pin_project! {
    /// A read-only MARS-aware frame stream (see [`MarsCodec`]).
    pub struct MarsReader<T> {
        #[pin]
        inner: FramedRead<T, MarsCodec>,
    }
}

impl<T> MarsReader<T>
where
    T: AsyncRead,
{
    /// Create a new MARS-aware reader over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: FramedRead::new(transport, MarsCodec::new()),
        }
    }

    /// Create a new MARS-aware reader wrapping an existing [`TdsCodec`].
    pub fn with_codec(transport: T, codec: TdsCodec) -> Self {
        Self {
            inner: FramedRead::new(transport, MarsCodec::with_codec(codec)),
        }
    }
}

impl<T> Stream for MarsReader<T>
where
    T: AsyncRead + Unpin,
{
    type Item = Result<Frame, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

pin_project! {
    /// A write-only MARS-aware frame sink (see [`MarsCodec`]).
    pub struct MarsWriter<T> {
        #[pin]
        inner: FramedWrite<T, MarsCodec>,
    }
}

impl<T> MarsWriter<T>
where
    T: AsyncWrite,
{
    /// Create a new MARS-aware writer over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: FramedWrite::new(transport, MarsCodec::new()),
        }
    }

    /// Create a new MARS-aware writer wrapping an existing [`TdsCodec`].
    pub fn with_codec(transport: T, codec: TdsCodec) -> Self {
        Self {
            inner: FramedWrite::new(transport, MarsCodec::with_codec(codec)),
        }
    }
}

impl<T> Sink<MarsOutgoing> for MarsWriter<T>
where
    T: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: MarsOutgoing) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod mars_tests {
    use super::*;
    use tds_protocol::packet::{PacketHeader, PacketStatus, PacketType};

    fn main_session_packet_bytes() -> BytesMut {
        let mut codec = TdsCodec::new();
        let header = PacketHeader::new(PacketType::SqlBatch, PacketStatus::END_OF_MESSAGE, 0);
        let packet = Packet::new(header, BytesMut::from(&b"select 1"[..]));
        let mut dst = BytesMut::new();
        Encoder::<Packet>::encode(&mut codec, packet, &mut dst).unwrap();
        dst
    }

    #[test]
    fn decodes_bare_packet_as_main() {
        let mut src = main_session_packet_bytes();
        let mut codec = MarsCodec::new();
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert!(matches!(frame, Frame::Main(_)));
    }

    #[test]
    fn decodes_smp_syn_as_control() {
        let header = SmpHeader::syn(1, 4);
        let mut src = BytesMut::new();
        header.write(&mut src);

        let mut codec = MarsCodec::new();
        let frame = codec.decode(&mut src).unwrap().unwrap();
        match frame {
            Frame::Control(parsed) => assert_eq!(parsed, header),
            _ => panic!("expected a control frame"),
        }
    }

    #[test]
    fn decodes_smp_data_with_embedded_packet() {
        let payload = main_session_packet_bytes();
        let header = SmpHeader::data(1, 0, 4, payload.len() as u32);

        let mut src = BytesMut::new();
        header.write(&mut src);
        src.extend_from_slice(&payload);

        let mut codec = MarsCodec::new();
        let frame = codec.decode(&mut src).unwrap().unwrap();
        match frame {
            Frame::Data {
                header: parsed,
                packet,
            } => {
                assert_eq!(parsed.sid, 1);
                assert_eq!(packet.header.packet_type, PacketType::SqlBatch);
            }
            _ => panic!("expected a data frame"),
        }
    }

    #[test]
    fn incomplete_smp_frame_waits_for_more_bytes() {
        let header = SmpHeader::syn(1, 4);
        let mut full = BytesMut::new();
        header.write(&mut full);

        let mut partial = full.split_to(SMP_HEADER_SIZE - 1);
        let mut codec = MarsCodec::new();
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn round_trips_data_frame_through_encoder() {
        let header_in = PacketHeader::new(PacketType::SqlBatch, PacketStatus::END_OF_MESSAGE, 0);
        let packet = Packet::new(header_in, BytesMut::from(&b"select 1"[..]));
        let mut packet_bytes = BytesMut::new();
        Encoder::<Packet>::encode(&mut TdsCodec::new(), packet.clone(), &mut packet_bytes).unwrap();

        let smp_header = SmpHeader::data(2, 0, 4, packet_bytes.len() as u32);
        let mut dst = BytesMut::new();
        let mut codec = MarsCodec::new();
        codec
            .encode(
                MarsOutgoing::Data {
                    header: smp_header,
                    packet,
                },
                &mut dst,
            )
            .unwrap();

        let frame = codec.decode(&mut dst).unwrap().unwrap();
        match frame {
            Frame::Data { header, .. } => assert_eq!(header.sid, 2),
            _ => panic!("expected a data frame"),
        }
    }
}
