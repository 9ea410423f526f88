//! Split I/O connection for cancellation safety, with a background reactor
//! task that demultiplexes the main session from any open MARS sub-sessions.
//!
//! Per ADR-005, the TCP stream is split into separate read and write halves
//! to allow sending Attention packets while blocked on reading results. The
//! read half is owned entirely by the reactor task spawned in `new`/
//! `with_codecs`; `Connection` itself only holds the write half (shared with
//! any [`MarsSession`] handles) and a channel the reactor forwards completed
//! main-session messages on.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use tds_protocol::packet::{PACKET_HEADER_SIZE, PacketHeader, PacketStatus, PacketType};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, Notify, mpsc};

use crate::error::CodecError;
use crate::framed::{Frame, MarsOutgoing, MarsReader, MarsWriter};
use crate::mars::{MarsRouter, MarsSession};
use crate::message::{Message, MessageAssembler};
use crate::packet_codec::{Packet, TdsCodec};

/// Default initial MARS receive window, matching `Config::mars_initial_window`'s
/// own default.
const DEFAULT_MARS_WINDOW: u32 = 4;

/// A TDS connection with split I/O for cancellation safety.
///
/// The underlying transport is split into read and write halves. The read
/// half is handed to a background reactor task that demultiplexes the main
/// session (sid 0, never SMP-wrapped) from any MARS sub-sessions opened via
/// [`Connection::open_mars_session`]; completed main-session messages arrive
/// through a channel that [`Connection::read_message`] receives from.
///
/// # Cancellation
///
/// SQL Server uses out-of-band "Attention" packets to cancel running queries.
/// Without split I/O, the driver would be unable to send cancellation while
/// blocked awaiting a read (e.g., processing a large result set).
///
/// # Example
///
/// ```rust,ignore
/// use mssql_codec::Connection;
/// use tokio::net::TcpStream;
///
/// let stream = TcpStream::connect("localhost:1433").await?;
/// let conn = Connection::new(stream);
///
/// // Can cancel from another task while reading
/// let cancel_handle = conn.cancel_handle();
/// tokio::spawn(async move {
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     cancel_handle.cancel().await?;
/// });
/// ```
pub struct Connection<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Write half, shared with any open `MarsSession` handles.
    writer: Arc<Mutex<MarsWriter<WriteHalf<T>>>>,
    /// Completed main-session messages, forwarded by the reactor task.
    main_rx: mpsc::UnboundedReceiver<Result<Message, CodecError>>,
    /// Registry of open MARS sub-sessions, shared with the reactor task.
    mars: Arc<MarsRouter>,
    /// Initial receive window handed to newly opened sub-sessions.
    mars_initial_window: u32,
    /// Notification for cancellation completion.
    cancel_notify: Arc<Notify>,
    /// Flag indicating cancellation is in progress.
    cancelling: Arc<std::sync::atomic::AtomicBool>,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create a new connection from a transport.
    ///
    /// The transport is immediately split into read and write halves, and a
    /// reactor task is spawned to own the read half.
    pub fn new(transport: T) -> Self {
        Self::with_codecs(transport, TdsCodec::new(), TdsCodec::new())
    }

    /// Create a new connection with custom codecs.
    pub fn with_codecs(transport: T, read_codec: TdsCodec, write_codec: TdsCodec) -> Self {
        let (read_half, write_half) = tokio::io::split(transport);

        let reader = MarsReader::with_codec(read_half, read_codec);
        let writer = Arc::new(Mutex::new(MarsWriter::with_codec(write_half, write_codec)));
        let mars = Arc::new(MarsRouter::new());
        let cancel_notify = Arc::new(Notify::new());
        let cancelling = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (main_tx, main_rx) = mpsc::unbounded_channel();

        tokio::spawn(reactor_loop(
            reader,
            Arc::clone(&writer),
            Arc::clone(&mars),
            main_tx,
            Arc::clone(&cancel_notify),
            Arc::clone(&cancelling),
        ));

        Self {
            writer,
            main_rx,
            mars,
            mars_initial_window: DEFAULT_MARS_WINDOW,
            cancel_notify,
            cancelling,
        }
    }

    /// Set the initial receive window new MARS sub-sessions open with.
    #[must_use]
    pub fn with_mars_initial_window(mut self, window: u32) -> Self {
        self.mars_initial_window = window;
        self
    }

    /// Open a new MARS sub-session, sending its opening SYN.
    ///
    /// The server must have negotiated MARS support during pre-login, and
    /// this connection's reactor task must still be running.
    pub async fn open_mars_session(&self) -> Result<MarsSession<T>, CodecError> {
        MarsSession::open(
            Arc::clone(&self.writer),
            Arc::clone(&self.mars),
            self.mars_initial_window,
        )
        .await
    }
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Get a handle for cancelling queries on this connection.
    ///
    /// The handle can be cloned and sent to other tasks.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle<T> {
        CancelHandle {
            writer: Arc::clone(&self.writer),
            notify: Arc::clone(&self.cancel_notify),
            cancelling: Arc::clone(&self.cancelling),
        }
    }

    /// Check if a cancellation is currently in progress.
    #[must_use]
    pub fn is_cancelling(&self) -> bool {
        self.cancelling.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Read the next complete message from the connection.
    ///
    /// This handles multi-packet message reassembly (and, while a
    /// cancellation is in progress, draining) inside the reactor task; this
    /// just receives whatever it forwards.
    pub async fn read_message(&mut self) -> Result<Option<Message>, CodecError> {
        match self.main_rx.recv().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Send a complete message, splitting into multiple packets if needed.
    ///
    /// If `reset_connection` is true, the RESETCONNECTION flag is set on the
    /// first packet. This causes SQL Server to reset connection state (temp
    /// tables, SET options, isolation level, etc.) before executing the command.
    /// Per TDS spec, this flag MUST only be set on the first packet of a message.
    pub async fn send_message(
        &mut self,
        packet_type: PacketType,
        payload: Bytes,
        max_packet_size: usize,
    ) -> Result<(), CodecError> {
        self.send_message_with_reset(packet_type, payload, max_packet_size, false)
            .await
    }

    /// Send a complete message with optional connection reset.
    ///
    /// If `reset_connection` is true, the RESETCONNECTION flag is set on the
    /// first packet. This causes SQL Server to reset connection state (temp
    /// tables, SET options, isolation level, etc.) before executing the command.
    /// Per TDS spec, this flag MUST only be set on the first packet of a message.
    pub async fn send_message_with_reset(
        &mut self,
        packet_type: PacketType,
        payload: Bytes,
        max_packet_size: usize,
        reset_connection: bool,
    ) -> Result<(), CodecError> {
        let max_payload = max_packet_size - PACKET_HEADER_SIZE;
        let chunks: Vec<_> = payload.chunks(max_payload).collect();
        let total_chunks = chunks.len();

        let mut writer = self.writer.lock().await;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let is_first = i == 0;
            let is_last = i == total_chunks - 1;

            // Build status flags
            let mut status = if is_last {
                PacketStatus::END_OF_MESSAGE
            } else {
                PacketStatus::NORMAL
            };

            // Per TDS spec, RESETCONNECTION must be on the first packet only
            if is_first && reset_connection {
                status |= PacketStatus::RESET_CONNECTION;
            }

            let header = PacketHeader::new(packet_type, status, 0);
            let packet = Packet::new(header, BytesMut::from(chunk));

            writer.send(MarsOutgoing::Main(packet)).await?;
        }

        Ok(())
    }

    /// Flush the write buffer.
    pub async fn flush(&mut self) -> Result<(), CodecError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await
    }
}

impl<T> std::fmt::Debug for Connection<T>
where
    T: AsyncRead + AsyncWrite + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("cancelling", &self.is_cancelling())
            .finish_non_exhaustive()
    }
}

/// Demultiplex inbound frames for one connection until the transport closes.
///
/// Bare main-session packets are reassembled into messages and forwarded on
/// `main_tx`. SMP control frames (SYN/ACK/FIN) and DATA frames are routed
/// through `mars`; a DATA frame that advances a sub-session's receive window
/// gets an ACK written straight back out on `writer`.
///
/// While `cancelling` is set, main-session packets are drained (checked only
/// for a DONE token with the ATTENTION flag) instead of being assembled and
/// forwarded, mirroring how the pull-based reader used to special-case
/// cancellation in `read_message`.
async fn reactor_loop<T>(
    mut reader: MarsReader<ReadHalf<T>>,
    writer: Arc<Mutex<MarsWriter<WriteHalf<T>>>>,
    mars: Arc<MarsRouter>,
    main_tx: mpsc::UnboundedSender<Result<Message, CodecError>>,
    cancel_notify: Arc<Notify>,
    cancelling: Arc<std::sync::atomic::AtomicBool>,
) where
    T: AsyncRead + AsyncWrite,
{
    let mut assembler = MessageAssembler::new();
    let mut draining = false;

    loop {
        match reader.next().await {
            Some(Ok(Frame::Main(packet))) => {
                if cancelling.load(std::sync::atomic::Ordering::Acquire) {
                    if !draining {
                        assembler.clear();
                        draining = true;
                    }
                    if check_attention_done(&packet) {
                        tracing::debug!(
                            "received DONE with ATTENTION, cancellation complete"
                        );
                        cancelling.store(false, std::sync::atomic::Ordering::Release);
                        cancel_notify.notify_waiters();
                        draining = false;
                    }
                    continue;
                }

                draining = false;
                if let Some(message) = assembler.push(packet) {
                    if main_tx.send(Ok(message)).is_err() {
                        return;
                    }
                }
            }
            Some(Ok(Frame::Control(header))) => {
                mars.handle_control(header).await;
            }
            Some(Ok(Frame::Data { header, packet })) => match mars.handle_data(header, packet).await {
                Ok(Some(ack)) => {
                    let mut w = writer.lock().await;
                    if w.send(MarsOutgoing::Control(ack)).await.is_err() || w.flush().await.is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "MARS routing error, sub-session notified");
                }
            },
            Some(Err(e)) => {
                mars.broadcast_error(e.clone()).await;
                let _ = main_tx.send(Err(e));
                return;
            }
            None => {
                if assembler.has_partial() {
                    let _ = main_tx.send(Err(CodecError::ConnectionClosed));
                }
                mars.broadcast_error(CodecError::ConnectionClosed).await;
                return;
            }
        }
    }
}

/// Check if a packet contains a DONE token with ATTENTION flag.
fn check_attention_done(packet: &Packet) -> bool {
    // Look for DONE token (0xFD) with ATTN status flag (bit 5)
    // DONE token format: token_type(1) + status(2) + cur_cmd(2) + row_count(8)
    if packet.header.packet_type != PacketType::TabularResult || packet.payload.is_empty() {
        return false;
    }

    let payload = &packet.payload;
    for i in 0..payload.len() {
        if payload[i] == 0xFD && i + 3 <= payload.len() {
            // Found DONE token, check status
            let status = u16::from_le_bytes([payload[i + 1], payload[i + 2]]);
            // DONE_ATTN = 0x0020
            if status & 0x0020 != 0 {
                return true;
            }
        }
    }

    false
}

/// Handle for cancelling queries on a connection.
///
/// This can be cloned and sent to other tasks to enable cancellation
/// from a different async context.
pub struct CancelHandle<T>
where
    T: AsyncRead + AsyncWrite,
{
    writer: Arc<Mutex<MarsWriter<WriteHalf<T>>>>,
    notify: Arc<Notify>,
    cancelling: Arc<std::sync::atomic::AtomicBool>,
}

impl<T> CancelHandle<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Send an Attention packet to cancel the current query.
    ///
    /// This can be called from a different task while the main task
    /// is blocked reading results.
    pub async fn cancel(&self) -> Result<(), CodecError> {
        // Mark cancellation in progress
        self.cancelling
            .store(true, std::sync::atomic::Ordering::Release);

        tracing::debug!("sending Attention packet for query cancellation");

        // Send the Attention packet
        let mut writer = self.writer.lock().await;

        // Create and send attention packet
        let header = PacketHeader::new(
            PacketType::Attention,
            PacketStatus::END_OF_MESSAGE,
            PACKET_HEADER_SIZE as u16,
        );
        let packet = Packet::new(header, BytesMut::new());

        writer.send(MarsOutgoing::Main(packet)).await?;
        writer.flush().await?;

        Ok(())
    }

    /// Wait for the cancellation to complete.
    ///
    /// This waits until the server acknowledges the cancellation
    /// with a DONE token containing the ATTENTION flag.
    pub async fn wait_cancelled(&self) {
        if self.cancelling.load(std::sync::atomic::Ordering::Acquire) {
            self.notify.notified().await;
        }
    }

    /// Check if a cancellation is currently in progress.
    #[must_use]
    pub fn is_cancelling(&self) -> bool {
        self.cancelling.load(std::sync::atomic::Ordering::Acquire)
    }
}

impl<T> Clone for CancelHandle<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            notify: Arc::clone(&self.notify),
            cancelling: Arc::clone(&self.cancelling),
        }
    }
}

impl<T> std::fmt::Debug for CancelHandle<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelling", &self.is_cancelling())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attention_packet_header() {
        // Verify attention packet header construction
        let header = PacketHeader::new(
            PacketType::Attention,
            PacketStatus::END_OF_MESSAGE,
            PACKET_HEADER_SIZE as u16,
        );

        assert_eq!(header.packet_type, PacketType::Attention);
        assert!(header.status.contains(PacketStatus::END_OF_MESSAGE));
        assert_eq!(header.length, PACKET_HEADER_SIZE as u16);
    }

    #[test]
    fn test_check_attention_done() {
        // Test DONE token with ATTN flag detection
        // DONE token: 0xFD + status(2 bytes) + cur_cmd(2 bytes) + row_count(8 bytes)
        // DONE_ATTN flag is 0x0020
        let header = PacketHeader::new(PacketType::TabularResult, PacketStatus::END_OF_MESSAGE, 0);

        let payload_with_attn = BytesMut::from(
            &[
                0xFD, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ][..],
        );
        let packet_with_attn = Packet::new(header, payload_with_attn);

        let payload_no_attn = BytesMut::from(
            &[
                0xFD, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ][..],
        );
        let packet_no_attn = Packet::new(header, payload_no_attn);

        assert!(check_attention_done(&packet_with_attn));
        assert!(!check_attention_done(&packet_no_attn));
    }
}
