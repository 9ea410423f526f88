//! MARS (Multiple Active Result Sets) sub-session multiplexing.
//!
//! A connection with MARS negotiated carries one main session (`sid` 0,
//! never SMP-wrapped) plus any number of sub-sessions opened at runtime, each
//! wrapped in a 16-byte SMP envelope (`tds_protocol::smp`). A sub-session
//! starts `Idle`, sends a SYN to move to `Open` as soon as it's constructed,
//! and stays `Open` until it's dropped, at which point it sends a FIN. While
//! `Open`, the receive window advances in fixed steps of 4: whenever an
//! incoming DATA frame's `seqnum` reaches the current window, the window
//! advances and an ACK goes back to the peer.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use bytes::{Bytes, BytesMut};
use tds_protocol::packet::{PACKET_HEADER_SIZE, PacketHeader, PacketStatus, PacketType};
use tds_protocol::smp::{SmpFlags, SmpHeader};
use tokio::io::{AsyncWrite, WriteHalf};
use tokio::sync::{Mutex, mpsc};

use crate::error::CodecError;
use crate::framed::MarsWriter;
use crate::message::{Message, MessageAssembler};
use crate::packet_codec::Packet;

/// The receive window advances by this many sequence numbers each time it's
/// exhausted (fixed per the wire protocol, not negotiable).
const WINDOW_STEP: u32 = 4;

#[derive(Debug)]
struct SessionState {
    send_seq: u32,
    recv_seqnum: u32,
    recv_wndw: u32,
    assembler: MessageAssembler,
}

struct SessionEntry {
    state: Mutex<SessionState>,
    inbound_tx: mpsc::UnboundedSender<Result<Message, CodecError>>,
}

/// Per-connection registry of open MARS sub-sessions, shared between the
/// connection's reactor loop (which demultiplexes inbound SMP frames) and
/// each [`MarsSession`] handle (which sends on its own sid).
#[derive(Default)]
pub struct MarsRouter {
    sessions: Mutex<HashMap<u16, Arc<SessionEntry>>>,
    next_sid: AtomicU16,
}

impl MarsRouter {
    /// Create an empty router. Sub-session ids start at 1; sid 0 is reserved
    /// for the main session and is never registered here.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_sid: AtomicU16::new(1),
        }
    }

    async fn register(
        &self,
        initial_window: u32,
    ) -> (u16, mpsc::UnboundedReceiver<Result<Message, CodecError>>) {
        let sid = self.next_sid.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let entry = Arc::new(SessionEntry {
            state: Mutex::new(SessionState {
                send_seq: 0,
                recv_seqnum: 0,
                recv_wndw: initial_window,
                assembler: MessageAssembler::new(),
            }),
            inbound_tx: tx,
        });
        self.sessions.lock().await.insert(sid, entry);
        (sid, rx)
    }

    async fn unregister(&self, sid: u16) {
        self.sessions.lock().await.remove(&sid);
    }

    /// Handle an SMP control frame (SYN/ACK/FIN) read off the wire.
    ///
    /// A FIN closes out the sub-session; an unexpected SYN/ACK for a sid we
    /// didn't register (or already closed) is ignored rather than treated as
    /// fatal, since teardown races between FIN and a trailing ACK are
    /// expected.
    pub async fn handle_control(&self, header: SmpHeader) {
        match header.flags {
            SmpFlags::Fin => self.unregister(header.sid).await,
            SmpFlags::Ack | SmpFlags::Syn => {}
            SmpFlags::Data => unreachable!("control frames never carry the Data flag"),
        }
    }

    /// Handle an SMP DATA frame, routing its embedded packet to the target
    /// sub-session's message assembler. Returns an ACK header to send back
    /// to the peer when the receive window has just advanced.
    pub async fn handle_data(
        &self,
        header: SmpHeader,
        packet: Packet,
    ) -> Result<Option<SmpHeader>, CodecError> {
        let entry = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(&header.sid)
                .cloned()
                .ok_or(CodecError::UnknownSubSession(header.sid))?
        };

        let mut state = entry.state.lock().await;
        if header.seqnum != state.recv_seqnum {
            let err = CodecError::SequenceMismatch {
                sid: header.sid,
                expected: state.recv_seqnum,
                got: header.seqnum,
            };
            let _ = entry.inbound_tx.send(Err(err.clone()));
            return Err(err);
        }

        state.recv_seqnum += 1;
        if let Some(message) = state.assembler.push(packet) {
            let _ = entry.inbound_tx.send(Ok(message));
        }

        if header.seqnum == state.recv_wndw {
            state.recv_wndw += WINDOW_STEP;
            let ack = SmpHeader::ack(header.sid, header.seqnum, state.recv_wndw);
            return Ok(Some(ack));
        }

        Ok(None)
    }

    /// Deliver a fatal connection error to every open sub-session.
    pub async fn broadcast_error(&self, err: CodecError) {
        let sessions = self.sessions.lock().await;
        for entry in sessions.values() {
            let _ = entry.inbound_tx.send(Err(err.clone()));
        }
    }
}

/// A handle to one open MARS sub-session.
///
/// Constructing a session (via `Connection::open_mars_session`) sends the
/// opening SYN; dropping it sends a FIN and removes it from the router.
/// `Drop` can't `.await`, so the FIN is sent from a detached `tokio::spawn`
/// task, the same pattern used for connection-pool cleanup in `mssql-pool`.
pub struct MarsSession<T>
where
    T: AsyncWrite + Send + 'static,
{
    sid: u16,
    send_seq: u32,
    recv_wndw: u32,
    writer: Arc<Mutex<MarsWriter<WriteHalf<T>>>>,
    router: Arc<MarsRouter>,
    inbound_rx: mpsc::UnboundedReceiver<Result<Message, CodecError>>,
}

impl<T> MarsSession<T>
where
    T: AsyncWrite + Send + 'static,
{
    /// Open a new sub-session: register it with `router`, then send the
    /// opening SYN over `writer`.
    pub(crate) async fn open(
        writer: Arc<Mutex<MarsWriter<WriteHalf<T>>>>,
        router: Arc<MarsRouter>,
        initial_window: u32,
    ) -> Result<Self, CodecError> {
        use crate::framed::MarsOutgoing;
        use futures_util::SinkExt;

        let (sid, inbound_rx) = router.register(initial_window).await;

        {
            let mut w = writer.lock().await;
            w.send(MarsOutgoing::Control(SmpHeader::syn(sid, initial_window)))
                .await?;
            w.flush().await?;
        }

        Ok(Self {
            sid,
            send_seq: 0,
            recv_wndw: initial_window,
            writer,
            router,
            inbound_rx,
        })
    }

    /// This sub-session's id, as assigned by the server's SMP multiplexer.
    #[must_use]
    pub fn sid(&self) -> u16 {
        self.sid
    }

    /// Send a complete message on this sub-session, splitting into one or
    /// more TDS packets and wrapping each in its own SMP DATA envelope.
    pub async fn send_message(
        &mut self,
        packet_type: PacketType,
        payload: Bytes,
        max_packet_size: usize,
    ) -> Result<(), CodecError> {
        use crate::framed::MarsOutgoing;
        use futures_util::SinkExt;

        let max_payload = max_packet_size - PACKET_HEADER_SIZE;
        let chunks: Vec<_> = payload.chunks(max_payload.max(1)).collect();
        let total_chunks = chunks.len().max(1);

        let mut writer = self.writer.lock().await;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let status = if i == total_chunks - 1 {
                PacketStatus::END_OF_MESSAGE
            } else {
                PacketStatus::NORMAL
            };
            let header = PacketHeader::new(packet_type, status, 0);
            let packet = Packet::new(header, BytesMut::from(chunk));

            let mut packet_bytes = BytesMut::new();
            {
                use tokio_util::codec::Encoder;
                crate::packet_codec::TdsCodec::new().encode(packet.clone(), &mut packet_bytes)?;
            }

            let smp_header =
                SmpHeader::data(self.sid, self.send_seq, self.recv_wndw, packet_bytes.len() as u32);
            self.send_seq += 1;

            writer
                .send(MarsOutgoing::Data {
                    header: smp_header,
                    packet,
                })
                .await?;
        }

        writer.flush().await?;
        Ok(())
    }

    /// Receive the next complete message addressed to this sub-session.
    ///
    /// Returns `Ok(None)` once the connection's reactor loop has ended (the
    /// transport closed) with nothing left pending for this sub-session.
    pub async fn recv(&mut self) -> Result<Option<Message>, CodecError> {
        match self.inbound_rx.recv().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

impl<T> Drop for MarsSession<T>
where
    T: AsyncWrite + Send + 'static,
{
    fn drop(&mut self) {
        use crate::framed::MarsOutgoing;
        use futures_util::SinkExt;

        let sid = self.sid;
        let send_seq = self.send_seq;
        let recv_wndw = self.recv_wndw;
        let writer = Arc::clone(&self.writer);
        let router = Arc::clone(&self.router);

        tokio::spawn(async move {
            let mut w = writer.lock().await;
            let _ = w
                .send(MarsOutgoing::Control(SmpHeader::fin(
                    sid, send_seq, recv_wndw,
                )))
                .await;
            let _ = w.flush().await;
            drop(w);
            router.unregister(sid).await;
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_packet(is_eom: bool) -> Packet {
        let status = if is_eom {
            PacketStatus::END_OF_MESSAGE
        } else {
            PacketStatus::NORMAL
        };
        Packet::new(
            PacketHeader::new(PacketType::TabularResult, status, 0),
            BytesMut::from(&b"row"[..]),
        )
    }

    #[tokio::test]
    async fn data_below_window_sends_no_ack() {
        let router = MarsRouter::new();
        let (sid, _rx) = router.register(4).await;

        let header = SmpHeader::data(sid, 0, 4, 3);
        let ack = router.handle_data(header, make_packet(true)).await.unwrap();
        assert!(ack.is_none());
    }

    #[tokio::test]
    async fn data_reaching_window_advances_and_acks() {
        let router = MarsRouter::new();
        let (sid, _rx) = router.register(0).await;

        // Window starts at 0: the very first frame (seqnum 0) already meets it.
        let header = SmpHeader::data(sid, 0, 4, 3);
        let ack = router.handle_data(header, make_packet(true)).await.unwrap();
        let ack = ack.expect("window should have advanced");
        assert_eq!(ack.sid, sid);
        assert_eq!(ack.wndw, WINDOW_STEP);
    }

    #[tokio::test]
    async fn sequence_mismatch_is_an_error() {
        let router = MarsRouter::new();
        let (sid, _rx) = router.register(4).await;

        let header = SmpHeader::data(sid, 5, 4, 3);
        let err = router.handle_data(header, make_packet(true)).await;
        assert!(matches!(err, Err(CodecError::SequenceMismatch { .. })));
    }

    #[tokio::test]
    async fn unknown_sid_is_an_error() {
        let router = MarsRouter::new();
        let header = SmpHeader::data(99, 0, 4, 3);
        let err = router.handle_data(header, make_packet(true)).await;
        assert!(matches!(err, Err(CodecError::UnknownSubSession(99))));
    }

    #[tokio::test]
    async fn fin_removes_the_session() {
        let router = MarsRouter::new();
        let (sid, _rx) = router.register(4).await;

        router
            .handle_control(SmpHeader::fin(sid, 0, 4))
            .await;

        let header = SmpHeader::data(sid, 0, 4, 3);
        let err = router.handle_data(header, make_packet(true)).await;
        assert!(matches!(err, Err(CodecError::UnknownSubSession(_))));
    }
}
