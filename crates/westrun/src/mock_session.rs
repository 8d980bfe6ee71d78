//! In-memory sessions for testing.
//!
//! A `MockSession` hands everything the server sends to a `MockPeer` over tokio
//! channels, so tests can play the client side without a socket.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use westpack::ArgKind;
use westpack::Message;
use westpack::Packet;

use crate::config::DEFAULT_SUBPROTOCOL;
use crate::session;
use crate::session::CloseReason;
use crate::session::Payload;
use crate::session::Session;
use crate::session::SessionId;
use crate::session::TransportError;

/// The server side of an in-memory session.
pub struct MockSession {
    id: SessionId,
    subprotocol: Option<String>,
    packets: mpsc::UnboundedSender<Packet>,
    closes: mpsc::UnboundedSender<CloseReason>,
    closed: AtomicBool,
    broken: AtomicBool,
}

/// The client side of a `MockSession`.
pub struct MockPeer {
    packets: mpsc::UnboundedReceiver<Packet>,
    closes: mpsc::UnboundedReceiver<CloseReason>,
}

impl MockSession {
    pub fn new(id: u64, subprotocol: Option<&str>) -> (Arc<Self>, MockPeer) {
        let (packets_tx, packets_rx) = mpsc::unbounded_channel();
        let (closes_tx, closes_rx) = mpsc::unbounded_channel();

        let session = Arc::new(Self {
            id: SessionId(id),
            subprotocol: subprotocol.map(str::to_string),
            packets: packets_tx,
            closes: closes_tx,
            closed: AtomicBool::new(false),
            broken: AtomicBool::new(false),
        });
        let peer = MockPeer {
            packets: packets_rx,
            closes: closes_rx,
        };

        (session, peer)
    }

    /// A session that negotiated the default subprotocol.
    pub fn pair(id: u64) -> (Arc<Self>, MockPeer) {
        Self::new(id, Some(DEFAULT_SUBPROTOCOL))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Makes every later send fail as if the link dropped.
    pub fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Session for MockSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn subprotocol(&self) -> Option<String> {
        self.subprotocol.clone()
    }

    async fn send(&self, packet: Packet) -> session::Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionLost("Link broken".into()));
        }
        self.packets
            .send(packet)
            .map_err(|_| TransportError::ConnectionLost("Peer dropped".into()))
    }

    async fn close(&self, reason: CloseReason) -> session::Result<()> {
        // only the first close reaches the peer
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.closes.send(reason);
        Ok(())
    }
}

impl MockPeer {
    /// Waits for the next packet. `None` once the session is gone.
    pub async fn packet(&mut self) -> Option<Packet> {
        self.packets.recv().await
    }

    pub fn try_packet(&mut self) -> Option<Packet> {
        self.packets.try_recv().ok()
    }

    /// Waits for the close reason. `None` once the session is gone without closing.
    pub async fn closed(&mut self) -> Option<CloseReason> {
        self.closes.recv().await
    }

    pub fn try_closed(&mut self) -> Option<CloseReason> {
        self.closes.try_recv().ok()
    }

    /// Decodes every message of a packet, looking up each signature by target and opcode.
    pub fn decode(
        packet: &Packet,
        signature: impl Fn(&Message) -> Vec<ArgKind>,
    ) -> westpack::Result<Vec<Message>> {
        let mut fds = packet.fds.iter().copied();
        let mut messages = Vec::new();
        for raw in westpack::split(&packet.bytes) {
            let raw = raw?;
            let header = Message::new(raw.target(), raw.opcode(), Vec::new());
            messages.push(raw.decode(&signature(&header), &mut fds)?);
        }
        Ok(messages)
    }
}

/// Encodes client requests into one binary payload.
pub fn requests(messages: &[Message]) -> westpack::Result<Payload> {
    westpack::encode_all(messages).map(Payload::Binary)
}
