//! # Session Boundary
//!
//! The minimal interface a transport adapter implements for one accepted connection.
//!
//! ## Philosophy
//!
//! - **Message-Oriented**: The transport already frames raw bytes into discrete payloads.
//!   A binary payload may still carry several protocol messages back-to-back.
//! - **Protocol-Agnostic**: A session moves packets and close reasons. It knows nothing
//!   about objects, opcodes, or arguments.

use std::fmt;

use westpack::Packet;

/// Strong type for session identifiers, assigned by the transport.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// One inbound unit as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Reserved for transport-level signaling, never protocol data.
    Text(String),
    /// Protocol messages plus any fds that travelled with them.
    Binary(Packet),
}

impl Payload {
    pub fn binary(bytes: Vec<u8>) -> Self {
        Self::Binary(Packet::new(bytes))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(packet) => packet.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Packet> for Payload {
    fn from(packet: Packet) -> Self {
        Self::Binary(packet)
    }
}

/// Close codes, shared with the websocket close frame.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    Normal = 1000,
    ProtocolError = 1002,
    InternalError = 1011,
}

impl CloseCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Why a session was closed by this side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: CloseCode,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn normal() -> Self {
        Self::new(CloseCode::Normal, "")
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code.as_u16(), self.reason)
    }
}

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The session was already closed.
    Closed,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Closed => write!(f, "Session closed"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// One accepted transport session.
///
/// This trait is designed to be object-safe (`Arc<dyn Session>`).
#[async_trait::async_trait]
pub trait Session: Send + Sync + 'static {
    fn id(&self) -> SessionId;

    /// The subprotocol token negotiated during the handshake, if any.
    fn subprotocol(&self) -> Option<String>;

    /// Pushes one packet to the peer.
    ///
    /// # invariants
    /// - Packets are delivered in the order they are sent.
    /// - The fds in the packet travel alongside its bytes.
    async fn send(&self, packet: Packet) -> Result<()>;

    /// Closes the session. Closing twice is not an error.
    async fn close(&self, reason: CloseReason) -> Result<()>;
}
