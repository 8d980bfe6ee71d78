//! # Error Definitions
//!
//! Every failure a connection can hit, from a bad frame to a dropped transport.
//!
//! The codec and registry never swallow these. They travel up to the `Connection`,
//! which is the only place that decides to close a session.

use westpack::ObjectId;

use crate::session::CloseCode;
use crate::session::CloseReason;
use crate::session::SessionId;
use crate::session::TransportError;

#[derive(Debug)]
pub enum Error {
    /// The payload could not be framed or an argument could not be decoded.
    Framing(westpack::Error),
    /// A message addressed an id with no live resource.
    UnknownObject(ObjectId),
    /// The addressed resource has no request for this opcode.
    UnknownOpcode { object: ObjectId, interface: String, opcode: u16 },
    /// A `new_id` argument reused an id or went backwards.
    InvalidNewId { id: ObjectId, next: ObjectId },
    /// The root object cannot be destroyed by protocol action.
    RootObject,
    /// The id counter reached the end of the 32-bit space.
    IdsExhausted,
    /// Globals are announced once per connection.
    AlreadyPublished,
    /// A request signature takes a `new_id` but does not say what it creates.
    MissingNewIdInterface { interface: String, request: String },
    /// A text payload arrived where only binary protocol data is allowed.
    UnexpectedText,
    /// A binary payload exceeded the configured limit.
    PayloadTooLarge { size: usize, limit: usize },
    /// A request handler failed.
    Handler { object: ObjectId, request: String, source: anyhow::Error },
    /// The negotiated subprotocol did not match.
    Negotiation { expected: String, found: Option<String> },
    /// An event queued by a handler could not be encoded.
    Encode { object: ObjectId, source: westpack::Error },
    /// The transport reported a failure.
    Transport(TransportError),
    /// No connection is registered for this session.
    UnknownSession(SessionId),
    /// A connection is already registered for this session.
    SessionExists(SessionId),
    /// The connection no longer accepts messages.
    Closed,
    /// A configuration value could not be parsed.
    Config(String),
}

impl Error {
    /// Whether the peer broke the protocol, as opposed to a local or transport failure.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::Framing(_)
                | Self::UnknownObject(_)
                | Self::UnknownOpcode { .. }
                | Self::InvalidNewId { .. }
                | Self::RootObject
                | Self::UnexpectedText
                | Self::PayloadTooLarge { .. }
                | Self::Negotiation { .. }
        )
    }

    /// Category code carried by the in-band error event.
    pub fn code(&self) -> u32 {
        match self {
            Self::Framing(_) => 1,
            Self::UnknownObject(_) => 2,
            Self::UnknownOpcode { .. } => 3,
            Self::InvalidNewId { .. } => 4,
            Self::RootObject => 5,
            Self::UnexpectedText => 6,
            Self::PayloadTooLarge { .. } => 7,
            Self::Handler { .. } => 8,
            Self::Negotiation { .. } => 9,
            Self::Encode { .. } => 10,
            _ => 0,
        }
    }

    /// The object the error is about, if any.
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            Self::UnknownObject(id) => Some(*id),
            Self::UnknownOpcode { object, .. } => Some(*object),
            Self::InvalidNewId { id, .. } => Some(*id),
            Self::Handler { object, .. } => Some(*object),
            Self::Encode { object, .. } => Some(*object),
            _ => None,
        }
    }

    /// How the session is closed when this error ends it.
    pub fn close_reason(&self) -> CloseReason {
        let code = if self.is_protocol_violation() {
            CloseCode::ProtocolError
        } else {
            CloseCode::InternalError
        };
        CloseReason::new(code, self.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Framing(e) => write!(f, "Framing error: {}", e),
            Self::UnknownObject(id) => write!(f, "Unknown object: {}", id),
            Self::UnknownOpcode { object, interface, opcode } => {
                write!(f, "Unknown opcode {} on {} ({})", opcode, object, interface)
            }
            Self::InvalidNewId { id, next } => {
                write!(f, "Invalid new id {}: ids below {} are taken", id, next)
            }
            Self::RootObject => write!(f, "The root object cannot be destroyed"),
            Self::IdsExhausted => write!(f, "Object id space exhausted"),
            Self::AlreadyPublished => write!(f, "Globals already published"),
            Self::MissingNewIdInterface { interface, request } => {
                write!(f, "Request {}.{} takes a new_id but creates no interface", interface, request)
            }
            Self::UnexpectedText => write!(f, "Text payloads are not protocol data"),
            Self::PayloadTooLarge { size, limit } => {
                write!(f, "Payload of {} bytes exceeds limit of {}", size, limit)
            }
            Self::Handler { object, request, source } => {
                write!(f, "Handler {} on {} failed: {}", request, object, source)
            }
            Self::Negotiation { expected, found } => match found {
                Some(found) => write!(f, "Expected subprotocol '{}', got '{}'", expected, found),
                None => write!(f, "Expected subprotocol '{}'", expected),
            },
            Self::Encode { object, source } => write!(f, "Event on {} could not be encoded: {}", object, source),
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::UnknownSession(id) => write!(f, "Unknown session: {}", id),
            Self::SessionExists(id) => write!(f, "Session already open: {}", id),
            Self::Closed => write!(f, "Connection closed"),
            Self::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Framing(e) => Some(e),
            Self::Encode { source, .. } => Some(source),
            Self::Transport(e) => Some(e),
            Self::Handler { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

impl From<westpack::Error> for Error {
    fn from(e: westpack::Error) -> Self {
        Self::Framing(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
