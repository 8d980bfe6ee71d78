//! Core types for the westpack wire format

/// Identifier of a protocol object, unique within one connection.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The reserved root slot (the registry itself).
    pub const ROOT: ObjectId = ObjectId(0);
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object@{}", self.0)
    }
}

/// Handle of a file descriptor carried out-of-band by the transport.
///
/// The codec never interprets it. It only keeps the handles in argument order so the
/// transport can attach them next to the byte payload.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct Fd(pub u32);

/// The closed set of argument kinds a signature can declare.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Int = 0x01,
    Uint = 0x02,
    Fixed = 0x03,
    String = 0x04,
    Object = 0x05,
    NewId = 0x06,
    Array = 0x07,
    Fd = 0x08,
}

impl ArgKind {
    /// Whether a value of this kind has a fixed wire size (one word, or none for fds).
    pub const fn is_fixed_width(self) -> bool {
        !matches!(self, ArgKind::String | ArgKind::Array)
    }
}

impl std::fmt::Display for ArgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArgKind::Int => "int",
            ArgKind::Uint => "uint",
            ArgKind::Fixed => "fixed",
            ArgKind::String => "string",
            ArgKind::Object => "object",
            ArgKind::NewId => "new_id",
            ArgKind::Array => "array",
            ArgKind::Fd => "fd",
        };
        f.write_str(name)
    }
}

/// Westpack encoding and decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer exhausted while reading: a length reaches past the message boundary.
    UnexpectedEnd { needed: usize, available: usize },
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// A blob is longer than a 32-bit length field can describe.
    BlobTooLarge(usize),
    /// The signature asks for an fd but the transport supplied none.
    MissingFd,
    /// A declared message size is smaller than the header, unaligned, or larger than the bytes left.
    BadFrameSize { declared: usize, available: usize },
    /// The message body had bytes left after every declared argument was decoded.
    TrailingBytes(usize),
    /// An outbound message does not fit the 16-bit size field.
    MessageTooLarge(usize),
    /// The bytes written for a message differ from its computed size.
    SizeMismatch { computed: usize, written: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnexpectedEnd { needed, available } => {
                write!(f, "unexpected end of message: needed {} bytes, {} available", needed, available)
            }
            Error::InvalidUtf8 => write!(f, "string argument is not valid UTF-8"),
            Error::BlobTooLarge(len) => write!(f, "blob of {} bytes exceeds the length field", len),
            Error::MissingFd => write!(f, "fd argument without an out-of-band handle"),
            Error::BadFrameSize { declared, available } => {
                write!(f, "bad frame size: declared {} bytes, {} available", declared, available)
            }
            Error::TrailingBytes(n) => write!(f, "{} trailing bytes after the last argument", n),
            Error::MessageTooLarge(n) => write!(f, "message of {} bytes exceeds the size field", n),
            Error::SizeMismatch { computed, written } => {
                write!(f, "message size mismatch: computed {}, wrote {}", computed, written)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
