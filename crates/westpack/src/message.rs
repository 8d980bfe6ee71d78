//! # Message Framing
//!
//! Composes and parses whole messages: target object, opcode, total size, arguments.
//!
//! ## Layout
//! ```text
//! word 0: target object id
//! word 1: size << 16 | opcode     (size includes this 8-byte header)
//! body:   arguments, each ending on a word boundary
//! ```
//!
//! ## Invariants
//! - The declared size is part of the wire contract: it always equals the bytes written.
//! - Parsing never reads past the declared size, and a body must be consumed exactly.

use crate::arg::Arg;
use crate::cursor::Cursor;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::encoder::Packet;
use crate::types::ArgKind;
use crate::types::Error;
use crate::types::Fd;
use crate::types::ObjectId;
use crate::types::Result;

/// Size of the fixed message header in bytes.
pub const HEADER_SIZE: usize = 8;

/// The size field is 16 bits wide.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// The fixed header that precedes every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub target: ObjectId,
    pub opcode: u16,
    /// Total message length in bytes, header included.
    pub size: u16,
}

impl Header {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.write_u32_raw(self.target.0);
        enc.write_u32_raw(((self.size as u32) << 16) | self.opcode as u32);
    }

    /// Reads a header without validating the size against the available bytes.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let target = ObjectId(cursor.read_u32()?);
        let word = cursor.read_u32()?;
        Ok(Self {
            target,
            opcode: (word & 0xffff) as u16,
            size: (word >> 16) as u16,
        })
    }

    pub fn body_len(&self) -> usize {
        (self.size as usize).saturating_sub(HEADER_SIZE)
    }
}

/// A framed message whose arguments have not been decoded yet.
///
/// The argument signature is only known once the target object has been resolved,
/// so framing and argument decoding are separate steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage<'a> {
    pub header: Header,
    pub body: &'a [u8],
}

impl<'a> RawMessage<'a> {
    pub fn target(&self) -> ObjectId {
        self.header.target
    }

    pub fn opcode(&self) -> u16 {
        self.header.opcode
    }

    /// Decodes exactly the signature's arguments, consuming fds from the shared queue.
    pub fn decode(&self, signature: &[ArgKind], fds: &mut impl Iterator<Item = Fd>) -> Result<Message> {
        let wanted = signature.iter().filter(|k| **k == ArgKind::Fd).count();
        let mut dec = Decoder::with_fds(self.body, fds.take(wanted));
        let args = dec.args(signature)?;

        if dec.remaining() > 0 {
            return Err(Error::TrailingBytes(dec.remaining()));
        }

        Ok(Message {
            target: self.header.target,
            opcode: self.header.opcode,
            args,
        })
    }
}

/// Iterator over the back-to-back messages of one binary payload.
///
/// Yields an error and then stops when a declared size is inconsistent with the bytes left.
pub struct Frames<'a> {
    cursor: Cursor<'a>,
    failed: bool,
}

/// Splits a payload into raw messages.
pub fn split(bytes: &[u8]) -> Frames<'_> {
    Frames {
        cursor: Cursor::new(bytes),
        failed: false,
    }
}

impl<'a> Frames<'a> {
    fn next_frame(&mut self) -> Result<RawMessage<'a>> {
        let available = self.cursor.remaining();
        let mut ahead = self.cursor.clone();
        let header = Header::decode(&mut ahead)?;
        let declared = header.size as usize;

        if declared < HEADER_SIZE || declared % 4 != 0 || declared > available {
            return Err(Error::BadFrameSize { declared, available });
        }

        let body = ahead.read_bytes(header.body_len())?;
        self.cursor = ahead;
        Ok(RawMessage { header, body })
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<RawMessage<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_empty() {
            return None;
        }
        let frame = self.next_frame();
        self.failed = frame.is_err();
        Some(frame)
    }
}

/// A decoded message. Owned, immutable once framed, dispatched once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub target: ObjectId,
    pub opcode: u16,
    pub args: Vec<Arg>,
}

impl Message {
    pub fn new(target: ObjectId, opcode: u16, args: Vec<Arg>) -> Self {
        Self { target, opcode, args }
    }

    /// Total wire size: header plus every argument.
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.args.iter().map(Arg::size).sum::<usize>()
    }

    pub fn signature(&self) -> Vec<ArgKind> {
        self.args.iter().map(Arg::kind).collect()
    }

    /// Appends the framed message to the encoder.
    ///
    /// On error the encoder is left exactly as it was before the call.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        let size = self.size();
        if size > MAX_MESSAGE_SIZE {
            return Err(Error::MessageTooLarge(size));
        }

        let start = enc.len();
        let start_fds = enc.fds().len();
        let result = self.write(enc, size, start);
        if result.is_err() {
            enc.rewind(start, start_fds);
        }
        result
    }

    fn write(&self, enc: &mut Encoder, size: usize, start: usize) -> Result<()> {
        let header = Header {
            target: self.target,
            opcode: self.opcode,
            size: size as u16,
        };
        header.encode(enc);
        enc.args(&self.args)?;

        let written = enc.len() - start;
        if written != size {
            return Err(Error::SizeMismatch { computed: size, written });
        }
        Ok(())
    }
}

/// Frames the longest prefix of `messages` that encodes cleanly.
///
/// Returns the packet holding that prefix, plus the index and error of the first
/// message that could not be encoded, if any.
pub fn encode_prefix(messages: &[Message]) -> (Packet, Option<(usize, Error)>) {
    let capacity = messages.iter().map(Message::size).filter(|s| *s <= MAX_MESSAGE_SIZE).sum();
    let mut enc = Encoder::with_capacity(capacity);
    for (index, message) in messages.iter().enumerate() {
        if let Err(e) = message.encode(&mut enc) {
            return (enc.into_packet(), Some((index, e)));
        }
    }
    (enc.into_packet(), None)
}

/// Frames a batch of messages back-to-back into one packet.
pub fn encode_all(messages: &[Message]) -> Result<Packet> {
    let capacity = messages.iter().map(Message::size).sum();
    let mut enc = Encoder::with_capacity(capacity);
    for message in messages {
        message.encode(&mut enc)?;
    }
    Ok(enc.into_packet())
}
