use std::collections::VecDeque;

use crate::arg::Arg;
use crate::cursor::Cursor;
use crate::fixed::Fixed;
use crate::types::ArgKind;
use crate::types::Error;
use crate::types::Fd;
use crate::types::ObjectId;
use crate::types::Result;

/// A bounds-checked reader over one message body.
///
/// Fd arguments are popped, in order, from the queue the transport delivered
/// alongside the bytes.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    cursor: Cursor<'a>,
    fds: VecDeque<Fd>,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            fds: VecDeque::new(),
        }
    }

    pub fn with_fds(bytes: &'a [u8], fds: impl IntoIterator<Item = Fd>) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            fds: fds.into_iter().collect(),
        }
    }

    pub fn pos(&self) -> usize {
        self.cursor.pos()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Hands back any fds that were not consumed by the arguments decoded so far.
    pub fn into_fds(self) -> VecDeque<Fd> {
        self.fds
    }

    pub fn int(&mut self) -> Result<i32> {
        self.cursor.read_i32()
    }

    pub fn uint(&mut self) -> Result<u32> {
        self.cursor.read_u32()
    }

    pub fn fixed(&mut self) -> Result<Fixed> {
        self.cursor.read_i32().map(Fixed::from_raw)
    }

    pub fn object(&mut self) -> Result<ObjectId> {
        self.cursor.read_u32().map(ObjectId)
    }

    pub fn new_id(&mut self) -> Result<ObjectId> {
        self.cursor.read_u32().map(ObjectId)
    }

    /// Reads a length-prefixed blob and skips its padding.
    ///
    /// The whole padded extent is checked before anything is consumed, so a lying
    /// length never moves the cursor past the message boundary.
    fn blob(&mut self) -> Result<&'a [u8]> {
        let mut ahead = self.cursor.clone();
        let len = ahead.read_u32()? as usize;
        // a length near u32::MAX must not overflow usize on 32-bit targets
        let padded = len.checked_add(3).map(|n| n & !3).ok_or(Error::UnexpectedEnd {
            needed: len,
            available: ahead.remaining(),
        })?;
        ahead.need(padded)?;

        self.cursor = ahead;
        let data = self.cursor.read_bytes(len)?;
        self.cursor.skip(padded - len)?;
        Ok(data)
    }

    pub fn str(&mut self) -> Result<&'a str> {
        let bytes = self.blob()?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    pub fn array(&mut self) -> Result<&'a [u8]> {
        self.blob()
    }

    pub fn fd(&mut self) -> Result<Fd> {
        self.fds.pop_front().ok_or(Error::MissingFd)
    }

    /// Decodes one argument of the requested kind.
    pub fn arg(&mut self, kind: ArgKind) -> Result<Arg> {
        Ok(match kind {
            ArgKind::Int => Arg::Int(self.int()?),
            ArgKind::Uint => Arg::Uint(self.uint()?),
            ArgKind::Fixed => Arg::Fixed(self.fixed()?),
            ArgKind::String => Arg::String(self.str()?.to_string()),
            ArgKind::Object => Arg::Object(self.object()?),
            ArgKind::NewId => Arg::NewId(self.new_id()?),
            ArgKind::Array => Arg::Array(self.array()?.to_vec()),
            ArgKind::Fd => Arg::Fd(self.fd()?),
        })
    }

    /// Decodes exactly one argument per kind, in signature order.
    pub fn args(&mut self, signature: &[ArgKind]) -> Result<Vec<Arg>> {
        signature.iter().map(|kind| self.arg(*kind)).collect()
    }
}
