//! # Arguments
//!
//! A tagged argument value and its wire size.
//!
//! ## Invariants
//! - `encode(arg)` appends exactly `arg.size()` bytes to the encoder.
//! - Blob sizes are `4 + round_up4(len)`, so every argument ends on a word boundary.

use crate::fixed::Fixed;
use crate::types::ArgKind;
use crate::types::Fd;
use crate::types::ObjectId;

/// Rounds `n` up to the next multiple of four.
#[inline(always)]
pub const fn round_up4(n: usize) -> usize {
    (n + 3) & !3
}

/// One protocol argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Int(i32),
    Uint(u32),
    Fixed(Fixed),
    String(String),
    Object(ObjectId),
    NewId(ObjectId),
    Array(Vec<u8>),
    Fd(Fd),
}

impl Arg {
    pub fn kind(&self) -> ArgKind {
        match self {
            Arg::Int(_) => ArgKind::Int,
            Arg::Uint(_) => ArgKind::Uint,
            Arg::Fixed(_) => ArgKind::Fixed,
            Arg::String(_) => ArgKind::String,
            Arg::Object(_) => ArgKind::Object,
            Arg::NewId(_) => ArgKind::NewId,
            Arg::Array(_) => ArgKind::Array,
            Arg::Fd(_) => ArgKind::Fd,
        }
    }

    /// Number of bytes this argument occupies in the message body.
    pub fn size(&self) -> usize {
        match self {
            Arg::Int(_) | Arg::Uint(_) | Arg::Fixed(_) | Arg::Object(_) | Arg::NewId(_) => 4,
            Arg::String(s) => 4 + round_up4(s.len()),
            Arg::Array(a) => 4 + round_up4(a.len()),
            Arg::Fd(_) => 0,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Arg::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u32> {
        match self {
            Arg::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_fixed(&self) -> Option<Fixed> {
        match self {
            Arg::Fixed(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Arg::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_new_id(&self) -> Option<ObjectId> {
        match self {
            Arg::NewId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[u8]> {
        match self {
            Arg::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_fd(&self) -> Option<Fd> {
        match self {
            Arg::Fd(fd) => Some(*fd),
            _ => None,
        }
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Int(v)
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Arg::Uint(v)
    }
}

impl From<Fixed> for Arg {
    fn from(v: Fixed) -> Self {
        Arg::Fixed(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::String(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::String(v)
    }
}

impl From<ObjectId> for Arg {
    fn from(v: ObjectId) -> Self {
        Arg::Object(v)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(v: Vec<u8>) -> Self {
        Arg::Array(v)
    }
}

impl From<Fd> for Arg {
    fn from(v: Fd) -> Self {
        Arg::Fd(v)
    }
}
