//! # Westpack
//!
//! The wire codec for an object-oriented RPC protocol modeled on the Wayland wire format.
//!
//! ## Format
//!
//! - **Header**: `[Target: 4b][Size << 16 | Opcode: 4b]`
//! - **Words**: `int`, `uint`, `fixed`, `object`, `new_id` are one 4-byte word each.
//! - **Blobs**: `string` and `array` are `[Len: 4b][Data: Len][Pad: 0..3]`, padded to a word.
//! - **Fds**: carried out-of-band by the transport, never inlined.
//!
//! All integers are Little-Endian.
//!
//! ## Philosophy
//!
//! - **Closed Kinds**: The set of argument kinds is fixed by the protocol, so `Arg` is a
//!   plain enum and every codec path is an exhaustive `match`.
//! - **Bounded**: Decoders are bounds-checked views over a borrowed slice. A length that
//!   reaches past the message boundary is an error, never a panic.

pub mod types;
pub mod cursor;
pub mod fixed;
pub mod arg;
pub mod encoder;
pub mod decoder;
pub mod message;

pub use types::ArgKind;
pub use types::Error;
pub use types::Fd;
pub use types::ObjectId;
pub use types::Result;

pub use fixed::Fixed;

pub use arg::Arg;
pub use arg::round_up4;

pub use cursor::Cursor;

pub use encoder::Encoder;
pub use encoder::Packet;

pub use decoder::Decoder;

pub use message::Frames;
pub use message::HEADER_SIZE;
pub use message::Header;
pub use message::MAX_MESSAGE_SIZE;
pub use message::Message;
pub use message::RawMessage;
pub use message::encode_all;
pub use message::encode_prefix;
pub use message::split;
