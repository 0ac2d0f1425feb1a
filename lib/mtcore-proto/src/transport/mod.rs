// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Implementation of the several [MTProto transports]. This layer is
//! responsible for taking serialized messages from the MTP and packing them
//! in a format that can be sent over a stream-oriented protocol, such as TCP.
//!
//! Packing happens in-place: the transport header is prepended to the
//! [`DequeBuffer`] holding the payload. Unpacking does not copy either;
//! it reports where the payload lives within the input.
//!
//! [MTProto transports]: https://core.telegram.org/mtproto#mtproto-transport
mod abridged;
mod full;
mod intermediate;

pub use abridged::Abridged;
pub use full::Full;
pub use intermediate::Intermediate;
use mtcore_crypto::DequeBuffer;
use std::fmt;

/// The most bytes a transport will ever prepend to a payload,
/// including the one-time connection preamble.
pub const MAX_TRANSPORT_HEADER_LEN: usize = 8;

/// The error type reported by the different transports when something is wrong.
///
/// Certain transports will only produce certain variants of this error.
///
/// Unless the variant is `MissingBytes`, the connection should not continue.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Not enough bytes are provided. More should be read before retrying.
    MissingBytes,

    /// The length is either too short or too long to represent a valid packet.
    BadLen { got: i32 },

    /// The sequence number received does not match the expected value.
    BadSeq { expected: i32, got: i32 },

    /// The checksum of the packet does not match its expected value.
    BadCrc { expected: u32, got: u32 },

    /// A negative length was received, indicating a [transport-level error].
    /// The absolute value behaves like an HTTP status code:
    ///
    /// * 404, if the authorization key used was not found by the server.
    /// * 429, if too many transport connections were opened from the same address.
    ///
    /// [transport-level error]: https://core.telegram.org/mtproto/mtproto-transports#transport-errors
    BadStatus { status: u32 },
}

/// Where the payload of a frame lies within the buffer given to [`Transport::unpack`].
#[derive(Clone, Debug, PartialEq)]
pub struct UnpackedOffset {
    pub data_start: usize,
    pub data_end: usize,
    /// Where the next frame begins. Everything before it may be discarded.
    pub next_offset: usize,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: ")?;
        match self {
            Error::MissingBytes => write!(f, "need more bytes"),
            Error::BadLen { got } => write!(f, "bad len (got {got})"),
            Error::BadSeq { expected, got } => {
                write!(f, "bad seq (expected {expected}, got {got})")
            }
            Error::BadCrc { expected, got } => {
                write!(f, "bad crc (expected {expected}, got {got})")
            }
            Error::BadStatus { status } => {
                write!(f, "bad status (negative length -{status})")
            }
        }
    }
}

/// The trait implemented by every framing of the transport layer.
pub trait Transport {
    /// Packs the payload in `buffer` in-place, prepending the frame header
    /// (and appending the trailer, if any).
    ///
    /// The first call after creation or [`Transport::reset`] also prepends
    /// the connection preamble, if the framing uses one.
    ///
    /// # Panics
    ///
    /// Panics if `buffer.len()` is not divisible by 4.
    fn pack(&mut self, buffer: &mut DequeBuffer<u8>);

    /// Finds the first frame in `buffer`.
    ///
    /// Subsequent calls should be made with the bytes before
    /// [`UnpackedOffset::next_offset`] removed.
    fn unpack(&mut self, buffer: &[u8]) -> Result<UnpackedOffset, Error>;

    /// Reset the state, as if a new instance was just created.
    fn reset(&mut self);
}

/// Reads a little-endian `i32` at `offset`. The caller has checked the length.
fn read_i32(buffer: &[u8], offset: usize) -> i32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&buffer[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}
