// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::transport;
use mtcore_crypto as crypto;
use mtcore_tl as tl;
use std::fmt;

/// Why an incoming payload could not be turned into messages.
#[derive(Clone, Debug, PartialEq)]
pub enum DeserializeError {
    /// `auth_key_id` differs from ours (or is not zero for plain messages).
    BadAuthKey { got: i64, expected: i64 },

    /// A plain message id that is not a valid server id.
    BadMessageId { got: i64 },

    /// The message belongs to another session.
    BadSessionId { got: i64, expected: i64 },

    NegativeMessageLength { got: i32 },

    /// A length prefix that points past the end of the payload.
    TooLongMessageLength { got: usize, max_length: usize },

    /// The payload ended before a complete message could be read.
    Truncated,

    /// `gzip_packed` data that would not inflate.
    DecompressionFailed,

    UnexpectedConstructor { id: u32 },

    Decryption(crypto::Error),

    /// A four-byte negative status sent in place of a message.
    Transport(transport::Error),
}

impl std::error::Error for DeserializeError {}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadAuthKey { got, expected } => {
                write!(f, "auth key id mismatch: {got} != {expected}")
            }
            Self::BadMessageId { got } => write!(f, "invalid server msg_id {got}"),
            Self::BadSessionId { got, expected } => {
                write!(f, "session id mismatch: {got} != {expected}")
            }
            Self::NegativeMessageLength { got } => write!(f, "negative message length {got}"),
            Self::TooLongMessageLength { got, max_length } => {
                write!(f, "message length {got} exceeds the {max_length} bytes available")
            }
            Self::Truncated => f.write_str("payload too short for a message"),
            Self::DecompressionFailed => f.write_str("could not inflate gzip_packed data"),
            Self::UnexpectedConstructor { id } => {
                write!(f, "unexpected constructor {id:08x} ({})", tl::name_for_id(*id))
            }
            Self::Decryption(error) => write!(f, "decryption failed: {error}"),
            Self::Transport(error) => write!(f, "{error}"),
        }
    }
}

impl From<tl::deserialize::Error> for DeserializeError {
    fn from(error: tl::deserialize::Error) -> Self {
        match error {
            tl::deserialize::Error::UnexpectedEof => Self::Truncated,
            tl::deserialize::Error::UnexpectedConstructor { id } => {
                Self::UnexpectedConstructor { id }
            }
        }
    }
}

impl From<crypto::Error> for DeserializeError {
    fn from(error: crypto::Error) -> Self {
        Self::Decryption(error)
    }
}

impl From<transport::Error> for DeserializeError {
    fn from(error: transport::Error) -> Self {
        Self::Transport(error)
    }
}
