// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Envelopes of the protocol that the schema describes loosely (or not at all),
//! since their contents are opaque to the rest of the library.
use crate::mtp::DeserializeError;
use flate2::Compression;
use flate2::write::{GzDecoder, GzEncoder};
use mtcore_tl::{self as tl, Cursor, Deserializable, Identifiable, Serializable};
use std::io::{self, Write};

/// A message as found inside an encrypted payload or a container.
///
/// The `body` is kept raw; it is only parsed once its constructor is known.
pub(crate) struct Message {
    pub msg_id: i64,
    pub seq_no: i32,
    pub body: Vec<u8>,
}

impl Message {
    // msg_id (8 bytes), seq_no (4 bytes), bytes (4 len)
    pub const SIZE_OVERHEAD: usize = 16;

    pub fn constructor_id(&self) -> Result<u32, tl::deserialize::Error> {
        u32::from_bytes(&self.body)
    }

    /// Only [content-related] messages have an odd sequence number.
    ///
    /// [content-related]: https://core.telegram.org/mtproto/description#content-related-message
    pub fn requires_ack(&self) -> bool {
        self.seq_no % 2 == 1
    }

    /// Reads a message, rejecting lengths that could not belong to a valid one.
    pub fn read(buf: &mut Cursor) -> Result<Self, DeserializeError> {
        let msg_id = i64::deserialize(buf)?;
        let seq_no = i32::deserialize(buf)?;

        let len = i32::deserialize(buf)?;
        if len < 0 {
            return Err(DeserializeError::NegativeMessageLength { got: len });
        }
        let len = len as usize;
        if len > buf.remaining() {
            return Err(DeserializeError::TooLongMessageLength {
                got: len,
                max_length: buf.remaining(),
            });
        }

        let mut body = vec![0; len];
        buf.read_exact(&mut body)?;

        Ok(Message {
            msg_id,
            seq_no,
            body,
        })
    }
}

/// `rpc_result#f35c6d01 req_msg_id:long result:Object = RpcResult;`
pub(crate) struct RpcResult {
    pub req_msg_id: i64,
    pub result: Vec<u8>,
}

impl RpcResult {
    pub fn inner_constructor(&self) -> Result<u32, tl::deserialize::Error> {
        u32::from_bytes(&self.result)
    }
}

impl Identifiable for RpcResult {
    const CONSTRUCTOR_ID: u32 = 0xf35c6d01;
}

impl Deserializable for RpcResult {
    fn deserialize(buf: tl::deserialize::Buffer) -> tl::deserialize::Result<Self> {
        let id = u32::deserialize(buf)?;
        if id != Self::CONSTRUCTOR_ID {
            return Err(tl::deserialize::Error::UnexpectedConstructor { id });
        }

        let req_msg_id = i64::deserialize(buf)?;
        let mut result = Vec::new();
        buf.read_to_end(&mut result)?;

        Ok(Self { req_msg_id, result })
    }
}

/// `msg_container#73f1f8dc messages:vector<message> = MessageContainer;`
pub(crate) struct MessageContainer {
    pub messages: Vec<Message>,
}

impl MessageContainer {
    // constructor id (4 bytes), inner vec len (4 bytes)
    pub const SIZE_OVERHEAD: usize = 8;

    /// Largest payload the server accepts in a single container.
    pub const MAXIMUM_SIZE: usize = 1_044_456 - Self::SIZE_OVERHEAD;

    /// Most messages the server accepts in a single container.
    pub const MAXIMUM_LENGTH: usize = 100;

    pub fn read(buf: &mut Cursor) -> Result<Self, DeserializeError> {
        let id = u32::deserialize(buf)?;
        if id != Self::CONSTRUCTOR_ID {
            return Err(DeserializeError::UnexpectedConstructor { id });
        }

        let len = i32::deserialize(buf)?;
        if len < 0 {
            return Err(DeserializeError::NegativeMessageLength { got: len });
        }
        let len = len as usize;

        let mut messages = Vec::with_capacity(len.min(Self::MAXIMUM_LENGTH));
        for _ in 0..len {
            messages.push(Message::read(buf)?);
        }

        Ok(Self { messages })
    }
}

impl Identifiable for MessageContainer {
    const CONSTRUCTOR_ID: u32 = 0x73f1f8dc;
}

/// `msg_copy#e06046b2 orig_message:Message = MessageCopy;`
pub(crate) struct MessageCopy {
    pub orig_message: Message,
}

impl MessageCopy {
    pub fn read(buf: &mut Cursor) -> Result<Self, DeserializeError> {
        let id = u32::deserialize(buf)?;
        if id != Self::CONSTRUCTOR_ID {
            return Err(DeserializeError::UnexpectedConstructor { id });
        }
        Ok(Self {
            orig_message: Message::read(buf)?,
        })
    }
}

impl Identifiable for MessageCopy {
    const CONSTRUCTOR_ID: u32 = 0xe06046b2;
}

/// `gzip_packed#3072cfa1 packed_data:bytes = Object;`
pub(crate) struct GzipPacked {
    pub packed_data: Vec<u8>,
}

impl GzipPacked {
    pub fn new(unpacked_data: &[u8]) -> io::Result<Self> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(unpacked_data)?;
        Ok(Self {
            packed_data: encoder.finish()?,
        })
    }

    pub fn decompress(&self) -> Result<Vec<u8>, DeserializeError> {
        let mut decoder = GzDecoder::new(Vec::new());
        decoder
            .write_all(&self.packed_data)
            .map_err(|_| DeserializeError::DecompressionFailed)?;
        decoder
            .finish()
            .map_err(|_| DeserializeError::DecompressionFailed)
    }
}

impl Identifiable for GzipPacked {
    const CONSTRUCTOR_ID: u32 = 0x3072cfa1;
}

impl Serializable for GzipPacked {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.packed_data.serialize(buf);
    }
}

impl Deserializable for GzipPacked {
    fn deserialize(buf: tl::deserialize::Buffer) -> tl::deserialize::Result<Self> {
        let id = u32::deserialize(buf)?;
        if id != Self::CONSTRUCTOR_ID {
            return Err(tl::deserialize::Error::UnexpectedConstructor { id });
        }

        let packed_data = Vec::<u8>::deserialize(buf)?;
        Ok(Self { packed_data })
    }
}
