// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::{Deserialization, DeserializeError, Mtp, RpcResult};
use crate::{MsgId, utils};
use mtcore_crypto::DequeBuffer;
use mtcore_tl::{Cursor, Deserializable};

/// auth_key_id (8 bytes), msg_id (8 bytes), message_data_length (4 bytes).
pub const PLAIN_PACKET_HEADER_LEN: usize = 8 + 8 + 4;

/// An implementation of the [Mobile Transport Protocol] for plaintext
/// (unencrypted) messages.
///
/// Plain messages are only used to generate the authorization key, so a
/// single request is carried at a time: once a request has been pushed,
/// further pushes return `None` until the buffer is finalized.
///
/// [Mobile Transport Protocol]: https://core.telegram.org/mtproto
pub struct Plain {
    last_msg_id: i64,
    pending: Option<MsgId>,
}

#[allow(clippy::new_without_default)]
impl Plain {
    pub fn new() -> Self {
        Self {
            last_msg_id: 0,
            pending: None,
        }
    }
}

impl Mtp for Plain {
    /// Wraps a request's data into a plain message (also known as
    /// [unencrypted messages]).
    ///
    /// [unencrypted messages]: https://core.telegram.org/mtproto/description#unencrypted-message
    fn push(&mut self, buffer: &mut DequeBuffer<u8>, request: &[u8]) -> Option<MsgId> {
        if self.pending.is_some() {
            return None;
        }
        assert_eq!(request.len() % 4, 0);

        self.last_msg_id = utils::new_msg_id(0, self.last_msg_id);
        let msg_id = MsgId(self.last_msg_id);
        buffer.extend(request.iter().copied());
        self.pending = Some(msg_id);
        Some(msg_id)
    }

    fn finalize(&mut self, buffer: &mut DequeBuffer<u8>) -> Option<MsgId> {
        let msg_id = self.pending.take()?;

        let mut header = [0; PLAIN_PACKET_HEADER_LEN];
        // auth_key_id = 0
        header[8..16].copy_from_slice(&msg_id.0.to_le_bytes());
        header[16..].copy_from_slice(&(buffer.len() as i32).to_le_bytes());
        buffer.extend_front(&header);

        Some(msg_id)
    }

    /// Validates that the returned data is a correct plain message, and
    /// if it is, returns its inner contents as the result of the last request.
    fn deserialize(&mut self, payload: &[u8]) -> Result<Vec<Deserialization>, DeserializeError> {
        utils::check_message_buffer(payload)?;

        let mut buf = Cursor::from_slice(payload);
        let auth_key_id = i64::deserialize(&mut buf)?;
        if auth_key_id != 0 {
            return Err(DeserializeError::BadAuthKey {
                got: auth_key_id,
                expected: 0,
            });
        }

        let msg_id = i64::deserialize(&mut buf)?;
        // We can't validate it's close to our system time because our system
        // time may be wrong at this point (it only matters once encrypted
        // communication begins). However, server message identifiers that
        // respond to a client message are always 1 modulo 4.
        // https://core.telegram.org/mtproto/description#message-identifier-msg-id
        if msg_id <= 0 || (msg_id % 4) != 1 {
            return Err(DeserializeError::BadMessageId { got: msg_id });
        }

        let len = i32::deserialize(&mut buf)?;
        if len <= 0 {
            return Err(DeserializeError::NegativeMessageLength { got: len });
        }
        let len = len as usize;
        if PLAIN_PACKET_HEADER_LEN + len > payload.len() {
            return Err(DeserializeError::TooLongMessageLength {
                got: len,
                max_length: payload.len() - PLAIN_PACKET_HEADER_LEN,
            });
        }

        Ok(vec![Deserialization::RpcResult(RpcResult {
            msg_id: MsgId(self.last_msg_id),
            body: payload[PLAIN_PACKET_HEADER_LEN..PLAIN_PACKET_HEADER_LEN + len].into(),
        })])
    }

    fn reset(&mut self) {
        self.pending = None;
    }
}
