// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Message-level framing of [MTProto](https://core.telegram.org/mtproto/description).
//!
//! [`Plain`] is only good for generating an authorization key. Everything
//! afterwards goes through [`Encrypted`], which owns the session state.
mod encrypted;
mod error;
mod plain;
mod results;

use crate::MsgId;
use mtcore_crypto::DequeBuffer;

pub use encrypted::{Builder, ENCRYPTED_PACKET_HEADER_LEN, Encrypted, MESSAGE_CONTAINER_HEADER_LEN};
pub use error::DeserializeError;
pub use plain::{PLAIN_PACKET_HEADER_LEN, Plain};
pub use results::{
    BadMessage, Deserialization, DeserializationFailure, RpcResult, RpcResultError,
};

/// Turns request bodies into outgoing messages and incoming payloads into results.
pub trait Mtp {
    /// Append `request` to the batch being built in `buffer`.
    ///
    /// Returns the id given to the message, or `None` once the batch is full.
    ///
    /// # Panics
    ///
    /// If `request` is not a multiple of four bytes long, or exceeds roughly 1 MiB.
    fn push(&mut self, buffer: &mut DequeBuffer<u8>, request: &[u8]) -> Option<MsgId>;

    /// Close the batch, wrapping it in a container when needed.
    ///
    /// Pending acknowledgements and other service messages may be added even
    /// when nothing was pushed. Returns the outermost message id written, if any.
    fn finalize(&mut self, buffer: &mut DequeBuffer<u8>) -> Option<MsgId>;

    /// Read one payload received from the transport.
    fn deserialize(&mut self, payload: &[u8]) -> Result<Vec<Deserialization>, DeserializeError>;

    /// Forget all session state.
    fn reset(&mut self);
}
