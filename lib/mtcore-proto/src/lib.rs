// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This library is an implementation of the [Mobile Transport Protocol].
//!
//! It is split in three layers:
//!
//! * [`transport`] frames the payload so that it can be sent over a stream.
//! * [`mtp`] wraps requests into messages, encrypts them, and makes sense of
//!   the many service messages the server responds with.
//! * [`authentication`] generates the authorization key the encrypted
//!   protocol needs in the first place.
//!
//! None of the layers perform any I/O. They only transform bytes.
//!
//! [Mobile Transport Protocol]: https://core.telegram.org/mtproto
#![deny(unsafe_code)]

pub mod authentication;
mod manual_tl;
pub mod mtp;
pub mod transport;
mod utils;

/// The default compression threshold to be used.
///
/// Every request is compressed, as long as the result ends up being smaller.
pub const DEFAULT_COMPRESSION_THRESHOLD: Option<usize> = Some(0);

/// A Message Identifier.
///
/// When requests are serialized, a new message identifier is attached to them.
/// This can be used to map the responses back to their original requests.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MsgId(pub i64);
