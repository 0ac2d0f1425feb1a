// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! All of the functions, each represented by a `struct`.
//!
//! All of them implement [`crate::Identifiable`] and [`crate::Serializable`].
//! The type the server answers with is the associated type in their
//! [`crate::RemoteCall`] implementation.
#![allow(clippy::unreadable_literal)]

use crate::{Identifiable, RemoteCall, Serializable, enums};

tl_function!(ReqPqMulti = 0xbe7e8ef1 { nonce: [u8; 16] } -> enums::ResPq);

tl_function!(ReqDhParams = 0xd712e4be {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    p: Vec<u8>,
    q: Vec<u8>,
    public_key_fingerprint: i64,
    encrypted_data: Vec<u8>,
} -> enums::ServerDhParams);

tl_function!(SetClientDhParams = 0xf5045f1f {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    encrypted_data: Vec<u8>,
} -> enums::SetClientDhParamsAnswer);

tl_function!(RpcDropAnswer = 0x58e4a740 { req_msg_id: i64 } -> enums::RpcDropAnswer);

tl_function!(GetFutureSalts = 0xb921bd04 { num: i32 } -> enums::FutureSalts);

tl_function!(Ping = 0x7abe77ec { ping_id: i64 } -> enums::Pong);

tl_function!(
    /// Ping that also asks the server to close the connection if no other
    /// ping arrives within `disconnect_delay` seconds.
    PingDelayDisconnect = 0xf3427b8c {
        ping_id: i64,
        disconnect_delay: i32,
    } -> enums::Pong
);

tl_function!(DestroySession = 0xe7512126 { session_id: i64 } -> enums::DestroySessionRes);

/// `invokeAfterMsg#cb9f372d {X:Type} msg_id:long query:!X = X;`
///
/// Asks the server to process `query` only once the message `msg_id` has been processed.
#[derive(Clone, Debug, PartialEq)]
pub struct InvokeAfterMsg<X: RemoteCall> {
    pub msg_id: i64,
    pub query: X,
}

impl<X: RemoteCall> Identifiable for InvokeAfterMsg<X> {
    const CONSTRUCTOR_ID: u32 = 0xcb9f372d;
}

impl<X: RemoteCall> Serializable for InvokeAfterMsg<X> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.msg_id.serialize(buf);
        self.query.serialize(buf);
    }
}

impl<X: RemoteCall> RemoteCall for InvokeAfterMsg<X> {
    type Return = X::Return;
}
