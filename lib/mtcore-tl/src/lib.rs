// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Type Language runtime for the Mobile Transport Protocol core.
//!
//! This crate contains the [Binary Data Serialization] primitives along
//! with the Rust definitions for the [`types`], [`enums`] and [`functions`]
//! of the MTProto service schema, used by the handshake and the service
//! messages. The API layer lives in `grammers-tl-types`; its requests travel
//! through the sender already serialized, as a [`Blob`].
//! Types implement [`Serializable`] and [`Deserializable`]; functions
//! implement [`Serializable`] and [`RemoteCall`].
//!
//! [Binary Data Serialization]: https://core.telegram.org/mtproto/serialize
#![deny(unsafe_code)]

#[macro_use]
mod macros;

pub mod deserialize;
pub mod enums;
pub mod functions;
mod serialize;
pub mod types;

pub use deserialize::{Cursor, Deserializable};
pub use serialize::Serializable;

/// The concrete `vector` bare type, as opposed to the boxed `Vector`.
/// The boxed form is represented by a plain `Vec`.
#[derive(Clone, Debug, PartialEq)]
pub struct RawVec<T>(pub Vec<T>);

/// An unparsed blob, which should not be deserialized as a bytes string.
/// Used by generic results that pass the underlying object along untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob(pub Vec<u8>);

impl From<Vec<u8>> for Blob {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// Anything implementing this trait is identifiable by both ends (client-server)
/// when performing Remote Procedure Calls (RPC) and transmission of objects.
pub trait Identifiable {
    /// The unique identifier for the type.
    const CONSTRUCTOR_ID: u32;
}

/// Structures implementing this trait indicate that they are suitable for
/// use to perform Remote Procedure Calls (RPC), and know what the type of
/// the response will be.
pub trait RemoteCall: Serializable {
    /// The type of the "return" value coming from the other end of the connection.
    type Return: Deserializable;
}

/// A request that was already serialized, such as one waiting in a queue.
/// Its result is left untouched for the caller to deserialize.
impl RemoteCall for Blob {
    type Return = Blob;
}

macro_rules! name_table {
    ($($ty:ty => $name:literal,)+) => {
        const NAMES: &[(u32, &str)] = &[
            $((<$ty as Identifiable>::CONSTRUCTOR_ID, $name),)+
        ];
    };
}

name_table! {
    types::ResPq => "resPQ",
    types::PQInnerData => "p_q_inner_data",
    types::ServerDhParamsFail => "server_DH_params_fail",
    types::ServerDhParamsOk => "server_DH_params_ok",
    types::ServerDhInnerData => "server_DH_inner_data",
    types::ClientDhInnerData => "client_DH_inner_data",
    types::DhGenOk => "dh_gen_ok",
    types::DhGenRetry => "dh_gen_retry",
    types::DhGenFail => "dh_gen_fail",
    types::RpcError => "rpc_error",
    types::RpcAnswerUnknown => "rpc_answer_unknown",
    types::RpcAnswerDroppedRunning => "rpc_answer_dropped_running",
    types::RpcAnswerDropped => "rpc_answer_dropped",
    types::FutureSalt => "future_salt",
    types::FutureSalts => "future_salts",
    types::Pong => "pong",
    types::DestroySessionOk => "destroy_session_ok",
    types::DestroySessionNone => "destroy_session_none",
    types::NewSessionCreated => "new_session_created",
    types::MsgsAck => "msgs_ack",
    types::BadMsgNotification => "bad_msg_notification",
    types::BadServerSalt => "bad_server_salt",
    types::MsgResendReq => "msg_resend_req",
    types::MsgResendAnsReq => "msg_resend_ans_req",
    types::MsgsStateReq => "msgs_state_req",
    types::MsgsStateInfo => "msgs_state_info",
    types::MsgsAllInfo => "msgs_all_info",
    types::MsgDetailedInfo => "msg_detailed_info",
    types::MsgNewDetailedInfo => "msg_new_detailed_info",
    types::HttpWait => "http_wait",
    functions::ReqPqMulti => "req_pq_multi",
    functions::ReqDhParams => "req_DH_params",
    functions::SetClientDhParams => "set_client_DH_params",
    functions::RpcDropAnswer => "rpc_drop_answer",
    functions::GetFutureSalts => "get_future_salts",
    functions::Ping => "ping",
    functions::PingDelayDisconnect => "ping_delay_disconnect",
    functions::DestroySession => "destroy_session",
    functions::InvokeAfterMsg<functions::Ping> => "invokeAfterMsg",
}

// Envelopes that are not regular constructors of the schema.
const ENVELOPE_NAMES: &[(u32, &str)] = &[
    (0xf35c6d01, "rpc_result"),
    (0x73f1f8dc, "msg_container"),
    (0xe06046b2, "msg_copy"),
    (0x3072cfa1, "gzip_packed"),
    (0x1cb5c415, "vector"),
    (0x997275b5, "boolTrue"),
    (0xbc799737, "boolFalse"),
];

/// Name of the definition with the given constructor identifier, for logging purposes.
///
/// Returns `"(unknown)"` for constructors outside of this crate's schema.
pub fn name_for_id(id: u32) -> &'static str {
    NAMES
        .iter()
        .chain(ENVELOPE_NAMES)
        .find(|(cid, _)| *cid == id)
        .map(|(_, name)| *name)
        .unwrap_or("(unknown)")
}
