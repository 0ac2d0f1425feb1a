// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::DeserializeError;
use crate::MsgId;
use mtcore_tl as tl;

/// A request that completed, along with its still-serialized answer.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcResult {
    pub msg_id: MsgId,
    pub body: Vec<u8>,
}

/// A request the server answered with `rpc_error`.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcResultError {
    pub msg_id: MsgId,
    pub error: tl::types::RpcError,
}

/// A `bad_msg_notification` or `bad_server_salt` addressed at one of our messages.
///
/// `msg_id` may name a container rather than the request itself.
#[derive(Clone, Debug, PartialEq)]
pub struct BadMessage {
    pub msg_id: MsgId,
    pub code: i32,
}

/// An answer was addressed at one of our messages but could not be read.
#[derive(Clone, Debug, PartialEq)]
pub struct DeserializationFailure {
    pub msg_id: MsgId,
    pub error: DeserializeError,
}

/// One unit of work produced by reading an incoming payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Deserialization {
    Update(Vec<u8>),
    RpcResult(RpcResult),
    RpcError(RpcResultError),
    BadMessage(BadMessage),
    Failure(DeserializationFailure),
}

#[derive(Clone, Copy, PartialEq)]
enum Severity {
    /// Local state was adjusted; a resend under a fresh id should go through.
    Corrected,
    /// Only a broken client can produce this.
    Bug,
    /// Neither of the above; the request fails.
    Final,
}

// https://core.telegram.org/mtproto/service_messages_about_messages
const BAD_MSG_CODES: &[(i32, Severity, &str)] = &[
    (16, Severity::Corrected, "msg_id too low, clock adjusted"),
    (17, Severity::Corrected, "msg_id too high, clock adjusted"),
    (18, Severity::Bug, "msg_id lower bits are not 01"),
    (19, Severity::Bug, "container msg_id reused"),
    (20, Severity::Final, "message too old to be processed"),
    (32, Severity::Corrected, "msg_seqno too low, sequence bumped"),
    (33, Severity::Corrected, "msg_seqno too high, sequence lowered"),
    (34, Severity::Bug, "even msg_seqno expected"),
    (35, Severity::Bug, "odd msg_seqno expected"),
    (48, Severity::Corrected, "server salt replaced"),
    (64, Severity::Bug, "malformed container"),
];

impl BadMessage {
    fn lookup(&self) -> Option<(Severity, &'static str)> {
        BAD_MSG_CODES
            .iter()
            .find(|(code, _, _)| *code == self.code)
            .map(|&(_, severity, text)| (severity, text))
    }

    /// Human-readable meaning of `code`.
    pub fn description(&self) -> &'static str {
        self.lookup()
            .map_or("unrecognised bad message code", |(_, text)| text)
    }

    /// The request may be resent as-is under a new message id.
    pub fn retryable(&self) -> bool {
        matches!(self.lookup(), Some((Severity::Corrected, _)))
    }

    /// The code points at a defect in message construction.
    pub fn fatal(&self) -> bool {
        matches!(self.lookup(), Some((Severity::Bug, _)))
    }
}
