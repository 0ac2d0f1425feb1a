// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! All of the boxed types, each represented by an `enum`.
//!
//! All of them implement [`crate::Serializable`] and [`crate::Deserializable`],
//! and can be built `From` any of their variants' types.
#![allow(clippy::large_enum_variant)]

use crate::types;

tl_enum!(ResPq { Pq(types::ResPq) });

tl_enum!(PQInnerData { Data(types::PQInnerData) });

tl_enum!(ServerDhParams {
    Fail(types::ServerDhParamsFail),
    Ok(types::ServerDhParamsOk),
});

tl_enum!(ServerDhInnerData { Data(types::ServerDhInnerData) });

tl_enum!(ClientDhInnerData { Data(types::ClientDhInnerData) });

tl_enum!(SetClientDhParamsAnswer {
    DhGenOk(types::DhGenOk),
    DhGenRetry(types::DhGenRetry),
    DhGenFail(types::DhGenFail),
});

tl_enum!(RpcError { Error(types::RpcError) });

tl_enum!(RpcDropAnswer {
    RpcAnswerUnknown(types::RpcAnswerUnknown),
    RpcAnswerDroppedRunning(types::RpcAnswerDroppedRunning),
    RpcAnswerDropped(types::RpcAnswerDropped),
});

tl_enum!(FutureSalt { Salt(types::FutureSalt) });

tl_enum!(FutureSalts { Salts(types::FutureSalts) });

tl_enum!(Pong { Pong(types::Pong) });

tl_enum!(DestroySessionRes {
    DestroySessionOk(types::DestroySessionOk),
    DestroySessionNone(types::DestroySessionNone),
});

tl_enum!(NewSession { Created(types::NewSessionCreated) });

tl_enum!(MsgsAck { Ack(types::MsgsAck) });

tl_enum!(BadMsgNotification {
    Notification(types::BadMsgNotification),
    BadServerSalt(types::BadServerSalt),
});

tl_enum!(MsgResendReq {
    Req(types::MsgResendReq),
    MsgResendAnsReq(types::MsgResendAnsReq),
});

tl_enum!(MsgsStateReq { Req(types::MsgsStateReq) });

tl_enum!(MsgsStateInfo { Info(types::MsgsStateInfo) });

tl_enum!(MsgsAllInfo { Info(types::MsgsAllInfo) });

tl_enum!(MsgDetailedInfo {
    Info(types::MsgDetailedInfo),
    MsgNewDetailedInfo(types::MsgNewDetailedInfo),
});

tl_enum!(HttpWait { Wait(types::HttpWait) });
