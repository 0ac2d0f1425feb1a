// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! All of the bare types, each represented by a `struct`.
//!
//! All of them implement [`crate::Identifiable`], [`crate::Serializable`]
//! and [`crate::Deserializable`].
#![allow(clippy::unreadable_literal)]

use crate::deserialize::{Buffer, Result};
use crate::{Deserializable, Identifiable, Serializable};

// Service messages of the Mobile Transport Protocol itself.

tl_type!(ResPq = 0x05162463 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    pq: Vec<u8>,
    server_public_key_fingerprints: Vec<i64>,
});

tl_type!(PQInnerData = 0x83c95aec {
    pq: Vec<u8>,
    p: Vec<u8>,
    q: Vec<u8>,
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce: [u8; 32],
});

tl_type!(ServerDhParamsFail = 0x79cb045d {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce_hash: [u8; 16],
});

tl_type!(ServerDhParamsOk = 0xd0e8075c {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    encrypted_answer: Vec<u8>,
});

tl_type!(ServerDhInnerData = 0xb5890dba {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    g: i32,
    dh_prime: Vec<u8>,
    g_a: Vec<u8>,
    server_time: i32,
});

tl_type!(ClientDhInnerData = 0x6643b654 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    retry_id: i64,
    g_b: Vec<u8>,
});

tl_type!(DhGenOk = 0x3bcbf734 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce_hash1: [u8; 16],
});

tl_type!(DhGenRetry = 0x46dc1fb9 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce_hash2: [u8; 16],
});

tl_type!(DhGenFail = 0xa69dae02 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce_hash3: [u8; 16],
});

tl_type!(RpcError = 0x2144ca19 {
    error_code: i32,
    error_message: String,
});

tl_type!(RpcAnswerUnknown = 0x5e2ad36e {});

tl_type!(RpcAnswerDroppedRunning = 0xcd78e586 {});

tl_type!(RpcAnswerDropped = 0xa43ad8b7 {
    msg_id: i64,
    seq_no: i32,
    bytes: i32,
});

tl_type!(FutureSalt = 0x0949d9dc {
    valid_since: i32,
    valid_until: i32,
    salt: i64,
});

tl_type!(FutureSalts = 0xae500895 {
    req_msg_id: i64,
    now: i32,
    salts: crate::RawVec<FutureSalt>,
});

tl_type!(Pong = 0x347773c5 {
    msg_id: i64,
    ping_id: i64,
});

tl_type!(DestroySessionOk = 0xe22045fc { session_id: i64 });

tl_type!(DestroySessionNone = 0x62d350c9 { session_id: i64 });

tl_type!(NewSessionCreated = 0x9ec20908 {
    first_msg_id: i64,
    unique_id: i64,
    server_salt: i64,
});

tl_type!(MsgsAck = 0x62d6b459 { msg_ids: Vec<i64> });

tl_type!(BadMsgNotification = 0xa7eff811 {
    bad_msg_id: i64,
    bad_msg_seqno: i32,
    error_code: i32,
});

tl_type!(BadServerSalt = 0xedab447b {
    bad_msg_id: i64,
    bad_msg_seqno: i32,
    error_code: i32,
    new_server_salt: i64,
});

tl_type!(MsgResendReq = 0x7d861a08 { msg_ids: Vec<i64> });

tl_type!(MsgResendAnsReq = 0x8610baeb { msg_ids: Vec<i64> });

tl_type!(MsgsStateReq = 0xda69fb52 { msg_ids: Vec<i64> });

tl_type!(MsgsStateInfo = 0x04deb57d {
    req_msg_id: i64,
    info: Vec<u8>,
});

tl_type!(MsgsAllInfo = 0x8cc0d131 {
    msg_ids: Vec<i64>,
    info: Vec<u8>,
});

tl_type!(MsgDetailedInfo = 0x276d3ec6 {
    msg_id: i64,
    answer_msg_id: i64,
    bytes: i32,
    status: i32,
});

tl_type!(MsgNewDetailedInfo = 0x809db6df {
    answer_msg_id: i64,
    bytes: i32,
    status: i32,
});

tl_type!(HttpWait = 0x9299359f {
    max_delay: i32,
    wait_after: i32,
    max_wait: i32,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_of_longs_are_boxed() {
        let ack = MsgsAck {
            msg_ids: vec![1, 2],
        };
        let bytes = ack.to_bytes();
        assert_eq!(&bytes[..4], &0x62d6b459u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &0x1cb5c415u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
        assert_eq!(bytes.len(), 4 + 4 + 4 + 2 * 8);
        assert_eq!(MsgsAck::from_bytes(&bytes), Ok(ack));
    }

    #[test]
    fn nonces_are_written_raw() {
        let pq = ResPq {
            nonce: [1; 16],
            server_nonce: [2; 16],
            pq: vec![0x17, 0xed, 0x48, 0x94, 0x1a, 0x08, 0xf9, 0x81],
            server_public_key_fingerprints: vec![-1],
        };
        let bytes = pq.to_bytes();
        assert_eq!(&bytes[4..20], &[1; 16]);
        assert_eq!(&bytes[20..36], &[2; 16]);
        // One byte of length, eight of data and three of padding.
        assert_eq!(bytes[36], 8);
        assert_eq!(ResPq::from_bytes(&bytes), Ok(pq));
    }

    #[test]
    fn wrong_constructor_is_rejected() {
        let pong = Pong {
            msg_id: 1,
            ping_id: 2,
        };
        let mut bytes = pong.to_bytes();
        bytes[0] ^= 0xff;
        assert!(Pong::from_bytes(&bytes).is_err());
    }
}
