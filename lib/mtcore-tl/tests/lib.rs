// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use mtcore_tl::{Deserializable, RawVec, Serializable, enums, types};

include!("../../includes/check_deps_documented.rs");

#[test]
fn future_salts_survive_transmission() {
    let salts = enums::FutureSalts::Salts(types::FutureSalts {
        req_msg_id: 0x5e0b_800e_0000_0004,
        now: 1_700_000_000,
        salts: RawVec(vec![
            types::FutureSalt {
                valid_since: 1_700_000_000,
                valid_until: 1_700_001_800,
                salt: -7,
            },
            types::FutureSalt {
                valid_since: 1_700_001_800,
                valid_until: 1_700_003_600,
                salt: 42,
            },
        ]),
    });

    let bytes = salts.to_bytes();
    assert_eq!(bytes.len() % 4, 0);
    // Bare vector: constructor, two longs, an int, then the element count.
    assert_eq!(&bytes[20..24], &2i32.to_le_bytes());
    assert_eq!(enums::FutureSalts::from_bytes(&bytes), Ok(salts));
}

#[test]
fn server_dh_params_keep_padded_answer() {
    let params = enums::ServerDhParams::Ok(types::ServerDhParamsOk {
        nonce: [1; 16],
        server_nonce: [2; 16],
        encrypted_answer: vec![0xab; 300],
    });

    let bytes = params.to_bytes();
    assert_eq!(bytes.len() % 4, 0);
    // Long strings use the 0xfe marker followed by a three byte length.
    assert_eq!(&bytes[36..40], &[0xfe, 0x2c, 0x01, 0x00]);
    match enums::ServerDhParams::from_bytes(&bytes).unwrap() {
        enums::ServerDhParams::Ok(ok) => assert_eq!(ok.encrypted_answer.len(), 300),
        other => panic!("unexpected params: {other:?}"),
    }
}
