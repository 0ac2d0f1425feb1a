// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The steps required to generate an authorization key.
//!
//! Each step consumes the data produced by the previous one together with
//! the server's response, so the steps cannot be run out of order. Any
//! mismatch aborts the exchange; callers start over from [`step1`].
//!
//! # Examples
//!
//! ```no_run
//! use mtcore_proto::authentication;
//!
//! fn send_data_to_server(request: &[u8]) -> Result<Vec<u8>, authentication::Error> {
//!     unimplemented!()
//! }
//!
//! fn main() -> Result<(), authentication::Error> {
//!     let (request, data) = authentication::step1()?;
//!     let response = send_data_to_server(&request)?;
//!
//!     let (request, data) = authentication::step2(data, &response)?;
//!     let response = send_data_to_server(&request)?;
//!
//!     let (request, data) = authentication::step3(data, &response)?;
//!     let response = send_data_to_server(&request)?;
//!
//!     let authentication::Finished { auth_key, .. } = authentication::create_key(data, &response)?;
//!     // Now you have a secure `auth_key` to send encrypted messages to server.
//!     Ok(())
//! }
//! ```
use crate::utils;
use log::{debug, trace};
use mtcore_crypto::{self as crypto, AuthKey, aes, factorize::factorize, hex, rsa, sha1};
use mtcore_tl::{self as tl, Cursor, Deserializable, RemoteCall, Serializable};
use num_bigint::BigUint;
use std::fmt;

/// Represents an error that occured during the generation of an
/// authorization key.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The response data was invalid and did not match our expectations.
    InvalidResponse {
        /// The inner error that caused the invalid response.
        error: tl::deserialize::Error,
    },

    /// The server's nonce did not match ours.
    InvalidNonce {
        /// The unexpected nonce that we got.
        got: [u8; 16],

        /// The expected nonce.
        expected: [u8; 16],
    },

    /// The server's PQ number was not of the right size.
    InvalidPQSize {
        /// The unexpected size that we got.
        size: usize,
    },

    /// The server's PQ number could not be split into two factors.
    InvalidPQ {
        /// The number that failed to factorize.
        pq: u64,
    },

    /// None of the server fingerprints are known to us.
    UnknownFingerprints {
        /// The list of fingerprint that we got.
        fingerprints: Vec<i64>,
    },

    /// The server failed to send the Diffie-Hellman parameters.
    DHParamsFail,

    /// The server's nonce has changed during the key exchange.
    InvalidServerNonce {
        /// The unexpected nonce that we got.
        got: [u8; 16],

        /// The expected nonce.
        expected: [u8; 16],
    },

    /// The server's `encrypted_data` is not correctly padded.
    EncryptedResponseNotPadded {
        /// The non-padded length of the response.
        len: usize,
    },

    /// An error occured while trying to read the DH inner data.
    InvalidDhInnerData {
        /// The inner error that occured when reading the data.
        error: tl::deserialize::Error,
    },

    /// Some parameter (`g`, `g_a` or `g_b`) was out of range.
    GParameterOutOfRange {
        value: BigUint,
        low: BigUint,
        high: BigUint,
    },

    /// The generation of Diffie-Hellman parameters is to be retried.
    DHGenRetry,

    /// The generation of Diffie-Hellman parameters failed.
    DHGenFail,

    /// The plaintext answer hash did not match.
    InvalidAnswerHash {
        /// The unexpected hash that we got.
        got: [u8; 20],

        /// The expected hash.
        expected: [u8; 20],
    },

    /// The new nonce hash did not match.
    InvalidNewNonceHash {
        /// The unexpected nonce that we got.
        got: [u8; 16],

        /// The expected nonce.
        expected: [u8; 16],
    },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidResponse { error } => write!(f, "invalid server response: {error}"),
            Self::InvalidNonce { got, expected } => {
                write!(f, "invalid nonce: got {got:?}, expected {expected:?}")
            }
            Self::InvalidPQSize { size } => write!(f, "invalid pq size {size}"),
            Self::InvalidPQ { pq } => write!(f, "could not factorize pq = {pq}"),
            Self::UnknownFingerprints { fingerprints } => {
                write!(f, "all server fingerprints are unknown: {fingerprints:?}")
            }
            Self::DHParamsFail => write!(f, "the generation of DH parameters by the server failed"),
            Self::InvalidServerNonce { got, expected } => {
                write!(f, "invalid server nonce: got {got:?}, expected {expected:?}")
            }
            Self::EncryptedResponseNotPadded { len } => write!(
                f,
                "the encrypted server response was {len} bytes long, which is not correctly padded"
            ),
            Self::InvalidDhInnerData { error } => {
                write!(f, "could not deserialize DH inner data: {error}")
            }
            Self::GParameterOutOfRange { low, high, value } => write!(
                f,
                "the parameter g = {value} was not in the range {low}..{high}"
            ),
            Self::DHGenRetry => write!(f, "the generation of DH parameters should be retried"),
            Self::DHGenFail => write!(f, "the generation of DH parameters failed"),
            Self::InvalidAnswerHash { got, expected } => {
                write!(f, "invalid answer hash: got {got:?}, expected {expected:?}")
            }
            Self::InvalidNewNonceHash { got, expected } => {
                write!(f, "invalid new nonce hash: got {got:?}, expected {expected:?}")
            }
        }
    }
}

impl From<tl::deserialize::Error> for Error {
    fn from(error: tl::deserialize::Error) -> Self {
        Self::InvalidResponse { error }
    }
}

/// The data generated by [`step1`], needed for [`step2`].
pub struct Step1 {
    nonce: [u8; 16],
}

/// The data generated by [`step2`], needed for [`step3`].
pub struct Step2 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce: [u8; 32],
}

/// The data generated by [`step3`], needed for [`create_key`].
pub struct Step3 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce: [u8; 32],
    gab: BigUint,
    time_offset: i32,
}

/// The final result of doing the authorization handshake, generated by [`create_key`].
#[derive(Clone, Debug, PartialEq)]
pub struct Finished {
    pub auth_key: [u8; 256],
    pub time_offset: i32,
    pub first_salt: i64,
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buffer = [0; N];
    getrandom::fill(&mut buffer).expect("failed to generate secure data for auth key");
    buffer
}

/// The first step of the process to generate an authorization key.
pub fn step1() -> Result<(Vec<u8>, Step1), Error> {
    debug!("starting authorization key generation");
    do_step1(&random_bytes())
}

// n.b.: the `do_step` functions are pure so that they can be tested.
fn do_step1(random_bytes: &[u8; 16]) -> Result<(Vec<u8>, Step1), Error> {
    let nonce = *random_bytes;
    Ok((
        tl::functions::ReqPqMulti { nonce }.to_bytes(),
        Step1 { nonce },
    ))
}

/// The second step of the process to generate an authorization key.
///
/// This step factorizes the server's `pq`, which takes a noticeable amount
/// of CPU time. Async callers should run it on a blocking-friendly thread.
pub fn step2(data: Step1, response: &[u8]) -> Result<(Vec<u8>, Step2), Error> {
    trace!("< {}", hex::to_hex(response));
    do_step2(data, response, &random_bytes())
}

fn do_step2(
    data: Step1,
    response: &[u8],
    random_bytes: &[u8; 32 + 256],
) -> Result<(Vec<u8>, Step2), Error> {
    let Step1 { nonce } = data;
    let tl::enums::ResPq::Pq(res_pq) =
        <tl::functions::ReqPqMulti as RemoteCall>::Return::from_bytes(response)?;

    check_nonce(&res_pq.nonce, &nonce)?;

    let pq: [u8; 8] = res_pq
        .pq
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidPQSize {
            size: res_pq.pq.len(),
        })?;
    let pq = u64::from_be_bytes(pq);
    let (p, q) = factorize(pq).ok_or(Error::InvalidPQ { pq })?;
    debug!("factorized pq = {pq} into {p} * {q}");

    let (new_nonce, random_bytes) = random_bytes.split_at(32);
    let new_nonce: [u8; 32] = new_nonce.try_into().expect("split at 32");
    let random_bytes: &[u8; 256] = random_bytes.try_into().expect("split leaves 256");

    // "pq is a representation of a natural number (in binary big endian format)"
    // and so are p and q, using as few bytes as possible; otherwise the server
    // answers with a -404 transport error.
    // https://core.telegram.org/mtproto/auth_key#dh-exchange-initiation
    let p_bytes = minimal_be_bytes(p);
    let q_bytes = minimal_be_bytes(q);

    let pq_inner_data = tl::enums::PQInnerData::Data(tl::types::PQInnerData {
        pq: res_pq.pq.clone(),
        p: p_bytes.clone(),
        q: q_bytes.clone(),
        nonce,
        server_nonce: res_pq.server_nonce,
        new_nonce,
    })
    .to_bytes();

    let (fingerprint, key) = select_key(&res_pq.server_public_key_fingerprints)
        .ok_or_else(|| Error::UnknownFingerprints {
            fingerprints: res_pq.server_public_key_fingerprints.clone(),
        })?;

    // sha1(data) + data + random padding
    let ciphertext = rsa::encrypt_hashed(&pq_inner_data, &key, random_bytes);

    Ok((
        tl::functions::ReqDhParams {
            nonce,
            server_nonce: res_pq.server_nonce,
            p: p_bytes,
            q: q_bytes,
            public_key_fingerprint: fingerprint,
            encrypted_data: ciphertext,
        }
        .to_bytes(),
        Step2 {
            nonce,
            server_nonce: res_pq.server_nonce,
            new_nonce,
        },
    ))
}

/// The third step of the process to generate an authorization key.
pub fn step3(data: Step2, response: &[u8]) -> Result<(Vec<u8>, Step3), Error> {
    trace!("< {}", hex::to_hex(response));
    let now = utils::unix_now().as_secs() as i32;
    do_step3(data, response, &random_bytes(), now)
}

fn do_step3(
    data: Step2,
    response: &[u8],
    random_bytes: &[u8; 256 + 16],
    now: i32,
) -> Result<(Vec<u8>, Step3), Error> {
    let Step2 {
        nonce,
        server_nonce,
        new_nonce,
    } = data;
    let server_dh_params =
        <tl::functions::ReqDhParams as RemoteCall>::Return::from_bytes(response)?;

    let server_dh_params = match server_dh_params {
        tl::enums::ServerDhParams::Fail(server_dh_params) => {
            // Even though this is a failing case, we should still perform
            // all the security checks.
            check_nonce(&server_dh_params.nonce, &nonce)?;
            check_server_nonce(&server_dh_params.server_nonce, &server_nonce)?;

            let sha = sha1!(new_nonce);
            let new_nonce_hash: [u8; 16] = sha[4..20].try_into().expect("sha1 is 20 bytes");
            check_new_nonce_hash(&server_dh_params.new_nonce_hash, &new_nonce_hash)?;

            return Err(Error::DHParamsFail);
        }
        tl::enums::ServerDhParams::Ok(x) => x,
    };

    check_nonce(&server_dh_params.nonce, &nonce)?;
    check_server_nonce(&server_dh_params.server_nonce, &server_nonce)?;

    let mut plain_text_answer = server_dh_params.encrypted_answer;
    if plain_text_answer.len() % 16 != 0 || plain_text_answer.len() < 20 {
        return Err(Error::EncryptedResponseNotPadded {
            len: plain_text_answer.len(),
        });
    }

    // sha1 hash + plain text + padding
    let (key, iv) = crypto::generate_key_data_from_nonce(&server_nonce, &new_nonce);
    aes::ige_decrypt(&mut plain_text_answer, &key, &iv);

    let got_answer_hash: [u8; 20] = plain_text_answer[..20]
        .try_into()
        .expect("length checked above");

    // Use a cursor explicitly so we know where it ends (and most importantly
    // where the padding starts).
    let mut plain_text_cursor = Cursor::from_slice(&plain_text_answer[20..]);
    let server_dh_inner = match tl::enums::ServerDhInnerData::deserialize(&mut plain_text_cursor) {
        Ok(tl::enums::ServerDhInnerData::Data(x)) => x,
        Err(error) => return Err(Error::InvalidDhInnerData { error }),
    };

    let expected_answer_hash = sha1!(&plain_text_answer[20..20 + plain_text_cursor.pos()]);
    if got_answer_hash != expected_answer_hash {
        return Err(Error::InvalidAnswerHash {
            got: got_answer_hash,
            expected: expected_answer_hash,
        });
    }

    check_nonce(&server_dh_inner.nonce, &nonce)?;
    check_server_nonce(&server_dh_inner.server_nonce, &server_nonce)?;

    let dh_prime = BigUint::from_bytes_be(&server_dh_inner.dh_prime);
    let g = BigUint::from(server_dh_inner.g.unsigned_abs());
    let g_a = BigUint::from_bytes_be(&server_dh_inner.g_a);

    let time_offset = server_dh_inner.server_time - now;
    debug!("server time offset is {time_offset}s");

    let (b, padding) = random_bytes.split_at(256);
    let b = BigUint::from_bytes_be(b);
    let g_b = g.modpow(&b, &dh_prime);
    let gab = g_a.modpow(&b, &dh_prime);

    // IMPORTANT: Apart from the conditions on the Diffie-Hellman prime
    // dh_prime and generator g, both sides are to check that g, g_a and
    // g_b are greater than 1 and less than dh_prime - 1. We recommend
    // checking that g_a and g_b are between 2^{2048-64} and
    // dh_prime - 2^{2048-64} as well.
    // (https://core.telegram.org/mtproto/auth_key#dh-key-exchange-complete)
    let one = BigUint::from(1u32);
    let upper = &dh_prime - &one;
    check_g_in_range(&g, &one, &upper)?;
    check_g_in_range(&g_a, &one, &upper)?;
    check_g_in_range(&g_b, &one, &upper)?;

    let safety_range = one << (2048 - 64);
    let upper = &dh_prime - &safety_range;
    check_g_in_range(&g_a, &safety_range, &upper)?;
    check_g_in_range(&g_b, &safety_range, &upper)?;

    let client_dh_inner = tl::enums::ClientDhInnerData::Data(tl::types::ClientDhInnerData {
        nonce,
        server_nonce,
        retry_id: 0,
        g_b: g_b.to_bytes_be(),
    })
    .to_bytes();

    // sha1(client_dh_inner) + client_dh_inner + padding
    let mut client_dh_encrypted = Vec::with_capacity(20 + client_dh_inner.len() + 16);
    client_dh_encrypted.extend(sha1!(&client_dh_inner));
    client_dh_encrypted.extend(&client_dh_inner);
    let pad_len = (16 - (client_dh_encrypted.len() % 16)) % 16;
    client_dh_encrypted.extend(&padding[..pad_len]);
    aes::ige_encrypt(&mut client_dh_encrypted, &key, &iv);

    Ok((
        tl::functions::SetClientDhParams {
            nonce,
            server_nonce,
            encrypted_data: client_dh_encrypted,
        }
        .to_bytes(),
        Step3 {
            nonce,
            server_nonce,
            new_nonce,
            gab,
            time_offset,
        },
    ))
}

/// The last step of the process to generate an authorization key.
pub fn create_key(data: Step3, response: &[u8]) -> Result<Finished, Error> {
    trace!("< {}", hex::to_hex(response));

    let Step3 {
        nonce,
        server_nonce,
        new_nonce,
        gab,
        time_offset,
    } = data;
    let dh_gen = <tl::functions::SetClientDhParams as RemoteCall>::Return::from_bytes(response)?;

    let (dh_nonce, dh_server_nonce, new_nonce_hash, nonce_number) = match dh_gen {
        tl::enums::SetClientDhParamsAnswer::DhGenOk(x) => {
            (x.nonce, x.server_nonce, x.new_nonce_hash1, 1)
        }
        tl::enums::SetClientDhParamsAnswer::DhGenRetry(x) => {
            (x.nonce, x.server_nonce, x.new_nonce_hash2, 2)
        }
        tl::enums::SetClientDhParamsAnswer::DhGenFail(x) => {
            (x.nonce, x.server_nonce, x.new_nonce_hash3, 3)
        }
    };

    check_nonce(&dh_nonce, &nonce)?;
    check_server_nonce(&dh_server_nonce, &server_nonce)?;

    let auth_key = {
        let mut buffer = [0; 256];
        let gab_bytes = gab.to_bytes_be();
        // gab might need less than 256 bytes
        let skip = buffer.len().saturating_sub(gab_bytes.len());
        buffer[skip..].copy_from_slice(&gab_bytes[gab_bytes.len().saturating_sub(256)..]);
        AuthKey::from_bytes(buffer)
    };

    let expected_hash = auth_key.calc_new_nonce_hash(&new_nonce, nonce_number);
    check_new_nonce_hash(&new_nonce_hash, &expected_hash)?;

    match nonce_number {
        1 => {}
        2 => return Err(Error::DHGenRetry),
        _ => return Err(Error::DHGenFail),
    }

    let mut first_salt = [0; 8];
    first_salt
        .iter_mut()
        .zip(&new_nonce[..8])
        .zip(&server_nonce[..8])
        .for_each(|((x, a), b)| *x = a ^ b);
    let first_salt = i64::from_le_bytes(first_salt);

    debug!("authorization key generated");
    Ok(Finished {
        auth_key: auth_key.to_bytes(),
        time_offset,
        first_salt,
    })
}

/// Big-endian bytes of `n` with the leading zeroes removed.
fn minimal_be_bytes(n: u64) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn check_nonce(got: &[u8; 16], expected: &[u8; 16]) -> Result<(), Error> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::InvalidNonce {
            got: *got,
            expected: *expected,
        })
    }
}

fn check_server_nonce(got: &[u8; 16], expected: &[u8; 16]) -> Result<(), Error> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::InvalidServerNonce {
            got: *got,
            expected: *expected,
        })
    }
}

fn check_new_nonce_hash(got: &[u8; 16], expected: &[u8; 16]) -> Result<(), Error> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::InvalidNewNonceHash {
            got: *got,
            expected: *expected,
        })
    }
}

/// `value` must lie strictly between `low` and `high`.
fn check_g_in_range(value: &BigUint, low: &BigUint, high: &BigUint) -> Result<(), Error> {
    if low < value && value < high {
        Ok(())
    } else {
        Err(Error::GParameterOutOfRange {
            value: value.clone(),
            low: low.clone(),
            high: high.clone(),
        })
    }
}

/// A server public key we know how to encrypt with.
struct KnownKey {
    fingerprint: i64,
    n: &'static str,
    e: &'static str,
    /// Retired keys are only used when the server offers nothing newer.
    deprecated: bool,
}

#[allow(clippy::unreadable_literal)]
const KNOWN_KEYS: &[KnownKey] = &[
    // Production
    KnownKey {
        fingerprint: -3414540481677951611,
        n: "29379598170669337022986177149456128565388431120058863768162556424047512191330847455146576344487764408661701890505066208632169112269581063774293102577308490531282748465986139880977280302242772832972539403531316010870401287642763009136156734339538042419388722777357134487746169093539093850251243897188928735903389451772730245253062963384108812842079887538976360465290946139638691491496062099570836476454855996319192747663615955633778034897140982517446405334423701359108810182097749467210509584293428076654573384828809574217079944388301239431309115013843331317877374435868468779972014486325557807783825502498215169806323",
        e: "65537",
        deprecated: false,
    },
    // Test
    KnownKey {
        fingerprint: -5595554452916591101,
        n: "25342889448840415564971689590713473206898847759084779052582026594546022463853940585885215951168491965708222649399180603818074200620463776135424884632162512403163793083921641631564740959529419359595852941166848940585952337613333022396096584117954892216031229237302943701877588456738335398602461675225081791820393153757504952636234951323237820036543581047826906120927972487366805292115792231423684261262330394324750785450942589751755390156647751460719351439969059949569615302809050721500330239005077889855323917509948255722081644689442127297605422579707142646660768825302832201908302295573257427896031830742328565032949",
        e: "65537",
        deprecated: false,
    },
    // Retired production keys
    KnownKey {
        fingerprint: -4344800451088585951,
        n: "24403446649145068056824081744112065346446136066297307473868293895086332508101251964919587745984311372853053253457835208829824428441874946556659953519213382748319518214765985662663680818277989736779506318868003755216402538945900388706898101286548187286716959100102939636333452457308619454821845196109544157601096359148241435922125602449263164512290854366930013825808102403072317738266383237191313714482187326643144603633877219028262697593882410403273959074350849923041765639673335775605842311578109726403165298875058941765362622936097839775380070572921007586266115476975819175319995527916042178582540628652481530373407",
        e: "65537",
        deprecated: true,
    },
    KnownKey {
        fingerprint: -7306692244673891685,
        n: "25081407810410225030931722734886059247598515157516470397242545867550116598436968553551465554653745201634977779380884774534457386795922003815072071558370597290368737862981871277312823942822144802509055492512145589734772907225259038113414940384446493111736999668652848440655603157665903721517224934142301456312994547591626081517162758808439979745328030376796953660042629868902013177751703385501412640560275067171555763725421377065095231095517201241069856888933358280729674273422117201596511978645878544308102076746465468955910659145532699238576978901011112475698963666091510778777356966351191806495199073754705289253783",
        e: "65537",
        deprecated: true,
    },
    KnownKey {
        fingerprint: -5738946642031285640,
        n: "22347337644621997830323797217583448833849627595286505527328214795712874535417149457567295215523199212899872122674023936713124024124676488204889357563104452250187725437815819680799441376434162907889288526863223004380906766451781702435861040049293189979755757428366240570457372226323943522935844086838355728767565415115131238950994049041950699006558441163206523696546297006014416576123345545601004508537089192869558480948139679182328810531942418921113328804749485349441503927570568778905918696883174575510385552845625481490900659718413892216221539684717773483326240872061786759868040623935592404144262688161923519030977",
        e: "65537",
        deprecated: true,
    },
    KnownKey {
        fingerprint: 8205599988028290019,
        n: "24573455207957565047870011785254215390918912369814947541785386299516827003508659346069416840622922416779652050319196701077275060353178142796963682024347858398319926119639265555410256455471016400261630917813337515247954638555325280392998950756512879748873422896798579889820248358636937659872379948616822902110696986481638776226860777480684653756042166610633513404129518040549077551227082262066602286208338952016035637334787564972991208252928951876463555456715923743181359826124083963758009484867346318483872552977652588089928761806897223231500970500186019991032176060579816348322451864584743414550721639495547636008351",
        e: "65537",
        deprecated: true,
    },
];

fn key_for_fingerprint(fingerprint: i64, allow_deprecated: bool) -> Option<rsa::Key> {
    KNOWN_KEYS
        .iter()
        .find(|key| key.fingerprint == fingerprint && (allow_deprecated || !key.deprecated))
        .and_then(|key| rsa::Key::new(key.n, key.e))
}

/// Pick the first advertised fingerprint we have a current key for,
/// falling back to retired keys in a second pass.
fn select_key(fingerprints: &[i64]) -> Option<(i64, rsa::Key)> {
    [false, true].into_iter().find_map(|allow_deprecated| {
        fingerprints.iter().find_map(|&fingerprint| {
            Some((fingerprint, key_for_fingerprint(fingerprint, allow_deprecated)?))
        })
    })
}
