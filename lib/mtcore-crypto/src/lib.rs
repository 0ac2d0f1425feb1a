// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![deny(unsafe_code)]

//! Cryptographic building blocks of the [Mobile Transport Protocol].
//!
//! Message encryption works in-place over a [`DequeBuffer`], so that the
//! `key_id || msg_key` envelope can be prepended without copying the payload.
//!
//! [Mobile Transport Protocol]: https://core.telegram.org/mtproto/description
pub mod aes;
mod auth_key;
mod deque_buffer;
pub mod factorize;
pub mod hex;
pub mod rsa;
mod sha;

pub use auth_key::AuthKey;
pub use deque_buffer::DequeBuffer;
use std::fmt;

#[doc(hidden)]
pub mod __private {
    pub use sha1;
    pub use sha2;
}

/// Which end of the connection produced a message.
///
/// The key derivation reads different portions of the authorization key for each direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    // "where x = 0 for messages from client to server and x = 8 for those from server to client"
    fn x(self) -> usize {
        match self {
            Side::Client => 0,
            Side::Server => 8,
        }
    }
}

/// The error type for the decryption of incoming messages.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The ciphertext is either too small or not padded correctly.
    InvalidBuffer,

    /// The server replied with the ID of a different authorization key.
    AuthKeyMismatch,

    /// The key of the message did not match our expectations.
    MessageKeyMismatch,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBuffer => write!(f, "invalid ciphertext buffer length"),
            Self::AuthKeyMismatch => write!(f, "server authkey mismatches with ours"),
            Self::MessageKeyMismatch => write!(f, "server msgkey mismatches with ours"),
        }
    }
}

/// Length of the `key_id || msg_key` envelope that prefixes every ciphertext.
const ENVELOPE_LEN: usize = 8 + 16;

fn fill_random(buffer: &mut [u8]) {
    getrandom::fill(buffer).expect("failed to generate secure random bytes");
}

fn check_envelope(buffer: &[u8], auth_key: &AuthKey) -> Result<[u8; 16], Error> {
    if buffer.len() < ENVELOPE_LEN || (buffer.len() - ENVELOPE_LEN) % 16 != 0 {
        return Err(Error::InvalidBuffer);
    }
    if auth_key.key_id != buffer[..8] {
        return Err(Error::AuthKeyMismatch);
    }
    let mut msg_key = [0; 16];
    msg_key.copy_from_slice(&buffer[8..ENVELOPE_LEN]);
    Ok(msg_key)
}

/// MTProto 2.0 `aes_key` and `aes_iv` derivation.
fn calc_key_v2(auth_key: &AuthKey, msg_key: &[u8; 16], side: Side) -> ([u8; 32], [u8; 32]) {
    let x = side.x();
    let sha256_a = sha256!(msg_key, &auth_key.data[x..x + 36]);
    let sha256_b = sha256!(&auth_key.data[40 + x..40 + x + 36], msg_key);

    let mut aes_key = [0; 32];
    aes_key[..8].copy_from_slice(&sha256_a[..8]);
    aes_key[8..24].copy_from_slice(&sha256_b[8..24]);
    aes_key[24..].copy_from_slice(&sha256_a[24..]);

    let mut aes_iv = [0; 32];
    aes_iv[..8].copy_from_slice(&sha256_b[..8]);
    aes_iv[8..24].copy_from_slice(&sha256_a[8..24]);
    aes_iv[24..].copy_from_slice(&sha256_b[24..]);

    (aes_key, aes_iv)
}

/// MTProto 2.0 `msg_key`, the middle bits of `msg_key_large`.
fn msg_key_v2(auth_key: &AuthKey, padded_plaintext: &[u8], side: Side) -> [u8; 16] {
    let x = side.x();
    let msg_key_large = sha256!(&auth_key.data[88 + x..88 + x + 32], padded_plaintext);
    let mut msg_key = [0; 16];
    msg_key.copy_from_slice(&msg_key_large[8..24]);
    msg_key
}

/// Padding needed by MTProto 2.0: between 12 and 1024 bytes, leaving the total a multiple of 16.
fn padding_len_v2(len: usize) -> usize {
    16 + (16 - (len % 16))
}

fn do_encrypt_data_v2(
    buffer: &mut DequeBuffer<u8>,
    auth_key: &AuthKey,
    side: Side,
    random_padding: &[u8; 32],
) {
    let padding = padding_len_v2(buffer.len());
    buffer.extend(random_padding.iter().take(padding).copied());

    let msg_key = msg_key_v2(auth_key, buffer.as_ref(), side);
    let (key, iv) = calc_key_v2(auth_key, &msg_key, side);
    aes::ige_encrypt(buffer.as_mut(), &key, &iv);

    buffer.extend_front(&msg_key);
    buffer.extend_front(&auth_key.key_id);
}

/// Encrypt the plaintext in `buffer` using the [MTProto 2.0 algorithm].
///
/// Random padding is appended, and the result is `key_id || msg_key || ciphertext`.
///
/// [MTProto 2.0 algorithm]: https://core.telegram.org/mtproto/description#defining-aes-key-and-initialization-vector
pub fn encrypt_data_v2(buffer: &mut DequeBuffer<u8>, auth_key: &AuthKey, side: Side) {
    let mut random_padding = [0; 32];
    fill_random(&mut random_padding);
    do_encrypt_data_v2(buffer, auth_key, side, &random_padding);
}

/// Decrypt a `key_id || msg_key || ciphertext` message produced by `side` using MTProto 2.0.
///
/// On success, the returned slice contains the padded plaintext.
pub fn decrypt_data_v2<'a>(
    buffer: &'a mut [u8],
    auth_key: &AuthKey,
    side: Side,
) -> Result<&'a mut [u8], Error> {
    let msg_key = check_envelope(buffer, auth_key)?;

    let (key, iv) = calc_key_v2(auth_key, &msg_key, side);
    aes::ige_decrypt(&mut buffer[ENVELOPE_LEN..], &key, &iv);

    // https://core.telegram.org/mtproto/security_guidelines#mtproto-encrypted-messages
    if msg_key_v2(auth_key, &buffer[ENVELOPE_LEN..], side) != msg_key {
        return Err(Error::MessageKeyMismatch);
    }

    Ok(&mut buffer[ENVELOPE_LEN..])
}

/// MTProto 1.0 `aes_key` and `aes_iv` derivation, based on SHA-1.
fn calc_key_v1(auth_key: &AuthKey, msg_key: &[u8; 16], side: Side) -> ([u8; 32], [u8; 32]) {
    let x = side.x();
    let data = &auth_key.data;
    let sha1_a = sha1!(msg_key, &data[x..x + 32]);
    let sha1_b = sha1!(&data[32 + x..48 + x], msg_key, &data[48 + x..64 + x]);
    let sha1_c = sha1!(&data[64 + x..96 + x], msg_key);
    let sha1_d = sha1!(msg_key, &data[96 + x..128 + x]);

    let mut aes_key = [0; 32];
    aes_key[..8].copy_from_slice(&sha1_a[..8]);
    aes_key[8..20].copy_from_slice(&sha1_b[8..20]);
    aes_key[20..].copy_from_slice(&sha1_c[4..16]);

    let mut aes_iv = [0; 32];
    aes_iv[..12].copy_from_slice(&sha1_a[8..20]);
    aes_iv[12..20].copy_from_slice(&sha1_b[..8]);
    aes_iv[20..24].copy_from_slice(&sha1_c[16..20]);
    aes_iv[24..].copy_from_slice(&sha1_d[..8]);

    (aes_key, aes_iv)
}

/// Encrypt the plaintext in `buffer` using the older MTProto 1.0 scheme.
///
/// Still needed by peers that negotiated secret chats with it. The `msg_key` covers
/// the unpadded plaintext, which should therefore start with its own length.
pub fn encrypt_data_v1(buffer: &mut DequeBuffer<u8>, auth_key: &AuthKey, side: Side) {
    let sha = sha1!(buffer.as_ref());
    let mut msg_key = [0; 16];
    msg_key.copy_from_slice(&sha[4..20]);

    let mut random_padding = [0; 16];
    fill_random(&mut random_padding);
    let padding = (16 - buffer.len() % 16) % 16;
    buffer.extend(random_padding.iter().take(padding).copied());

    let (key, iv) = calc_key_v1(auth_key, &msg_key, side);
    aes::ige_encrypt(buffer.as_mut(), &key, &iv);

    buffer.extend_front(&msg_key);
    buffer.extend_front(&auth_key.key_id);
}

/// Decrypt a message produced by [`encrypt_data_v1`] on the given `side`.
///
/// The plaintext must begin with its little-endian 32-bit length. The returned slice
/// starts at that length prefix and excludes the padding.
pub fn decrypt_data_v1<'a>(
    buffer: &'a mut [u8],
    auth_key: &AuthKey,
    side: Side,
) -> Result<&'a mut [u8], Error> {
    let msg_key = check_envelope(buffer, auth_key)?;
    if buffer.len() < ENVELOPE_LEN + 16 {
        return Err(Error::InvalidBuffer);
    }

    let (key, iv) = calc_key_v1(auth_key, &msg_key, side);
    let plaintext = &mut buffer[ENVELOPE_LEN..];
    aes::ige_decrypt(plaintext, &key, &iv);

    let len = u32::from_le_bytes([plaintext[0], plaintext[1], plaintext[2], plaintext[3]]) as usize;
    let end = len
        .checked_add(4)
        .filter(|&end| end <= plaintext.len())
        .ok_or(Error::InvalidBuffer)?;

    if sha1!(&plaintext[..end])[4..20] != msg_key {
        return Err(Error::MessageKeyMismatch);
    }

    Ok(&mut plaintext[..end])
}

/// Generate the AES key and initialization vector from the server nonce
/// and the new client nonce, used to encrypt the Diffie-Hellman parameters.
pub fn generate_key_data_from_nonce(
    server_nonce: &[u8; 16],
    new_nonce: &[u8; 32],
) -> ([u8; 32], [u8; 32]) {
    let hash1 = sha1!(new_nonce, server_nonce);
    let hash2 = sha1!(server_nonce, new_nonce);
    let hash3 = sha1!(new_nonce, new_nonce);

    // key = hash1 + hash2[:12]
    let mut key = [0; 32];
    key[..20].copy_from_slice(&hash1);
    key[20..].copy_from_slice(&hash2[..12]);

    // iv = hash2[12:20] + hash3 + new_nonce[:4]
    let mut iv = [0; 32];
    iv[..8].copy_from_slice(&hash2[12..]);
    iv[8..28].copy_from_slice(&hash3);
    iv[28..].copy_from_slice(&new_nonce[..4]);

    (key, iv)
}
