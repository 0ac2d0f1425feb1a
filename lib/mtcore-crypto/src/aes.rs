// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! AES-256 in [Infinite Garble Extension](https://mgp25.com/blog/2015/06/21/AESIGE/) mode.
//!
//! Both directions work in-place. The key schedule is built once per call.

#![allow(deprecated)] // generic-array 0.14 re-exports, see RustCrypto/block-ciphers#509

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

fn split_iv(iv: &[u8; 32]) -> ([u8; 16], [u8; 16]) {
    let mut low = [0; 16];
    let mut high = [0; 16];
    low.copy_from_slice(&iv[..16]);
    high.copy_from_slice(&iv[16..]);
    (low, high)
}

fn xor_block(block: &mut [u8], with: &[u8; 16]) {
    block.iter_mut().zip(with).for_each(|(b, w)| *b ^= w);
}

/// Encrypt `buffer` in-place.
///
/// # Panics
///
/// Panics if the buffer length is not a multiple of 16.
pub fn ige_encrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    assert_eq!(buffer.len() % 16, 0, "ige input must be block-aligned");

    let cipher = Aes256::new(GenericArray::from_slice(key));
    // iv1 tracks the previous ciphertext block, iv2 the previous plaintext block.
    let (mut iv1, mut iv2) = split_iv(iv);
    let mut plain = [0u8; 16];

    for block in buffer.chunks_mut(16) {
        plain.copy_from_slice(block);

        xor_block(block, &iv1);
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
        xor_block(block, &iv2);

        iv1.copy_from_slice(block);
        iv2 = plain;
    }
}

/// Decrypt `buffer` in-place.
///
/// # Panics
///
/// Panics if the buffer length is not a multiple of 16.
pub fn ige_decrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    assert_eq!(buffer.len() % 16, 0, "ige input must be block-aligned");

    let cipher = Aes256::new(GenericArray::from_slice(key));
    let (mut iv1, mut iv2) = split_iv(iv);
    let mut cipher_block = [0u8; 16];

    for block in buffer.chunks_mut(16) {
        cipher_block.copy_from_slice(block);

        xor_block(block, &iv2);
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
        xor_block(block, &iv1);

        iv1 = cipher_block;
        iv2.copy_from_slice(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_reverses_encrypt() {
        let original = (0..64).map(|i| i as u8).collect::<Vec<_>>();
        let key = [7; 32];
        let iv = [9; 32];

        let mut buffer = original.clone();
        ige_encrypt(&mut buffer, &key, &iv);
        assert_ne!(buffer, original);
        ige_decrypt(&mut buffer, &key, &iv);
        assert_eq!(buffer, original);
    }

    #[test]
    fn blocks_are_chained() {
        // Two equal plaintext blocks must not produce equal ciphertext blocks.
        let mut buffer = vec![1; 32];
        ige_encrypt(&mut buffer, &[2; 32], &[3; 32]);
        assert_ne!(buffer[..16], buffer[16..]);
    }

    #[test]
    #[should_panic]
    fn unaligned_input_panics() {
        ige_encrypt(&mut [0; 15], &[0; 32], &[0; 32]);
    }
}
