// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::sha1;
use std::fmt;

/// Telegram's [authorization key]: 2048 bits of shared secret.
///
/// The derived identifiers are computed once on construction.
///
/// [authorization key]: https://core.telegram.org/mtproto/auth_key
#[derive(Clone)]
pub struct AuthKey {
    pub(crate) data: [u8; 256],
    pub(crate) aux_hash: [u8; 8],
    pub(crate) key_id: [u8; 8],
}

impl AuthKey {
    /// Wrap the given key material.
    pub fn from_bytes(data: [u8; 256]) -> Self {
        let sha = sha1!(&data);
        let mut aux_hash = [0; 8];
        let mut key_id = [0; 8];
        aux_hash.copy_from_slice(&sha[..8]);
        key_id.copy_from_slice(&sha[12..20]);

        Self {
            data,
            aux_hash,
            key_id,
        }
    }

    /// The raw key material, suitable for persisting and loading back with [`AuthKey::from_bytes`].
    pub fn to_bytes(&self) -> [u8; 256] {
        self.data
    }

    /// The 64 lower-order bits of the SHA-1 of the key, as sent on the wire.
    pub fn key_id(&self) -> [u8; 8] {
        self.key_id
    }

    /// The 64 higher-order bits of the SHA-1 of the key.
    pub fn aux_hash(&self) -> [u8; 8] {
        self.aux_hash
    }

    /// Hash used to confirm the outcome of the key exchange.
    ///
    /// `number` is `1` for `dh_gen_ok`, `2` for `dh_gen_retry` and `3` for `dh_gen_fail`.
    pub fn calc_new_nonce_hash(&self, new_nonce: &[u8; 32], number: u8) -> [u8; 16] {
        let sha = sha1!(new_nonce, [number], &self.aux_hash);
        let mut result = [0; 16];
        result.copy_from_slice(&sha[4..]);
        result
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_id == other.key_id
    }
}

impl Eq for AuthKey {}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the key material itself.
        f.debug_struct("AuthKey")
            .field("key_id", &u64::from_le_bytes(self.key_id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_auth_key() -> AuthKey {
        let mut buffer = [0u8; 256];
        buffer
            .iter_mut()
            .enumerate()
            .for_each(|(i, x)| *x = i as u8);

        AuthKey::from_bytes(buffer)
    }

    fn test_new_nonce() -> [u8; 32] {
        let mut buffer = [0u8; 32];
        buffer
            .iter_mut()
            .enumerate()
            .for_each(|(i, x)| *x = i as u8);

        buffer
    }

    #[test]
    fn derives_aux_hash() {
        assert_eq!(test_auth_key().aux_hash(), [73, 22, 214, 189, 183, 247, 142, 104]);
    }

    #[test]
    fn derives_key_id() {
        assert_eq!(test_auth_key().key_id(), [50, 209, 88, 110, 164, 87, 223, 200]);
    }

    #[test]
    fn new_nonce_hash_variants() {
        let auth_key = test_auth_key();
        let new_nonce = test_new_nonce();
        assert_eq!(
            auth_key.calc_new_nonce_hash(&new_nonce, 1),
            [194, 206, 210, 179, 62, 89, 58, 85, 210, 127, 74, 93, 171, 238, 124, 103]
        );
        assert_eq!(
            auth_key.calc_new_nonce_hash(&new_nonce, 2),
            [244, 49, 142, 133, 189, 47, 243, 190, 132, 217, 254, 252, 227, 220, 227, 159]
        );
        assert_eq!(
            auth_key.calc_new_nonce_hash(&new_nonce, 3),
            [75, 249, 215, 179, 125, 180, 19, 238, 67, 29, 40, 81, 118, 49, 203, 61]
        );
    }

    #[test]
    fn debug_hides_material() {
        let repr = format!("{:?}", test_auth_key());
        assert!(repr.starts_with("AuthKey { key_id: "));
        assert!(!repr.contains("data"));
    }
}
