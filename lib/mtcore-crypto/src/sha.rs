// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hashing shorthands.
//!
//! Both macros take any number of `AsRef<[u8]>` parts, which are hashed
//! as if they had been concatenated, and evaluate to a fixed-size array.

/// SHA-1 over the concatenation of all the parts, as a `[u8; 20]`.
#[macro_export]
macro_rules! sha1 {
    ( $( $part:expr ),+ $(,)? ) => {{
        use $crate::__private::sha1::Digest as _;
        let mut hasher = $crate::__private::sha1::Sha1::new();
        $( hasher.update($part); )+
        let digest: [u8; 20] = hasher.finalize().into();
        digest
    }};
}

/// SHA-256 over the concatenation of all the parts, as a `[u8; 32]`.
#[macro_export]
macro_rules! sha256 {
    ( $( $part:expr ),+ $(,)? ) => {{
        use $crate::__private::sha2::Digest as _;
        let mut hasher = $crate::__private::sha2::Sha256::new();
        $( hasher.update($part); )+
        let digest: [u8; 32] = hasher.finalize().into();
        digest
    }};
}
