// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// This trait allows for concrete instances to be serialized into
/// binary data as specified by the [Binary Data Serialization].
///
/// [Binary Data Serialization]: https://core.telegram.org/mtproto/serialize
pub trait Serializable {
    /// Serializes the instance into the given buffer.
    fn serialize(&self, buf: &mut impl Extend<u8>);

    /// Convenience function to serialize the object into a new buffer
    /// and return its bytes. It is more efficient to reuse a buffer with
    /// [`Serializable::serialize`].
    fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.serialize(&mut buffer);
        buffer
    }
}

impl Serializable for bool {
    /// Serializes the boolean as one of the boxed `Bool` constructors:
    ///
    /// * `boolFalse#bc799737 = Bool;`
    /// * `boolTrue#997275b5 = Bool;`
    #[allow(clippy::unreadable_literal)]
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        if *self { 0x997275b5u32 } else { 0xbc799737u32 }.serialize(buf)
    }
}

macro_rules! impl_le_serializable {
    ($($ty:ty),+) => {
        $(
            impl Serializable for $ty {
                fn serialize(&self, buf: &mut impl Extend<u8>) {
                    buf.extend(self.to_le_bytes())
                }
            }
        )+
    };
}

impl_le_serializable!(i32, u32, i64, f64);

impl Serializable for [u8; 16] {
    /// `int128` is serialized verbatim.
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        buf.extend(self.iter().copied())
    }
}

impl Serializable for [u8; 32] {
    /// `int256` is serialized verbatim.
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        buf.extend(self.iter().copied())
    }
}

impl<T: Serializable> Serializable for Vec<T> {
    /// Serializes a boxed `Vector`: `vector#1cb5c415 {t:Type} # [ t ] = Vector t;`.
    #[allow(clippy::unreadable_literal)]
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        0x1cb5c415u32.serialize(buf);
        (self.len() as i32).serialize(buf);
        self.iter().for_each(|x| x.serialize(buf));
    }
}

impl<T: Serializable> Serializable for crate::RawVec<T> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        (self.0.len() as i32).serialize(buf);
        self.0.iter().for_each(|x| x.serialize(buf));
    }
}

impl Serializable for String {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.as_bytes().serialize(buf)
    }
}

impl Serializable for Vec<u8> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.as_slice().serialize(buf)
    }
}

impl Serializable for &[u8] {
    /// Serializes `bytes` and `string`.
    ///
    /// Lengths up to 253 use a single byte. Longer ones are marked with
    /// 254 followed by the length in three little-endian bytes. The total
    /// is then padded with zeros to a multiple of four.
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        let header_len = if self.len() <= 253 {
            buf.extend([self.len() as u8]);
            1
        } else {
            let len = (self.len() as u32).to_le_bytes();
            buf.extend([254, len[0], len[1], len[2]]);
            4
        };
        let padding = (4 - ((header_len + self.len()) % 4)) % 4;

        buf.extend(self.iter().copied());
        buf.extend((0..padding).map(|_| 0));
    }
}

impl Serializable for crate::Blob {
    /// Blobs are written as-is, without any length prefix.
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        buf.extend(self.0.iter().copied())
    }
}
