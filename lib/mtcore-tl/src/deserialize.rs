// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::fmt;

/// The error type for the deserialization of Type Language objects.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The end of the buffer was reached earlier than anticipated, which
    /// implies there is not enough data to complete the deserialization.
    UnexpectedEof,

    /// An unknown constructor was found where a boxed type, a `Bool`
    /// or a boxed `Vector` was expected.
    ///
    /// Bare types carry no constructor and cannot be validated this way.
    UnexpectedConstructor {
        /// The unexpected constructor identifier.
        id: u32,
    },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnexpectedEof => write!(f, "unexpected eof"),
            Self::UnexpectedConstructor { id } => {
                write!(f, "unexpected constructor: {id:08x} ({})", crate::name_for_id(id))
            }
        }
    }
}

/// Read-only cursor over an in-memory buffer.
///
/// Deserialization never touches actual I/O, so the only possible failure
/// is running out of data.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset into the buffer. Key generation needs it to find
    /// where a hashed inner object ends and its padding begins.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = *self.buf.get(self.pos).ok_or(Error::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos + buf.len();
        let src = self.buf.get(self.pos..end).ok_or(Error::UnexpectedEof)?;
        buf.copy_from_slice(src);
        self.pos = end;
        Ok(())
    }

    pub fn read_to_end(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let rest = &self.buf[self.pos..];
        buf.extend_from_slice(rest);
        self.pos = self.buf.len();
        Ok(rest.len())
    }
}

pub type Buffer<'a, 'b> = &'a mut Cursor<'b>;
pub type Result<T> = std::result::Result<T, Error>;

/// This trait allows for data serialized according to the
/// [Binary Data Serialization] to be deserialized into concrete instances.
///
/// [Binary Data Serialization]: https://core.telegram.org/mtproto/serialize
pub trait Deserializable {
    /// Deserializes an instance of the type from a given buffer.
    fn deserialize(buf: Buffer) -> Result<Self>
    where
        Self: Sized;

    /// Convenience function to deserialize an instance from a given buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use mtcore_tl::Deserializable;
    ///
    /// assert_eq!(bool::from_bytes(&[0x37, 0x97, 0x79, 0xbc]).unwrap(), false);
    /// ```
    fn from_bytes(buf: &[u8]) -> Result<Self>
    where
        Self: Sized,
    {
        Self::deserialize(&mut Cursor::from_slice(buf))
    }
}

impl Deserializable for bool {
    #[allow(clippy::unreadable_literal)]
    fn deserialize(buf: Buffer) -> Result<Self> {
        match u32::deserialize(buf)? {
            0x997275b5u32 => Ok(true),
            0xbc799737u32 => Ok(false),
            id => Err(Error::UnexpectedConstructor { id }),
        }
    }
}

macro_rules! impl_le_deserializable {
    ($($ty:ty),+) => {
        $(
            impl Deserializable for $ty {
                fn deserialize(buf: Buffer) -> Result<Self> {
                    let mut buffer = [0u8; std::mem::size_of::<$ty>()];
                    buf.read_exact(&mut buffer)?;
                    Ok(Self::from_le_bytes(buffer))
                }
            }
        )+
    };
}

impl_le_deserializable!(i32, u32, i64, f64);

impl<const N: usize> Deserializable for [u8; N] {
    /// Reads `int128` and `int256` verbatim.
    fn deserialize(buf: Buffer) -> Result<Self> {
        let mut buffer = [0u8; N];
        buf.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

impl<T: Deserializable> Deserializable for Vec<T> {
    #[allow(clippy::unreadable_literal)]
    fn deserialize(buf: Buffer) -> Result<Self> {
        let id = u32::deserialize(buf)?;
        if id != 0x1cb5c415u32 {
            return Err(Error::UnexpectedConstructor { id });
        }
        crate::RawVec::<T>::deserialize(buf).map(|v| v.0)
    }
}

impl<T: Deserializable> Deserializable for crate::RawVec<T> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let len = u32::deserialize(buf)? as usize;
        // Every element takes at least four bytes, so a bogus length can't reserve a lot.
        let mut items = Vec::with_capacity(len.min(buf.remaining() / 4));
        for _ in 0..len {
            items.push(T::deserialize(buf)?);
        }
        Ok(Self(items))
    }
}

impl Deserializable for String {
    fn deserialize(buf: Buffer) -> Result<Self> {
        Ok(String::from_utf8_lossy(&Vec::<u8>::deserialize(buf)?).into())
    }
}

impl Deserializable for Vec<u8> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let first_byte = buf.read_byte()?;
        let (header_len, len) = if first_byte == 254 {
            let mut len = [0u8; 4];
            buf.read_exact(&mut len[..3])?;
            (4, u32::from_le_bytes(len) as usize)
        } else {
            (1, first_byte as usize)
        };

        if len > buf.remaining() {
            return Err(Error::UnexpectedEof);
        }
        let mut result = vec![0u8; len];
        buf.read_exact(&mut result)?;

        let padding = (4 - ((header_len + len) % 4)) % 4;
        for _ in 0..padding {
            buf.read_byte()?;
        }

        Ok(result)
    }
}

impl Deserializable for crate::Blob {
    /// Consumes the rest of the buffer.
    fn deserialize(buf: Buffer) -> Result<Self> {
        let mut data = Vec::new();
        buf.read_to_end(&mut data)?;
        Ok(Self(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Serializable;

    #[test]
    fn integers_are_little_endian() {
        assert_eq!(i32::from_bytes(&[0xff, 0xff, 0xff, 0xff]), Ok(-1));
        assert_eq!(u32::from_bytes(&[0x01, 0x00, 0x00, 0x00]), Ok(1));
        assert_eq!(
            i64::from_bytes(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f]),
            Ok(i64::MAX)
        );
        assert_eq!(i64::from_bytes(&[0; 7]), Err(Error::UnexpectedEof));
    }

    #[test]
    fn bool_rejects_other_constructors() {
        assert_eq!(bool::from_bytes(&[0xb5, 0x75, 0x72, 0x99]), Ok(true));
        assert_eq!(
            bool::from_bytes(&[1, 2, 3, 4]),
            Err(Error::UnexpectedConstructor { id: 0x04030201 })
        );
    }

    #[test]
    fn bytes_consume_padding() {
        let mut cursor = Cursor::from_slice(&[3, 1, 2, 3, 2, 7, 8, 0, 0xaa]);
        assert_eq!(Vec::<u8>::deserialize(&mut cursor), Ok(vec![1, 2, 3]));
        assert_eq!(Vec::<u8>::deserialize(&mut cursor), Ok(vec![7, 8]));
        assert_eq!(cursor.pos(), 8);
    }

    #[test]
    fn long_bytes_are_read_back() {
        let data = (0..300).map(|i| i as u8).collect::<Vec<_>>();
        let bytes = data.to_bytes();
        let mut cursor = Cursor::from_slice(&bytes);
        assert_eq!(Vec::<u8>::deserialize(&mut cursor), Ok(data));
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn truncated_bytes_fail() {
        assert_eq!(Vec::<u8>::from_bytes(&[8, 1, 2]), Err(Error::UnexpectedEof));
    }

    #[test]
    fn vector_checks_its_constructor() {
        assert_eq!(
            Vec::<i32>::from_bytes(&[0x15, 0xc4, 0xb5, 0x1c, 1, 0, 0, 0, 9, 0, 0, 0]),
            Ok(vec![9])
        );
        assert_eq!(
            Vec::<i32>::from_bytes(&[0, 0, 0, 0, 0, 0, 0, 0]),
            Err(Error::UnexpectedConstructor { id: 0 })
        );
    }
}
