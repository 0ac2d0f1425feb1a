// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::{Error, Transport, UnpackedOffset, read_i32};
use mtcore_crypto::DequeBuffer;

const TAG: [u8; 4] = [0xee, 0xee, 0xee, 0xee];

/// A light MTProto transport protocol that guarantees data padded
/// to 4 bytes. This is an implementation of the [intermediate transport].
///
/// * Overhead: small.
/// * Minimum envelope length: 4 bytes.
/// * Maximum envelope length: 4 bytes.
///
/// It serializes the input payload as follows:
///
/// ```text
/// +----+----...----+
/// | len|  payload  |
/// +----+----...----+
///  ^^^^ 4 bytes
/// ```
///
/// The very first frame is preceded by the `0xeeeeeeee` tag.
///
/// [intermediate transport]: https://core.telegram.org/mtproto/mtproto-transports#intermediate
pub struct Intermediate {
    init: bool,
}

#[allow(clippy::new_without_default)]
impl Intermediate {
    pub fn new() -> Self {
        Self { init: false }
    }
}

impl Transport for Intermediate {
    fn pack(&mut self, buffer: &mut DequeBuffer<u8>) {
        let len = buffer.len();
        assert_eq!(len % 4, 0);

        buffer.extend_front(&(len as i32).to_le_bytes());

        if !self.init {
            buffer.extend_front(&TAG);
            self.init = true;
        }
    }

    fn unpack(&mut self, buffer: &[u8]) -> Result<UnpackedOffset, Error> {
        if buffer.len() < 4 {
            return Err(Error::MissingBytes);
        }

        let len = read_i32(buffer, 0);
        if len < 0 {
            return Err(Error::BadLen { got: len });
        }
        let len = len as usize;

        if buffer.len() < 4 + len {
            return Err(Error::MissingBytes);
        }

        if len == 4 {
            let status = read_i32(buffer, 4);
            if status < 0 {
                return Err(Error::BadStatus {
                    status: status.unsigned_abs(),
                });
            }
        }

        Ok(UnpackedOffset {
            data_start: 4,
            data_end: 4 + len,
            next_offset: 4 + len,
        })
    }

    fn reset(&mut self) {
        self.init = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns a new intermediate transport, and `n` bytes of input data for it.
    fn setup_pack(n: usize) -> (Intermediate, DequeBuffer<u8>) {
        let mut buffer = DequeBuffer::with_capacity(n, 8);
        buffer.extend((0..n).map(|x| (x & 0xff) as u8));
        (Intermediate::new(), buffer)
    }

    #[test]
    fn pack_empty() {
        let (mut transport, mut buffer) = setup_pack(0);
        transport.pack(&mut buffer);
        assert_eq!(&buffer[..], &[0xee, 0xee, 0xee, 0xee, 0, 0, 0, 0]);
    }

    #[test]
    #[should_panic]
    fn pack_non_padded() {
        let (mut transport, mut buffer) = setup_pack(7);
        transport.pack(&mut buffer);
    }

    #[test]
    fn pack_normal() {
        let (mut transport, mut buffer) = setup_pack(128);
        let orig = buffer.clone();
        transport.pack(&mut buffer);
        assert_eq!(&buffer[..8], &[0xee, 0xee, 0xee, 0xee, 128, 0, 0, 0]);
        assert_eq!(&buffer[8..], &orig[..]);
    }

    #[test]
    fn tag_is_sent_once() {
        let (mut transport, buffer) = setup_pack(4);
        let mut first = buffer.clone();
        transport.pack(&mut first);
        let mut second = buffer.clone();
        transport.pack(&mut second);

        assert_eq!(first.len(), 12);
        assert_eq!(&second[..], &[4, 0, 0, 0, 0, 1, 2, 3]);

        transport.reset();
        let mut third = buffer.clone();
        transport.pack(&mut third);
        assert_eq!(&third[..4], &TAG);
    }

    #[test]
    fn unpack_small() {
        let mut transport = Intermediate::new();
        assert_eq!(transport.unpack(&[1]), Err(Error::MissingBytes));
        assert_eq!(
            transport.unpack(&[8, 0, 0, 0, 1, 2, 3, 4]),
            Err(Error::MissingBytes)
        );
    }

    #[test]
    fn unpack_empty() {
        let (mut transport, mut buffer) = setup_pack(0);
        transport.pack(&mut buffer);
        let offset = transport.unpack(&buffer[4..]).unwrap();
        assert_eq!(offset.data_start, offset.data_end);
        assert_eq!(offset.next_offset, 4);
    }

    #[test]
    fn unpack_normal() {
        let (mut transport, mut buffer) = setup_pack(128);
        let orig = buffer.clone();
        transport.pack(&mut buffer);
        let input = &buffer[4..]; // tag
        let offset = transport.unpack(input).unwrap();
        assert_eq!(&input[offset.data_start..offset.data_end], &orig[..]);
    }

    #[test]
    fn unpack_two_at_once() {
        let (mut transport, mut buffer) = setup_pack(128);
        let orig = buffer.clone();

        let mut input = Vec::new();
        transport.pack(&mut buffer);
        input.extend(&buffer[4..]); // tag
        let single_size = input.len();

        let mut buffer = orig.clone();
        transport.pack(&mut buffer);
        input.extend(&buffer[..]);

        let offset = transport.unpack(&input).unwrap();
        assert_eq!(&input[offset.data_start..offset.data_end], &orig[..]);
        assert_eq!(offset.next_offset, single_size);

        let input = &input[offset.next_offset..];
        let offset = transport.unpack(input).unwrap();
        assert_eq!(&input[offset.data_start..offset.data_end], &orig[..]);
    }

    #[test]
    fn unpack_bad_status() {
        let mut transport = Intermediate::new();
        let mut input = Vec::new();
        input.extend(4_i32.to_le_bytes());
        input.extend((-404_i32).to_le_bytes());

        assert_eq!(
            transport.unpack(&input),
            Err(Error::BadStatus { status: 404 })
        );
    }
}
