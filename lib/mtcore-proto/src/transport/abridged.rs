// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::{Error, Transport, UnpackedOffset, read_i32};
use mtcore_crypto::DequeBuffer;

/// The lightest MTProto transport protocol available. This is an
/// implementation of the [abridged transport].
///
/// * Overhead: very small.
/// * Minimum envelope length: 1 byte.
/// * Maximum envelope length: 4 bytes.
///
/// Lengths are measured in 4-byte words. If the length is small enough,
/// it fits in a single byte:
///
/// ```text
/// +-+----...----+
/// |L|  payload  |
/// +-+----...----+
///  ^ 1 byte
/// ```
///
/// Otherwise the first byte is `0x7f` and the length follows in 3 bytes:
///
/// ```text
/// +----+----...----+
/// | len|  payload  |
/// +----+----...----+
///  ^^^^ 4 bytes
/// ```
///
/// The very first frame is preceded by the `0xef` tag.
///
/// [abridged transport]: https://core.telegram.org/mtproto/mtproto-transports#abridged
pub struct Abridged {
    init: bool,
}

#[allow(clippy::new_without_default)]
impl Abridged {
    pub fn new() -> Self {
        Self { init: false }
    }
}

impl Transport for Abridged {
    fn pack(&mut self, buffer: &mut DequeBuffer<u8>) {
        let len = buffer.len();
        assert_eq!(len % 4, 0);

        let len = len / 4;
        if len < 127 {
            buffer.extend_front(&[len as u8]);
        } else {
            buffer.extend_front(&(0x7f | ((len as u32) << 8)).to_le_bytes());
        }

        if !self.init {
            buffer.extend_front(&[0xef]);
            self.init = true;
        }
    }

    fn unpack(&mut self, buffer: &[u8]) -> Result<UnpackedOffset, Error> {
        if buffer.is_empty() {
            return Err(Error::MissingBytes);
        }

        let (header_len, len) = if buffer[0] < 127 {
            (1, buffer[0] as usize)
        } else {
            if buffer.len() < 4 {
                return Err(Error::MissingBytes);
            }
            (4, (read_i32(buffer, 0) as u32 >> 8) as usize)
        };

        let len = len * 4;
        if buffer.len() < header_len + len {
            return Err(Error::MissingBytes);
        }

        if header_len == 1 && len == 4 {
            let status = read_i32(buffer, 1);
            if status < 0 {
                return Err(Error::BadStatus {
                    status: status.unsigned_abs(),
                });
            }
        }

        Ok(UnpackedOffset {
            data_start: header_len,
            data_end: header_len + len,
            next_offset: header_len + len,
        })
    }

    fn reset(&mut self) {
        self.init = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns a new abridged transport, and `n` bytes of input data for it.
    fn setup_pack(n: usize) -> (Abridged, DequeBuffer<u8>) {
        let mut buffer = DequeBuffer::with_capacity(n, 5);
        buffer.extend((0..n).map(|x| (x & 0xff) as u8));
        (Abridged::new(), buffer)
    }

    #[test]
    fn pack_empty() {
        let (mut transport, mut buffer) = setup_pack(0);
        transport.pack(&mut buffer);
        assert_eq!(&buffer[..], &[0xef, 0]);
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
        assert_eq!(&buffer[..2], &[0xef, 32]);
        assert_eq!(&buffer[2..], &orig[..]);
    }

    #[test]
    fn pack_large() {
        let (mut transport, mut buffer) = setup_pack(512);
        let orig = buffer.clone();
        transport.pack(&mut buffer);
        assert_eq!(&buffer[..5], &[0xef, 0x7f, 128, 0, 0]);
        assert_eq!(&buffer[5..], &orig[..]);
    }

    #[test]
    fn unpack_small() {
        let mut transport = Abridged::new();
        assert_eq!(transport.unpack(&[]), Err(Error::MissingBytes));
        assert_eq!(transport.unpack(&[1]), Err(Error::MissingBytes));
        assert_eq!(transport.unpack(&[0x7f, 1]), Err(Error::MissingBytes));
    }

    #[test]
    fn unpack_empty() {
        let (mut transport, mut buffer) = setup_pack(0);
        transport.pack(&mut buffer);
        let offset = transport.unpack(&buffer[1..]).unwrap();
        assert_eq!(offset.data_start, offset.data_end);
        assert_eq!(offset.next_offset, 1);
    }

    #[test]
    fn unpack_normal() {
        let (mut transport, mut buffer) = setup_pack(128);
        let orig = buffer.clone();
        transport.pack(&mut buffer);
        let input = &buffer[1..]; // tag
        let offset = transport.unpack(input).unwrap();
        assert_eq!(&input[offset.data_start..offset.data_end], &orig[..]);
    }

    #[test]
    fn unpack_two_at_once() {
        let (mut transport, mut buffer) = setup_pack(128);
        let orig = buffer.clone();

        let mut input = Vec::new();
        transport.pack(&mut buffer);
        input.extend(&buffer[1..]); // tag
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
    fn unpack_large() {
        let (mut transport, mut buffer) = setup_pack(1024);
        let orig = buffer.clone();
        transport.pack(&mut buffer);
        let input = &buffer[1..]; // tag
        let offset = transport.unpack(input).unwrap();
        assert_eq!(offset.data_start, 4);
        assert_eq!(&input[offset.data_start..offset.data_end], &orig[..]);
    }

    #[test]
    fn unpack_bad_status() {
        let mut transport = Abridged::new();
        let mut input = vec![1u8];
        input.extend((-404_i32).to_le_bytes());

        assert_eq!(
            transport.unpack(&input),
            Err(Error::BadStatus { status: 404 })
        );
    }
}
