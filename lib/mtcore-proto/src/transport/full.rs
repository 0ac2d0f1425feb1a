// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::{Error, Transport, UnpackedOffset, read_i32};
use crc32fast::Hasher;
use mtcore_crypto::DequeBuffer;

/// The basic MTProto transport protocol. This is an implementation of the
/// [full transport].
///
/// * Overhead: medium
/// * Minimum envelope length: 12 bytes.
/// * Maximum envelope length: 12 bytes.
///
/// It serializes the input payload as follows:
///
/// ```text
/// +----+----+----...----+----+
/// | len| seq|  payload  | crc|
/// +----+----+----...----+----+
///  ^^^^ 4 bytes
/// ```
///
/// `len` counts the whole frame, and `crc` is the CRC32 of everything before it.
///
/// [full transport]: https://core.telegram.org/mtproto/mtproto-transports#full
pub struct Full {
    send_seq: i32,
    recv_seq: i32,
}

#[allow(clippy::new_without_default)]
impl Full {
    pub fn new() -> Self {
        Self {
            send_seq: 0,
            recv_seq: 0,
        }
    }
}

impl Transport for Full {
    fn pack(&mut self, buffer: &mut DequeBuffer<u8>) {
        assert_eq!(buffer.len() % 4, 0);

        // payload len + length itself (4 bytes) + send counter (4 bytes) + crc32 (4 bytes)
        let len = buffer.len() + 4 + 4 + 4;

        let mut header = [0; 8];
        header[..4].copy_from_slice(&(len as i32).to_le_bytes());
        header[4..].copy_from_slice(&self.send_seq.to_le_bytes());
        buffer.extend_front(&header);

        let crc = {
            let mut hasher = Hasher::new();
            hasher.update(buffer.as_ref());
            hasher.finalize()
        };
        buffer.extend(crc.to_le_bytes());

        self.send_seq += 1;
    }

    fn unpack(&mut self, buffer: &[u8]) -> Result<UnpackedOffset, Error> {
        // Need 4 bytes for the initial length
        if buffer.len() < 4 {
            return Err(Error::MissingBytes);
        }

        let len = read_i32(buffer, 0);
        if len < 12 {
            return Err(Error::BadLen { got: len });
        }
        let len = len as usize;

        if buffer.len() < len {
            return Err(Error::MissingBytes);
        }

        let seq = read_i32(buffer, 4);
        if seq != self.recv_seq {
            return Err(Error::BadSeq {
                expected: self.recv_seq,
                got: seq,
            });
        }

        let crc = read_i32(buffer, len - 4) as u32;
        let valid_crc = {
            let mut hasher = Hasher::new();
            hasher.update(&buffer[..len - 4]);
            hasher.finalize()
        };
        if crc != valid_crc {
            return Err(Error::BadCrc {
                expected: valid_crc,
                got: crc,
            });
        }

        // A payload made of a single negative integer is a transport error.
        if len == 16 {
            let status = read_i32(buffer, 8);
            if status < 0 {
                return Err(Error::BadStatus {
                    status: status.unsigned_abs(),
                });
            }
        }

        self.recv_seq += 1;
        Ok(UnpackedOffset {
            data_start: 8,
            data_end: len - 4,
            next_offset: len,
        })
    }

    fn reset(&mut self) {
        self.send_seq = 0;
        self.recv_seq = 0;
    }
}
