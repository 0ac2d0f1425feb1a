// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use crate::mtp::DeserializeError;
use crate::transport;
use std::time::Duration;
use web_time::{SystemTime, UNIX_EPOCH};

/// Checks a message buffer for common errors.
pub(crate) fn check_message_buffer(message: &[u8]) -> Result<(), DeserializeError> {
    if message.len() == 4 {
        // A lone negative integer is a transport-level error code.
        let status = i32::from_le_bytes([message[0], message[1], message[2], message[3]]);
        Err(DeserializeError::Transport(transport::Error::BadStatus {
            status: status.unsigned_abs(),
        }))
    } else if message.len() < 20 {
        Err(DeserializeError::Truncated)
    } else {
        Ok(())
    }
}

/// Time elapsed since the Unix epoch, or zero if the clock is set before it.
pub(crate) fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// A random identifier, used for session IDs and the like.
pub(crate) fn random_i64() -> i64 {
    let mut buffer = [0; 8];
    getrandom::fill(&mut buffer).expect("failed to generate a secure client_id");
    i64::from_le_bytes(buffer)
}

/// Generates a message identifier from the current time, adjusted by `time_offset`
/// seconds, making sure it is strictly greater than `last_msg_id`.
///
/// Client message identifiers are always divisible by 4.
pub(crate) fn new_msg_id(time_offset: i32, last_msg_id: i64) -> i64 {
    let now = unix_now();
    let seconds = (now.as_secs() as i64 + time_offset as i64) as u64;
    let nanoseconds = now.subsec_nanos() as u64;
    let msg_id = ((seconds << 32) | (nanoseconds << 2)) as i64;

    if last_msg_id >= msg_id {
        last_msg_id + 4
    } else {
        msg_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_ids_keep_increasing() {
        let mut last = 0;
        for _ in 0..1000 {
            let msg_id = new_msg_id(0, last);
            assert!(msg_id > last);
            assert_eq!(msg_id % 4, 0);
            last = msg_id;
        }
    }

    #[test]
    fn msg_id_follows_offset() {
        let now = unix_now().as_secs() as i64;
        let msg_id = new_msg_id(3600, 0);
        assert!((msg_id >> 32) - now >= 3600);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert_eq!(
            check_message_buffer(&(-429i32).to_le_bytes()),
            Err(DeserializeError::Transport(transport::Error::BadStatus {
                status: 429
            }))
        );
        assert_eq!(
            check_message_buffer(&[0; 12]),
            Err(DeserializeError::Truncated)
        );
        assert_eq!(check_message_buffer(&[0; 20]), Ok(()));
    }
}
