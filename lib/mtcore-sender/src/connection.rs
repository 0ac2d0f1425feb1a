// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The byte-level half of the sender: a stream, the framing on top of it, and the
//! buffers that hold whatever could not be read or written at once.
use crate::errors::ReadError;
use crate::net::{NetStream, ServerAddr};
use crate::reconnection::ReconnectionPolicy;
use bytes::{Buf, BytesMut};
use futures_util::future::{Either, FutureExt as _, select};
use log::{debug, trace, warn};
use mtcore_crypto::DequeBuffer;
use mtcore_proto::mtp::{self, Deserialization, Mtp};
use mtcore_proto::transport::{self, Transport};
use std::io;
use std::ops::ControlFlow;
use std::pin::pin;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use web_time::Instant;

/// The maximum data that we're willing to send or receive at once.
///
/// Telegram will close the connection with roughly a megabyte of data,
/// so to account for the transports' own overhead, we add a few extra
/// kilobytes to the maximum data size.
pub(crate) const MAXIMUM_DATA: usize = (1024 * 1024) + (8 * 1024);

// Everything the codec and the transport may prepend to the messages in a flush:
// the container header, the encrypted header, `key_id` and `msg_key`, and the frame.
const LEADING_BUFFER_SPACE: usize = transport::MAX_TRANSPORT_HEADER_LEN
    + 24
    + mtp::ENCRYPTED_PACKET_HEADER_LEN
    + mtp::MESSAGE_CONTAINER_HEADER_LEN;

const READ_CHUNK: usize = 16 * 1024;

/// What happened during a single [`Connection::step`].
#[derive(Debug, Default)]
pub(crate) struct Progress {
    /// The pending write buffer was sent in its entirety.
    pub flushed: bool,
    /// The payload of every frame that was completed.
    pub packets: Vec<Vec<u8>>,
}

pub(crate) struct Connection<T: Transport> {
    stream: NetStream,
    pub(crate) transport: T,
    read_buffer: BytesMut,
    /// Filled by the codec and packed by the transport. It is only refilled once empty.
    pub(crate) write_buffer: DequeBuffer<u8>,
    write_head: usize,
}

impl<T: Transport> Connection<T> {
    /// Connects to `addr`, trying again for as long as `policy` allows.
    pub(crate) async fn connect(
        transport: T,
        addr: &ServerAddr,
        policy: &dyn ReconnectionPolicy,
    ) -> Result<Self, io::Error> {
        let mut attempts = 0;
        let stream = loop {
            match NetStream::connect(addr).await {
                Ok(stream) => break stream,
                Err(err) => match policy.should_retry(attempts) {
                    ControlFlow::Continue(delay) => {
                        attempts += 1;
                        warn!("connection to {addr} failed ({err}); retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                    }
                    ControlFlow::Break(()) => return Err(err),
                },
            }
        };

        Ok(Self {
            stream,
            transport,
            read_buffer: BytesMut::with_capacity(MAXIMUM_DATA),
            write_buffer: DequeBuffer::with_capacity(MAXIMUM_DATA, LEADING_BUFFER_SPACE),
            write_head: 0,
        })
    }

    /// Replaces the stream with a new one, discarding anything half-read or half-written.
    pub(crate) async fn reconnect(&mut self, addr: &ServerAddr) -> Result<(), io::Error> {
        self.stream = NetStream::connect(addr).await?;
        self.transport.reset();
        self.read_buffer.clear();
        self.write_buffer.clear();
        self.write_head = 0;
        Ok(())
    }

    /// Whether the write buffer may be filled with new data.
    pub(crate) fn can_write(&self) -> bool {
        self.write_buffer.is_empty()
    }

    /// Reads and writes at the same time until either makes progress or `deadline` is reached.
    pub(crate) async fn step(&mut self, deadline: Instant) -> Result<Progress, ReadError> {
        let mut progress = Progress::default();
        let timeout = deadline.saturating_duration_since(Instant::now());

        self.read_buffer.reserve(READ_CHUNK);
        let (read_len, write_len) = {
            let (mut reader, mut writer) = self.stream.split();
            let read = pin!(reader.read_buf(&mut self.read_buffer));
            let sleep = pin!(tokio::time::sleep(timeout));

            if self.write_head < self.write_buffer.len() {
                trace!(
                    "reading bytes and sending up to {} bytes via network",
                    self.write_buffer.len() - self.write_head
                );
                let write = pin!(writer.write(&self.write_buffer[self.write_head..]));
                match select(select(read, write), sleep).await {
                    Either::Left((Either::Left((n, write)), _)) => {
                        (Some(n?), write.now_or_never().transpose()?)
                    }
                    Either::Left((Either::Right((n, read)), _)) => {
                        (read.now_or_never().transpose()?, Some(n?))
                    }
                    Either::Right(((), _)) => (None, None),
                }
            } else {
                match select(read, sleep).await {
                    Either::Left((n, _)) => (Some(n?), None),
                    Either::Right(((), _)) => (None, None),
                }
            }
        };

        if let Some(n) = write_len {
            trace!("written {n} bytes to the network");
            self.write_head += n;
            if self.write_head == self.write_buffer.len() {
                self.write_buffer.clear();
                self.write_head = 0;
                progress.flushed = true;
            }
        }

        if let Some(n) = read_len {
            trace!("read {n} bytes from the network");
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by the server",
                )
                .into());
            }
            self.unpack_into(&mut progress.packets)?;
        }

        Ok(progress)
    }

    /// Moves every complete frame out of the read buffer.
    fn unpack_into(&mut self, packets: &mut Vec<Vec<u8>>) -> Result<(), ReadError> {
        loop {
            match self.transport.unpack(&self.read_buffer) {
                Ok(offset) => {
                    packets.push(self.read_buffer[offset.data_start..offset.data_end].to_vec());
                    self.read_buffer.advance(offset.next_offset);
                }
                Err(transport::Error::MissingBytes) if self.read_buffer.len() <= MAXIMUM_DATA => {
                    break Ok(());
                }
                Err(transport::Error::MissingBytes) => {
                    break Err(transport::Error::BadLen {
                        got: self.read_buffer.len() as i32,
                    }
                    .into());
                }
                Err(err) => break Err(err.into()),
            }
        }
    }

    /// Sends a single request through a plain codec and waits for its answer.
    ///
    /// Only meant for the authorization key generation, when nothing else is in flight.
    pub(crate) async fn exchange(
        &mut self,
        mtp: &mut mtp::Plain,
        request: &[u8],
        timeout: std::time::Duration,
    ) -> Result<Vec<u8>, ReadError> {
        self.write_buffer.clear();
        self.write_head = 0;
        mtp.reset();
        mtp.push(&mut self.write_buffer, request);
        mtp.finalize(&mut self.write_buffer);
        self.transport.pack(&mut self.write_buffer);

        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "server did not answer in time",
                )
                .into());
            }
            let progress = self.step(deadline).await?;
            for packet in progress.packets {
                for result in mtp.deserialize(&packet)? {
                    match result {
                        Deserialization::RpcResult(result) => return Ok(result.body),
                        other => debug!("ignoring unexpected plain message: {other:?}"),
                    }
                }
            }
        }
    }
}
