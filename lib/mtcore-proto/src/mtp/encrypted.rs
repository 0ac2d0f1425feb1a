// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::{
    BadMessage, Deserialization, DeserializationFailure, DeserializeError, Mtp, RpcResult,
    RpcResultError,
};
use crate::manual_tl::{self, GzipPacked, Message, MessageContainer, MessageCopy};
use crate::{MsgId, utils};
use log::{debug, info, trace, warn};
use mtcore_crypto::{AuthKey, DequeBuffer, Side, decrypt_data_v2, encrypt_data_v2};
use mtcore_tl::{self as tl, Cursor, Deserializable, Identifiable, Serializable};
use std::mem;

/// salt (8 bytes), client_id (8 bytes)
pub const ENCRYPTED_PACKET_HEADER_LEN: usize = 8 + 8;

/// The header of the container message, followed by the container's own header.
pub const MESSAGE_CONTAINER_HEADER_LEN: usize =
    Message::SIZE_OVERHEAD + MessageContainer::SIZE_OVERHEAD;

// The server refuses acknowledgements of more messages at once.
const MAX_ACKS_PER_MESSAGE: usize = 8192;

// Fewer known salts than this and more should be requested.
const FUTURE_SALTS_LOW_WATER: usize = 2;

// Constructors of the API's `Updates`, which are pushed outside of any result.
// The API schema lives outside this crate, so only the identifiers are kept.
const UPDATES_TOO_LONG: u32 = 0xe317af7e;
static UPDATE_IDS: [u32; 7] = [
    UPDATES_TOO_LONG,
    0x313bc7f8, // updateShortMessage
    0x4d6deea5, // updateShortChatMessage
    0x78d4dec1, // updateShort
    0x725b04c3, // updatesCombined
    0x74ae4240, // updates
    0x9015e101, // updateShortSentMessage
];

/// Every message the server may send, classified by constructor.
///
/// Service messages are documented at:
/// * <https://core.telegram.org/mtproto/service_messages>
/// * <https://core.telegram.org/mtproto/service_messages_about_messages>
enum Incoming {
    RpcResult(manual_tl::RpcResult),
    MsgsAck(tl::enums::MsgsAck),
    BadNotification(tl::enums::BadMsgNotification),
    StateReq(tl::enums::MsgsStateReq),
    StateInfo(tl::enums::MsgsStateInfo),
    AllInfo(tl::enums::MsgsAllInfo),
    DetailedInfo(tl::enums::MsgDetailedInfo),
    Resend(tl::enums::MsgResendReq),
    FutureSalt(tl::enums::FutureSalt),
    FutureSalts(tl::enums::FutureSalts),
    Pong(tl::enums::Pong),
    DestroySession(tl::enums::DestroySessionRes),
    NewSessionCreated(tl::enums::NewSession),
    Container(MessageContainer),
    Copy(MessageCopy),
    GzipPacked(GzipPacked),
    HttpWait(tl::enums::HttpWait),
    Update(Vec<u8>),
    Unknown(u32),
}

impl Incoming {
    fn parse(body: &[u8]) -> Result<Self, DeserializeError> {
        use tl::types as t;

        Ok(match u32::from_bytes(body)? {
            manual_tl::RpcResult::CONSTRUCTOR_ID => {
                Self::RpcResult(manual_tl::RpcResult::from_bytes(body)?)
            }
            t::MsgsAck::CONSTRUCTOR_ID => Self::MsgsAck(Deserializable::from_bytes(body)?),
            t::BadMsgNotification::CONSTRUCTOR_ID | t::BadServerSalt::CONSTRUCTOR_ID => {
                Self::BadNotification(Deserializable::from_bytes(body)?)
            }
            t::MsgsStateReq::CONSTRUCTOR_ID => Self::StateReq(Deserializable::from_bytes(body)?),
            t::MsgsStateInfo::CONSTRUCTOR_ID => Self::StateInfo(Deserializable::from_bytes(body)?),
            t::MsgsAllInfo::CONSTRUCTOR_ID => Self::AllInfo(Deserializable::from_bytes(body)?),
            t::MsgDetailedInfo::CONSTRUCTOR_ID | t::MsgNewDetailedInfo::CONSTRUCTOR_ID => {
                Self::DetailedInfo(Deserializable::from_bytes(body)?)
            }
            t::MsgResendReq::CONSTRUCTOR_ID | t::MsgResendAnsReq::CONSTRUCTOR_ID => {
                Self::Resend(Deserializable::from_bytes(body)?)
            }
            t::FutureSalt::CONSTRUCTOR_ID => Self::FutureSalt(Deserializable::from_bytes(body)?),
            t::FutureSalts::CONSTRUCTOR_ID => {
                Self::FutureSalts(Deserializable::from_bytes(body)?)
            }
            t::Pong::CONSTRUCTOR_ID => Self::Pong(Deserializable::from_bytes(body)?),
            t::DestroySessionOk::CONSTRUCTOR_ID | t::DestroySessionNone::CONSTRUCTOR_ID => {
                Self::DestroySession(Deserializable::from_bytes(body)?)
            }
            t::NewSessionCreated::CONSTRUCTOR_ID => {
                Self::NewSessionCreated(Deserializable::from_bytes(body)?)
            }
            MessageContainer::CONSTRUCTOR_ID => {
                Self::Container(MessageContainer::read(&mut Cursor::from_slice(body))?)
            }
            MessageCopy::CONSTRUCTOR_ID => {
                Self::Copy(MessageCopy::read(&mut Cursor::from_slice(body))?)
            }
            GzipPacked::CONSTRUCTOR_ID => Self::GzipPacked(GzipPacked::from_bytes(body)?),
            t::HttpWait::CONSTRUCTOR_ID => Self::HttpWait(Deserializable::from_bytes(body)?),
            id if UPDATE_IDS.contains(&id) => Self::Update(body.to_vec()),
            id => Self::Unknown(id),
        })
    }
}

/// A builder to configure [`Encrypted`] instances.
///
/// Use the [`Encrypted::build`] method to create builder instances.
pub struct Builder {
    time_offset: i32,
    first_salt: i64,
    compression_threshold: Option<usize>,
}

/// An implementation of the [Mobile Transport Protocol] for ciphertext
/// (encrypted) messages.
///
/// [Mobile Transport Protocol]: https://core.telegram.org/mtproto/description
pub struct Encrypted {
    /// The authorization key to use to encrypt payload.
    auth_key: AuthKey,

    /// The time offset from the server's time, in seconds.
    time_offset: i32,

    /// The current salt to be used when encrypting payload.
    salt: i64,

    /// Salts the server announced, sorted by the time they become valid.
    future_salts: Vec<tl::types::FutureSalt>,

    /// The secure, random identifier for this instance.
    client_id: i64,

    /// The current message sequence number.
    sequence: i32,

    /// The ID of the last message.
    last_msg_id: i64,

    /// Identifiers that need to be acknowledged to the server.
    ///
    /// A [Content-related Message] is "a message requiring an explicit
    /// acknowledgment. These include all the user and many service messages,
    /// virtually all with the exception of containers and acknowledgments."
    ///
    /// [Content-related Message]: https://core.telegram.org/mtproto/description#content-related-message
    pending_ack: Vec<i64>,

    /// Serialized answers to service messages, sent along the next batch.
    pending_replies: Vec<Vec<u8>>,

    /// If present, the threshold in bytes at which a message will be
    /// considered large enough to attempt compressing it. Otherwise,
    /// outgoing messages will never be compressed.
    compression_threshold: Option<usize>,

    /// Results produced while processing the current payload.
    deserialization: Vec<Deserialization>,

    /// How many messages are there in the buffer.
    msg_count: usize,
}

impl Builder {
    /// Configures the time offset to Telegram servers.
    pub fn time_offset(mut self, offset: i32) -> Self {
        self.time_offset = offset;
        self
    }

    /// Configures the salt to use until the server provides others.
    pub fn first_salt(mut self, first_salt: i64) -> Self {
        self.first_salt = first_salt;
        self
    }

    /// Configures the compression threshold for outgoing messages.
    pub fn compression_threshold(mut self, threshold: Option<usize>) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Finishes the builder and returns the `Encrypted` instance with all
    /// the configuration changes applied.
    pub fn finish(self, auth_key: [u8; 256]) -> Encrypted {
        Encrypted {
            auth_key: AuthKey::from_bytes(auth_key),
            time_offset: self.time_offset,
            salt: self.first_salt,
            future_salts: Vec::new(),
            client_id: utils::random_i64(),
            sequence: 0,
            last_msg_id: 0,
            pending_ack: Vec::new(),
            pending_replies: Vec::new(),
            compression_threshold: self.compression_threshold,
            deserialization: Vec::new(),
            msg_count: 0,
        }
    }
}

impl Encrypted {
    /// Start building a new encrypted MTP.
    pub fn build() -> Builder {
        Builder {
            time_offset: 0,
            first_salt: 0,
            compression_threshold: crate::DEFAULT_COMPRESSION_THRESHOLD,
        }
    }

    /// The authorization key used for encryption and decryption.
    pub fn auth_key(&self) -> [u8; 256] {
        self.auth_key.to_bytes()
    }

    /// The current time offset to the server, in seconds.
    pub fn time_offset(&self) -> i32 {
        self.time_offset
    }

    /// Whether the server should be asked for more salts with `get_future_salts`.
    pub fn should_request_salts(&self) -> bool {
        self.future_salts.len() < FUTURE_SALTS_LOW_WATER
    }

    /// Start a new session, with a new identifier and fresh sequence numbers.
    ///
    /// The key, salt and time offset are kept.
    pub fn reset_session(&mut self) {
        self.client_id = utils::random_i64();
        self.sequence = 0;
        self.last_msg_id = 0;
        self.pending_ack.clear();
        self.pending_replies.clear();
        self.deserialization.clear();
        self.msg_count = 0;
    }

    /// Correct our time offset based on a known valid message ID.
    fn correct_time_offset(&mut self, msg_id: i64) {
        let now = utils::unix_now().as_secs() as i32;
        let correct = (msg_id >> 32) as i32;
        self.time_offset = correct - now;
        info!("corrected time offset to {}s", self.time_offset);
    }

    /// Generates a new unique message ID based on the current
    /// time (in ms) since epoch, applying a known time offset.
    fn get_new_msg_id(&mut self) -> i64 {
        self.last_msg_id = utils::new_msg_id(self.time_offset, self.last_msg_id);
        self.last_msg_id
    }

    /// Generates the next sequence number depending on whether
    /// it should be for a content-related query or not.
    fn get_seq_no(&mut self, content_related: bool) -> i32 {
        if content_related {
            self.sequence += 2;
            self.sequence - 1
        } else {
            self.sequence
        }
    }

    fn serialize_msg(
        &mut self,
        buffer: &mut DequeBuffer<u8>,
        body: &[u8],
        content_related: bool,
    ) -> MsgId {
        let msg_id = self.get_new_msg_id();
        msg_id.serialize(buffer);
        self.get_seq_no(content_related).serialize(buffer);
        (body.len() as i32).serialize(buffer);
        buffer.extend(body.iter().copied());

        self.msg_count += 1;
        MsgId(msg_id)
    }

    /// Serializes pending acknowledgements and answers to service messages.
    fn serialize_service_messages(&mut self, buffer: &mut DequeBuffer<u8>) {
        if !self.pending_ack.is_empty() {
            let count = self.pending_ack.len().min(MAX_ACKS_PER_MESSAGE);
            let msg_ids = self.pending_ack.drain(..count).collect();
            let body = tl::enums::MsgsAck::Ack(tl::types::MsgsAck { msg_ids }).to_bytes();
            self.serialize_msg(buffer, &body, false);
        }
        for reply in mem::take(&mut self.pending_replies) {
            self.serialize_msg(buffer, &reply, false);
        }
    }

    /// Returns the compressed form of `request` if it is worth sending instead.
    fn compress(&self, request: &[u8]) -> Option<Vec<u8>> {
        let threshold = self.compression_threshold?;
        if request.len() < threshold {
            return None;
        }
        let compressed = GzipPacked::new(request).ok()?.to_bytes();
        (compressed.len() < request.len()).then_some(compressed)
    }

    /// Switches to the announced salt that is valid right now, if any.
    fn rotate_salt(&mut self) {
        let now = utils::unix_now().as_secs() as i64 + self.time_offset as i64;
        self.future_salts
            .retain(|salt| salt.valid_until as i64 > now);

        if let Some(current) = self.future_salts.first() {
            if current.valid_since as i64 <= now && current.salt != self.salt {
                debug!("switching to a new server salt");
                self.salt = current.salt;
            }
        }
    }

    /// `finalize`, but without encryption.
    fn finalize_plain(&mut self, buffer: &mut DequeBuffer<u8>) -> Option<MsgId> {
        if self.msg_count == 0 {
            self.serialize_service_messages(buffer);
        }
        if self.msg_count == 0 {
            return None;
        }

        let msg_id = if self.msg_count == 1 {
            MsgId(self.last_msg_id)
        } else {
            // Give the container its message ID and sequence number.
            let mut header = Vec::with_capacity(MESSAGE_CONTAINER_HEADER_LEN);
            let msg_id = self.get_new_msg_id();
            msg_id.serialize(&mut header);
            self.get_seq_no(false).serialize(&mut header);
            // The container body includes its constructor ID and length (4 bytes each).
            ((buffer.len() + MessageContainer::SIZE_OVERHEAD) as i32).serialize(&mut header);
            MessageContainer::CONSTRUCTOR_ID.serialize(&mut header);
            (self.msg_count as i32).serialize(&mut header);
            buffer.extend_front(&header);
            MsgId(msg_id)
        };
        self.msg_count = 0;

        self.rotate_salt();
        let mut header = Vec::with_capacity(ENCRYPTED_PACKET_HEADER_LEN);
        self.salt.serialize(&mut header);
        self.client_id.serialize(&mut header);
        buffer.extend_front(&header);

        Some(msg_id)
    }

    fn process_message(&mut self, message: Message) -> Result<(), DeserializeError> {
        if message.requires_ack() {
            self.pending_ack.push(message.msg_id);
        }
        self.process_body(message.msg_id, &message.body)
    }

    /// Processes a message that was already acknowledged.
    fn process_body(&mut self, msg_id: i64, body: &[u8]) -> Result<(), DeserializeError> {
        match Incoming::parse(body)? {
            Incoming::RpcResult(result) => self.handle_rpc_result(result),
            Incoming::MsgsAck(tl::enums::MsgsAck::Ack(ack)) => {
                trace!("server acknowledged {} messages", ack.msg_ids.len());
            }
            Incoming::BadNotification(notification) => {
                self.handle_bad_notification(msg_id, notification)
            }
            Incoming::StateReq(tl::enums::MsgsStateReq::Req(req)) => {
                self.reply_unknown_state(msg_id, req.msg_ids.len())
            }
            Incoming::Resend(tl::enums::MsgResendReq::Req(req)) => {
                self.reply_unknown_state(msg_id, req.msg_ids.len())
            }
            Incoming::Resend(tl::enums::MsgResendReq::MsgResendAnsReq(req)) => {
                self.reply_unknown_state(msg_id, req.msg_ids.len())
            }
            Incoming::StateInfo(_) | Incoming::AllInfo(_) => {
                // Only informative; their acknowledgement is all that is needed.
            }
            Incoming::DetailedInfo(info) => self.handle_detailed_info(info),
            Incoming::FutureSalt(_) => {
                debug!("ignoring lone future_salt that no request asks for");
            }
            Incoming::FutureSalts(tl::enums::FutureSalts::Salts(salts)) => {
                self.handle_future_salts(salts, body)
            }
            Incoming::Pong(tl::enums::Pong::Pong(pong)) => {
                self.deserialization.push(Deserialization::RpcResult(RpcResult {
                    msg_id: MsgId(pong.msg_id),
                    body: body.to_vec(),
                }));
            }
            Incoming::DestroySession(result) => {
                debug!("destroy session result: {result:?}");
            }
            Incoming::NewSessionCreated(tl::enums::NewSession::Created(created)) => {
                info!("new session created by the server");
                self.salt = created.server_salt;
            }
            Incoming::Container(container) => {
                for message in container.messages {
                    if let Err(err) = self.process_message(message) {
                        warn!("failed to process message inside container: {err}");
                    }
                }
            }
            Incoming::Copy(copy) => self.process_message(copy.orig_message)?,
            Incoming::GzipPacked(packed) => {
                let body = packed.decompress()?;
                self.process_body(msg_id, &body)?;
            }
            Incoming::HttpWait(_) => {
                // Only meaningful over HTTP, which is not supported.
            }
            Incoming::Update(body) => self.deserialization.push(Deserialization::Update(body)),
            Incoming::Unknown(id) => {
                warn!(
                    "ignoring message with unexpected constructor {:08x} ({})",
                    id,
                    tl::name_for_id(id)
                );
            }
        }
        Ok(())
    }

    /// **[Response to an RPC query]**
    ///
    /// The `result` may be an `rpc_error`, or it may be compressed. Any
    /// problem with the result is given to the caller of the request, which
    /// means this method itself never fails.
    ///
    /// [Response to an RPC query]: https://core.telegram.org/mtproto/service_messages#response-to-an-rpc-query
    fn handle_rpc_result(&mut self, result: manual_tl::RpcResult) {
        let msg_id = MsgId(result.req_msg_id);
        let inner_constructor = result.inner_constructor();

        let body = match inner_constructor {
            Ok(GzipPacked::CONSTRUCTOR_ID) => {
                match GzipPacked::from_bytes(&result.result)
                    .map_err(DeserializeError::from)
                    .and_then(|packed| packed.decompress())
                {
                    Ok(body) => body,
                    Err(error) => return self.push_failure(msg_id, error),
                }
            }
            Ok(_) => result.result,
            Err(error) => return self.push_failure(msg_id, error.into()),
        };

        if u32::from_bytes(&body) == Ok(tl::types::RpcError::CONSTRUCTOR_ID) {
            match tl::enums::RpcError::from_bytes(&body) {
                Ok(tl::enums::RpcError::Error(error)) => self
                    .deserialization
                    .push(Deserialization::RpcError(RpcResultError { msg_id, error })),
                Err(error) => self.push_failure(msg_id, error.into()),
            }
        } else {
            self.store_own_updates(&body);
            self.deserialization
                .push(Deserialization::RpcResult(RpcResult { msg_id, body }));
        }
    }

    fn push_failure(&mut self, msg_id: MsgId, error: DeserializeError) {
        self.deserialization
            .push(Deserialization::Failure(DeserializationFailure { msg_id, error }));
    }

    /// Requests that result in `Updates` also carry updates of their own.
    fn store_own_updates(&mut self, body: &[u8]) {
        if let Ok(body_id) = u32::from_bytes(body) {
            if UPDATE_IDS.contains(&body_id) {
                self.deserialization
                    .push(Deserialization::Update(body.to_vec()));
            }
        }
    }

    /// **[Notice of Ignored Error Message]**
    ///
    /// The server did not process a message (or container). Whatever can be
    /// corrected locally is, and the caller decides whether to resend.
    ///
    /// [Notice of Ignored Error Message]: https://core.telegram.org/mtproto/service_messages_about_messages#notice-of-ignored-error-message
    fn handle_bad_notification(
        &mut self,
        server_msg_id: i64,
        notification: tl::enums::BadMsgNotification,
    ) {
        let bad_msg = match notification {
            tl::enums::BadMsgNotification::BadServerSalt(x) => {
                info!("server salt was wrong, switching to the one provided");
                self.salt = x.new_server_salt;
                // Announced salts are no longer trustworthy.
                self.future_salts.clear();
                BadMessage {
                    msg_id: MsgId(x.bad_msg_id),
                    code: x.error_code,
                }
            }
            tl::enums::BadMsgNotification::Notification(x) => {
                match x.error_code {
                    // Sent `msg_id` was too low or too high (our `time_offset` is wrong).
                    16 | 17 => self.correct_time_offset(server_msg_id),
                    // Sent `seq_no` was too low. Bump it by some large-ish value.
                    32 => self.sequence += 64,
                    // Sent `seq_no` was too high.
                    33 => self.sequence -= 16,
                    _ => {}
                }
                BadMessage {
                    msg_id: MsgId(x.bad_msg_id),
                    code: x.error_code,
                }
            }
        };

        debug!(
            "bad message {:?}: {} (code {})",
            bad_msg.msg_id,
            bad_msg.description(),
            bad_msg.code
        );
        self.deserialization
            .push(Deserialization::BadMessage(bad_msg));
    }

    /// Answers `msgs_state_req` and `msg_resend_req` claiming that nothing is
    /// known about any of the messages, which is true for a client.
    fn reply_unknown_state(&mut self, req_msg_id: i64, count: usize) {
        let reply = tl::enums::MsgsStateInfo::Info(tl::types::MsgsStateInfo {
            req_msg_id,
            info: vec![1; count],
        });
        self.pending_replies.push(reply.to_bytes());
    }

    /// The answer announced by `msg_detailed_info` has to be acknowledged,
    /// or else the server will keep sending it.
    fn handle_detailed_info(&mut self, info: tl::enums::MsgDetailedInfo) {
        let answer_msg_id = match info {
            tl::enums::MsgDetailedInfo::Info(x) => x.answer_msg_id,
            tl::enums::MsgDetailedInfo::MsgNewDetailedInfo(x) => x.answer_msg_id,
        };
        self.pending_ack.push(answer_msg_id);
    }

    fn handle_future_salts(&mut self, salts: tl::types::FutureSalts, body: &[u8]) {
        self.future_salts = salts.salts.0;
        self.future_salts.sort_by_key(|salt| salt.valid_since);
        self.rotate_salt();

        self.deserialization.push(Deserialization::RpcResult(RpcResult {
            msg_id: MsgId(salts.req_msg_id),
            body: body.to_vec(),
        }));
    }
}

impl Mtp for Encrypted {
    fn push(&mut self, buffer: &mut DequeBuffer<u8>, request: &[u8]) -> Option<MsgId> {
        assert_eq!(request.len() % 4, 0);
        assert!(request.len() + Message::SIZE_OVERHEAD <= MessageContainer::MAXIMUM_SIZE);

        if self.msg_count == 0 {
            self.serialize_service_messages(buffer);
        }
        if self.msg_count >= MessageContainer::MAXIMUM_LENGTH {
            return None;
        }

        let compressed = self.compress(request);
        let body = compressed.as_deref().unwrap_or(request);
        if buffer.len() + Message::SIZE_OVERHEAD + body.len() > MessageContainer::MAXIMUM_SIZE {
            return None;
        }

        let msg_id = self.serialize_msg(buffer, body, true);
        trace!("serialized request {:?} ({} bytes)", msg_id, body.len());
        Some(msg_id)
    }

    fn finalize(&mut self, buffer: &mut DequeBuffer<u8>) -> Option<MsgId> {
        let msg_id = self.finalize_plain(buffer)?;
        encrypt_data_v2(buffer, &self.auth_key, Side::Client);
        Some(msg_id)
    }

    fn deserialize(&mut self, payload: &[u8]) -> Result<Vec<Deserialization>, DeserializeError> {
        utils::check_message_buffer(payload)?;

        let mut ciphertext = payload.to_vec();
        let plaintext = decrypt_data_v2(&mut ciphertext, &self.auth_key, Side::Server)?;

        let mut buf = Cursor::from_slice(plaintext);
        let _salt = i64::deserialize(&mut buf)?;
        let client_id = i64::deserialize(&mut buf)?;
        if client_id != self.client_id {
            return Err(DeserializeError::BadSessionId {
                got: client_id,
                expected: self.client_id,
            });
        }

        let message = Message::read(&mut buf)?;
        let result = self.process_message(message);
        let deserialization = mem::take(&mut self.deserialization);
        result.map(|_| deserialization)
    }

    fn reset(&mut self) {
        self.reset_session();
    }
}
