// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use log::LevelFilter;
use mtcore_crypto::{AuthKey, DequeBuffer, Side, decrypt_data_v2, encrypt_data_v2};
use mtcore_proto::authentication;
use mtcore_proto::transport::{Full, Transport};
use mtcore_sender::{
    AlwaysReconnect, ConnectionParams, FixedReconnect, InvocationError, NoReconnect, ReadError,
    ReconnectionPolicy, ServerAddr, connect, connect_with_auth,
};
use mtcore_tl::{self as tl, Deserializable, Identifiable, Serializable};
use simple_logger::SimpleLogger;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

include!("../../includes/check_deps_documented.rs");

pub const TELEGRAM_TEST_DC_2: &str = "149.154.167.40:443";

const AUTH_KEY: [u8; 256] = [7; 256];

// msg_container#73f1f8dc messages:vector<message> = MessageContainer;
const MSG_CONTAINER: u32 = 0x73f1f8dc;

// rpc_result#f35c6d01 req_msg_id:long result:Object = RpcResult;
const RPC_RESULT: u32 = 0xf35c6d01;

// updatesTooLong#e317af7e = Updates;
const UPDATES_TOO_LONG: u32 = 0xe317af7e;

/// Offered by the fake server during key exchange, so the client never gets past step 2.
const UNKNOWN_FINGERPRINT: i64 = 1;

/// 1229739323 * 1402015859, small enough to factorize quickly.
const SMALL_PQ: u64 = 0x17ed48941a08f981;

static RETRY_NOW: FixedReconnect = FixedReconnect {
    attempts: 3,
    delay: Duration::ZERO,
};

static RETRY_SLOWLY: FixedReconnect = FixedReconnect {
    attempts: 3,
    delay: Duration::from_millis(500),
};

/// How the fake server answers each request.
#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Echo,
    FloodWait,
    /// Closes the first connection upon receiving a request, then echoes.
    DropFirstConnection,
    AlwaysDrop,
    /// Echoes, then sends an update nobody asked for.
    PushUpdate,
    /// Answers with a transport-level status instead of a message.
    Status(i32),
    /// Replies on the first connection are garbled after encryption.
    CorruptFirstConnection,
    /// Rejects the first request of every connection with `bad_msg_notification`.
    BadMsg(i32),
    /// Reports the key as unknown (-404) on the first connection and expects a new
    /// key exchange afterwards.
    ForgetKey,
}

#[derive(Debug)]
struct Received {
    msg_id: i64,
    body: Vec<u8>,
}

struct ServerConnection {
    stream: TcpStream,
    transport: Full,
    auth_key: AuthKey,
    session_id: i64,
    next_msg_id: i64,
}

impl ServerConnection {
    async fn send(&mut self, body: &[u8]) -> io::Result<()> {
        self.send_encrypted(body, false).await
    }

    async fn send_encrypted(&mut self, body: &[u8], corrupt: bool) -> io::Result<()> {
        let mut buffer = DequeBuffer::with_capacity(body.len() + 64, 64);
        0i64.serialize(&mut buffer);
        self.session_id.serialize(&mut buffer);
        self.next_msg_id.serialize(&mut buffer);
        1i32.serialize(&mut buffer);
        (body.len() as i32).serialize(&mut buffer);
        buffer.extend(body.iter().copied());
        self.next_msg_id += 4;

        encrypt_data_v2(&mut buffer, &self.auth_key, Side::Server);
        if corrupt {
            // Past `auth_key_id` and `msg_key`, inside the ciphertext.
            buffer[40] ^= 0xff;
        }
        self.transport.pack(&mut buffer);
        self.stream.write_all(buffer.as_ref()).await
    }

    async fn send_plain(&mut self, body: &[u8]) -> io::Result<()> {
        let mut buffer = DequeBuffer::with_capacity(body.len() + 32, 32);
        0i64.serialize(&mut buffer);
        self.next_msg_id.serialize(&mut buffer);
        (body.len() as i32).serialize(&mut buffer);
        buffer.extend(body.iter().copied());
        self.next_msg_id += 4;

        self.transport.pack(&mut buffer);
        self.stream.write_all(buffer.as_ref()).await
    }

    async fn send_status(&mut self, status: i32) -> io::Result<()> {
        let mut buffer = DequeBuffer::with_capacity(4, 8);
        buffer.extend(status.to_le_bytes());
        self.transport.pack(&mut buffer);
        self.stream.write_all(buffer.as_ref()).await
    }
}

fn read_message(buffer: &[u8], pos: &mut usize) -> (i64, i32, Vec<u8>) {
    let msg_id = i64::from_bytes(&buffer[*pos..]).unwrap();
    let seq_no = i32::from_bytes(&buffer[*pos + 8..]).unwrap();
    let len = i32::from_bytes(&buffer[*pos + 12..]).unwrap() as usize;
    let body = buffer[*pos + 16..*pos + 16 + len].to_vec();
    *pos += 16 + len;
    (msg_id, seq_no, body)
}

/// The session identifier and every content-related message in a decrypted payload.
fn content_messages(plaintext: &[u8]) -> (i64, Vec<(i64, Vec<u8>)>) {
    let session_id = i64::from_bytes(&plaintext[8..16]).unwrap();
    let mut pos = 16;
    let (msg_id, seq_no, body) = read_message(plaintext, &mut pos);

    let mut messages = Vec::new();
    if u32::from_bytes(&body).unwrap() == MSG_CONTAINER {
        let count = i32::from_bytes(&body[4..]).unwrap();
        let mut pos = 8;
        for _ in 0..count {
            let (msg_id, seq_no, body) = read_message(&body, &mut pos);
            if seq_no & 1 == 1 {
                messages.push((msg_id, body));
            }
        }
    } else if seq_no & 1 == 1 {
        messages.push((msg_id, body));
    }
    (session_id, messages)
}

/// Requests the sender makes on its own, which the fake server leaves unanswered.
fn is_keepalive(body: &[u8]) -> bool {
    let id = u32::from_bytes(body).unwrap();
    id == tl::functions::PingDelayDisconnect::CONSTRUCTOR_ID
        || id == tl::functions::GetFutureSalts::CONSTRUCTOR_ID
}

fn rpc_result(req_msg_id: i64, result: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    RPC_RESULT.serialize(&mut body);
    req_msg_id.serialize(&mut body);
    body.extend(result);
    body
}

fn bad_msg_notification(bad_msg_id: i64, code: i32) -> Vec<u8> {
    tl::enums::BadMsgNotification::Notification(tl::types::BadMsgNotification {
        bad_msg_id,
        bad_msg_seqno: 0,
        error_code: code,
    })
    .to_bytes()
}

/// The answer to `req_pq_multi`, echoing the client's nonce.
fn res_pq(nonce: &[u8]) -> Vec<u8> {
    tl::enums::ResPq::Pq(tl::types::ResPq {
        nonce: nonce.try_into().unwrap(),
        server_nonce: [0; 16],
        pq: SMALL_PQ.to_be_bytes().to_vec(),
        server_public_key_fingerprints: vec![UNKNOWN_FINGERPRINT],
    })
    .to_bytes()
}

/// The `(msg_id, body)` of an unencrypted message.
fn plain_message(payload: &[u8]) -> (i64, Vec<u8>) {
    let msg_id = i64::from_bytes(&payload[8..16]).unwrap();
    let len = i32::from_bytes(&payload[16..20]).unwrap() as usize;
    (msg_id, payload[20..20 + len].to_vec())
}

fn rpc_error(code: i32, message: &str) -> Vec<u8> {
    tl::enums::RpcError::Error(tl::types::RpcError {
        error_code: code,
        error_message: message.to_string(),
    })
    .to_bytes()
}

async fn serve(
    stream: TcpStream,
    behavior: Behavior,
    connection: usize,
    received: mpsc::UnboundedSender<Received>,
) -> io::Result<()> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    let mut conn = ServerConnection {
        stream,
        transport: Full::new(),
        auth_key: AuthKey::from_bytes(AUTH_KEY),
        session_id: 0,
        next_msg_id: ((now.as_secs() as i64) << 32) | 1,
    };

    let mut buffer = Vec::new();
    let mut rejected = false;
    loop {
        if conn.stream.read_buf(&mut buffer).await? == 0 {
            return Ok(());
        }
        while let Ok(offset) = conn.transport.unpack(&buffer) {
            let mut payload = buffer[offset.data_start..offset.data_end].to_vec();
            buffer.drain(..offset.next_offset);

            if payload[..8] == [0; 8] {
                let (msg_id, body) = plain_message(&payload);
                drop(received.send(Received {
                    msg_id,
                    body: body.clone(),
                }));
                if u32::from_bytes(&body).unwrap() == tl::functions::ReqPqMulti::CONSTRUCTOR_ID {
                    conn.send_plain(&res_pq(&body[4..20])).await?;
                }
                continue;
            }

            let plaintext = decrypt_data_v2(&mut payload, &conn.auth_key, Side::Client).unwrap();
            let (session_id, messages) = content_messages(plaintext);
            conn.session_id = session_id;

            for (msg_id, body) in messages {
                if is_keepalive(&body) {
                    continue;
                }
                drop(received.send(Received {
                    msg_id,
                    body: body.clone(),
                }));

                let query = if u32::from_bytes(&body).unwrap() == 0xcb9f372d {
                    body[12..].to_vec()
                } else {
                    body
                };
                match behavior {
                    Behavior::Echo => conn.send(&rpc_result(msg_id, &query)).await?,
                    Behavior::FloodWait => {
                        conn.send(&rpc_result(msg_id, &rpc_error(420, "FLOOD_WAIT_31")))
                            .await?
                    }
                    Behavior::DropFirstConnection if connection == 1 => return Ok(()),
                    Behavior::DropFirstConnection => {
                        conn.send(&rpc_result(msg_id, &query)).await?
                    }
                    Behavior::AlwaysDrop => return Ok(()),
                    Behavior::PushUpdate => {
                        conn.send(&rpc_result(msg_id, &query)).await?;
                        conn.send(&UPDATES_TOO_LONG.to_le_bytes()).await?;
                    }
                    Behavior::Status(status) => conn.send_status(status).await?,
                    Behavior::CorruptFirstConnection => {
                        conn.send_encrypted(&rpc_result(msg_id, &query), connection == 1)
                            .await?
                    }
                    Behavior::BadMsg(code) if !rejected => {
                        rejected = true;
                        conn.send(&bad_msg_notification(msg_id, code)).await?
                    }
                    Behavior::BadMsg(_) => conn.send(&rpc_result(msg_id, &query)).await?,
                    Behavior::ForgetKey if connection == 1 => conn.send_status(-404).await?,
                    Behavior::ForgetKey => conn.send(&rpc_result(msg_id, &query)).await?,
                }
            }
        }
    }
}

async fn start_server(behavior: Behavior) -> (ServerAddr, mpsc::UnboundedReceiver<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = ServerAddr::Tcp {
        address: listener.local_addr().unwrap(),
    };
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut connection = 0;
        while let Ok((stream, _)) = listener.accept().await {
            connection += 1;
            tokio::spawn(serve(stream, behavior, connection, tx.clone()));
        }
    });
    (addr, rx)
}

fn params(policy: &'static dyn ReconnectionPolicy) -> ConnectionParams {
    ConnectionParams {
        reconnection_policy: policy,
        compression_threshold: None,
        ..Default::default()
    }
}

async fn within<F: Future>(future: F) -> F::Output {
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("test took too long")
}

fn blob(data: &[u8]) -> tl::Blob {
    tl::Blob(data.to_vec())
}

#[tokio::test]
async fn request_is_answered() {
    within(async {
        let (addr, mut received) = start_server(Behavior::Echo).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
            .await
            .unwrap();

        assert_eq!(sender.invoke(&blob(b"Hey!")).await.unwrap(), blob(b"Hey!"));
        assert_eq!(sender.invoke(&blob(b"Bye!")).await.unwrap(), blob(b"Bye!"));
        assert_eq!(received.recv().await.unwrap().body, b"Hey!");
        assert_eq!(received.recv().await.unwrap().body, b"Bye!");
    })
    .await
}

#[tokio::test]
async fn rpc_errors_are_parsed() {
    within(async {
        let (addr, _received) = start_server(Behavior::FloodWait).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
            .await
            .unwrap();

        match sender.invoke(&blob(b"Hey!")).await {
            Err(InvocationError::Rpc(error)) => {
                assert_eq!(error.code, 420);
                assert!(error.is("FLOOD_WAIT"));
                assert_eq!(error.value, Some(31));
                assert_eq!(error.caused_by, Some(u32::from_le_bytes(*b"Hey!")));
            }
            result => panic!("expected rpc error, got {result:?}"),
        }
    })
    .await
}

#[tokio::test]
async fn requests_are_resent_after_reconnecting() {
    within(async {
        let (addr, mut received) = start_server(Behavior::DropFirstConnection).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&RETRY_NOW))
            .await
            .unwrap();

        assert_eq!(sender.invoke(&blob(b"Hey!")).await.unwrap(), blob(b"Hey!"));

        let first = received.recv().await.unwrap();
        let second = received.recv().await.unwrap();
        assert_eq!(first.body, b"Hey!");
        assert_eq!(second.body, b"Hey!");
        assert_ne!(first.msg_id, second.msg_id);
    })
    .await
}

#[tokio::test]
async fn requests_fail_when_reconnection_is_not_allowed() {
    within(async {
        let (addr, _received) = start_server(Behavior::AlwaysDrop).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
            .await
            .unwrap();

        match sender.invoke(&blob(b"Hey!")).await {
            Err(InvocationError::Read(ReadError::Io(_))) => {}
            result => panic!("expected io error, got {result:?}"),
        }
    })
    .await
}

#[tokio::test]
async fn rejected_clients_do_not_reconnect() {
    within(async {
        let (addr, mut received) = start_server(Behavior::Status(-403)).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&AlwaysReconnect))
            .await
            .unwrap();

        match sender.invoke(&blob(b"Hey!")).await {
            Err(InvocationError::Read(error)) => assert!(error.is_fatal()),
            result => panic!("expected fatal error, got {result:?}"),
        }
        assert!(received.recv().await.is_some());
        assert!(received.try_recv().is_err());
    })
    .await
}

#[tokio::test]
async fn forgotten_auth_key_is_reported() {
    within(async {
        let (addr, _received) = start_server(Behavior::Status(-404)).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        sender.on_auth_key_change(move |auth_key| drop(tx.send(auth_key)));

        match sender.invoke(&blob(b"Hey!")).await {
            Err(InvocationError::Read(error)) => assert!(error.is_auth_key_broken()),
            result => panic!("expected broken auth key, got {result:?}"),
        }
        assert_eq!(rx.try_recv().unwrap(), None);
    })
    .await
}

#[tokio::test]
async fn ordered_batches_are_chained() {
    within(async {
        let (addr, mut received) = start_server(Behavior::Echo).await;
        let sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
            .await
            .unwrap();
        let (runner, handle) = sender.into_runner();

        let (result, replies) = tokio::join!(runner.run(|_| {}), async move {
            let results = handle.send_batch(vec![b"One!".to_vec(), b"Two!".to_vec()], true);
            let mut replies = Vec::new();
            for result in results {
                replies.push(result.await.unwrap());
            }
            handle.disconnect();
            replies
        });
        result.unwrap();
        assert_eq!(replies, vec![b"One!".to_vec(), b"Two!".to_vec()]);

        let first = received.recv().await.unwrap();
        let second = received.recv().await.unwrap();
        assert_eq!(first.body, b"One!");
        assert_eq!(&second.body[..4], &0xcb9f372du32.to_le_bytes());
        assert_eq!(&second.body[4..12], &first.msg_id.to_le_bytes());
        assert_eq!(&second.body[12..], b"Two!");
    })
    .await
}

#[tokio::test]
async fn unordered_batches_are_not_chained() {
    within(async {
        let (addr, mut received) = start_server(Behavior::Echo).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
            .await
            .unwrap();

        let mut results = sender.enqueue_batch(vec![b"One!".to_vec(), b"Two!".to_vec()], false);
        let second = results.pop().unwrap();
        let first = results.pop().unwrap();
        assert_eq!(sender.invoke(&blob(b"End!")).await.unwrap(), blob(b"End!"));
        assert_eq!(first.await.unwrap(), b"One!");
        assert_eq!(second.await.unwrap(), b"Two!");

        let bodies = [
            received.recv().await.unwrap().body,
            received.recv().await.unwrap().body,
        ];
        assert_eq!(bodies, [b"One!".to_vec(), b"Two!".to_vec()]);
    })
    .await
}

#[tokio::test]
async fn updates_reach_the_runner() {
    within(async {
        let (addr, _received) = start_server(Behavior::PushUpdate).await;
        let sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
            .await
            .unwrap();
        let (runner, handle) = sender.into_runner();
        let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();

        let (result, (reply, update)) = tokio::join!(
            runner.run(move |update| drop(updates_tx.send(update))),
            async move {
                let reply = handle.invoke(&blob(b"Hey!")).await.unwrap();
                let update = updates_rx.recv().await.unwrap();
                handle.disconnect();
                (reply, update)
            }
        );
        result.unwrap();
        assert_eq!(reply, blob(b"Hey!"));
        assert_eq!(update, UPDATES_TOO_LONG.to_le_bytes());
    })
    .await
}

#[tokio::test]
async fn disconnecting_drops_pending_requests() {
    within(async {
        let (addr, _received) = start_server(Behavior::Echo).await;
        let sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
            .await
            .unwrap();
        let (runner, handle) = sender.into_runner();
        let pending = handle.send(b"Hey!".to_vec());
        handle.disconnect();

        runner.run(|_| {}).await.unwrap();
        assert!(matches!(pending.await, Err(InvocationError::Dropped)));
        assert!(matches!(
            handle.send(b"Bye!".to_vec()).await,
            Err(InvocationError::Dropped)
        ));
    })
    .await
}

#[tokio::test]
async fn requests_submitted_while_reconnecting_are_sent() {
    within(async {
        let (addr, mut received) = start_server(Behavior::DropFirstConnection).await;
        let sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&RETRY_SLOWLY))
            .await
            .unwrap();
        let (runner, handle) = sender.into_runner();

        let bodies = [b"One!", b"Two!", b"Tri!", b"For!"];
        let (result, replies) = tokio::join!(runner.run(|_| {}), async move {
            let mut pending = Vec::new();
            for body in bodies {
                pending.push(handle.send(body.to_vec()));
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            let mut replies = Vec::new();
            for result in pending {
                replies.push(result.await.unwrap());
            }
            handle.disconnect();
            replies
        });
        result.unwrap();
        assert_eq!(replies, bodies.map(|body| body.to_vec()));

        // The first request reached both connections.
        let mut seen = Vec::new();
        while let Ok(request) = received.try_recv() {
            seen.push(request.body);
        }
        assert_eq!(seen.iter().filter(|body| *body == b"One!").count(), 2);
    })
    .await
}

#[tokio::test]
async fn disconnecting_while_reconnecting_drops_requests() {
    within(async {
        let (addr, mut received) = start_server(Behavior::AlwaysDrop).await;
        let sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&RETRY_SLOWLY))
            .await
            .unwrap();
        let (runner, handle) = sender.into_runner();

        let (result, (first, second)) = tokio::join!(runner.run(|_| {}), async move {
            let first = handle.send(b"Hey!".to_vec());
            received.recv().await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            let second = handle.send(b"Bye!".to_vec());
            handle.disconnect();
            (first.await, second.await)
        });
        result.unwrap();
        assert!(matches!(first, Err(InvocationError::Dropped)));
        assert!(matches!(second, Err(InvocationError::Dropped)));
    })
    .await
}

#[tokio::test]
async fn unreadable_replies_cause_a_reconnection() {
    within(async {
        let (addr, mut received) = start_server(Behavior::CorruptFirstConnection).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&RETRY_NOW))
            .await
            .unwrap();

        assert_eq!(sender.invoke(&blob(b"Hey!")).await.unwrap(), blob(b"Hey!"));

        let first = received.recv().await.unwrap();
        let second = received.recv().await.unwrap();
        assert_eq!(second.body, first.body);
        assert_ne!(first.msg_id, second.msg_id);
    })
    .await
}

#[tokio::test]
async fn unreadable_replies_fail_requests_without_reconnection() {
    within(async {
        let (addr, _received) = start_server(Behavior::CorruptFirstConnection).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
            .await
            .unwrap();

        match sender.invoke(&blob(b"Hey!")).await {
            Err(InvocationError::Read(ReadError::Deserialize(_))) => {}
            result => panic!("expected deserialize error, got {result:?}"),
        }
    })
    .await
}

#[tokio::test]
async fn corrected_bad_messages_are_resent() {
    within(async {
        for code in [16, 17, 32, 33] {
            let (addr, mut received) = start_server(Behavior::BadMsg(code)).await;
            let mut sender =
                connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
                    .await
                    .unwrap();

            assert_eq!(sender.invoke(&blob(b"Hey!")).await.unwrap(), blob(b"Hey!"));

            let first = received.recv().await.unwrap();
            let second = received.recv().await.unwrap();
            assert_eq!(first.body, b"Hey!", "code {code}");
            assert_eq!(second.body, b"Hey!", "code {code}");
            assert_ne!(first.msg_id, second.msg_id, "code {code}");
        }
    })
    .await
}

#[tokio::test]
async fn other_bad_messages_fail_the_request() {
    within(async {
        for code in [20, 64] {
            let (addr, mut received) = start_server(Behavior::BadMsg(code)).await;
            let mut sender =
                connect_with_auth(Full::new(), addr, AUTH_KEY, params(&NoReconnect))
                    .await
                    .unwrap();

            match sender.invoke(&blob(b"Hey!")).await {
                Err(InvocationError::BadMessage { code: got }) => assert_eq!(got, code),
                result => panic!("expected bad message {code}, got {result:?}"),
            }
            assert!(received.recv().await.is_some());
            assert!(received.try_recv().is_err());
        }
    })
    .await
}

#[tokio::test]
async fn broken_auth_key_starts_a_new_exchange() {
    within(async {
        let (addr, mut received) = start_server(Behavior::ForgetKey).await;
        let mut sender = connect_with_auth(Full::new(), addr, AUTH_KEY, params(&RETRY_NOW))
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        sender.on_auth_key_change(move |auth_key| drop(tx.send(auth_key)));

        match sender.invoke(&blob(b"Hey!")).await {
            Err(InvocationError::Read(ReadError::AuthKeyGen(
                authentication::Error::UnknownFingerprints { fingerprints },
            ))) => assert_eq!(fingerprints, vec![UNKNOWN_FINGERPRINT]),
            result => panic!("expected key generation failure, got {result:?}"),
        }
        assert_eq!(rx.try_recv().unwrap(), None);
        assert!(rx.try_recv().is_err());

        assert_eq!(received.recv().await.unwrap().body, b"Hey!");
        let exchange = received.recv().await.unwrap();
        assert_eq!(
            exchange.body[..4],
            tl::functions::ReqPqMulti::CONSTRUCTOR_ID.to_le_bytes()
        );
    })
    .await
}

fn live_server_address() -> SocketAddr {
    // Optional `tests/live.toml` with an `address = "ip:port"` entry.
    std::fs::read_to_string("tests/live.toml")
        .ok()
        .and_then(|settings| settings.parse::<toml::Table>().ok())
        .and_then(|settings| settings.get("address")?.as_str()?.parse().ok())
        .unwrap_or_else(|| TELEGRAM_TEST_DC_2.parse().unwrap())
}

#[tokio::test]
#[ignore = "needs network access to a Telegram test server"]
async fn auth_key_is_generated_with_live_server() {
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
    let addr = ServerAddr::Tcp {
        address: live_server_address(),
    };
    let mut sender = connect(Full::new(), addr, ConnectionParams::default())
        .await
        .unwrap();

    let tl::enums::Pong::Pong(pong) = sender
        .invoke(&tl::functions::Ping { ping_id: 42 })
        .await
        .unwrap();
    assert_eq!(pong.ping_id, 42);
}
