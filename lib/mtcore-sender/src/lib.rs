// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A [`Sender`] owns a connection to a single server, and with it the authorization key
//! and session used to talk to it.
//!
//! Requests are enqueued, batched into containers, and matched to their responses.
//! Broken connections are established again according to a [`ReconnectionPolicy`],
//! resending whatever had not been answered yet.
//!
//! The sender is driven by calling [`Sender::step`] repeatedly. To share it between
//! tasks, turn it into a [`SenderRunner`] and clone the accompanying [`SenderHandle`].
#![deny(unsafe_code)]

mod configuration;
mod connection;
mod errors;
mod exported;
mod net;
mod reconnection;

pub use configuration::ConnectionParams;
pub use errors::{AuthorizationError, InvocationError, ReadError, RpcError};
pub use exported::{ExportState, ExportedSenders};
pub use net::ServerAddr;
pub use reconnection::{AlwaysReconnect, FixedReconnect, NoReconnect, ReconnectionPolicy};

use connection::Connection;
use futures_util::future::{Either, select};
use log::{debug, error, info, trace, warn};
use mtcore_proto::mtp::{self, Deserialization, Mtp};
use mtcore_proto::transport::Transport;
use mtcore_proto::{MsgId, authentication};
use mtcore_tl::{self as tl, Deserializable, RemoteCall, Serializable};
use std::future::Future;
use std::io;
use std::mem;
use std::ops::ControlFlow;
use std::pin::{Pin, pin};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use web_time::{Instant, SystemTime, UNIX_EPOCH};

/// How often a ping is sent to keep the connection alive.
const PING_DELAY: Duration = Duration::from_secs(60);

/// The server closes the connection if no other ping arrives within this many seconds.
const NO_PING_DISCONNECT: i32 = 75;

const SALT_REQUEST_DELAY: Duration = Duration::from_secs(60);

const FUTURE_SALTS_TO_REQUEST: i32 = 64;

/// How long the server may take to answer each step of the key generation.
const AUTH_KEY_GEN_TIMEOUT: Duration = Duration::from_secs(30);

type RequestResult = Result<Vec<u8>, InvocationError>;

/// The eventual result of an enqueued request.
///
/// Resolves to [`InvocationError::Dropped`] if the sender goes away without answering.
pub struct PendingResult(oneshot::Receiver<RequestResult>);

impl PendingResult {
    fn try_take(&mut self) -> Option<RequestResult> {
        match self.0.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(InvocationError::Dropped)),
        }
    }
}

impl Future for PendingResult {
    type Output = RequestResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(InvocationError::Dropped)))
    }
}

struct Request {
    id: u64,
    body: Vec<u8>,
    /// The request that must be processed by the server before this one.
    after: Option<u64>,
    state: RequestState,
    /// `None` for the requests the sender makes on its own.
    result: Option<oneshot::Sender<RequestResult>>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum RequestState {
    NotSerialized,
    Serialized { msg_id: MsgId, container: MsgId },
    Sent { msg_id: MsgId, container: MsgId },
}

impl Request {
    fn msg_id(&self) -> Option<MsgId> {
        match self.state {
            RequestState::NotSerialized => None,
            RequestState::Serialized { msg_id, .. } | RequestState::Sent { msg_id, .. } => {
                Some(msg_id)
            }
        }
    }

    /// Whether the message with this identifier is either the request or its container.
    fn is_in(&self, id: MsgId) -> bool {
        match self.state {
            RequestState::NotSerialized => false,
            RequestState::Serialized { msg_id, container }
            | RequestState::Sent { msg_id, container } => msg_id == id || container == id,
        }
    }

    /// The caller is no longer interested in the result.
    fn is_abandoned(&self) -> bool {
        self.result.as_ref().is_some_and(|tx| tx.is_closed())
    }

    fn complete(self, result: RequestResult) {
        if let Some(tx) = self.result {
            drop(tx.send(result));
        }
    }
}

/// Manages enqueuing requests, matching them to their response, and IO.
pub struct Sender<T: Transport> {
    conn: Connection<T>,
    mtp: mtp::Encrypted,
    addr: ServerAddr,
    params: ConnectionParams,

    requests: Vec<Request>,
    next_request_id: u64,
    updates: Vec<Vec<u8>>,

    next_ping: Instant,
    next_salt_request: Instant,

    /// The error that broke the connection, until it is established again.
    failure: Option<ReadError>,
    reconnection_attempts: usize,
    auth_key_broken: bool,
    auth_key_callback: Option<Box<dyn FnMut(Option<[u8; 256]>) + Send>>,
}

fn build_mtp(
    params: &ConnectionParams,
    auth_key: [u8; 256],
    time_offset: i32,
    salt: i64,
) -> mtp::Encrypted {
    mtp::Encrypted::build()
        .time_offset(time_offset)
        .first_salt(salt)
        .compression_threshold(params.compression_threshold)
        .finish(auth_key)
}

impl<T: Transport> Sender<T> {
    fn new(
        conn: Connection<T>,
        mtp: mtp::Encrypted,
        addr: ServerAddr,
        params: ConnectionParams,
    ) -> Self {
        let now = Instant::now();
        Self {
            conn,
            mtp,
            addr,
            params,
            requests: Vec::new(),
            next_request_id: 0,
            updates: Vec::new(),
            next_ping: now + PING_DELAY,
            next_salt_request: now,
            failure: None,
            reconnection_attempts: 0,
            auth_key_broken: false,
            auth_key_callback: None,
        }
    }

    /// The authorization key currently in use.
    pub fn auth_key(&self) -> [u8; 256] {
        self.mtp.auth_key()
    }

    pub fn addr(&self) -> &ServerAddr {
        &self.addr
    }

    /// Registers a callback to run whenever the authorization key is invalidated (`None`)
    /// or replaced by a newly generated one (`Some`).
    ///
    /// The key negotiated by [`connect`] is available through [`Sender::auth_key`].
    pub fn on_auth_key_change(
        &mut self,
        callback: impl FnMut(Option<[u8; 256]>) + Send + 'static,
    ) {
        self.auth_key_callback = Some(Box::new(callback));
    }

    fn notify_auth_key(&mut self, auth_key: Option<[u8; 256]>) {
        if let Some(callback) = self.auth_key_callback.as_mut() {
            callback(auth_key);
        }
    }

    /// `enqueue` a Remote Procedure Call and `step` until it is answered.
    ///
    /// Updates received in the meantime are returned by the next call to [`Sender::step`].
    pub async fn invoke<R: RemoteCall>(
        &mut self,
        request: &R,
    ) -> Result<R::Return, InvocationError> {
        let pending = self.enqueue(request);
        let body = self.step_until_receive(pending).await?;
        Ok(R::Return::from_bytes(&body)?)
    }

    /// Enqueue a Remote Procedure Call to be sent in future calls to `step`.
    pub fn enqueue<R: RemoteCall>(&mut self, request: &R) -> PendingResult {
        self.enqueue_body(request.to_bytes())
    }

    /// Like [`Sender::enqueue`], with an already serialized request.
    pub fn enqueue_body(&mut self, body: Vec<u8>) -> PendingResult {
        let (tx, rx) = oneshot::channel();
        self.push_request(body, None, Some(tx));
        PendingResult(rx)
    }

    /// Enqueue several requests at once.
    ///
    /// If `ordered`, the server is asked to process each request only after the previous one.
    pub fn enqueue_batch(&mut self, bodies: Vec<Vec<u8>>, ordered: bool) -> Vec<PendingResult> {
        let (requests, results) = bodies
            .into_iter()
            .map(|body| {
                let (tx, rx) = oneshot::channel();
                ((body, tx), PendingResult(rx))
            })
            .unzip();
        self.enqueue_with(requests, ordered);
        results
    }

    fn enqueue_with(
        &mut self,
        requests: Vec<(Vec<u8>, oneshot::Sender<RequestResult>)>,
        ordered: bool,
    ) {
        let mut previous = None;
        for (body, tx) in requests {
            let after = if ordered { previous } else { None };
            previous = Some(self.push_request(body, after, Some(tx)));
        }
    }

    fn push_request(
        &mut self,
        body: Vec<u8>,
        after: Option<u64>,
        result: Option<oneshot::Sender<RequestResult>>,
    ) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.requests.push(Request {
            id,
            body,
            after,
            state: RequestState::NotSerialized,
            result,
        });
        id
    }

    async fn step_until_receive(&mut self, mut pending: PendingResult) -> RequestResult {
        loop {
            let updates = self.step().await?;
            self.updates.extend(updates);
            if let Some(result) = pending.try_take() {
                break result;
            }
        }
    }

    /// Step network events, writing and reading at the same time.
    ///
    /// Returns the updates that arrived. An error means the connection could not be
    /// recovered, and every pending request has already been failed with it.
    pub async fn step(&mut self) -> Result<Vec<Vec<u8>>, ReadError> {
        self.recover().await?;
        self.step_io().await;
        self.recover().await?;
        Ok(mem::take(&mut self.updates))
    }

    /// A single round of reading and writing. A broken connection is left in `failure`.
    ///
    /// Dropping the future before it completes loses nothing, so new requests can
    /// interrupt the wait.
    async fn step_io(&mut self) {
        self.enqueue_keepalive();
        self.try_fill_write();

        let deadline = if self.mtp.should_request_salts() {
            self.next_ping.min(self.next_salt_request)
        } else {
            self.next_ping
        };
        let result = match self.conn.step(deadline).await {
            Ok(progress) => {
                if progress.flushed {
                    self.on_flushed();
                }
                self.process_packets(progress.packets)
            }
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            warn!("connection to {} broke: {err}", self.addr);
            self.failure = Some(err);
        }
    }

    /// Whether the connection broke and has not been established again yet.
    pub fn is_broken(&self) -> bool {
        self.failure.is_some()
    }

    /// Fails every request with [`InvocationError::Dropped`].
    pub fn disconnect(&mut self) {
        for request in self.requests.drain(..) {
            request.complete(Err(InvocationError::Dropped));
        }
    }

    fn fail_all(&mut self, error: &ReadError) {
        warn!("failing {} pending requests: {error}", self.requests.len());
        for request in self.requests.drain(..) {
            request.complete(Err(InvocationError::Read(error.clone())));
        }
    }

    /// Establishes the connection again if it broke, for as long as the policy allows.
    ///
    /// An attempt only counts once the connection is actually being established, so
    /// interrupting the delay before it does not use up any.
    async fn recover(&mut self) -> Result<(), ReadError> {
        while let Some(error) = self.failure.clone() {
            if error.is_fatal() {
                error!("connection to {} cannot be recovered: {error}", self.addr);
                self.failure = None;
                self.fail_all(&error);
                return Err(error);
            }
            if error.is_auth_key_broken() && !self.auth_key_broken {
                warn!("server no longer knows the authorization key; a new one will be generated");
                self.auth_key_broken = true;
                self.notify_auth_key(None);
            }

            match self
                .params
                .reconnection_policy
                .should_retry(self.reconnection_attempts)
            {
                ControlFlow::Continue(delay) => {
                    info!(
                        "reconnecting to {} in {delay:?} (attempt {})",
                        self.addr,
                        self.reconnection_attempts + 1
                    );
                    tokio::time::sleep(delay).await;
                    self.reconnection_attempts += 1;
                }
                ControlFlow::Break(()) => {
                    self.failure = None;
                    self.reconnection_attempts = 0;
                    self.fail_all(&error);
                    return Err(error);
                }
            }

            match self.reestablish().await {
                Ok(()) => {
                    info!("reconnected to {}", self.addr);
                    self.failure = None;
                    self.reconnection_attempts = 0;
                }
                Err(err) => {
                    warn!("reconnection to {} failed: {err}", self.addr);
                    self.failure = Some(err);
                }
            }
        }
        Ok(())
    }

    async fn reestablish(&mut self) -> Result<(), ReadError> {
        self.conn.reconnect(&self.addr).await?;
        if self.auth_key_broken {
            let authentication::Finished {
                auth_key,
                time_offset,
                first_salt,
            } = generate_auth_key(
                &mut self.conn,
                &self.addr,
                self.params.auth_key_gen_attempts,
            )
            .await?;
            self.mtp = build_mtp(&self.params, auth_key, time_offset, first_salt);
            self.auth_key_broken = false;
            self.notify_auth_key(Some(auth_key));
        } else {
            self.mtp.reset();
        }

        // Keepalive requests are not worth resending; new ones are scheduled.
        self.requests.retain(|request| request.result.is_some());
        for request in self.requests.iter_mut() {
            request.state = RequestState::NotSerialized;
        }
        let now = Instant::now();
        self.next_ping = now + PING_DELAY;
        self.next_salt_request = now;
        Ok(())
    }

    fn enqueue_keepalive(&mut self) {
        let now = Instant::now();
        if now >= self.next_ping {
            self.next_ping = now + PING_DELAY;
            let ping_id = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos() as i64)
                .unwrap_or_default();
            debug!("sending keepalive ping {ping_id}");
            let ping = tl::functions::PingDelayDisconnect {
                ping_id,
                disconnect_delay: NO_PING_DISCONNECT,
            };
            self.push_request(ping.to_bytes(), None, None);
        }
        if self.mtp.should_request_salts() && now >= self.next_salt_request {
            self.next_salt_request = now + SALT_REQUEST_DELAY;
            debug!("requesting future salts");
            let request = tl::functions::GetFutureSalts {
                num: FUTURE_SALTS_TO_REQUEST,
            };
            self.push_request(request.to_bytes(), None, None);
        }
    }

    /// Serializes as many pending requests as fit, unless a write is already pending.
    fn try_fill_write(&mut self) {
        if !self.conn.can_write() {
            return;
        }

        self.requests.retain(|request| {
            let abandoned =
                request.state == RequestState::NotSerialized && request.is_abandoned();
            if abandoned {
                debug!("dropping request {} before sending it", request.id);
            }
            !abandoned
        });

        let mut serialized = Vec::new();
        for i in 0..self.requests.len() {
            let request = &self.requests[i];
            if request.state != RequestState::NotSerialized {
                continue;
            }

            let predecessor = request
                .after
                .and_then(|after| self.requests.iter().find(|r| r.id == after));
            let wrapped;
            let body = match predecessor.map(|r| (r.state, r.msg_id())) {
                // Answered or abandoned; there is nothing left to wait for.
                None => &request.body,
                Some((RequestState::NotSerialized, _)) => break,
                Some((_, msg_id)) => {
                    wrapped = tl::functions::InvokeAfterMsg {
                        msg_id: msg_id.map_or(0, |id| id.0),
                        query: tl::Blob(request.body.clone()),
                    }
                    .to_bytes();
                    &wrapped
                }
            };

            match self.mtp.push(&mut self.conn.write_buffer, body) {
                Some(msg_id) => serialized.push((i, msg_id)),
                None => break,
            }
        }

        let Some(container) = self.mtp.finalize(&mut self.conn.write_buffer) else {
            return;
        };
        for (i, msg_id) in serialized.iter().copied() {
            self.requests[i].state = RequestState::Serialized { msg_id, container };
        }
        debug!(
            "serialized {} requests into message {container:?}",
            serialized.len()
        );
        self.conn.transport.pack(&mut self.conn.write_buffer);
    }

    fn on_flushed(&mut self) {
        for request in self.requests.iter_mut() {
            if let RequestState::Serialized { msg_id, container } = request.state {
                request.state = RequestState::Sent { msg_id, container };
            }
        }
    }

    fn process_packets(&mut self, packets: Vec<Vec<u8>>) -> Result<(), ReadError> {
        for packet in packets {
            // A packet that cannot be read means the session can no longer be trusted.
            // Reconnecting starts a new one, and whatever it answered is sent again.
            let results = self.mtp.deserialize(&packet)?;
            for result in results {
                self.process_result(result);
            }
        }
        Ok(())
    }

    fn process_result(&mut self, result: Deserialization) {
        match result {
            Deserialization::Update(update) => {
                trace!("received update of {} bytes", update.len());
                self.updates.push(update);
            }
            Deserialization::RpcResult(mtp::RpcResult { msg_id, body }) => {
                self.complete(msg_id, move |_| Ok(body))
            }
            Deserialization::RpcError(mtp::RpcResultError { msg_id, error }) => {
                self.complete(msg_id, move |request| {
                    let error = RpcError::from(error);
                    Err(InvocationError::Rpc(
                        match u32::from_bytes(&request.body) {
                            Ok(id) => error.with_caused_by(id),
                            Err(_) => error,
                        },
                    ))
                })
            }
            Deserialization::BadMessage(bad) => self.handle_bad_message(bad),
            Deserialization::Failure(mtp::DeserializationFailure { msg_id, error }) => {
                self.complete(msg_id, move |_| Err(error.into()))
            }
        }
    }

    fn complete(&mut self, msg_id: MsgId, result: impl FnOnce(&Request) -> RequestResult) {
        match self
            .requests
            .iter()
            .position(|request| request.msg_id() == Some(msg_id))
        {
            Some(i) => {
                let request = self.requests.remove(i);
                debug!("got result for request {msg_id:?}");
                let result = result(&request);
                request.complete(result);
            }
            None => debug!("got result for unknown request {msg_id:?}"),
        }
    }

    fn handle_bad_message(&mut self, bad: mtp::BadMessage) {
        if bad.fatal() {
            error!("bad message {:?}: {}", bad.msg_id, bad.description());
        }

        let mut i = 0;
        while i < self.requests.len() {
            if !self.requests[i].is_in(bad.msg_id) {
                i += 1;
            } else if bad.retryable() {
                info!(
                    "resending request {} ({})",
                    self.requests[i].id,
                    bad.description()
                );
                self.requests[i].state = RequestState::NotSerialized;
                i += 1;
            } else {
                warn!(
                    "failing request {} ({})",
                    self.requests[i].id,
                    bad.description()
                );
                self.requests
                    .remove(i)
                    .complete(Err(InvocationError::BadMessage { code: bad.code }));
            }
        }
    }

    /// Moves the sender into a runner that can be driven on its own task, controlled
    /// through the returned handle.
    pub fn into_runner(self) -> (SenderRunner<T>, SenderHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            SenderRunner {
                sender: self,
                commands: rx,
            },
            SenderHandle(tx),
        )
    }
}

enum Command {
    Send {
        requests: Vec<(Vec<u8>, oneshot::Sender<RequestResult>)>,
        ordered: bool,
    },
    Disconnect,
}

/// A cheap handle to submit requests to a [`SenderRunner`] from anywhere.
#[derive(Clone)]
pub struct SenderHandle(mpsc::UnboundedSender<Command>);

impl SenderHandle {
    /// Submits an already serialized request.
    pub fn send(&self, body: Vec<u8>) -> PendingResult {
        let (tx, rx) = oneshot::channel();
        // If the runner is gone, `tx` is dropped and the result resolves as dropped.
        drop(self.0.send(Command::Send {
            requests: vec![(body, tx)],
            ordered: false,
        }));
        PendingResult(rx)
    }

    /// Submits several requests at once, optionally asking the server to process them in order.
    pub fn send_batch(&self, bodies: Vec<Vec<u8>>, ordered: bool) -> Vec<PendingResult> {
        let (requests, results) = bodies
            .into_iter()
            .map(|body| {
                let (tx, rx) = oneshot::channel();
                ((body, tx), PendingResult(rx))
            })
            .unzip();
        drop(self.0.send(Command::Send { requests, ordered }));
        results
    }

    pub async fn invoke<R: RemoteCall>(&self, request: &R) -> Result<R::Return, InvocationError> {
        let body = self.send(request.to_bytes()).await?;
        Ok(R::Return::from_bytes(&body)?)
    }

    /// Stops the runner. Pending requests resolve as dropped.
    pub fn disconnect(&self) {
        drop(self.0.send(Command::Disconnect));
    }
}

/// Drives a [`Sender`] until it is disconnected or all handles are dropped.
pub struct SenderRunner<T: Transport> {
    sender: Sender<T>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl<T: Transport> SenderRunner<T> {
    pub fn sender(&mut self) -> &mut Sender<T> {
        &mut self.sender
    }

    /// Runs the sender, handing every update received to `on_update`.
    ///
    /// Requests submitted while the connection is being established again wait until it
    /// is, and are then sent along with the ones that were pending.
    pub async fn run(mut self, mut on_update: impl FnMut(Vec<u8>)) -> Result<(), ReadError> {
        let mut held = Vec::new();
        loop {
            if self.sender.is_broken() {
                let recovered = {
                    let mut recover = pin!(self.sender.recover());
                    loop {
                        let command = pin!(self.commands.recv());
                        match select(command, recover.as_mut()).await {
                            Either::Left((Some(Command::Send { requests, ordered }), _)) => {
                                held.push((requests, ordered))
                            }
                            Either::Left((Some(Command::Disconnect) | None, _)) => break None,
                            Either::Right((result, _)) => break Some(result),
                        }
                    }
                };
                match recovered {
                    Some(Ok(())) => {}
                    Some(Err(err)) => {
                        for (requests, _) in held {
                            for (_, tx) in requests {
                                drop(tx.send(Err(InvocationError::Read(err.clone()))));
                            }
                        }
                        break Err(err);
                    }
                    None => {
                        self.disconnect();
                        break Ok(());
                    }
                }
            }
            for (requests, ordered) in held.drain(..) {
                self.sender.enqueue_with(requests, ordered);
            }

            let command = {
                let command = pin!(self.commands.recv());
                let step = pin!(self.sender.step_io());
                match select(command, step).await {
                    Either::Left((command, _)) => Some(command),
                    Either::Right(((), _)) => None,
                }
            };
            match command {
                Some(Some(Command::Send { requests, ordered })) => {
                    self.sender.enqueue_with(requests, ordered)
                }
                Some(Some(Command::Disconnect) | None) => {
                    self.disconnect();
                    break Ok(());
                }
                None => {}
            }
            mem::take(&mut self.sender.updates)
                .into_iter()
                .for_each(&mut on_update);
        }
    }

    fn disconnect(&mut self) {
        info!("disconnecting from {}", self.sender.addr);
        self.sender.disconnect();
    }
}

/// Connects to `addr` and generates a new authorization key for it.
pub async fn connect<T: Transport>(
    transport: T,
    addr: ServerAddr,
    params: ConnectionParams,
) -> Result<Sender<T>, AuthorizationError> {
    info!(
        "connecting to {addr} as {} on {}",
        params.app_version, params.device_model
    );
    let mut conn = Connection::connect(transport, &addr, params.reconnection_policy).await?;
    let authentication::Finished {
        auth_key,
        time_offset,
        first_salt,
    } = generate_auth_key(&mut conn, &addr, params.auth_key_gen_attempts).await?;
    let mtp = build_mtp(&params, auth_key, time_offset, first_salt);
    Ok(Sender::new(conn, mtp, addr, params))
}

/// Connects to `addr` using a previously generated authorization key.
pub async fn connect_with_auth<T: Transport>(
    transport: T,
    addr: ServerAddr,
    auth_key: [u8; 256],
    params: ConnectionParams,
) -> Result<Sender<T>, io::Error> {
    info!(
        "connecting to {addr} as {} on {} with a known key",
        params.app_version, params.device_model
    );
    let conn = Connection::connect(transport, &addr, params.reconnection_policy).await?;
    let mtp = build_mtp(&params, auth_key, 0, 0);
    Ok(Sender::new(conn, mtp, addr, params))
}

/// Runs the key exchange, starting over when the server asks to or the connection drops.
async fn generate_auth_key<T: Transport>(
    conn: &mut Connection<T>,
    addr: &ServerAddr,
    attempts: usize,
) -> Result<authentication::Finished, ReadError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        info!("generating new authorization key...");
        match try_generate_auth_key(conn).await {
            Ok(finished) => {
                info!("authorization key generated successfully");
                break Ok(finished);
            }
            Err(
                err @ (ReadError::Io(_)
                | ReadError::AuthKeyGen(authentication::Error::DHGenRetry)),
            ) if attempt < attempts => {
                warn!("authorization key generation failed ({err}); starting over");
                conn.reconnect(addr).await?;
            }
            Err(err) => break Err(err),
        }
    }
}

async fn try_generate_auth_key<T: Transport>(
    conn: &mut Connection<T>,
) -> Result<authentication::Finished, ReadError> {
    let mut mtp = mtp::Plain::new();

    let (request, data) = authentication::step1()?;
    debug!("gen auth key: sending step 1");
    let response = conn.exchange(&mut mtp, &request, AUTH_KEY_GEN_TIMEOUT).await?;

    debug!("gen auth key: starting step 2");
    // Factorizing `pq` is CPU-bound and must not stall other connections.
    let step2 = tokio::task::spawn_blocking(move || authentication::step2(data, &response));
    let (request, data) = match step2.await {
        Ok(result) => result?,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => return Err(io::Error::other(err).into()),
    };
    debug!("gen auth key: sending step 2");
    let response = conn.exchange(&mut mtp, &request, AUTH_KEY_GEN_TIMEOUT).await?;

    debug!("gen auth key: starting step 3");
    let (request, data) = authentication::step3(data, &response)?;
    debug!("gen auth key: sending step 3");
    let response = conn.exchange(&mut mtp, &request, AUTH_KEY_GEN_TIMEOUT).await?;

    debug!("gen auth key: completing generation");
    Ok(authentication::create_key(data, &response)?)
}
