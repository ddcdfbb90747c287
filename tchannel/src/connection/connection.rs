//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! One transport link with its frame loop and pending-call table.

use super::handshake::{self, HandshakeError, PeerInfo};
use super::{CloseReason, ConnectionContext, ConnectionState, Direction, PendingCalls, TimeoutManager};
use crate::buffer::PayloadBuffer;
use crate::error::{CONNECTION_CLOSED_MESSAGE, CallError, ErrorType};
use crate::frame::{
    CONNECTION_FRAME_ID, CallHead, CallMessage, CancelMessage, ErrorMessage, FragmentAssembler,
    Frame, FrameError, FrameType, read_frame, write_frames,
};
use crate::message::{Request, Response};
use crate::transport::Transport;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

enum WriterCommand {
    Frames(Vec<Frame>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Default)]
struct Tasks {
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
}

struct ConnectionInner {
    id: u64,
    direction: Direction,
    remote_addr: Option<SocketAddr>,
    remote: PeerInfo,
    state: watch::Sender<ConnectionState>,
    close_reason: Mutex<Option<CloseReason>>,
    pending: Mutex<PendingCalls>,
    timeouts: TimeoutManager,
    inbound: Mutex<HashMap<u32, AbortHandle>>,
    writer: mpsc::Sender<WriterCommand>,
    tasks: Mutex<Tasks>,
    context: Arc<ConnectionContext>,
}

/// A connection to one remote process.
///
/// A connection multiplexes any number of concurrent calls in both
/// directions. Outbound calls are matched to their responses by correlation
/// id; inbound calls are handed to the channel's dispatcher and answered on
/// the same connection.
///
/// Cloning is cheap and yields another handle to the same connection.
///
/// # State machine
///
/// A connection is `Connecting` until the init exchange completes and
/// `Established` while calls may flow. A local [`close`](Self::close)
/// passes through `Closing`; a remote close, reset or protocol violation
/// moves straight to `Closed`. Either way every call still pending fails
/// with a `NetworkError` (or `ProtocolError`) before the connection reaches
/// `Closed`.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Runs the initiating side of the init exchange over `transport` and
    /// starts the connection.
    pub(crate) async fn outbound<T: Transport>(
        transport: T,
        context: Arc<ConnectionContext>,
    ) -> Result<Self, HandshakeError> {
        Self::open(transport, Direction::Outbound, context).await
    }

    /// Runs the accepting side of the init exchange over `transport` and
    /// starts the connection.
    pub(crate) async fn inbound<T: Transport>(
        transport: T,
        context: Arc<ConnectionContext>,
    ) -> Result<Self, HandshakeError> {
        Self::open(transport, Direction::Inbound, context).await
    }

    async fn open<T: Transport>(
        transport: T,
        direction: Direction,
        context: Arc<ConnectionContext>,
    ) -> Result<Self, HandshakeError> {
        let remote_addr = transport.metadata().peer_addr;
        let (mut reader, mut writer) = transport.split();

        let local = context.local_info();
        let timeout = context.config.handshake_timeout;
        let handshake = match direction {
            Direction::Outbound => handshake::initiate(&mut reader, &mut writer, &local, timeout).await,
            Direction::Inbound => handshake::accept(&mut reader, &mut writer, &local, timeout).await,
        };
        let remote = match handshake {
            Ok(remote) => remote,
            Err(error) => {
                debug!(?remote_addr, %direction, %error, "init exchange failed");
                // Best effort; the link is being dropped anyway.
                let _ = writer.shutdown().await;
                return Err(error);
            }
        };

        let (writer_tx, writer_rx) = mpsc::channel(context.config.write_queue_depth);
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let inner = Arc::new(ConnectionInner {
            id: context.next_connection_id(),
            direction,
            remote_addr,
            remote,
            state,
            close_reason: Mutex::new(None),
            pending: Mutex::new(PendingCalls::new(context.config.max_pending_calls)),
            timeouts: TimeoutManager::new(),
            inbound: Mutex::new(HashMap::new()),
            writer: writer_tx,
            tasks: Mutex::new(Tasks::default()),
            context,
        });

        {
            let mut tasks = inner.tasks.lock();
            tasks.writer = Some(tokio::spawn(write_loop(Arc::clone(&inner), writer, writer_rx)));
            tasks.timer = Some(tokio::spawn(expire_loop(Arc::clone(&inner))));
            tasks.reader = Some(tokio::spawn(read_loop(Arc::clone(&inner), reader)));
        }

        if inner.transition(ConnectionState::Established) {
            info!(
                connection_id = inner.id,
                direction = %inner.direction,
                peer = %inner.remote,
                "connection established"
            );
        }
        Ok(Self { inner })
    }

    /// Process-unique id of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Which side opened the connection.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Returns `true` while calls may be sent.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.state() == ConnectionState::Established
    }

    /// Address of the remote socket, when the transport has one.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    /// Identity the remote side advertised.
    #[must_use]
    pub fn remote_info(&self) -> &PeerInfo {
        &self.inner.remote
    }

    /// Why the connection closed, once it has begun closing.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.close_reason.lock().clone()
    }

    /// Number of outbound calls awaiting a response.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Sends `request` and waits for its outcome.
    ///
    /// The call fails with `Timeout` if no response arrives by `deadline`,
    /// with `Busy` if too many calls are already pending, and with a
    /// `NetworkError` if the connection is not established or closes first.
    ///
    /// Dropping the returned future before it resolves withdraws the call
    /// and tells the remote side to stop working on it.
    pub async fn send(&self, request: Request, deadline: Instant) -> Result<Response, CallError> {
        let inner = &self.inner;
        let config = &inner.context.config;

        let size = request.args_len();
        if size > config.max_message_size {
            return Err(CallError::bad_request(format!(
                "request of {size} bytes exceeds the limit of {} bytes",
                config.max_message_size
            )));
        }

        let (id, outcome) = {
            let mut pending = inner.pending.lock();
            // Checked under the pending lock: a close that has not drained
            // the table yet will drain this call too.
            if !self.is_established() {
                return Err(inner.close_error());
            }
            pending.register()?
        };
        let mut guard = PendingGuard {
            inner,
            id,
            armed: true,
            sent: false,
        };
        inner.timeouts.schedule(id, deadline);

        let ttl = deadline.saturating_duration_since(Instant::now());
        let ttl_ms = u32::try_from(ttl.as_millis()).unwrap_or(u32::MAX).max(1);
        let head = CallHead::Request {
            ttl_ms,
            service: request.service().to_string(),
            headers: request.transport_headers().clone(),
        };
        let args = request.into_args().map(PayloadBuffer::into_bytes);
        let frames = CallMessage { id, head, args }
            .encode(config.max_frame_payload)
            .map_err(|error| CallError::bad_request(error.to_string()))?;

        debug!(connection_id = inner.id, id, frames = frames.len(), "sending call");
        if !inner.enqueue(frames).await {
            return Err(inner.close_error());
        }
        guard.sent = true;

        let result = outcome.await.unwrap_or_else(|_| Err(inner.close_error()));
        guard.armed = false;
        result
    }

    /// Sends a ping and returns the round-trip time.
    pub async fn ping(&self, timeout: Duration) -> Result<Duration, CallError> {
        let inner = &self.inner;
        let (id, pong) = {
            let mut pending = inner.pending.lock();
            if !self.is_established() {
                return Err(inner.close_error());
            }
            pending.register_ping()
        };

        let started = Instant::now();
        if !inner.enqueue(vec![Frame::new(FrameType::PingReq, id, Bytes::new())]).await {
            inner.pending.lock().take_ping(id);
            return Err(inner.close_error());
        }
        match tokio::time::timeout(timeout, pong).await {
            Ok(Ok(())) => Ok(started.elapsed()),
            Ok(Err(_)) => Err(inner.close_error()),
            Err(_) => {
                inner.pending.lock().take_ping(id);
                Err(CallError::timeout(format!("ping not answered within {timeout:?}")))
            }
        }
    }

    /// Closes the connection.
    ///
    /// Pending calls fail with a `NetworkError` before the write side is
    /// flushed and shut down. Waits at most the configured shutdown grace
    /// for the flush. Closing an already closed connection does nothing.
    pub async fn close(&self) {
        let inner = &self.inner;
        if !inner.begin_close(CloseReason::Local) {
            return;
        }

        let grace = inner.context.config.shutdown_grace;
        let flushed = tokio::time::timeout(grace, async {
            let (done_tx, done_rx) = oneshot::channel();
            if inner.writer.send(WriterCommand::Shutdown(done_tx)).await.is_ok() {
                let _ = done_rx.await;
            }
        })
        .await;
        if flushed.is_err() {
            debug!(connection_id = inner.id, ?grace, "write side did not drain in time");
        }
        inner.finish();
    }

    /// Waits until the connection is closed.
    pub async fn closed(&self) {
        let mut state = self.inner.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = state.wait_for(|state| state.is_terminal()).await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("direction", &self.inner.direction)
            .field("state", &self.state())
            .field("remote", &self.inner.remote)
            .finish()
    }
}

/// Removes an outbound call that is dropped before it resolves and tells
/// the remote side to stop working on it.
struct PendingGuard<'a> {
    inner: &'a ConnectionInner,
    id: u32,
    armed: bool,
    sent: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let inner = self.inner;
        inner.timeouts.cancel(self.id);
        let was_pending = inner.pending.lock().take(self.id).is_some();
        if was_pending && self.sent && *inner.state.borrow() == ConnectionState::Established {
            debug!(connection_id = inner.id, id = self.id, "call withdrawn");
            let payload = CancelMessage::new("call cancelled by caller").encode();
            let frame = Frame::new(FrameType::Cancel, self.id, payload);
            // Cannot wait in drop; a full queue means the remote will time
            // the call out on its own.
            let _ = inner.writer.try_send(WriterCommand::Frames(vec![frame]));
        }
    }
}

impl ConnectionInner {
    fn transition(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                debug!(connection_id = self.id, from = %state, to = %next, "connection state change");
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// The error calls on this connection fail with once it is closing.
    fn close_error(&self) -> CallError {
        self.close_reason
            .lock()
            .as_ref()
            .map(CloseReason::call_error)
            .unwrap_or_else(|| CallError::network(CONNECTION_CLOSED_MESSAGE))
    }

    /// Records `reason`, leaves `Established` and fails everything in
    /// flight. Returns `false` if the connection was already closing.
    fn begin_close(&self, reason: CloseReason) -> bool {
        {
            let mut close_reason = self.close_reason.lock();
            if close_reason.is_some() {
                return false;
            }
            *close_reason = Some(reason.clone());
        }

        match &reason {
            CloseReason::Local | CloseReason::RemoteClosed => {
                info!(connection_id = self.id, peer = %self.remote, %reason, "connection closing");
            }
            _ => warn!(connection_id = self.id, peer = %self.remote, %reason, "connection lost"),
        }
        self.transition(reason.next_state());

        let error = reason.call_error();
        let senders = self.pending.lock().drain();
        if !senders.is_empty() {
            debug!(connection_id = self.id, calls = senders.len(), "failing pending calls");
        }
        for sender in senders {
            let _ = sender.send(Err(error.clone()));
        }
        self.timeouts.clear();

        for (_, handler) in self.inbound.lock().drain() {
            handler.abort();
        }
        true
    }

    /// Moves to `Closed` and stops the background tasks.
    fn finish(&self) {
        self.transition(ConnectionState::Closed);
        let mut tasks = self.tasks.lock();
        if let Some(reader) = tasks.reader.take() {
            reader.abort();
        }
        if let Some(timer) = tasks.timer.take() {
            timer.abort();
        }
        if let Some(writer) = tasks.writer.take() {
            // Let the writer flush what is queued, unless it is stuck.
            let (done_tx, _) = oneshot::channel();
            if let Err(mpsc::error::TrySendError::Full(_)) =
                self.writer.try_send(WriterCommand::Shutdown(done_tx))
            {
                writer.abort();
            }
        }
    }

    /// Closes for a reason observed by a background task.
    fn terminate(&self, reason: CloseReason) {
        self.begin_close(reason);
        self.finish();
    }

    async fn enqueue(&self, frames: Vec<Frame>) -> bool {
        self.writer.send(WriterCommand::Frames(frames)).await.is_ok()
    }

    fn handle_frame(
        self: &Arc<Self>,
        frame: Frame,
        requests: &mut FragmentAssembler,
        responses: &mut FragmentAssembler,
    ) -> Result<ControlFlow<CloseReason>, FrameError> {
        match frame.frame_type {
            FrameType::CallReq | FrameType::CallReqContinue => {
                if let Some(message) = requests.push(frame)? {
                    self.dispatch_inbound(message)?;
                }
            }
            FrameType::CallRes | FrameType::CallResContinue => {
                if let Some(message) = responses.push(frame)? {
                    self.complete_outbound(message)?;
                }
            }
            FrameType::Cancel => {
                let message = CancelMessage::decode(&frame.payload)?;
                requests.discard(frame.id);
                match self.inbound.lock().remove(&frame.id) {
                    Some(handler) => {
                        debug!(connection_id = self.id, id = frame.id, reason = %message.message, "inbound call cancelled");
                        handler.abort();
                    }
                    None => {
                        debug!(connection_id = self.id, id = frame.id, "cancel for a call that is not running");
                    }
                }
            }
            FrameType::PingReq => {
                let pong = Frame::new(FrameType::PingRes, frame.id, Bytes::new());
                if self.writer.try_send(WriterCommand::Frames(vec![pong])).is_err() {
                    debug!(connection_id = self.id, id = frame.id, "dropping ping response");
                }
            }
            FrameType::PingRes => match self.pending.lock().take_ping(frame.id) {
                Some(pong) => {
                    let _ = pong.send(());
                }
                None => warn!(connection_id = self.id, id = frame.id, "unsolicited ping response"),
            },
            FrameType::Error => {
                let message = ErrorMessage::decode(&frame.payload)?;
                if frame.id == CONNECTION_FRAME_ID {
                    return Ok(ControlFlow::Break(CloseReason::Protocol(format!(
                        "peer reported {}: {}",
                        message.error_type, message.message
                    ))));
                }
                responses.discard(frame.id);
                self.timeouts.cancel(frame.id);
                let error = CallError::new(message.error_type, message.message);
                if !self.pending.lock().complete(frame.id, Err(error)) {
                    warn!(connection_id = self.id, id = frame.id, "error frame for a call that is no longer pending");
                }
            }
            FrameType::InitReq | FrameType::InitRes => {
                return Err(FrameError::Unexpected {
                    frame_type: frame.frame_type,
                    id: frame.id,
                });
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn complete_outbound(&self, message: CallMessage) -> Result<(), FrameError> {
        let CallHead::Response { code, headers } = message.head else {
            return Err(FrameError::malformed("response assembler produced a request"));
        };
        let id = message.id;
        self.timeouts.cancel(id);
        let sender = self.pending.lock().take(id);
        match sender {
            Some(sender) => {
                let tracker = &self.context.tracker;
                let args = message.args.map(|arg| PayloadBuffer::tracked(arg, tracker));
                // A caller that stopped waiting drops the response, releasing it.
                let _ = sender.send(Ok(Response::from_parts(code, args, headers)));
            }
            None => {
                warn!(connection_id = self.id, id, "discarding response for a call that is no longer pending");
            }
        }
        Ok(())
    }

    fn dispatch_inbound(self: &Arc<Self>, message: CallMessage) -> Result<(), FrameError> {
        let CallHead::Request {
            ttl_ms,
            service,
            headers,
        } = message.head
        else {
            return Err(FrameError::malformed("request assembler produced a response"));
        };
        let id = message.id;

        let mut inbound = self.inbound.lock();
        if inbound.contains_key(&id) {
            return Err(FrameError::malformed(format!(
                "call id {id} is already in progress"
            )));
        }

        let tracker = &self.context.tracker;
        let args = message.args.map(|arg| PayloadBuffer::tracked(arg, tracker));
        let ttl = (ttl_ms > 0).then(|| Duration::from_millis(u64::from(ttl_ms)));
        let request = Request::from_parts(service, args, ttl, headers);

        let inner = Arc::clone(self);
        // Inserted while still holding the lock, so the task cannot look for
        // its entry before it exists.
        let task = tokio::spawn(async move {
            let outcome = inner.context.dispatcher.dispatch(request).await;
            inner.finish_inbound(id, outcome).await;
        });
        inbound.insert(id, task.abort_handle());
        Ok(())
    }

    async fn finish_inbound(&self, id: u32, outcome: Result<Response, CallError>) {
        if self.inbound.lock().remove(&id).is_none() {
            debug!(connection_id = self.id, id, "call was cancelled; dropping its outcome");
            return;
        }

        let max_payload = self.context.config.max_frame_payload;
        let frames = match outcome {
            Ok(response) => match self.encode_response(id, response) {
                Ok(frames) => frames,
                Err(error) => vec![error_frame(id, &error, max_payload)],
            },
            Err(error) => vec![error_frame(id, &error, max_payload)],
        };
        if !self.enqueue(frames).await {
            debug!(connection_id = self.id, id, "connection closed before the response was sent");
        }
    }

    fn encode_response(&self, id: u32, response: Response) -> Result<Vec<Frame>, CallError> {
        let config = &self.context.config;
        let size = response.args_len();
        if size > config.max_message_size {
            return Err(CallError::unexpected(format!(
                "response of {size} bytes exceeds the limit of {} bytes",
                config.max_message_size
            )));
        }
        let head = CallHead::Response {
            code: response.code(),
            headers: response.transport_headers().clone(),
        };
        let args = response.into_args().map(PayloadBuffer::into_bytes);
        CallMessage { id, head, args }
            .encode(config.max_frame_payload)
            .map_err(|error| CallError::unexpected(error.to_string()))
    }

    fn expire(&self, ids: Vec<u32>) {
        for id in ids {
            let sender = self.pending.lock().take(id);
            if let Some(sender) = sender {
                debug!(connection_id = self.id, id, "call timed out");
                let _ = sender.send(Err(CallError::timeout("Request timed out")));
            }
        }
    }
}

fn error_frame(id: u32, error: &CallError, max_payload: usize) -> Frame {
    let payload = ErrorMessage::new(error.error_type(), error.message()).encode(max_payload);
    Frame::new(FrameType::Error, id, payload)
}

async fn read_loop<R>(inner: Arc<ConnectionInner>, mut reader: R)
where
    R: AsyncRead + Unpin,
{
    let limit = inner.context.config.max_message_size;
    let mut requests = FragmentAssembler::new(limit);
    let mut responses = FragmentAssembler::new(limit);

    let reason = loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break CloseReason::RemoteClosed,
            Err(FrameError::Io { source }) => break CloseReason::Reset(source.to_string()),
            Err(error) => break protocol_violation(&inner, error),
        };
        match inner.handle_frame(frame, &mut requests, &mut responses) {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(reason)) => break reason,
            Err(error) => break protocol_violation(&inner, error),
        }
    };
    inner.terminate(reason);
}

/// Tells the peer why the connection is being dropped.
fn protocol_violation(inner: &ConnectionInner, error: FrameError) -> CloseReason {
    let message = error.to_string();
    let call_error = CallError::new(ErrorType::ProtocolError, message.clone());
    let frame = error_frame(CONNECTION_FRAME_ID, &call_error, inner.context.config.max_frame_payload);
    let _ = inner.writer.try_send(WriterCommand::Frames(vec![frame]));
    CloseReason::Protocol(message)
}

async fn write_loop<W>(
    inner: Arc<ConnectionInner>,
    mut writer: W,
    mut commands: mpsc::Receiver<WriterCommand>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        match command {
            WriterCommand::Frames(frames) => {
                if let Err(error) = write_frames(&mut writer, &frames).await {
                    inner.terminate(CloseReason::Reset(error.to_string()));
                    break;
                }
            }
            WriterCommand::Shutdown(done) => {
                let _ = writer.shutdown().await;
                let _ = done.send(());
                break;
            }
        }
    }
}

async fn expire_loop(inner: Arc<ConnectionInner>) {
    loop {
        let ids = inner.timeouts.next_expired().await;
        inner.expire(ids);
    }
}
