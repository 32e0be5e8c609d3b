//! RPC session over one byte stream
//!
//! Frames outgoing envelopes, correlates responses by id, and reports
//! closure exactly once.
//!
//! Frames are written by a dedicated writer task. A caller that is dropped
//! mid-call never leaves half a frame on the wire.

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Error, TransportError};
use crate::metrics::METRICS;
use crate::protocol::{
    encode_frame, error_response, parse_incoming, Envelope, FrameReader, Incoming,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};

type ReplySender = oneshot::Sender<Result<Value, Error>>;
type WriteAck = oneshot::Sender<Result<(), TransportError>>;

/// Work for the writer task
enum WriteCommand {
    /// Write one encoded frame and report the outcome
    Frame { frame: Bytes, ack: WriteAck },
    /// Shut down the write half and stop
    Shutdown(oneshot::Sender<()>),
}

/// State shared between the session handle and its reader task
struct Shared {
    generation: u64,
    outgoing: mpsc::UnboundedSender<WriteCommand>,
    pending: DashMap<u64, ReplySender>,
    closed: watch::Sender<bool>,
}

impl Shared {
    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Queue a frame for the writer task
    ///
    /// The frame is written in full even if the returned receiver is dropped.
    fn enqueue(
        &self,
        message: &Value,
    ) -> Result<oneshot::Receiver<Result<(), TransportError>>, TransportError> {
        let payload = serde_json::to_vec(message)?;
        let mut buf = BytesMut::new();
        encode_frame(&payload, &mut buf)?;

        let (ack, done) = oneshot::channel();
        self.outgoing
            .send(WriteCommand::Frame {
                frame: buf.freeze(),
                ack,
            })
            .map_err(|_| TransportError::Closed)?;
        Ok(done)
    }

    /// Queue a frame and wait until it has been written
    async fn write(&self, message: &Value) -> Result<(), TransportError> {
        let done = self.enqueue(message)?;
        done.await.unwrap_or(Err(TransportError::Closed))
    }

    fn dispatch(&self, incoming: Incoming) -> Result<(), TransportError> {
        match incoming {
            Incoming::Response { id, outcome } => {
                if let Some(id) = id.as_u64() {
                    match self.pending.remove(&id) {
                        Some((_, tx)) => {
                            let _ = tx.send(outcome.map_err(Error::Protocol));
                        }
                        None => {
                            warn!(generation = self.generation, id, "Dropping response for unknown request id");
                        }
                    }
                    return Ok(());
                }

                match outcome {
                    // The peer could not read one of our messages and cannot
                    // tell us which, so no in-flight request can be answered
                    Err(remote) if id.is_null() => {
                        let reason = match remote.code {
                            PARSE_ERROR => "parse error",
                            INVALID_REQUEST => "invalid request",
                            _ => "error",
                        };
                        warn!(generation = self.generation, code = remote.code, reason, "Peer rejected a message");
                        return Err(TransportError::Rejected(remote));
                    }
                    _ => {
                        warn!(generation = self.generation, %id, "Dropping response for unknown request id");
                    }
                }
            }
            Incoming::Request { id, method } => {
                debug!(generation = self.generation, %method, "Rejecting request from peer");
                self.enqueue(&error_response(id, METHOD_NOT_FOUND, "Method not found"))?;
            }
            Incoming::Notification { method } => {
                debug!(generation = self.generation, %method, "Ignoring notification from peer");
            }
        }
        Ok(())
    }

    /// Mark the session closed and fail every in-flight request
    ///
    /// Only the first call has any effect.
    fn shutdown(&self, cause: TransportError) {
        if self.closed.send_replace(true) {
            return;
        }

        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(Error::Transport(cause.clone())));
            }
        }

        METRICS.connection_closed();
        debug!(generation = self.generation, reason = %cause, "Session closed");
    }
}

/// Removes a request's reply slot when its caller goes away
struct PendingGuard<'a> {
    pending: &'a DashMap<u64, ReplySender>,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

/// A live JSON-RPC session
pub struct RpcSession {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl RpcSession {
    /// Wrap a connected stream and start reading from it
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<S>(stream: S, generation: u64) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outgoing, commands) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            generation,
            outgoing,
            pending: DashMap::new(),
            closed,
        });

        let reader = tokio::spawn(read_loop(FrameReader::new(read_half), shared.clone()));
        let writer = tokio::spawn(write_loop(write_half, commands, Arc::downgrade(&shared)));

        Self {
            shared,
            next_id: AtomicU64::new(1),
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Connection generation this session belongs to
    pub fn generation(&self) -> u64 {
        self.shared.generation
    }

    /// Check whether the session has closed
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Number of requests still awaiting a reply
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Receiver that flips to `true` once the session closes
    pub fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.shared.closed.subscribe()
    }

    /// Wait until the session closes
    pub async fn closed(&self) {
        let mut rx = self.subscribe_closed();
        // The sender lives as long as `self`
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Send a request and wait for its correlated reply
    pub async fn request(&self, envelope: &Envelope) -> Result<Value, Error> {
        if self.is_closed() {
            return Err(TransportError::Closed.into());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, tx);
        let _slot = PendingGuard {
            pending: &self.shared.pending,
            id,
        };

        // The reader may have shut down between the check above and the insert
        if self.is_closed() {
            return Err(TransportError::Closed.into());
        }

        trace!(generation = self.generation(), id, method = envelope.method(), "Sending request");
        if let Err(e) = self.shared.write(&envelope.to_request(id)).await {
            METRICS.transport_error();
            return Err(e.into());
        }
        METRICS.request_sent();

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                match &e {
                    Error::Protocol(_) => METRICS.remote_error(),
                    _ => METRICS.transport_error(),
                }
                Err(e)
            }
            Err(_) => {
                METRICS.transport_error();
                Err(TransportError::Closed.into())
            }
        }
    }

    /// Send a notification; completes once the frame is written
    pub async fn notify(&self, envelope: &Envelope) -> Result<(), Error> {
        if self.is_closed() {
            return Err(TransportError::Closed.into());
        }

        trace!(generation = self.generation(), method = envelope.method(), "Sending notification");
        if let Err(e) = self.shared.write(&envelope.to_notification()).await {
            METRICS.transport_error();
            return Err(e.into());
        }
        METRICS.notification_sent();
        Ok(())
    }

    /// Close the session explicitly
    ///
    /// Frames queued before the call are still written.
    pub async fn close(&self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.shared.shutdown(TransportError::Closed);

        let (done, flushed) = oneshot::channel();
        if self.shared.outgoing.send(WriteCommand::Shutdown(done)).is_ok() {
            let _ = flushed.await;
        }
    }
}

impl Drop for RpcSession {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        if let Some(writer) = self.writer.lock().take() {
            writer.abort();
        }
        self.shared.shutdown(TransportError::Closed);
    }
}

impl std::fmt::Debug for RpcSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSession")
            .field("generation", &self.generation())
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_requests())
            .finish()
    }
}

async fn read_loop<R>(mut reader: FrameReader<R>, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let cause = loop {
        let frame = match reader.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break TransportError::Closed,
            Err(e) => break e,
        };

        let incoming = match parse_incoming(&frame) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(generation = shared.generation, error = %e, "Malformed message from peer");
                break e;
            }
        };

        if let Err(e) = shared.dispatch(incoming) {
            break e;
        }
    };

    shared.shutdown(cause);
}

async fn write_loop<S>(
    mut writer: WriteHalf<S>,
    mut commands: mpsc::UnboundedReceiver<WriteCommand>,
    shared: Weak<Shared>,
) where
    S: AsyncRead + AsyncWrite,
{
    while let Some(command) = commands.recv().await {
        match command {
            WriteCommand::Frame { frame, ack } => {
                let result = write_all(&mut writer, &frame).await;
                let failed = result.as_ref().err().cloned();
                let _ = ack.send(result);
                if let Some(cause) = failed {
                    if let Some(shared) = shared.upgrade() {
                        shared.shutdown(cause);
                    }
                    return;
                }
            }
            WriteCommand::Shutdown(done) => {
                let _ = writer.shutdown().await;
                let _ = done.send(());
                return;
            }
        }
    }
}

async fn write_all<W>(writer: &mut W, frame: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
