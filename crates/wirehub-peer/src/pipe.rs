use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, trace, warn};
use wirehub_frame::{FrameError, FrameReader, FrameWriter};
use wirehub_message::{MessageReader, MessageTypeRegistry};
use wirehub_transport::NetStream;

use crate::config::PipeConfig;
use crate::error::{PeerError, Result};

const FLUSH_POLL: Duration = Duration::from_millis(5);

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl PipeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => PipeState::Connecting,
            1 => PipeState::Open,
            2 => PipeState::Closing,
            _ => PipeState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PipeState::Connecting => 0,
            PipeState::Open => 1,
            PipeState::Closing => 2,
            PipeState::Closed => 3,
        }
    }
}

/// Receives notifications from a pipe's worker threads.
///
/// Calls arrive on the read thread (messages, read errors, disconnect) or the
/// write thread (write errors, disconnect). `on_disconnected` is called
/// exactly once per pipe.
pub trait PipeObserver: Send + Sync + 'static {
    fn on_message(&self, message: MessageReader);

    fn on_error(&self, _error: &PeerError) {}

    fn on_disconnected(&self);
}

/// Read/write engine owning one TCP connection.
///
/// A read thread turns frames into [`MessageReader`]s; a write thread drains
/// the outbound FIFO. Dropping the pipe closes it.
pub struct ConnectionPipe {
    shared: Arc<PipeShared>,
}

struct PipeShared {
    stream: NetStream,
    peer_addr: Option<SocketAddr>,
    outbound: Sender<Bytes>,
    capacity: Option<usize>,
    max_payload: usize,
    shutdown: Mutex<Option<Sender<()>>>,
    state: AtomicU8,
    accepted: AtomicU64,
    written: AtomicU64,
    cancelled: AtomicBool,
    disconnected: AtomicBool,
    observer: Arc<dyn PipeObserver>,
}

impl ConnectionPipe {
    /// Take ownership of a connected stream and start both worker threads.
    pub fn spawn(
        stream: NetStream,
        registry: Arc<MessageTypeRegistry>,
        config: &PipeConfig,
        observer: Arc<dyn PipeObserver>,
    ) -> Result<Self> {
        stream.set_nodelay(config.nodelay)?;
        let reader = FrameReader::from_stream(stream.try_clone()?, &config.frame)?;
        let writer = FrameWriter::from_stream(stream.try_clone()?, &config.frame)?;

        let (outbound, queued) = match config.outbound_capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let shared = Arc::new(PipeShared {
            peer_addr: stream.peer_addr().ok(),
            stream,
            outbound,
            capacity: config.outbound_capacity,
            max_payload: config.frame.max_payload_size,
            shutdown: Mutex::new(Some(shutdown_tx)),
            state: AtomicU8::new(PipeState::Connecting.as_u8()),
            accepted: AtomicU64::new(0),
            written: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            observer,
        });

        let label = shared.label();
        let read_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(format!("wirehub-read-{label}"))
            .spawn(move || read_shared.read_loop(reader, registry))
            .map_err(|source| PeerError::Spawn {
                name: "read",
                source,
            })?;

        let write_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name(format!("wirehub-write-{label}"))
            .spawn(move || write_shared.write_loop(writer, queued, shutdown_rx));
        if let Err(source) = spawned {
            shared.close();
            return Err(PeerError::Spawn {
                name: "write",
                source,
            });
        }

        // A fast peer may already have closed the connection.
        let _ = shared.state.compare_exchange(
            PipeState::Connecting.as_u8(),
            PipeState::Open.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        debug!(peer = %label, "pipe open");
        Ok(Self { shared })
    }

    /// Queue a payload (type id + body) for the write thread. Never blocks.
    ///
    /// A payload over the frame limit is refused here and the pipe stays open.
    pub fn enqueue(&self, payload: Bytes) -> Result<()> {
        if self.shared.cancelled.load(Ordering::Acquire) {
            return Err(PeerError::ConnectionClosed);
        }
        if payload.len() > self.shared.max_payload {
            return Err(PeerError::Frame(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.shared.max_payload,
            }));
        }
        match self.shared.outbound.try_send(payload) {
            Ok(()) => {
                self.shared.accepted.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(PeerError::QueueFull {
                capacity: self.shared.capacity.unwrap_or(0),
            }),
            Err(TrySendError::Disconnected(_)) => Err(PeerError::ConnectionClosed),
        }
    }

    /// Wait until every payload queued so far has been written to the socket.
    ///
    /// Returns `false` if the pipe closed or `timeout` passed first.
    pub fn flush(&self, timeout: Duration) -> bool {
        let target = self.shared.accepted.load(Ordering::Acquire);
        let deadline = Instant::now() + timeout;
        loop {
            if self.shared.written.load(Ordering::Acquire) >= target {
                return true;
            }
            if self.shared.is_cancelled() || Instant::now() >= deadline {
                return false;
            }
            thread::sleep(FLUSH_POLL);
        }
    }

    /// Cancel both loops and close the socket. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn state(&self) -> PipeState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == PipeState::Open
    }

    /// Payloads waiting for the write thread.
    pub fn queued(&self) -> usize {
        self.shared.outbound.len()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.peer_addr
    }
}

impl Drop for ConnectionPipe {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl fmt::Debug for ConnectionPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPipe")
            .field("peer_addr", &self.shared.peer_addr)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .finish()
    }
}

impl PipeShared {
    fn label(&self) -> String {
        self.peer_addr
            .map_or_else(|| "unknown".to_string(), |addr| addr.to_string())
    }

    fn state(&self) -> PipeState {
        PipeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PipeState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancel, wake the write loop, then shut the socket down.
    fn close(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.set_state(PipeState::Closing);

        let signal = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(signal);

        if let Err(err) = self.stream.shutdown() {
            debug!(peer = %self.label(), error = %err, "socket shutdown failed");
        }
    }

    /// Close and notify the observer, once.
    fn finish(&self) {
        self.close();
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return;
        }
        self.set_state(PipeState::Closed);
        info!(peer = %self.label(), "connection closed");
        self.observer.on_disconnected();
    }

    fn report(&self, error: PeerError) {
        // Errors caused by our own close are expected noise.
        if self.is_cancelled() {
            debug!(peer = %self.label(), error = %error, "pipe error after close");
            return;
        }
        self.set_state(PipeState::Closing);
        warn!(peer = %self.label(), error = %error, "pipe error");
        self.observer.on_error(&error);
    }

    fn read_loop(self: Arc<Self>, mut reader: FrameReader<NetStream>, registry: Arc<MessageTypeRegistry>) {
        loop {
            match reader.read_frame() {
                Ok(frame) => {
                    trace!(peer = %self.label(), size = frame.payload.len(), "frame received");
                    match MessageReader::from_payload(&registry, frame.payload) {
                        Ok(message) => self.observer.on_message(message),
                        Err(err) => {
                            // The frame boundary is intact, so the stream is still usable.
                            warn!(peer = %self.label(), error = %err, "dropping undecodable message");
                            self.observer.on_error(&PeerError::Message(err));
                        }
                    }
                }
                Err(err) if err.is_clean_close() => {
                    debug!(peer = %self.label(), "remote closed connection");
                    break;
                }
                Err(err) => {
                    self.report(PeerError::Frame(err));
                    break;
                }
            }

            if self.is_cancelled() {
                break;
            }
        }
        self.finish();
    }

    fn write_loop(
        self: Arc<Self>,
        mut writer: FrameWriter<NetStream>,
        queued: Receiver<Bytes>,
        shutdown: Receiver<()>,
    ) {
        loop {
            select! {
                recv(queued) -> payload => {
                    let Ok(payload) = payload else { break };
                    if self.is_cancelled() {
                        break;
                    }
                    match writer.send(&payload) {
                        Ok(()) => trace!(peer = %self.label(), size = payload.len(), "frame sent"),
                        // Nothing reached the socket, so the stream is still in sync.
                        Err(FrameError::PayloadTooLarge { size, max }) => {
                            warn!(peer = %self.label(), size, max, "dropping oversized payload");
                        }
                        Err(err) => {
                            self.report(PeerError::Frame(err));
                            break;
                        }
                    }
                    self.written.fetch_add(1, Ordering::AcqRel);
                }
                recv(shutdown) -> _ => break,
            }
        }
        self.finish();
    }
}
