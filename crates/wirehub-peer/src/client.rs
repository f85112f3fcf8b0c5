use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};
use wirehub_message::{MessagePublisher, MessageReader, MessageTypeRegistry, MessageWriter};
use wirehub_transport::TcpTransport;

use crate::config::ClientConfig;
use crate::error::{PeerError, Result};
use crate::events::EventPublisher;
use crate::pipe::{ConnectionPipe, PipeObserver};

/// Client connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The last connect attempt failed. A new `connect` may be tried.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Single outbound connection to a server.
///
/// Connection faults never cross the pipe threads as panics or returned
/// errors; they arrive as `errored` and `disconnected` events and a state
/// change. Only `connect` itself returns its failure to the caller.
pub struct Client {
    shared: Arc<ClientShared>,
}

struct ClientShared {
    registry: Arc<MessageTypeRegistry>,
    config: ClientConfig,
    // Lock order: `pipe` before `state`.
    pipe: Mutex<Option<ConnectionPipe>>,
    state: Mutex<ConnectionState>,
    generation: AtomicU64,
    message_received: MessagePublisher,
    connected: EventPublisher<SocketAddr>,
    disconnected: EventPublisher<()>,
    errored: EventPublisher<PeerError>,
}

impl Client {
    pub fn new(registry: Arc<MessageTypeRegistry>) -> Self {
        Self::with_config(registry, ClientConfig::default())
    }

    pub fn with_config(registry: Arc<MessageTypeRegistry>, config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                registry,
                config,
                pipe: Mutex::new(None),
                state: Mutex::new(ConnectionState::Disconnected),
                generation: AtomicU64::new(0),
                message_received: MessagePublisher::new(),
                connected: EventPublisher::new(),
                disconnected: EventPublisher::new(),
                errored: EventPublisher::new(),
            }),
        }
    }

    /// Connect to a server (blocking).
    ///
    /// On failure the state becomes [`ConnectionState::Error`], `errored`
    /// fires, and the error is returned. There is no automatic retry.
    pub fn connect(&self, host: &str, port: u16) -> Result<()> {
        {
            let mut state = self.shared.lock_state();
            if matches!(
                *state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                return Err(PeerError::AlreadyConnected);
            }
            *state = ConnectionState::Connecting;
        }
        debug!(host, port, "connecting");

        match self.open_pipe(host, port) {
            Ok(addr) => {
                info!(server = %addr, "connected");
                self.shared.connected.publish(&addr);
                Ok(())
            }
            Err(err) => {
                *self.shared.lock_state() = ConnectionState::Error;
                warn!(host, port, error = %err, "connect failed");
                self.shared.errored.publish(&err);
                Err(err)
            }
        }
    }

    fn open_pipe(&self, host: &str, port: u16) -> Result<SocketAddr> {
        let stream = TcpTransport::connect(host, port, self.shared.config.connect_timeout)?;
        let addr = stream.peer_addr()?;
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;

        // Holding the pipe slot until the state is set keeps a pipe that
        // drops immediately from reporting before it is installed.
        let mut slot = self.shared.lock_pipe();
        let observer = Arc::new(ClientObserver {
            client: Arc::clone(&self.shared),
            generation,
        });
        let pipe = ConnectionPipe::spawn(
            stream,
            Arc::clone(&self.shared.registry),
            &self.shared.config.pipe,
            observer,
        )?;
        *slot = Some(pipe);
        *self.shared.lock_state() = ConnectionState::Connected;
        Ok(addr)
    }

    /// Queue a message for the server.
    pub fn send_to_server(&self, message: &MessageWriter) -> Result<()> {
        match self.shared.lock_pipe().as_ref() {
            Some(pipe) => pipe.enqueue(message.payload()),
            None => Err(PeerError::NotConnected),
        }
    }

    /// Wait until messages already sent have been written to the socket.
    ///
    /// Returns `false` when not connected, or if the connection closed or
    /// `timeout` passed first.
    pub fn flush(&self, timeout: Duration) -> bool {
        match self.shared.lock_pipe().as_ref() {
            Some(pipe) => pipe.flush(timeout),
            None => false,
        }
    }

    /// Close the connection. `disconnected` fires once the pipe has stopped.
    pub fn disconnect(&self) {
        let pipe = self.shared.lock_pipe().take();
        if let Some(pipe) = pipe {
            debug!("disconnecting");
            pipe.close();
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.lock_state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn registry(&self) -> &Arc<MessageTypeRegistry> {
        &self.shared.registry
    }

    /// Messages from the server.
    pub fn message_received(&self) -> &MessagePublisher {
        &self.shared.message_received
    }

    /// Fires with the server address after each successful connect.
    pub fn connected(&self) -> &EventPublisher<SocketAddr> {
        &self.shared.connected
    }

    /// Fires once per connection when it ends, whichever side closed it.
    pub fn disconnected(&self) -> &EventPublisher<()> {
        &self.shared.disconnected
    }

    /// Fires for connect failures and connection errors.
    pub fn errored(&self) -> &EventPublisher<PeerError> {
        &self.shared.errored
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl ClientShared {
    fn lock_pipe(&self) -> MutexGuard<'_, Option<ConnectionPipe>> {
        self.pipe.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct ClientObserver {
    client: Arc<ClientShared>,
    generation: u64,
}

impl PipeObserver for ClientObserver {
    fn on_message(&self, mut message: MessageReader) {
        self.client.message_received.publish(&mut message);
    }

    fn on_error(&self, error: &PeerError) {
        warn!(error = %error, "connection error");
        self.client.errored.publish(error);
    }

    fn on_disconnected(&self) {
        {
            let mut slot = self.client.lock_pipe();
            // A newer connection owns the slot and the state.
            if self.client.generation.load(Ordering::Acquire) == self.generation {
                let stale = slot.take();
                *self.client.lock_state() = ConnectionState::Disconnected;
                drop(slot);
                drop(stale);
            }
        }
        info!("disconnected from server");
        self.client.disconnected.publish(&());
    }
}
