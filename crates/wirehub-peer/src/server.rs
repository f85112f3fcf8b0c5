use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};
use wirehub_message::{MessagePublisher, MessageReader, MessageTypeRegistry, MessageWriter};
use wirehub_transport::{NetStream, TcpTransport};

use crate::config::ServerConfig;
use crate::entity::{EntityId, NetworkEntity};
use crate::error::{PeerError, Result};
use crate::events::EventPublisher;
use crate::pipe::{ConnectionPipe, PipeObserver};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Accepts TCP clients and keeps the directory of live entities.
///
/// Id 1 always holds the host's local entity. Remote clients get ids from 2
/// upward in accept order; ids are never reused, and once they run out new
/// connections are refused.
///
/// For any one client, `client_connected` is always published before
/// `client_disconnected`, even when the connection dies during admission.
pub struct Server {
    shared: Arc<ServerShared>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

struct ServerShared {
    transport: TcpTransport,
    registry: Arc<MessageTypeRegistry>,
    config: ServerConfig,
    directory: RwLock<BTreeMap<EntityId, Arc<NetworkEntity>>>,
    next_id: AtomicU32,
    /// Admitted ids whose `client_connected` is still being published; `true`
    /// once their disconnect has been deferred behind it.
    announcing: Mutex<BTreeMap<EntityId, bool>>,
    cancelled: AtomicBool,
    host_inbox: Arc<MessagePublisher>,
    message_received: MessagePublisher,
    client_connected: EventPublisher<Arc<NetworkEntity>>,
    client_disconnected: EventPublisher<Arc<NetworkEntity>>,
}

impl Server {
    /// Bind on every interface at `port` with default config.
    pub fn bind_port(port: u16, registry: Arc<MessageTypeRegistry>) -> Result<Self> {
        let transport = TcpTransport::bind_port(port)?;
        Ok(Self::from_transport(transport, registry, ServerConfig::default()))
    }

    /// Bind to an explicit address such as `127.0.0.1:0`.
    pub fn bind(
        addr: &str,
        registry: Arc<MessageTypeRegistry>,
        config: ServerConfig,
    ) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        Ok(Self::from_transport(transport, registry, config))
    }

    fn from_transport(
        transport: TcpTransport,
        registry: Arc<MessageTypeRegistry>,
        config: ServerConfig,
    ) -> Self {
        let host_inbox = Arc::new(MessagePublisher::new());
        let mut directory = BTreeMap::new();
        directory.insert(
            EntityId::HOST,
            Arc::new(NetworkEntity::local(EntityId::HOST, Arc::clone(&host_inbox))),
        );

        Self {
            shared: Arc::new(ServerShared {
                transport,
                registry,
                config,
                directory: RwLock::new(directory),
                next_id: AtomicU32::new(EntityId::FIRST_REMOTE.as_u32()),
                announcing: Mutex::new(BTreeMap::new()),
                cancelled: AtomicBool::new(false),
                host_inbox,
                message_received: MessagePublisher::new(),
                client_connected: EventPublisher::new(),
                client_disconnected: EventPublisher::new(),
            }),
            accept_thread: Mutex::new(None),
        }
    }

    /// Start the accept loop. Calling it again while running is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut slot = self
            .accept_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Ok(());
        }
        if self.shared.cancelled.load(Ordering::Acquire) {
            return Err(PeerError::ConnectionClosed);
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("wirehub-accept".to_string())
            .spawn(move || shared.accept_loop())
            .map_err(|source| PeerError::Spawn {
                name: "accept",
                source,
            })?;
        *slot = Some(handle);
        info!(addr = %self.local_addr(), "server started");
        Ok(())
    }

    /// Publish a message to the server's subscribers as if `from` had sent it.
    pub fn receive_message(&self, from: EntityId, message: MessageReader) -> usize {
        self.shared.receive_message(from, message)
    }

    /// Send to every entity in the directory, host included.
    ///
    /// Iterates a snapshot; entities joining or leaving meanwhile may or may
    /// not be reached. Per-entity failures are logged and skipped. Returns
    /// the number of entities the message was handed to.
    pub fn broadcast_message(&self, message: &MessageWriter) -> usize {
        let targets = self.shared.snapshot();
        let payload = message.payload();
        let mut delivered = 0;

        for entity in &targets {
            match entity.deliver(message, Some(&payload)) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(entity = %entity.id(), error = %err, "broadcast delivery failed"),
            }
        }
        debug!(
            message_type = %message.message_type(),
            targets = targets.len(),
            delivered,
            "broadcast"
        );
        delivered
    }

    /// Send to one entity.
    pub fn send_message(&self, to: EntityId, message: &MessageWriter) -> Result<()> {
        let entity = self.entity(to).ok_or(PeerError::UnknownEntity(to))?;
        entity.send(message)
    }

    pub fn entity(&self, id: EntityId) -> Option<Arc<NetworkEntity>> {
        self.shared.read_directory().get(&id).cloned()
    }

    /// Ids currently in the directory, ascending.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.shared.read_directory().keys().copied().collect()
    }

    /// Number of entities, host included.
    pub fn len(&self) -> usize {
        self.shared.read_directory().len()
    }

    /// Always false while the host entity is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.transport.local_addr()
    }

    pub fn registry(&self) -> &Arc<MessageTypeRegistry> {
        &self.shared.registry
    }

    /// Messages sent to the server, from clients or from the host.
    pub fn message_received(&self) -> &MessagePublisher {
        &self.shared.message_received
    }

    /// Messages the server delivers to the host entity (id 1).
    pub fn host_inbox(&self) -> &Arc<MessagePublisher> {
        &self.shared.host_inbox
    }

    pub fn client_connected(&self) -> &EventPublisher<Arc<NetworkEntity>> {
        &self.shared.client_connected
    }

    pub fn client_disconnected(&self) -> &EventPublisher<Arc<NetworkEntity>> {
        &self.shared.client_disconnected
    }

    pub fn is_running(&self) -> bool {
        !self.shared.cancelled.load(Ordering::Acquire)
            && self
                .accept_thread
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
    }

    /// Stop accepting and close every remote connection. Idempotent.
    ///
    /// Each removed client is reported through `client_disconnected`.
    pub fn shutdown(&self) {
        if self.shared.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        let handle = self
            .accept_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            self.shared.transport.unblock_accept();
            // Shutdown may be called from a callback running on the accept thread.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("accept thread panicked");
            }
        }

        let remotes: Vec<Arc<NetworkEntity>> = {
            let mut directory = self
                .shared
                .directory
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let ids: Vec<EntityId> = directory
                .iter()
                .filter(|(_, entity)| !entity.is_local())
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| directory.remove(id)).collect()
        };

        for entity in &remotes {
            entity.close();
            self.shared.announce_disconnected(entity);
        }
        info!(
            addr = %self.local_addr(),
            closed = remotes.len(),
            "server stopped"
        );
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ServerShared {
    fn read_directory(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, BTreeMap<EntityId, Arc<NetworkEntity>>> {
        self.directory.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Vec<Arc<NetworkEntity>> {
        self.read_directory().values().cloned().collect()
    }

    fn receive_message(&self, from: EntityId, mut message: MessageReader) -> usize {
        let delivered = self.message_received.publish(&mut message);
        debug!(
            entity = %from,
            message_type = %message.message_type(),
            delivered,
            "message received"
        );
        delivered
    }

    fn accept_loop(self: Arc<Self>) {
        loop {
            let accepted = self.transport.accept();
            if self.cancelled.load(Ordering::Acquire) {
                break;
            }

            match accepted {
                Ok((stream, addr)) => {
                    if let Err(err) = self.admit(stream, addr) {
                        warn!(peer = %addr, error = %err, "failed to admit client");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }
        debug!("accept loop stopped");
    }

    fn admit(self: &Arc<Self>, stream: NetStream, addr: SocketAddr) -> Result<()> {
        // The directory lock is held until the entity is inserted, so a pipe
        // that dies immediately cannot try to remove it first.
        let entity = {
            let mut directory = self.directory.write().unwrap_or_else(PoisonError::into_inner);
            let id = self
                .next_id
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| next.checked_add(1))
                .map(EntityId::new)
                .map_err(|_| PeerError::EntityIdsExhausted)?;
            let observer = Arc::new(EntityObserver {
                server: Arc::downgrade(self),
                id,
            });
            let pipe = ConnectionPipe::spawn(
                stream,
                Arc::clone(&self.registry),
                &self.config.pipe,
                observer,
            )?;
            let entity = Arc::new(NetworkEntity::remote(id, pipe));
            directory.insert(id, Arc::clone(&entity));
            self.lock_announcing().insert(id, false);
            entity
        };

        info!(entity = %entity.id(), peer = %addr, "client connected");
        self.client_connected.publish(&entity);

        let deferred = self.lock_announcing().remove(&entity.id()) == Some(true);
        if deferred {
            info!(entity = %entity.id(), "client disconnected");
            self.client_disconnected.publish(&entity);
        }
        Ok(())
    }

    fn lock_announcing(&self) -> std::sync::MutexGuard<'_, BTreeMap<EntityId, bool>> {
        self.announcing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `client_disconnected`, or leave it to `admit` while that
    /// entity's `client_connected` is still going out.
    fn announce_disconnected(&self, entity: &Arc<NetworkEntity>) {
        if let Some(deferred) = self.lock_announcing().get_mut(&entity.id()) {
            *deferred = true;
            return;
        }
        info!(entity = %entity.id(), "client disconnected");
        self.client_disconnected.publish(entity);
    }

    fn remove(&self, id: EntityId) -> Option<Arc<NetworkEntity>> {
        self.directory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }
}

/// Wires one remote entity's pipe back into its server.
struct EntityObserver {
    server: Weak<ServerShared>,
    id: EntityId,
}

impl PipeObserver for EntityObserver {
    fn on_message(&self, message: MessageReader) {
        if let Some(server) = self.server.upgrade() {
            server.receive_message(self.id, message);
        }
    }

    fn on_error(&self, error: &PeerError) {
        warn!(entity = %self.id, error = %error, "client connection error");
    }

    fn on_disconnected(&self) {
        let Some(server) = self.server.upgrade() else {
            return;
        };
        if let Some(entity) = server.remove(self.id) {
            server.announce_disconnected(&entity);
        }
    }
}
