use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;
use wirehub_message::{MessagePublisher, MessageWriter};

use crate::error::Result;
use crate::pipe::ConnectionPipe;

/// Server-assigned entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u32);

impl EntityId {
    /// The server itself. Never assigned to an entity.
    pub const SERVER: EntityId = EntityId(0);
    /// The host's in-process entity.
    pub const HOST: EntityId = EntityId(1);
    /// First id handed to a remote client.
    pub const FIRST_REMOTE: EntityId = EntityId(2);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity-{}", self.0)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// How messages reach an entity.
pub enum EntityKind {
    /// In-process delivery straight to a publisher.
    Local(Arc<MessagePublisher>),
    /// A network peer behind its own pipe.
    Remote(ConnectionPipe),
}

/// Addressable endpoint in the server directory.
pub struct NetworkEntity {
    id: EntityId,
    kind: EntityKind,
}

impl NetworkEntity {
    pub fn local(id: EntityId, inbox: Arc<MessagePublisher>) -> Self {
        Self {
            id,
            kind: EntityKind::Local(inbox),
        }
    }

    pub fn remote(id: EntityId, pipe: ConnectionPipe) -> Self {
        Self {
            id,
            kind: EntityKind::Remote(pipe),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn is_local(&self) -> bool {
        matches!(self.kind, EntityKind::Local(_))
    }

    /// Remote socket address, `None` for the local entity.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match &self.kind {
            EntityKind::Local(_) => None,
            EntityKind::Remote(pipe) => pipe.peer_addr(),
        }
    }

    /// Deliver `message` to this entity.
    ///
    /// Local delivery runs the subscribers on the calling thread; remote
    /// delivery only enqueues.
    pub fn send(&self, message: &MessageWriter) -> Result<()> {
        match &self.kind {
            EntityKind::Local(_) => self.deliver(message, None),
            EntityKind::Remote(_) => self.deliver(message, Some(&message.payload())),
        }
    }

    /// Like [`send`](Self::send), reusing an already-built payload for remote peers.
    pub(crate) fn deliver(&self, message: &MessageWriter, payload: Option<&Bytes>) -> Result<()> {
        match &self.kind {
            EntityKind::Local(inbox) => {
                let delivered = inbox.publish(&mut message.to_reader());
                trace!(entity = %self.id, delivered, "local delivery");
                Ok(())
            }
            EntityKind::Remote(pipe) => {
                let payload = payload.cloned().unwrap_or_else(|| message.payload());
                pipe.enqueue(payload)
            }
        }
    }

    pub(crate) fn close(&self) {
        if let EntityKind::Remote(pipe) = &self.kind {
            pipe.close();
        }
    }
}

impl fmt::Debug for NetworkEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("NetworkEntity");
        out.field("id", &self.id);
        match &self.kind {
            EntityKind::Local(_) => out.field("kind", &"local"),
            EntityKind::Remote(pipe) => out.field("kind", pipe),
        };
        out.finish()
    }
}
