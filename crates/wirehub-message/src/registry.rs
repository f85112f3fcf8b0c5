use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::{MessageError, Result};
use crate::types::{type_id, MessageType};

/// Id-keyed table of interned message types.
///
/// Shared by reference (usually `Arc<MessageTypeRegistry>`) between the host,
/// server, and client of one process. Reads of named entries take the read
/// lock only; creating entries or learning names takes the write lock.
#[derive(Default)]
pub struct MessageTypeRegistry {
    types: RwLock<HashMap<u32, MessageType>>,
}

impl MessageTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical type for `name`, creating or naming the entry as needed.
    ///
    /// A different name already holding the same id is a CRC-32 collision.
    /// The existing identity is returned and the collision is logged; use
    /// [`register`](Self::register) to reject it instead.
    pub fn get(&self, name: &str) -> MessageType {
        match self.intern(name) {
            Ok(ty) => ty,
            Err(collision) => {
                warn!(
                    requested = name,
                    existing = collision.name(),
                    id = collision.id(),
                    "message type id collision"
                );
                collision
            }
        }
    }

    /// Like [`get`](Self::get), but fails if the id belongs to another name.
    pub fn register(&self, name: &str) -> Result<MessageType> {
        self.intern(name).map_err(|existing| MessageError::TypeIdCollision {
            id: existing.id(),
            existing: existing.name().to_string(),
            requested: name.to_string(),
        })
    }

    /// Canonical type for a wire id. Unseen ids get an unnamed placeholder.
    pub fn by_id(&self, id: u32) -> MessageType {
        if let Some(ty) = self.lookup(id) {
            return ty;
        }

        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        types
            .entry(id)
            .or_insert_with(|| {
                debug!(id, "placeholder message type");
                MessageType::placeholder(id)
            })
            .clone()
    }

    /// Existing entry for `id`, without creating one.
    pub fn lookup(&self, id: u32) -> Option<MessageType> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        types.get(&id).cloned()
    }

    /// Number of interned types, placeholders included.
    pub fn len(&self) -> usize {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every interned type, sorted by id.
    pub fn types(&self) -> Vec<MessageType> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<MessageType> = types.values().cloned().collect();
        all.sort_unstable_by_key(MessageType::id);
        all
    }

    /// `Ok` with the canonical entry, or `Err` with the colliding one.
    fn intern(&self, name: &str) -> std::result::Result<MessageType, MessageType> {
        let id = type_id(name);

        if let Some(ty) = self.lookup(id).filter(MessageType::is_named) {
            return check_name(ty, name);
        }

        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        let ty = types
            .entry(id)
            .or_insert_with(|| MessageType::placeholder(id))
            .clone();
        drop(types);

        if ty.fill_name(name) {
            debug!(id, name, "registered message type");
        }
        check_name(ty, name)
    }
}

fn check_name(ty: MessageType, name: &str) -> std::result::Result<MessageType, MessageType> {
    if ty.name() == name {
        Ok(ty)
    } else {
        Err(ty)
    }
}
