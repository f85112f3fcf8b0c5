use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crc::{Crc, CRC_32_ISO_HDLC};

/// Name reported by a type that has only been seen by id.
pub const UNKNOWN_NAME: &str = "UNKNOWN";

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Wire id for a message type name: CRC-32 over its UTF-8 bytes.
pub fn type_id(name: &str) -> u32 {
    CRC32.checksum(name.as_bytes())
}

/// Interned `(id, name)` pair identifying a message's shape.
///
/// Clones share one entry, so a name learned after the first lookup by id
/// becomes visible through every handle. Equality and hashing use the id only.
#[derive(Clone)]
pub struct MessageType {
    entry: Arc<TypeEntry>,
}

struct TypeEntry {
    id: u32,
    name: OnceLock<String>,
}

impl MessageType {
    pub(crate) fn placeholder(id: u32) -> Self {
        Self {
            entry: Arc::new(TypeEntry {
                id,
                name: OnceLock::new(),
            }),
        }
    }

    pub(crate) fn named(id: u32, name: &str) -> Self {
        let ty = Self::placeholder(id);
        ty.fill_name(name);
        ty
    }

    /// Set the name if it is still unknown. Returns `true` if this call set it.
    pub(crate) fn fill_name(&self, name: &str) -> bool {
        self.entry.name.set(name.to_string()).is_ok()
    }

    /// Numeric id carried on the wire.
    pub fn id(&self) -> u32 {
        self.entry.id
    }

    /// Human-readable name, or [`UNKNOWN_NAME`] until one is learned.
    pub fn name(&self) -> &str {
        self.entry
            .name
            .get()
            .map(String::as_str)
            .unwrap_or(UNKNOWN_NAME)
    }

    /// Whether the name has been learned.
    pub fn is_named(&self) -> bool {
        self.entry.name.get().is_some()
    }

    /// Whether both handles point at the same interned entry.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageType")
            .field("id", &format_args!("{:#010x}", self.id()))
            .field("name", &self.name())
            .finish()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.name(), self.id())
    }
}
