//! Typed binary messages for wirehub.
//!
//! A frame payload is a 4-byte little-endian [`MessageType`] id followed by a
//! body of little-endian scalars and length-prefixed strings:
//!
//! - [`MessageTypeRegistry`] interns `(id, name)` pairs, ids are CRC-32 of the name
//! - [`MessageWriter`] builds a payload, [`MessageReader`] walks one with bounds checks
//! - [`MessagePublisher`] dispatches a reader to the subscribers of its type

pub mod codec;
pub mod error;
pub mod publisher;
pub mod reader;
pub mod registry;
pub mod types;
pub mod writer;

pub use codec::{decode, encode, TYPE_ID_SIZE};
pub use error::{MessageError, Result};
pub use publisher::{MessageHandler, MessagePublisher, SubscriptionId};
pub use reader::MessageReader;
pub use registry::MessageTypeRegistry;
pub use types::{type_id, MessageType, UNKNOWN_NAME};
pub use writer::MessageWriter;
