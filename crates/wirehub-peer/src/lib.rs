//! Connection management for wirehub.
//!
//! A [`Host`] runs a [`Server`] and sits in its directory as entity 1; a
//! [`Client`] holds one [`ConnectionPipe`] to a remote server. Every pipe
//! runs a read thread and a write thread; faults surface as observer
//! notifications, never as panics across those threads.

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod host;
pub mod pipe;
pub mod server;

pub use client::{Client, ConnectionState};
pub use config::{ClientConfig, PipeConfig, ServerConfig, DEFAULT_CONNECT_TIMEOUT};
pub use entity::{EntityId, EntityKind, NetworkEntity};
pub use error::{PeerError, Result};
pub use events::EventPublisher;
pub use host::Host;
pub use pipe::{ConnectionPipe, PipeObserver, PipeState};
pub use server::Server;
