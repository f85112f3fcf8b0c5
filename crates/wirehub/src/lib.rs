//! Typed TCP messaging between a host, its server and clients.
//!
//! A host runs a server and sits in its directory as entity 1; remote clients
//! connect over TCP and are numbered from 2. Messages are a CRC-32 type id and
//! a little-endian body, framed with a 4-byte length prefix.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener and stream, port validation
//! - [`frame`]: Length-prefixed framing (blocking, plus `FrameCodec` behind `async`)
//! - [`message`]: Message types, registry, reader/writer and dispatch
//! - [`peer`]: Connection pipes, server, host and client (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use wirehub_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use wirehub_frame::*;
}

/// Re-export message types.
pub mod message {
    pub use wirehub_message::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use wirehub_peer::*;
}
