//! TCP transport layer.
//!
//! Provides a thin, blocking wrapper over `std::net` for the rest of wirehub:
//! - [`TcpTransport`] binds and accepts
//! - [`NetStream`] is a connected stream that implements `Read + Write`
//!
//! This is the lowest layer of wirehub. Everything else builds on top of
//! the [`NetStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::NetStream;
pub use tcp::{validate_port, TcpTransport};
