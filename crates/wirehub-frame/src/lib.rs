//! Length-prefixed framing for wirehub.
//!
//! Every frame on the wire is a 4-byte little-endian payload length followed
//! by exactly that many payload bytes. Payload contents (type id + body) are
//! opaque at this layer.
//!
//! Blocking reads and writes deal in whole frames only.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    decode_frame, encode_frame, expected_len, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
