use std::io::{ErrorKind, Read};

use bytes::Bytes;
use wirehub_transport::NetStream;

use crate::codec::{Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Largest body chunk reserved up front; bigger bodies grow as bytes arrive.
const BODY_RESERVE: usize = 64 * 1024;

/// Pulls whole frames off a blocking stream: exactly one header, then
/// exactly the announced body.
pub struct FrameReader<T> {
    inner: T,
    max_payload: usize,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_payload(inner, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(inner: T, max_payload: usize) -> Self {
        Self { inner, max_payload }
    }

    /// Block until the next frame is complete.
    ///
    /// EOF before the first header byte is [`FrameError::ConnectionClosed`];
    /// EOF anywhere later is [`FrameError::Truncated`].
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        match fill(&mut self.inner, &mut header)? {
            0 => return Err(FrameError::ConnectionClosed),
            HEADER_SIZE => {}
            partial => {
                return Err(FrameError::Truncated {
                    expected: HEADER_SIZE,
                    received: partial,
                })
            }
        }

        let len = u32::from_le_bytes(header) as usize;
        if len > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.max_payload,
            });
        }

        let mut body = Vec::with_capacity(len.min(BODY_RESERVE));
        let received = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut body)
            .map_err(FrameError::Io)?;
        if received < len {
            return Err(FrameError::Truncated {
                expected: HEADER_SIZE + len,
                received: HEADER_SIZE + received,
            });
        }

        tracing::trace!(size = len, "frame read");
        Ok(Frame::new(Bytes::from(body)))
    }
}

impl FrameReader<NetStream> {
    /// Reader over a socket, with the configured read timeout applied to it.
    pub fn from_stream(stream: NetStream, config: &FrameConfig) -> Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_max_payload(stream, config.max_payload_size))
    }
}

/// Read into `buf` until it is full or the stream ends; returns bytes read.
fn fill(src: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(filled)
}
