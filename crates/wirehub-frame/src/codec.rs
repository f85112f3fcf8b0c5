use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: payload length (4, little-endian).
pub const HEADER_SIZE: usize = 4;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One length-prefixed unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame payload (type id + message body).
    pub payload: Bytes,
}

impl Frame {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Append `payload` to `dst` behind its u32 little-endian length.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Split the leading frame off `src`, or `Ok(None)` while it is still incomplete.
///
/// The length limit is checked as soon as the header is in, before the body arrives.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(payload_len) = peek_length(src) else {
        return Ok(None);
    };

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let missing = (HEADER_SIZE + payload_len).saturating_sub(src.len());
    if missing > 0 {
        src.reserve(missing);
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(Frame::new(src.split_to(payload_len).freeze())))
}

/// Wire size of the frame at the head of `src`, as far as its header tells.
///
/// Returns [`HEADER_SIZE`] while the header itself is incomplete.
pub fn expected_len(src: &[u8]) -> usize {
    match peek_length(src) {
        Some(len) => HEADER_SIZE + len,
        None => HEADER_SIZE,
    }
}

fn peek_length(src: &[u8]) -> Option<usize> {
    let header: [u8; HEADER_SIZE] = src.get(..HEADER_SIZE)?.try_into().ok()?;
    Some(u32::from_le_bytes(header) as usize)
}

/// Per-connection framing limits and socket timeouts.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest payload accepted in either direction.
    pub max_payload_size: usize,
    /// `None` blocks forever.
    pub read_timeout: Option<std::time::Duration>,
    /// An expired write timeout fails the send; it is not retried.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_little_endian_payload_length() {
        let mut wire = BytesMut::new();
        encode_frame(&[7u8; 0x0102], &mut wire).unwrap();
        assert_eq!(&wire[..HEADER_SIZE], &[0x02, 0x01, 0x00, 0x00]);
        assert_eq!(wire.len(), HEADER_SIZE + 0x0102);
    }

    #[test]
    fn decode_waits_for_the_whole_frame() {
        let mut full = BytesMut::new();
        encode_frame(b"\x09\x00\x00\x00status", &mut full).unwrap();

        let mut partial = BytesMut::new();
        for byte in full.iter() {
            assert!(decode_frame(&mut partial, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
            partial.extend_from_slice(&[*byte]);
            if partial.len() >= HEADER_SIZE {
                assert_eq!(expected_len(&partial), full.len());
            } else {
                assert_eq!(expected_len(&partial), HEADER_SIZE);
            }
        }
        let frame = decode_frame(&mut partial, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(&frame.payload[4..], b"status");
        assert!(partial.is_empty());
    }

    #[test]
    fn back_to_back_frames_split_cleanly() {
        let mut wire = BytesMut::new();
        encode_frame(b"", &mut wire).unwrap();
        encode_frame(b"second", &mut wire).unwrap();
        wire.extend_from_slice(&[3, 0]);

        assert!(decode_frame(&mut wire, 64).unwrap().unwrap().payload.is_empty());
        assert_eq!(decode_frame(&mut wire, 64).unwrap().unwrap().payload.as_ref(), b"second");
        assert!(decode_frame(&mut wire, 64).unwrap().is_none());
        assert_eq!(wire.as_ref(), &[3, 0]);
    }

    #[test]
    fn limit_applies_to_the_announced_length() {
        let mut wire = BytesMut::new();
        wire.put_u32_le(17 * 1024 * 1024);

        assert!(matches!(
            decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::PayloadTooLarge { size, max }) if size == 17 * 1024 * 1024 && max == DEFAULT_MAX_PAYLOAD
        ));
    }
}
