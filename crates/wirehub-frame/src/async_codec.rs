//! `tokio_util::codec` adapter for the same wire format.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, expected_len, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::FrameError;

/// Length-prefix codec for use with `FramedRead`/`FramedWrite`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_payload_size: usize,
}

impl FrameCodec {
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::Truncated {
                expected: expected_len(src),
                received: src.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
        if item.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_small_duplex() {
        // An 8-byte pipe forces every frame through several partial reads.
        let (left, right) = tokio::io::duplex(8);
        let mut sink = FramedWrite::new(left, FrameCodec::default());
        let mut stream = FramedRead::new(right, FrameCodec::default());

        let writer = tokio::spawn(async move {
            sink.send(Bytes::from_static(b"first frame")).await.unwrap();
            sink.send(Bytes::new()).await.unwrap();
            sink.send(Bytes::from(vec![0x5A; 100])).await.unwrap();
        });

        let f1 = stream.next().await.unwrap().unwrap();
        let f2 = stream.next().await.unwrap().unwrap();
        let f3 = stream.next().await.unwrap().unwrap();
        writer.await.unwrap();

        assert_eq!(f1.payload.as_ref(), b"first frame");
        assert!(f2.payload.is_empty());
        assert_eq!(f3.payload.as_ref(), vec![0x5A; 100].as_slice());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn eof_mid_frame_is_truncated() {
        let (mut left, right) = tokio::io::duplex(64);
        let mut stream = FramedRead::new(right, FrameCodec::default());

        left.write_all(&[10, 0, 0, 0, b'a', b'b']).await.unwrap();
        drop(left);

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 14,
                received: 6
            }
        ));
    }

    #[test]
    fn encoder_enforces_max_payload() {
        let mut codec = FrameCodec::new(2);
        let mut dst = BytesMut::new();
        let err = codec
            .encode(Bytes::from_static(b"abc"), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 3, max: 2 }));
        assert!(dst.is_empty());
    }
}
