use bytes::{Bytes, BytesMut};
use wirehub_frame::{decode_frame, expected_len, FrameError};

use crate::error::Result;
use crate::reader::MessageReader;
use crate::registry::MessageTypeRegistry;
use crate::types::MessageType;
use crate::writer::MessageWriter;

/// Width of the type id at the start of every payload.
pub const TYPE_ID_SIZE: usize = 4;

/// Build a complete wire frame for `ty`, letting `body` write the fields.
pub fn encode<F>(ty: &MessageType, body: F) -> Result<Bytes>
where
    F: FnOnce(&mut MessageWriter) -> Result<()>,
{
    let mut writer = MessageWriter::new(ty);
    body(&mut writer)?;
    writer.to_frame()
}

/// Decode one complete wire frame into a reader positioned at the body.
///
/// Bytes after the first frame are ignored.
pub fn decode(registry: &MessageTypeRegistry, frame: &[u8]) -> Result<MessageReader> {
    let mut src = BytesMut::from(frame);
    match decode_frame(&mut src, usize::MAX)? {
        Some(decoded) => MessageReader::from_payload(registry, decoded.payload),
        None => Err(FrameError::Truncated {
            expected: expected_len(frame),
            received: frame.len(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessageError;

    #[test]
    fn test_encode_decode_unicast_message() {
        let registry = MessageTypeRegistry::new();
        let ty = registry.get("MessageType1");

        let frame = encode(&ty, |w| {
            w.write_i16(1).write_i32(2).write_string("Hi")?;
            Ok(())
        })
        .unwrap();

        // length(4) + type id(4) + i16(2) + i32(4) + string(4 + 2)
        assert_eq!(frame.len(), 4 + 16);
        assert_eq!(&frame[..4], &16u32.to_le_bytes());
        assert_eq!(&frame[4..8], &ty.id().to_le_bytes());

        let mut reader = decode(&registry, &frame).unwrap();
        assert!(reader.message_type().ptr_eq(&ty));
        assert_eq!(reader.read_i16().unwrap(), 1);
        assert_eq!(reader.read_i32().unwrap(), 2);
        assert_eq!(reader.read_string().unwrap(), "Hi");
    }

    #[test]
    fn test_empty_body_still_carries_type() {
        let registry = MessageTypeRegistry::new();
        let ty = registry.get("Empty");
        let frame = encode(&ty, |_| Ok(())).unwrap();
        assert_eq!(&frame[..4], &4u32.to_le_bytes());

        let reader = decode(&registry, &frame).unwrap();
        assert_eq!(reader.message_type(), &ty);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_decode_truncated_frame() {
        let registry = MessageTypeRegistry::new();
        let ty = registry.get("Cut");
        let frame = encode(&ty, |w| {
            w.write_u32(1);
            Ok(())
        })
        .unwrap();

        let err = decode(&registry, &frame[..6]).unwrap_err();
        assert!(matches!(
            err,
            MessageError::Frame(FrameError::Truncated {
                expected: 12,
                received: 6
            })
        ));

        let err = decode(&registry, &frame[..2]).unwrap_err();
        assert!(matches!(
            err,
            MessageError::Frame(FrameError::Truncated {
                expected: 4,
                received: 2
            })
        ));
    }

    #[test]
    fn test_decode_frame_too_short_for_type_id() {
        let registry = MessageTypeRegistry::new();
        let err = decode(&registry, &[2, 0, 0, 0, 9, 9]).unwrap_err();
        assert!(matches!(err, MessageError::BufferUnderrun { .. }));
    }

    #[test]
    fn test_encode_propagates_body_errors() {
        let registry = MessageTypeRegistry::new();
        let ty = registry.get("Failing");
        let result = encode(&ty, |_| Err(MessageError::InvalidLength(-1)));
        assert!(matches!(result, Err(MessageError::InvalidLength(-1))));
    }
}
