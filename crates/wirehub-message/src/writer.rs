use bytes::{BufMut, Bytes, BytesMut};
use wirehub_frame::encode_frame;

use crate::codec::TYPE_ID_SIZE;
use crate::error::{MessageError, Result};
use crate::reader::MessageReader;
use crate::types::MessageType;

const INITIAL_CAPACITY: usize = 64;

/// Builds a message payload: type id, then body fields in call order.
///
/// All scalars are little-endian. Strings are an `Int32` byte length followed
/// by UTF-8, no terminator.
#[derive(Debug, Clone)]
pub struct MessageWriter {
    ty: MessageType,
    buf: BytesMut,
}

impl MessageWriter {
    /// Start a message of type `ty`.
    pub fn new(ty: &MessageType) -> Self {
        let mut buf = BytesMut::with_capacity(INITIAL_CAPACITY);
        buf.put_u32_le(ty.id());
        Self {
            ty: ty.clone(),
            buf,
        }
    }

    pub fn message_type(&self) -> &MessageType {
        &self.ty
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.buf.put_u8(u8::from(value));
        self
    }

    pub fn write_byte(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.buf.put_i16_le(value);
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16_le(value);
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32_le(value);
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.buf.put_f32_le(value);
        self
    }

    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.buf.put_f64_le(value);
        self
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> Result<&mut Self> {
        let len =
            i32::try_from(value.len()).map_err(|_| MessageError::StringTooLong(value.len()))?;
        self.buf.reserve(4 + value.len());
        self.buf.put_i32_le(len);
        self.buf.put_slice(value.as_bytes());
        Ok(self)
    }

    /// Append raw bytes. The length is not written; readers must know it.
    pub fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buf.put_slice(value);
        self
    }

    /// Body length in bytes, excluding the type id.
    pub fn body_len(&self) -> usize {
        self.buf.len() - TYPE_ID_SIZE
    }

    /// Frame payload (type id + body).
    pub fn payload(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }

    /// Consume the writer and return its payload without copying.
    pub fn into_payload(self) -> Bytes {
        self.buf.freeze()
    }

    /// Complete wire frame: length header followed by the payload.
    pub fn to_frame(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(wirehub_frame::HEADER_SIZE + self.buf.len());
        encode_frame(&self.buf, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Reader over a copy of the body, positioned at offset 0.
    pub fn to_reader(&self) -> MessageReader {
        MessageReader::new(
            self.ty.clone(),
            Bytes::copy_from_slice(&self.buf[TYPE_ID_SIZE..]),
        )
    }
}
