use bytes::{Buf, Bytes};

use crate::codec::TYPE_ID_SIZE;
use crate::error::{MessageError, Result};
use crate::registry::MessageTypeRegistry;
use crate::types::MessageType;
use crate::writer::MessageWriter;

/// Forward cursor over a message body.
///
/// Every read is bounds-checked; a read past the end fails with
/// [`MessageError::BufferUnderrun`] and leaves the cursor where it was.
/// [`seek`](Self::seek) repositions freely, so several consumers can each
/// read the body from the top.
#[derive(Debug, Clone)]
pub struct MessageReader {
    ty: MessageType,
    body: Bytes,
    offset: usize,
}

impl MessageReader {
    /// Reader over `body`, positioned at offset 0.
    pub fn new(ty: MessageType, body: impl Into<Bytes>) -> Self {
        Self {
            ty,
            body: body.into(),
            offset: 0,
        }
    }

    /// Split a frame payload into its type id and body.
    ///
    /// The id is resolved through `registry`, so unseen ids yield a placeholder.
    pub fn from_payload(registry: &MessageTypeRegistry, mut payload: Bytes) -> Result<Self> {
        if payload.len() < TYPE_ID_SIZE {
            return Err(MessageError::BufferUnderrun {
                offset: 0,
                needed: TYPE_ID_SIZE,
                available: payload.len(),
            });
        }
        let id = payload.get_u32_le();
        Ok(Self::new(registry.by_id(id), payload))
    }

    pub fn message_type(&self) -> &MessageType {
        &self.ty
    }

    /// The whole body, independent of the cursor.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Current cursor offset.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.body.len().saturating_sub(self.offset)
    }

    /// Move the cursor. Offsets past the end are allowed; reads will underrun.
    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let [b] = self.take_array::<1>()?;
        Ok(b)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.take_array().map(i16::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.take_array().map(i32::from_le_bytes)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.take_array().map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.take_array().map(f64::from_le_bytes)
    }

    /// Read an `Int32`-length-prefixed UTF-8 string.
    ///
    /// On any failure the cursor is restored to the start of the prefix.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.offset;
        let result = self.read_string_at(start);
        if result.is_err() {
            self.offset = start;
        }
        result
    }

    fn read_string_at(&mut self, start: usize) -> Result<String> {
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| MessageError::InvalidLength(len))?;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| MessageError::InvalidUtf8 {
                offset: start + 4,
            })
    }

    /// Read exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let start = self.offset;
        self.take(len)?;
        Ok(self.body.slice(start..self.offset))
    }

    /// Writer holding the same type and body, for relaying a received message.
    pub fn to_writer(&self) -> MessageWriter {
        let mut writer = MessageWriter::new(&self.ty);
        writer.write_bytes(&self.body);
        writer
    }

    fn take(&mut self, needed: usize) -> Result<&[u8]> {
        let start = self.offset;
        let end = start
            .checked_add(needed)
            .filter(|end| *end <= self.body.len())
            .ok_or(MessageError::BufferUnderrun {
                offset: start,
                needed,
                available: self.remaining(),
            })?;
        self.offset = end;
        Ok(&self.body[start..end])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
