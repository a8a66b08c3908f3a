//! Low-level payload encoding primitives
//!
//! Every payload starts with a 16-bit magic and a duplicated 16-bit type
//! tag, followed by fixed-width little-endian integers, length-prefixed
//! strings and raw byte blobs.

/// Magic for the main application payload family.
pub const PAYLOAD_MAGIC: u16 = 0x27D8;

/// Magic for the chat-channel payload family.
pub const CHAT_MAGIC: u16 = 0x27DA;

/// Upper bound for a single string or blob field. Anything larger is a
/// corrupt length prefix, not a legitimate field.
pub const MAX_FIELD_LEN: usize = 4096;

/// Errors that can occur while decoding a payload
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    #[error("payload truncated")]
    Truncated,
    #[error("field length {0} exceeds maximum {MAX_FIELD_LEN}")]
    FieldTooLong(usize),
    #[error("string field is not valid ASCII")]
    BadString,
    #[error("malformed cipher sub-payload")]
    BadCipherBlock,
}

/// Parsed payload prefix: magic plus the duplicated type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadPrefix {
    pub magic: u16,
    pub type1: u16,
    pub type2: u16,
}

impl PayloadPrefix {
    pub fn read(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            magic: r.read_u16()?,
            type1: r.read_u16()?,
            type2: r.read_u16()?,
        })
    }
}

/// Writer for a single outgoing payload
pub struct PayloadWriter {
    buffer: Vec<u8>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    /// Write the payload prefix: magic and the type tag twice.
    pub fn write_prefix(&mut self, magic: u16, kind: u16) {
        self.write_u16(magic);
        self.write_u16(kind);
        self.write_u16(kind);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    /// Write a length-prefixed NUL-terminated string. An empty string is
    /// written as a zero length with no body (an absent field on the wire).
    pub fn write_str(&mut self, value: &str) {
        if value.is_empty() {
            self.write_u32(0);
            return;
        }
        self.write_u32(value.len() as u32 + 1);
        self.buffer.extend_from_slice(value.as_bytes());
        self.buffer.push(0);
    }

    /// Write a length-prefixed raw byte blob.
    pub fn write_blob(&mut self, value: &[u8]) {
        self.write_u32(value.len() as u32);
        self.buffer.extend_from_slice(value);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for PayloadWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader over a single received payload
pub struct PayloadReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn read(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.position + n > self.data.len() {
            return Err(DecodeError::Truncated);
        }
        let slice = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.read(1).map(|b| b[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.read(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.read(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.read_u8().map(|b| b != 0)
    }

    /// Read a length-prefixed NUL-terminated string. A zero length decodes
    /// as the empty string.
    pub fn read_str(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        if len > MAX_FIELD_LEN {
            return Err(DecodeError::FieldTooLong(len));
        }
        let raw = self.read(len)?;
        // The length counts the trailing NUL.
        let body = match raw.split_last() {
            Some((0, body)) => body,
            _ => return Err(DecodeError::BadString),
        };
        String::from_utf8(body.to_vec()).map_err(|_| DecodeError::BadString)
    }

    /// Read a length-prefixed raw byte blob.
    pub fn read_blob(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u32()? as usize;
        if len > MAX_FIELD_LEN {
            return Err(DecodeError::FieldTooLong(len));
        }
        Ok(self.read(len)?.to_vec())
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.data.len()
    }
}
