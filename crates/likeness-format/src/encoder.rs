//! Binary encoding and decoding utilities
//!
//! Everything Likeness writes to disk (code units and metadata blobs) goes
//! through [`UnitWriter`] and comes back through [`UnitReader`]. All
//! multi-byte values are little-endian.

use thiserror::Error;

/// Errors that can occur while decoding binary data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Unexpected end of input
    #[error("Unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Unknown tag byte for an enumerated value
    #[error("Invalid {what} tag {tag:#x} at offset {offset}")]
    InvalidTag {
        /// What kind of value was being decoded
        what: &'static str,
        /// The offending tag
        tag: u8,
        /// Offset of the tag
        offset: usize,
    },

    /// A string pool index points past the end of the pool
    #[error("String index {index} out of range (pool size {len})")]
    InvalidStringIndex {
        /// The offending index
        index: u32,
        /// Pool length
        len: usize,
    },
}

/// Writer for the Likeness binary formats
#[derive(Debug, Default)]
pub struct UnitWriter {
    /// Internal buffer
    pub(crate) buffer: Vec<u8>,
}

impl UnitWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new writer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Get the current buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get the current offset
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // ===== Basic Emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a boolean as a single byte
    pub fn emit_bool(&mut self, value: bool) {
        self.emit_u8(value as u8);
    }

    /// Emit a 16-bit unsigned integer
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit the low 24 bits of a value
    pub fn emit_u24(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes()[..3]);
    }

    /// Emit a 32-bit unsigned integer
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit signed integer
    pub fn emit_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit signed integer
    pub fn emit_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit float
    pub fn emit_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit float
    pub fn emit_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a collection length as u32
    pub fn emit_len(&mut self, len: usize) {
        self.emit_u32(len as u32);
    }

    /// Emit a string: length (u32) + UTF-8 bytes
    pub fn emit_string(&mut self, value: &str) {
        self.emit_len(value.len());
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Emit a length-prefixed byte block
    pub fn emit_block(&mut self, bytes: &[u8]) {
        self.emit_len(bytes.len());
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit raw bytes with no length prefix
    pub fn emit_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Overwrite a previously emitted u32 (used for header checksums)
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Reader for the Likeness binary formats
pub struct UnitReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> UnitReader<'a> {
    /// Create a new reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Get the current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the remaining bytes in the buffer
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// The unread tail of the buffer
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.position.min(self.buffer.len())..]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let slice = &self.buffer[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    // ===== Basic Reading =====

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Read a boolean byte
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a 16-bit unsigned integer
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    /// Read a 24-bit unsigned integer
    pub fn read_u24(&mut self) -> Result<u32, DecodeError> {
        let [a, b, c] = self.take_array::<3>()?;
        Ok(u32::from_le_bytes([a, b, c, 0]))
    }

    /// Read a 32-bit unsigned integer
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Read a 32-bit signed integer
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    /// Read a 64-bit signed integer
    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Read a 32-bit float
    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    /// Read a 64-bit float
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// Read a u32 collection length
    pub fn read_len(&mut self) -> Result<usize, DecodeError> {
        Ok(self.read_u32()? as usize)
    }

    /// Read raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        Ok(self.take(len)?.to_vec())
    }

    /// Read a length-prefixed byte block
    pub fn read_block(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    /// Read a string: length (u32) + UTF-8 bytes
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_len()?;
        let start = self.position;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_primitives() {
        let mut writer = UnitWriter::new();
        writer.emit_u8(0x42);
        writer.emit_u16(0x1234);
        writer.emit_u24(0x00AB_CDEF);
        writer.emit_u32(0xABCD_EF01);
        writer.emit_i32(-42);
        writer.emit_i64(-7_000_000_000);
        writer.emit_f32(1.5);
        writer.emit_f64(3.14159);

        let mut reader = UnitReader::new(writer.buffer());
        assert_eq!(reader.read_u8().unwrap(), 0x42);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u24().unwrap(), 0x00AB_CDEF);
        assert_eq!(reader.read_u32().unwrap(), 0xABCD_EF01);
        assert_eq!(reader.read_i32().unwrap(), -42);
        assert_eq!(reader.read_i64().unwrap(), -7_000_000_000);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert!((reader.read_f64().unwrap() - 3.14159).abs() < 0.00001);
        assert!(!reader.has_more());
    }

    #[test]
    fn test_reader_bounds_checking() {
        let bytes = vec![0x01, 0x02];
        let mut reader = UnitReader::new(&bytes);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u8().unwrap(), 0x02);
        assert_eq!(reader.read_u8(), Err(DecodeError::UnexpectedEnd(2)));
    }

    #[test]
    fn test_reader_string() {
        let mut writer = UnitWriter::new();
        writer.emit_string("hello");
        writer.emit_string("");

        let mut reader = UnitReader::new(writer.buffer());
        assert_eq!(reader.read_string().unwrap(), "hello");
        assert_eq!(reader.read_string().unwrap(), "");
    }

    #[test]
    fn test_reader_invalid_utf8() {
        let mut writer = UnitWriter::new();
        writer.emit_block(&[0xFF, 0xFE]);

        let mut reader = UnitReader::new(writer.buffer());
        assert_eq!(reader.read_string(), Err(DecodeError::InvalidUtf8(4)));
    }

    #[test]
    fn test_patch_u32() {
        let mut writer = UnitWriter::new();
        writer.emit_u32(0);
        writer.emit_u8(7);
        writer.patch_u32(0, 0xDEAD_BEEF);

        let mut reader = UnitReader::new(writer.buffer());
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.rest(), &[7]);
    }
}
