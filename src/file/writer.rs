//! Byte stream writer, the encoding counterpart of [`crate::file::parser::Parser`].
//!
//! Every write appends to an owned buffer. Variable-length integers are always emitted in
//! their minimal form, which is also the form produced by the common compilers, so an
//! unmodified structure written back reproduces its input bytes.

use crate::file::io::{write_le, LeIO};

/// Append-only byte buffer with writers for each encoding the parser reads.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    data: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the writer and return its buffer.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Write a little-endian primitive.
    pub fn write_le<T: LeIO>(&mut self, value: T) {
        write_le(&mut self.data, value);
    }

    /// Write a variable-length unsigned 32-bit integer in minimal form.
    pub fn write_u32(&mut self, mut value: u32) {
        loop {
            #[allow(clippy::cast_possible_truncation)]
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.data.push(byte);
                return;
            }
            self.data.push(byte | 0x80);
        }
    }

    /// Write a variable-length unsigned 30-bit integer.
    pub fn write_u30(&mut self, value: u32) {
        self.write_u32(value);
    }

    /// Write a `usize` index as a variable-length integer.
    ///
    /// Indices above `u32::MAX` cannot be represented by the format; they are clamped,
    /// which the pool layer prevents by never growing a table that large.
    pub fn write_index(&mut self, value: usize) {
        self.write_u30(u32::try_from(value).unwrap_or(u32::MAX));
    }

    /// Write a variable-length signed 32-bit integer.
    pub fn write_s32(&mut self, value: i32) {
        #[allow(clippy::cast_sign_loss)]
        self.write_u32(value as u32);
    }

    /// Write a signed 24-bit little-endian integer.
    pub fn write_s24(&mut self, value: i32) {
        let bytes = value.to_le_bytes();
        self.data.extend_from_slice(&bytes[..3]);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Write a `u30`-length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) {
        self.write_index(value.len());
        self.data.extend_from_slice(value.as_bytes());
    }

    /// Write a null-terminated UTF-8 string.
    pub fn write_cstring(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
    }
}

/// Encoded length of `value` as a variable-length integer.
#[must_use]
pub fn u30_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Parser;

    #[test]
    fn test_write_u30_minimal() {
        for (value, expected) in [
            (0_u32, vec![0x00]),
            (127, vec![0x7F]),
            (128, vec![0x80, 0x01]),
            (300, vec![0xAC, 0x02]),
            (0x3FFF_FFFF, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x03]),
        ] {
            let mut writer = Writer::new();
            writer.write_u30(value);
            assert_eq!(writer.as_slice(), expected.as_slice(), "value {value}");
            assert_eq!(u30_len(value), expected.len());
        }
    }

    #[test]
    fn test_write_s32_negative_is_five_bytes() {
        let mut writer = Writer::new();
        writer.write_s32(-2);
        assert_eq!(writer.len(), 5);

        let mut parser = Parser::new(writer.as_slice());
        assert_eq!(parser.read_s32().unwrap(), -2);
    }

    #[test]
    fn test_write_s24() {
        let mut writer = Writer::new();
        writer.write_s24(-4);
        writer.write_s24(0x01_0203);
        assert_eq!(writer.as_slice(), &[0xFC, 0xFF, 0xFF, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_write_strings() {
        let mut writer = Writer::new();
        writer.write_string("ab");
        writer.write_cstring("c");
        assert_eq!(writer.into_inner(), vec![0x02, b'a', b'b', b'c', 0x00]);
    }
}
