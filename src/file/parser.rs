//! Low-level byte stream parser for movie and bytecode decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data
//! parser for the structures found in a Shockwave Flash movie and in the AVM2 bytecode units
//! embedded in it. It offers bounds-checked access to binary data with support for the
//! little-endian fixed-width fields, the variable-length integer encoding used throughout the
//! bytecode format, and the two string forms (length-prefixed and null-terminated).
//!
//! # Architecture
//!
//! The parser maintains a position within a borrowed byte slice:
//!
//! - **Position tracking** - Maintains current offset for sequential parsing operations
//! - **Bounds checking** - All operations validate data availability before reading
//! - **Type-safe reading** - Strongly typed methods for the encodings in use
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_le`] - Read primitive types (little-endian)
//! - [`crate::file::parser::Parser::read_u30`] - Read variable-length unsigned integers
//! - [`crate::file::parser::Parser::read_s32`] - Read variable-length signed integers
//! - [`crate::file::parser::Parser::read_s24`] - Read 24-bit branch displacements
//! - [`crate::file::parser::Parser::read_string`] - Read length-prefixed UTF-8 strings
//! - [`crate::file::parser::Parser::read_cstring`] - Read null-terminated UTF-8 strings
//!
//! # Usage Examples
//!
//! ```rust
//! use abcpatch::Parser;
//!
//! // u30 300 (two bytes), then a 3-byte string
//! let data = [0xAC, 0x02, 0x03, b'a', b'b', b'c'];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_u30()?, 300);
//! assert_eq!(parser.read_string()?, "abc");
//! assert!(!parser.has_more_data());
//! # Ok::<(), abcpatch::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, LeIO},
    Error::OutOfBounds,
    Result,
};

/// A generic binary data parser for reading movie and bytecode structures.
///
/// `Parser` provides a cursor-based interface over a borrowed byte slice. The parser
/// maintains an internal position cursor and provides bounds checking to prevent buffer
/// overruns when reading malformed or truncated data. It never allocates except for
/// the strings it returns.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new Parser from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abcpatch::Parser;
    ///
    /// let data = [0x01, 0x02, 0x03, 0x04];
    /// let parser = Parser::new(&data);
    /// assert_eq!(parser.len(), 4);
    /// ```
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the underlying data buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move to a specific position in the data.
    ///
    /// Seeking to exactly `len()` is allowed and leaves the parser at the end.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(pos) if pos <= self.data.len() => {
                self.position = pos;
                Ok(())
            }
            _ => Err(OutOfBounds),
        }
    }

    /// Get the current position in the data.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get the full underlying data slice.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if at the end of data.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data.get(self.position).copied().ok_or(OutOfBounds)
    }

    /// Read a type T from the current position in little-endian format and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there is not enough data left.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abcpatch::Parser;
    ///
    /// let data = [0x10, 0x00, 0x2E, 0x00];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_le::<u16>()?, 16);
    /// assert_eq!(parser.read_le::<u16>()?, 46);
    /// # Ok::<(), abcpatch::Error>(())
    /// ```
    pub fn read_le<T: LeIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a variable-length unsigned 32-bit integer.
    ///
    /// Each byte contributes its low seven bits, least significant group first; the high bit
    /// signals that another byte follows. At most five bytes are consumed, and bits beyond
    /// the 32nd are discarded the same way the virtual machine does.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding runs past the data.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut result: u32 = 0;
        for shift in [0_u32, 7, 14, 21, 28] {
            let byte = self.read_le::<u8>()?;
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                break;
            }
        }

        Ok(result)
    }

    /// Read a variable-length unsigned 30-bit integer.
    ///
    /// The encoding is the same as [`Parser::read_u32`]; this is the form used for every pool
    /// index, count and register number in the bytecode format.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding runs past the data.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use abcpatch::Parser;
    ///
    /// let data = [0x7F, 0x80, 0x01];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_u30()?, 127);
    /// assert_eq!(parser.read_u30()?, 128);
    /// # Ok::<(), abcpatch::Error>(())
    /// ```
    pub fn read_u30(&mut self) -> Result<u32> {
        self.read_u32()
    }

    /// Read a variable-length signed 32-bit integer (two's complement of the unsigned form).
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding runs past the data.
    pub fn read_s32(&mut self) -> Result<i32> {
        #[allow(clippy::cast_possible_wrap)]
        Ok(self.read_u32()? as i32)
    }

    /// Read a variable-length index and widen it to `usize` for table lookups.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the encoding runs past the data.
    pub fn read_index(&mut self) -> Result<usize> {
        Ok(self.read_u30()? as usize)
    }

    /// Read a signed 24-bit little-endian integer, the form of all branch displacements.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than three bytes remain.
    pub fn read_s24(&mut self) -> Result<i32> {
        let b0 = self.read_le::<u8>()?;
        let b1 = self.read_le::<u8>()?;
        let b2 = self.read_le::<u8>()?;

        let raw = i32::from(b0) | (i32::from(b1) << 8) | (i32::from(b2) << 16);
        Ok((raw << 8) >> 8)
    }

    /// Read `len` raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let Some(end) = self.position.checked_add(len) else {
            return Err(OutOfBounds);
        };
        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Read all bytes from the current position to the end.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.position.min(self.data.len())..];
        self.position = self.data.len();
        slice
    }

    /// Read a `u30`-length-prefixed UTF-8 string.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the string runs past the data, or
    /// [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_index()?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|error| malformed_error!("Invalid UTF-8 string at {} - {}", self.position, error))
    }

    /// Read a null-terminated UTF-8 string, consuming the terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no terminator is found, or
    /// [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.position.min(self.data.len())..];
        let Some(len) = rest.iter().position(|byte| *byte == 0) else {
            return Err(OutOfBounds);
        };

        let bytes = self.read_bytes(len)?;
        self.advance_by(1)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|error| malformed_error!("Invalid UTF-8 string at {} - {}", self.position, error))
    }
}
