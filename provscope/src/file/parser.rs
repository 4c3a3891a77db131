//! Low-level byte stream parser for header and metadata decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary
//! parser used for everything goblin does not already decode: the CLR runtime header,
//! debug directory records, physical metadata streams, and the portable debug format.
//! All operations are bounds-checked so that truncated or hostile input surfaces as an
//! error instead of a panic.
//!
//! # Usage
//!
//! ```rust
//! use provscope::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04];
//! let mut parser = Parser::new(&data);
//!
//! let value = parser.read_le::<u16>()?;
//! assert_eq!(value, 0x0201);
//! # Ok::<(), provscope::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, RawIO},
    Result,
};

/// A cursor-based binary data parser.
///
/// `Parser` maintains a position within a byte slice and provides strongly typed,
/// bounds-checked reads in little-endian order, plus the variable-length encodings
/// used by metadata blobs.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// # Arguments
    /// * `pos` - The position to move the cursor to
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Arguments
    /// * `step` - Amount of bytes to advance
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let Some(next) = self.position.checked_add(step) else {
            return Err(out_of_bounds_error!());
        };

        if next > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = next;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Read a type `T` from the current position in little-endian format and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: RawIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a compressed unsigned integer as used by metadata blob encodings.
    ///
    /// Compressed integers use variable-length encoding to efficiently store small values:
    /// - Values 0-127: 1 byte (`0xxxxxxx`)
    /// - Values 128-16383: 2 bytes (`10xxxxxx xxxxxxxx`)
    /// - Values up to 2^29-1: 4 bytes (`110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx`)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for an invalid lead byte.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use provscope::Parser;
    ///
    /// // Single byte encoding (value < 128)
    /// let data = [0x7F];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_compressed_uint()?, 127);
    ///
    /// // Two byte encoding
    /// let data = [0x80, 0x80];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_compressed_uint()?, 128);
    /// # Ok::<(), provscope::Error>(())
    /// ```
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            let value = ((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte);
            return Ok(value);
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            let value = ((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3;
            return Ok(value);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a NUL-terminated UTF-8 string from the current position.
    ///
    /// Advances past the terminator. A string running to the end of the buffer without a
    /// terminator is accepted and consumes the remainder.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
    pub fn read_string_utf8(&mut self) -> Result<String> {
        let start = self.position;
        let mut end = start;

        while end < self.data.len() && self.data[end] != 0 {
            end += 1;
        }

        let result = match std::str::from_utf8(&self.data[start..end]) {
            Ok(text) => text.to_string(),
            Err(_) => return Err(malformed_error!("Invalid UTF-8 string at {}", start)),
        };

        // Skip the terminator when one was present
        self.position = if end < self.data.len() { end + 1 } else { end };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u32>().unwrap(), 0x0403_0201);
        assert_eq!(parser.pos(), 4);

        parser.seek(6).unwrap();
        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0807);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn seek_and_advance_bounds() {
        let data = [0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);

        assert!(parser.seek(3).is_err());
        assert!(parser.advance_by(4).is_err());
        parser.advance_by(3).unwrap();
        assert!(!parser.has_more_data());
    }

    fn read_one_compressed(data: &[u8]) -> crate::Result<u32> {
        Parser::new(data).read_compressed_uint()
    }

    #[test]
    fn compressed_uint_encodings() {
        assert_eq!(read_one_compressed(&[0x03]).unwrap(), 3);
        assert_eq!(read_one_compressed(&[0x80, 0x80]).unwrap(), 128);
        assert_eq!(read_one_compressed(&[0xBF, 0xFF]).unwrap(), 0x3FFF);
        assert_eq!(read_one_compressed(&[0xC0, 0x00, 0x40, 0x00]).unwrap(), 0x4000);

        // 111xxxxx lead byte is not a valid encoding
        assert!(read_one_compressed(&[0xE0, 0x00, 0x00, 0x00]).is_err());

        // Truncated multi-byte encodings
        assert!(read_one_compressed(&[0x80]).is_err());
    }

    #[test]
    fn utf8_strings() {
        let mut parser = Parser::new(b"hello\0world");
        assert_eq!(parser.read_string_utf8().unwrap(), "hello");
        assert_eq!(parser.read_string_utf8().unwrap(), "world");
        assert!(!parser.has_more_data());

        let invalid = [0xFF, 0xFE, 0x00];
        let mut parser = Parser::new(&invalid);
        assert!(parser.read_string_utf8().is_err());
    }
}
