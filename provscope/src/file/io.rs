//! Bounds-checked little-endian primitive reads.
//!
//! All container formats this crate decodes (PE headers, physical metadata, the portable
//! debug format) store multi-byte values little-endian. This module provides the
//! [`crate::file::io::RawIO`] trait plus free functions for reading primitives out of byte
//! buffers without ever running past the end:
//!
//! - [`crate::file::io::read_le`] - Read from the start of a buffer
//! - [`crate::file::io::read_le_at`] - Read at an offset, advancing the offset
//! - [`crate::file::io::read_le_at_dyn`] - Read a 2- or 4-byte index depending on context
//!
//! The dynamic variant exists for metadata heaps and tables: index columns widen from
//! 2 to 4 bytes once the referenced heap or table grows past 16-bit addressing.

use crate::Result;

/// Types that can be decoded from a fixed-size little-endian byte pattern.
///
/// Implemented for the primitive integer types used by the PE and metadata formats.
pub trait RawIO: Sized {
    /// The fixed-size byte array this type decodes from.
    type Bytes: for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_raw_io {
    ($($t:ty),*) => {
        $(
            impl RawIO for $t {
                type Bytes = [u8; std::mem::size_of::<$t>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$t>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_raw_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Arguments
/// * `data` - The byte buffer to read from
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: RawIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Arguments
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position (advanced after reading)
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at<T: RawIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();

    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };

    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Dynamically reads either a 2-byte or 4-byte value in little-endian byte order.
///
/// Metadata index columns are 2 bytes wide until the referenced heap or table outgrows
/// 16-bit addressing; `is_large` selects the width and u16 values are promoted to u32
/// for a consistent return type.
///
/// # Arguments
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position (advanced after reading)
/// * `is_large` - If `true`, reads 4 bytes; if `false`, reads 2 bytes and promotes
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_le_primitives() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

        assert_eq!(read_le::<u8>(&data).unwrap(), 0x01);
        assert_eq!(read_le::<u16>(&data).unwrap(), 0x0201);
        assert_eq!(read_le::<u32>(&data).unwrap(), 0x0403_0201);
        assert_eq!(read_le::<u64>(&data).unwrap(), 0x0807_0605_0403_0201);
        assert_eq!(read_le::<i32>(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap(), -1);
    }

    #[test]
    fn read_le_at_advances() {
        let data = [0x01, 0x00, 0x02, 0x00];
        let mut offset = 0;

        let first: u16 = read_le_at(&data, &mut offset).unwrap();
        assert_eq!(first, 1);
        assert_eq!(offset, 2);

        let second: u16 = read_le_at(&data, &mut offset).unwrap();
        assert_eq!(second, 2);
        assert_eq!(offset, 4);

        assert!(read_le_at::<u8>(&data, &mut offset).is_err());
    }

    #[test]
    fn read_le_at_bounds() {
        let data = [0x01, 0x02];
        let mut offset = 1;
        assert!(read_le_at::<u32>(&data, &mut offset).is_err());
        assert_eq!(offset, 1);

        let mut overflow = usize::MAX;
        assert!(read_le_at::<u32>(&data, &mut overflow).is_err());
    }

    #[test]
    fn read_dyn_widths() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut offset = 0;

        assert_eq!(read_le_at_dyn(&data, &mut offset, false).unwrap(), 1);
        assert_eq!(offset, 2);
        assert_eq!(read_le_at_dyn(&data, &mut offset, true).unwrap(), 2);
        assert_eq!(offset, 6);
    }
}
