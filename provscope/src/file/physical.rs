//! Physical file backend for memory-mapped I/O.
//!
//! Packages can be large; mapping the archive into the address space lets the operating
//! system page in only what entry extraction actually touches, while still giving the
//! zip reader cheap random access to the central directory.

use super::Backend;
use crate::{Error::OutOfBounds, Result};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A file backend that uses memory-mapped I/O for efficient access to files on disk.
///
/// All access operations include bounds checking. The mapping stays valid for the
/// lifetime of the backend; the archive handle owns it for the duration of a run.
pub struct Physical {
    _file: fs::File,
    map: Mmap,
}

impl Physical {
    /// Open and map the file at `path`.
    ///
    /// # Arguments
    /// * `path` - The file to map
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped, or
    /// [`crate::Error::Empty`] for a zero-length file.
    pub fn new(path: &Path) -> Result<Physical> {
        let file = fs::File::open(path)?;

        // Safety: the mapping is read-only and the file handle is held alongside it.
        let map = unsafe { Mmap::map(&file)? };
        if map.is_empty() {
            return Err(crate::Error::Empty);
        }

        Ok(Physical { _file: file, map })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if offset_end > self.map.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.map[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        &self.map
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}
