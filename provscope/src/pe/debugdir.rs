//! Debug directory table parsing.
//!
//! The debug data directory of a PE file points at a table of 28-byte records, each
//! describing one piece of auxiliary debug information. Provenance validation cares
//! about four record types:
//!
//! - **CodeView** - carries the signature/age/path of the matching debug file
//! - **Reproducible** - zero-sized marker written by deterministic compilations
//! - **Embedded portable debug data** - a Deflate-compressed portable debug file
//!   carried inside the binary itself
//! - **Checksum** - digest of the binary with the debug fields zeroed (recorded, unused)

use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::{file::parser::Parser, Result};

/// Magic opening a CodeView `RSDS` record.
const CODEVIEW_SIGNATURE: u32 = 0x5344_5352;

/// Magic opening an embedded portable debug data record ("MPDB").
const EMBEDDED_SIGNATURE: u32 = 0x4244_504D;

/// Decompressed embedded debug data larger than this is rejected outright.
const MAX_EMBEDDED_SIZE: u32 = 0x1000_0000;

/// Discriminates the debug directory record types relevant to validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugDirectoryType {
    /// CodeView record (type 2)
    CodeView,
    /// Deterministic-build marker (type 16)
    Reproducible,
    /// Embedded portable debug data (type 17)
    EmbeddedPortablePdb,
    /// Debug-file checksum (type 19)
    PdbChecksum,
    /// Any other record type
    Unknown(u32),
}

impl From<u32> for DebugDirectoryType {
    fn from(value: u32) -> Self {
        match value {
            2 => DebugDirectoryType::CodeView,
            16 => DebugDirectoryType::Reproducible,
            17 => DebugDirectoryType::EmbeddedPortablePdb,
            19 => DebugDirectoryType::PdbChecksum,
            other => DebugDirectoryType::Unknown(other),
        }
    }
}

/// One 28-byte debug directory record.
#[derive(Debug, Clone)]
pub struct DebugDirectoryEntry {
    /// Reserved, always 0
    pub characteristics: u32,
    /// Time stamp (arbitrary hash for deterministic builds)
    pub time_date_stamp: u32,
    /// Format major version
    pub major_version: u16,
    /// Format minor version
    pub minor_version: u16,
    /// Record type
    pub entry_type: DebugDirectoryType,
    /// Size of the pointed-to raw data
    pub size_of_data: u32,
    /// RVA of the raw data when mapped
    pub address_of_raw_data: u32,
    /// File offset of the raw data
    pub pointer_to_raw_data: u32,
}

impl DebugDirectoryEntry {
    /// Size of one record on disk.
    pub const SIZE: usize = 28;

    /// Parse the full debug directory table from its data-directory extent.
    ///
    /// # Arguments
    /// * `data` - The byte slice spanning exactly the debug data directory
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the extent is not a whole number of records.
    pub fn read_table(data: &[u8]) -> Result<Vec<DebugDirectoryEntry>> {
        if data.len() % Self::SIZE != 0 {
            return Err(malformed_error!(
                "Debug directory size {} is not a multiple of {}",
                data.len(),
                Self::SIZE
            ));
        }

        let mut parser = Parser::new(data);
        let mut entries = Vec::with_capacity(data.len() / Self::SIZE);
        for _ in 0..data.len() / Self::SIZE {
            entries.push(DebugDirectoryEntry {
                characteristics: parser.read_le::<u32>()?,
                time_date_stamp: parser.read_le::<u32>()?,
                major_version: parser.read_le::<u16>()?,
                minor_version: parser.read_le::<u16>()?,
                entry_type: DebugDirectoryType::from(parser.read_le::<u32>()?),
                size_of_data: parser.read_le::<u32>()?,
                address_of_raw_data: parser.read_le::<u32>()?,
                pointer_to_raw_data: parser.read_le::<u32>()?,
            });
        }

        Ok(entries)
    }
}

/// A parsed CodeView (`RSDS`) record: the identity linking a binary to its debug file.
#[derive(Debug, Clone)]
pub struct CodeViewRecord {
    /// Raw 16-byte signature, same byte layout as metadata GUIDs
    pub signature: [u8; 16],
    /// Incrementing age (1 for portable debug files)
    pub age: u32,
    /// Path of the debug file at build time
    pub path: String,
}

impl CodeViewRecord {
    /// Parse a CodeView record from its raw data.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when the `RSDS` magic is absent or the
    /// record is truncated.
    pub fn read(data: &[u8]) -> Result<CodeViewRecord> {
        let mut parser = Parser::new(data);

        let magic = parser.read_le::<u32>()?;
        if magic != CODEVIEW_SIGNATURE {
            return Err(malformed_error!(
                "CodeView record magic does not match - {:#010X}",
                magic
            ));
        }

        let mut signature = [0u8; 16];
        for byte in &mut signature {
            *byte = parser.read_le::<u8>()?;
        }

        let age = parser.read_le::<u32>()?;
        let path = parser.read_string_utf8()?;

        Ok(CodeViewRecord {
            signature,
            age,
            path,
        })
    }

    /// The signature as a displayable GUID.
    #[must_use]
    pub fn guid(&self) -> uguid::Guid {
        uguid::Guid::from_bytes(self.signature)
    }
}

/// Decompress an embedded portable debug data record.
///
/// The raw data is a 4-byte magic, the declared uncompressed size, and a raw Deflate
/// stream. The output buffer is capped by the declared size; a stream that inflates to
/// a different length is rejected.
///
/// # Arguments
/// * `data` - The byte slice spanning the record's raw data
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for a bad magic, an unreasonable declared size,
/// or a Deflate stream that does not match the declared size.
pub fn read_embedded_pdb(data: &[u8]) -> Result<Vec<u8>> {
    let mut parser = Parser::new(data);

    let magic = parser.read_le::<u32>()?;
    if magic != EMBEDDED_SIGNATURE {
        return Err(malformed_error!(
            "Embedded debug data magic does not match - {:#010X}",
            magic
        ));
    }

    let uncompressed_size = parser.read_le::<u32>()?;
    if uncompressed_size == 0 || uncompressed_size > MAX_EMBEDDED_SIZE {
        return Err(malformed_error!(
            "Embedded debug data declares unreasonable size - {}",
            uncompressed_size
        ));
    }

    let compressed = &data[parser.pos()..];
    let mut decoder = DeflateDecoder::new(compressed).take(u64::from(uncompressed_size) + 1);
    let mut decompressed = Vec::with_capacity(uncompressed_size as usize);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| malformed_error!("Embedded debug data failed to inflate - {}", e))?;

    if decompressed.len() != uncompressed_size as usize {
        return Err(malformed_error!(
            "Embedded debug data inflated to {} bytes, expected {}",
            decompressed.len(),
            uncompressed_size
        ));
    }

    Ok(decompressed)
}
