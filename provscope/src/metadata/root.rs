//! Metadata root header and stream directory.
//!
//! The root is the entry point for reading physical metadata. It carries the version
//! string and the stream directory required to locate every metadata stream. Assemblies
//! typically expose five streams; portable debug files add a sixth (`#Pdb`).

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// The MAGIC value opening a physical metadata root ("BSJB").
pub const METADATA_MAGIC: u32 = 0x424A_5342;

/// Most streams any known producer emits (`#~`, `#Strings`, `#US`, `#GUID`, `#Blob`, `#Pdb`).
const MAX_STREAMS: u16 = 6;

/// The header of the present metadata, providing necessary information for parsing.
///
/// Gives access to the version string and all stream headers required to parse the
/// metadata of an assembly or a portable debug file. It is the first structure decoded
/// when reading either.
pub struct Root {
    /// Magic signature for physical metadata: 0x424A5342
    pub signature: u32,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// Producer version string, trailing padding stripped
    pub version: String,
    /// Reserved, always 0
    pub flags: u16,
    /// Stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Reads a [`Root`] metadata header from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice spanning the whole metadata blob
    ///
    /// # Errors
    /// Returns an error if the data is too short, the signature is invalid, or the
    /// stream directory is malformed.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != METADATA_MAGIC {
            return Err(malformed_error!(
                "METADATA_MAGIC does not match - {:#010X}",
                signature
            ));
        }

        let major_version = read_le_at::<u16>(data, &mut 4)?;
        let minor_version = read_le_at::<u16>(data, &mut 6)?;

        let version_length = read_le_at::<u32>(data, &mut 12)? as usize;
        if version_length > 255 {
            return Err(malformed_error!(
                "Unreasonable metadata version string length - {}",
                version_length
            ));
        }

        let Some(version_end) = version_length.checked_add(16) else {
            return Err(OutOfBounds);
        };
        if version_end + 4 > data.len() {
            return Err(OutOfBounds);
        }

        let version_bytes = &data[16..version_end];
        let version = match std::str::from_utf8(version_bytes) {
            Ok(text) => text.trim_end_matches('\0').to_string(),
            Err(_) => return Err(malformed_error!("Metadata version string is not UTF-8")),
        };

        let mut directory_offset = version_end;
        let flags = read_le_at::<u16>(data, &mut directory_offset)?;
        let stream_count = read_le_at::<u16>(data, &mut directory_offset)?;
        if stream_count == 0 || stream_count > MAX_STREAMS {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(stream_count as usize);
        let mut stream_offset = directory_offset;
        for _ in 0..stream_count {
            if stream_offset >= data.len() {
                return Err(OutOfBounds);
            }

            let header = StreamHeader::from(&data[stream_offset..])?;

            match u32::checked_add(header.offset, header.size) {
                Some(range) => {
                    if range as usize > data.len() {
                        return Err(OutOfBounds);
                    }
                }
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        header.offset,
                        header.size
                    ))
                }
            }

            stream_offset += header.byte_size();
            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version,
            minor_version,
            version,
            flags,
            stream_headers,
        })
    }

    /// Look up a stream header by name (e.g. `"#~"`, `"#Blob"`).
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|h| h.name == name)
    }

    /// Slice `data` down to the named stream's extent.
    ///
    /// `data` must be the same blob the root was read from.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] when the stream is absent or its declared
    /// extent exceeds the blob.
    pub fn stream_data<'a>(&self, data: &'a [u8], name: &str) -> Result<&'a [u8]> {
        let Some(header) = self.stream(name) else {
            return Err(out_of_bounds_error!());
        };

        let start = header.offset as usize;
        let end = start + header.size as usize;
        if end > data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&data[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crafted_root() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&METADATA_MAGIC.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes()); // major
        data.extend_from_slice(&1u16.to_le_bytes()); // minor
        data.extend_from_slice(&0u32.to_le_bytes()); // reserved
        data.extend_from_slice(&8u32.to_le_bytes()); // version length
        data.extend_from_slice(b"PDB v1.0"); // version, exactly 8 bytes
        data.extend_from_slice(&0u16.to_le_bytes()); // flags
        data.extend_from_slice(&1u16.to_le_bytes()); // stream count
        data.extend_from_slice(&40u32.to_le_bytes()); // stream offset
        data.extend_from_slice(&4u32.to_le_bytes()); // stream size
        data.extend_from_slice(b"#~\0\0"); // name, padded to 4
        data.extend_from_slice(&[0xAA; 8]); // stream payload
        data
    }

    #[test]
    fn crafted() {
        let data = crafted_root();
        let root = Root::read(&data).unwrap();

        assert_eq!(root.signature, METADATA_MAGIC);
        assert_eq!(root.major_version, 1);
        assert_eq!(root.version, "PDB v1.0");
        assert_eq!(root.stream_headers.len(), 1);

        let tables = root.stream("#~").unwrap();
        assert_eq!(tables.offset, 40);
        assert_eq!(tables.size, 4);
        assert!(root.stream("#Blob").is_none());

        assert_eq!(root.stream_data(&data, "#~").unwrap(), &[0xAA; 4]);
    }

    #[test]
    fn bad_magic() {
        let mut data = crafted_root();
        data[0] = 0x00;
        assert!(Root::read(&data).is_err());
    }

    #[test]
    fn truncated() {
        let data = crafted_root();
        assert!(Root::read(&data[..16]).is_err());
        assert!(Root::read(&data[..30]).is_err());
    }

    #[test]
    fn stream_past_end() {
        let mut data = crafted_root();
        // Stream size field now claims more bytes than the blob holds
        let size_at = data.len() - 16;
        data[size_at..size_at + 4].copy_from_slice(&0x1000u32.to_le_bytes());
        assert!(Root::read(&data).is_err());
    }
}
