//! Custom debug information kinds and blob decoding.
//!
//! Custom debug information entries are GUID-identified blobs attached to metadata
//! rows. The GUID selects the format of the blob; validation cares about four
//! well-known kinds: the source-link JSON document, embedded source files, and the
//! compiler's metadata/options records.

use std::collections::BTreeMap;

use crate::{file::parser::Parser, Result};

/// Well-known custom debug information kinds identified by GUID.
///
/// The GUIDs are matched in their on-disk (mixed-endian) byte order, exactly as they
/// appear in the `#GUID` heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomDebugKind {
    /// Source link information for source file mapping
    /// GUID: CC110556-A091-4D38-9FEC-25AB9A351A6A
    SourceLink,

    /// Embedded source file content
    /// GUID: 0E8A571B-6926-466E-B4AD-8AB04611F5FE
    EmbeddedSource,

    /// Compilation metadata references
    /// GUID: B5FEEC05-8CD0-4A83-96DA-466284BB4BD8
    CompilationMetadata,

    /// Compilation options used by the compiler
    /// GUID: B1C2ABE1-8BF0-497A-A9B1-02FA8571E544
    CompilationOptions,

    /// Unknown or unsupported debug information kind
    Unknown([u8; 16]),
}

impl CustomDebugKind {
    /// Create a `CustomDebugKind` from a GUID byte array.
    ///
    /// # Arguments
    /// * `guid_bytes` - The 16-byte GUID identifying the debug information kind
    #[must_use]
    pub fn from_guid(guid_bytes: [u8; 16]) -> Self {
        match guid_bytes {
            // Source Link: CC110556-A091-4D38-9FEC-25AB9A351A6A
            [0x56, 0x05, 0x11, 0xCC, 0x91, 0xA0, 0x38, 0x4D, 0x9F, 0xEC, 0x25, 0xAB, 0x9A, 0x35, 0x1A, 0x6A] => {
                CustomDebugKind::SourceLink
            }
            // Embedded Source: 0E8A571B-6926-466E-B4AD-8AB04611F5FE
            [0x1B, 0x57, 0x8A, 0x0E, 0x26, 0x69, 0x6E, 0x46, 0xB4, 0xAD, 0x8A, 0xB0, 0x46, 0x11, 0xF5, 0xFE] => {
                CustomDebugKind::EmbeddedSource
            }
            // Compilation Metadata: B5FEEC05-8CD0-4A83-96DA-466284BB4BD8
            [0x05, 0xEC, 0xFE, 0xB5, 0xD0, 0x8C, 0x83, 0x4A, 0x96, 0xDA, 0x46, 0x62, 0x84, 0xBB, 0x4B, 0xD8] => {
                CustomDebugKind::CompilationMetadata
            }
            // Compilation Options: B1C2ABE1-8BF0-497A-A9B1-02FA8571E544
            [0xE1, 0xAB, 0xC2, 0xB1, 0xF0, 0x8B, 0x7A, 0x49, 0xA9, 0xB1, 0x02, 0xFA, 0x85, 0x71, 0xE5, 0x44] => {
                CustomDebugKind::CompilationOptions
            }
            // Unknown GUID
            bytes => CustomDebugKind::Unknown(bytes),
        }
    }
}

/// Decode a compilation-options blob into a key/value map.
///
/// The blob is a flat sequence of NUL-terminated UTF-8 strings, alternating option
/// name and option value. A trailing name without a value maps to an empty string.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] when the blob is not valid UTF-8.
pub fn parse_compiler_options(data: &[u8]) -> Result<BTreeMap<String, String>> {
    let mut options = BTreeMap::new();
    let mut parser = Parser::new(data);

    while parser.has_more_data() {
        let name = parser.read_string_utf8()?;
        if name.is_empty() {
            continue;
        }

        let value = if parser.has_more_data() {
            parser.read_string_utf8()?
        } else {
            String::new()
        };

        options.insert(name, value);
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_guid() {
        let sourcelink_guid = [
            0x56, 0x05, 0x11, 0xCC, 0x91, 0xA0, 0x38, 0x4D, 0x9F, 0xEC, 0x25, 0xAB, 0x9A, 0x35,
            0x1A, 0x6A,
        ];
        assert_eq!(
            CustomDebugKind::from_guid(sourcelink_guid),
            CustomDebugKind::SourceLink
        );

        let embedded_guid = [
            0x1B, 0x57, 0x8A, 0x0E, 0x26, 0x69, 0x6E, 0x46, 0xB4, 0xAD, 0x8A, 0xB0, 0x46, 0x11,
            0xF5, 0xFE,
        ];
        assert_eq!(
            CustomDebugKind::from_guid(embedded_guid),
            CustomDebugKind::EmbeddedSource
        );

        let unknown_guid = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
            0x0E, 0x0F,
        ];
        assert_eq!(
            CustomDebugKind::from_guid(unknown_guid),
            CustomDebugKind::Unknown(unknown_guid)
        );
    }

    #[test]
    fn compiler_options_pairs() {
        let blob = b"language\0C#\0optimization\0release\0version\0";
        let options = parse_compiler_options(blob).unwrap();

        assert_eq!(options.len(), 3);
        assert_eq!(options["language"], "C#");
        assert_eq!(options["optimization"], "release");
        assert_eq!(options["version"], "");
    }

    #[test]
    fn compiler_options_empty() {
        assert!(parse_compiler_options(b"").unwrap().is_empty());
    }

    #[test]
    fn compiler_options_invalid_utf8() {
        assert!(parse_compiler_options(&[0xFF, 0xFE, 0x00, b'x', 0x00]).is_err());
    }
}
