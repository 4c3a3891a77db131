//! Debug information source resolution.
//!
//! For each managed binary the locator decides where its debug information lives, in
//! strict priority order:
//!
//! 1. **Embedded** - an embedded-debug-data record inside the binary. Authoritative:
//!    it cannot be stale relative to the binary, so it always wins.
//! 2. **Sibling** - a package entry at the binary's path with the extension swapped to
//!    `pdb`, found through the caller-supplied resolver. Cooperative best effort.
//! 3. **Missing** - neither exists. Symbol-server retrieval is a future collaborator,
//!    never performed here.

use crate::{
    pe::{debugdir, BinaryDebugData},
    Result,
};

/// Where a binary's debug information was found, carrying the materialized bytes.
///
/// At most one non-`Missing` variant exists per binary; the buffers are scoped to that
/// binary's evaluation.
#[derive(Debug)]
pub enum DebugInfoSource {
    /// Decompressed embedded debug data
    Embedded(Vec<u8>),
    /// A sibling debug file from the package
    Sibling {
        /// Entry path of the sibling inside the package
        path: String,
        /// The sibling's materialized contents
        data: Vec<u8>,
    },
    /// No debug information available
    Missing,
}

/// The sibling lookup path for a binary: extension swapped to `pdb`.
#[must_use]
pub fn sibling_path(binary_path: &str) -> String {
    match binary_path.rfind('.') {
        Some(dot) => format!("{}.pdb", &binary_path[..dot]),
        None => format!("{binary_path}.pdb"),
    }
}

/// Resolve the debug information source for one binary.
///
/// Consumes the embedded record out of `debug` so the decompressed buffer is owned by
/// the returned source (and dropped with it).
///
/// # Arguments
/// * `binary_path` - The binary's entry path inside the package
/// * `debug` - The binary's debug-directory data; the embedded record is taken from it
/// * `sibling_resolver` - Looks up and materializes a package entry by path
///
/// # Errors
/// Returns [`crate::Error::UnreadableSymbols`] when an embedded record exists but does
/// not decompress; the caller folds this into a verdict.
pub fn locate<F>(
    binary_path: &str,
    debug: &mut BinaryDebugData,
    sibling_resolver: F,
) -> Result<DebugInfoSource>
where
    F: FnOnce(&str) -> Option<Vec<u8>>,
{
    if let Some(raw) = debug.embedded_pdb_raw.take() {
        return match debugdir::read_embedded_pdb(&raw) {
            Ok(decompressed) => {
                log::debug!("{binary_path}: using embedded debug information");
                Ok(DebugInfoSource::Embedded(decompressed))
            }
            Err(error) => {
                log::warn!("{binary_path}: embedded debug information is corrupt ({error})");
                Err(crate::Error::UnreadableSymbols)
            }
        };
    }

    let candidate = sibling_path(binary_path);
    if let Some(data) = sibling_resolver(&candidate) {
        log::debug!("{binary_path}: using sibling debug file {candidate}");
        return Ok(DebugInfoSource::Sibling {
            path: candidate,
            data,
        });
    }

    Ok(DebugInfoSource::Missing)
}
