//! Structured fact extraction from a located debug information source.
//!
//! [`extract`] is the single seam between the format decoders and the evaluator: it
//! turns a [`DebugInfoSource`] plus the binary's header data into [`DebugFacts`], or
//! one of exactly two errors ([`crate::Error::NoSymbols`],
//! [`crate::Error::UnreadableSymbols`]) that the evaluator folds into verdicts.
//!
//! Decoding tries the portable format first and falls back to the windows-format
//! probe; only when both reject the data is it declared unreadable. A windows-format
//! file is readable but carries none of the portable-only records, so it yields facts
//! with no source link, no determinism evidence, and no compiler flags.

use std::collections::BTreeMap;

use crate::{
    pdb::{
        locator::DebugInfoSource,
        portable::PortablePdb,
        sourcelink::SourceLinkMap,
        windows::is_windows_pdb,
    },
    pe::BinaryDebugData,
    Result,
};

/// Which debug format supplied the facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugFormat {
    /// Portable debug format
    Portable,
    /// Windows (MSF) debug format
    Windows,
}

/// Provenance facts extracted from one binary's debug information.
///
/// Immutable once built; the evaluator maps these onto verdicts without re-reading any
/// binary data.
#[derive(Debug)]
pub struct DebugFacts {
    /// Format the facts were decoded from
    pub format: DebugFormat,
    /// Whether a non-empty source-link blob is attached to the module
    pub has_source_link: bool,
    /// Set when a source-link blob exists but is not a well-formed mapping
    pub source_link_error: Option<String>,
    /// Resolved document-to-URL mapping for covered documents
    pub source_link_documents: BTreeMap<String, String>,
    /// Whether the build is verifiably deterministic
    pub is_deterministic: bool,
    /// Whether documents exist that no source-link entry covers
    pub has_untracked_sources: bool,
    /// The uncovered document paths
    pub untracked_sources: Vec<String>,
    /// Compiler options (plus compilation metadata under a reserved key)
    pub compiler_flags: Option<BTreeMap<String, String>>,
}

impl DebugFacts {
    fn windows_format() -> DebugFacts {
        DebugFacts {
            format: DebugFormat::Windows,
            has_source_link: false,
            source_link_error: None,
            source_link_documents: BTreeMap::new(),
            is_deterministic: false,
            has_untracked_sources: false,
            untracked_sources: Vec::new(),
            compiler_flags: None,
        }
    }
}

/// Extract [`DebugFacts`] from a located debug information source.
///
/// # Arguments
/// * `source` - Where the debug information lives, with its materialized bytes
/// * `debug` - The owning binary's debug-directory data (reproducible marker,
///   CodeView record)
///
/// # Errors
/// - [`crate::Error::NoSymbols`] when `source` is [`DebugInfoSource::Missing`];
///   default facts are never synthesized
/// - [`crate::Error::UnreadableSymbols`] when both format decoders reject the data
pub fn extract(source: &DebugInfoSource, debug: &BinaryDebugData) -> Result<DebugFacts> {
    let data = match source {
        DebugInfoSource::Missing => return Err(crate::Error::NoSymbols),
        DebugInfoSource::Embedded(data) => data,
        DebugInfoSource::Sibling { data, .. } => data,
    };

    match PortablePdb::parse(data) {
        Ok(pdb) => Ok(portable_facts(&pdb, source, debug)),
        Err(portable_error) => {
            if is_windows_pdb(data) {
                log::debug!("Windows-format debug file, portable-only records unavailable");
                Ok(DebugFacts::windows_format())
            } else {
                log::warn!("Debug information unreadable in either format ({portable_error})");
                Err(crate::Error::UnreadableSymbols)
            }
        }
    }
}

fn portable_facts(
    pdb: &PortablePdb,
    source: &DebugInfoSource,
    debug: &BinaryDebugData,
) -> DebugFacts {
    let (has_source_link, source_link_error, map) = match &pdb.source_link {
        None => (false, None, None),
        Some(blob) if blob.is_empty() => (false, None, None),
        Some(blob) => match std::str::from_utf8(blob) {
            Err(_) => (
                true,
                Some("source link blob is not UTF-8 text".to_string()),
                None,
            ),
            Ok(json) => match SourceLinkMap::parse(json) {
                Ok(parsed) => (true, None, Some(parsed)),
                Err(error) => (true, Some(error.to_string()), None),
            },
        },
    };

    let mut source_link_documents = BTreeMap::new();
    let mut untracked_sources = Vec::new();
    if let Some(map) = &map {
        for document in &pdb.documents {
            if document.has_embedded_source {
                continue;
            }

            if let Some(url) = map.resolve(&document.name) {
                source_link_documents.insert(document.name.clone(), url);
            } else if document.name.starts_with("http://")
                || document.name.starts_with("https://")
            {
                // Already retrievable by name
                continue;
            } else {
                untracked_sources.push(document.name.clone());
            }
        }
    }

    // The debug id must belong to this binary before its records prove anything.
    // The CodeView signature is the pairing identity; an embedded file matches by
    // construction when no CodeView record exists to check against.
    let id_matches = match &debug.codeview {
        Some(codeview) => pdb.pdb_id[..16] == codeview.signature,
        None => matches!(source, DebugInfoSource::Embedded(_)),
    };
    let is_deterministic = debug.reproducible && id_matches;

    let mut compiler_flags = pdb.compiler_options.clone();
    if let Some(metadata) = &pdb.compilation_metadata {
        compiler_flags
            .get_or_insert_with(BTreeMap::new)
            .insert("compilation-metadata".to_string(), metadata.clone());
    }

    DebugFacts {
        format: DebugFormat::Portable,
        has_source_link,
        source_link_error,
        has_untracked_sources: !untracked_sources.is_empty(),
        source_link_documents,
        is_deterministic,
        untracked_sources,
        compiler_flags,
    }
}
