//! Package archive reading.
//!
//! A package is a zip container. [`PackageArchive`] owns the backing bytes (memory map
//! or heap buffer) for the duration of a validation run and exposes:
//!
//! - [`PackageArchive::entries`] - the entry listing from the central directory
//! - [`PackageArchive::read`] - one-shot materialization of a single entry, bounded by
//!   its declared size; buffers are owned by the caller and scoped to one candidate
//! - [`PackageArchive::find`] - path lookup (case-insensitive, separator-agnostic),
//!   the primitive behind the sibling debug-file resolver
//! - [`PackageArchive::manifest`] - package id/version from the `.nuspec` entry
//!
//! A container whose central directory does not parse is fatally corrupt: no entry
//! enumeration is possible, so the whole run aborts rather than guessing.

use std::io::{Cursor, Read};
use std::path::Path;

use ouroboros::self_referencing;
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::{
    file::{Backend, Memory, Physical},
    Error::{ArchiveCorrupt, ArchiveNotFound},
    Result,
};

/// Immutable view over one archive member.
#[derive(Debug, Clone)]
pub struct PackageEntry {
    /// Index in the central directory
    pub index: usize,
    /// Entry path, forward-slash separated
    pub path: String,
    /// Declared uncompressed size
    pub size: u64,
}

#[self_referencing]
struct ArchiveInner {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    zip: ZipArchive<Cursor<&'this [u8]>>,
}

/// An open package container.
///
/// Owns the read handle for the duration of validation. Entry streams are fully
/// materialized on [`read`](PackageArchive::read); the listing itself is restartable
/// without re-opening.
pub struct PackageArchive {
    inner: ArchiveInner,
    entries: Vec<PackageEntry>,
}

impl PackageArchive {
    /// Open a package from a file on disk, memory-mapping its contents.
    ///
    /// # Arguments
    /// * `path` - The package file
    ///
    /// # Errors
    /// Returns [`crate::Error::ArchiveNotFound`] when the path does not exist and
    /// [`crate::Error::ArchiveCorrupt`] when the container cannot be parsed.
    pub fn open(path: &Path) -> Result<PackageArchive> {
        if !path.is_file() {
            return Err(ArchiveNotFound(path.to_path_buf()));
        }

        let backend = Physical::new(path)?;
        Self::from_backend(Box::new(backend))
    }

    /// Open a package already held in memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::ArchiveCorrupt`] when the container cannot be parsed.
    pub fn from_mem(data: Vec<u8>) -> Result<PackageArchive> {
        Self::from_backend(Box::new(Memory::new(data)))
    }

    fn from_backend(backend: Box<dyn Backend>) -> Result<PackageArchive> {
        let mut inner = ArchiveInnerTryBuilder {
            data: backend,
            zip_builder: |data| {
                ZipArchive::new(Cursor::new(data.data()))
                    .map_err(|e| ArchiveCorrupt(e.to_string()))
            },
        }
        .try_build()?;

        let entries = inner.with_zip_mut(|zip| -> Result<Vec<PackageEntry>> {
            let mut entries = Vec::with_capacity(zip.len());
            for index in 0..zip.len() {
                let file = zip
                    .by_index_raw(index)
                    .map_err(|e| ArchiveCorrupt(e.to_string()))?;

                if file.is_dir() {
                    continue;
                }

                entries.push(PackageEntry {
                    index,
                    path: file.name().to_string(),
                    size: file.size(),
                });
            }
            Ok(entries)
        })?;

        log::debug!("Opened package with {} entries", entries.len());

        Ok(PackageArchive { inner, entries })
    }

    /// The package's entry listing.
    #[must_use]
    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    /// Find an entry by path, ignoring case and separator style.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&PackageEntry> {
        let wanted = normalize_path(path);
        self.entries
            .iter()
            .find(|entry| normalize_path(&entry.path) == wanted)
    }

    /// Materialize one entry into a scoped buffer, bounded by its declared size.
    ///
    /// # Arguments
    /// * `entry` - An entry previously obtained from this archive
    ///
    /// # Errors
    /// Returns [`crate::Error::ArchiveCorrupt`] when the entry cannot be read or its
    /// contents exceed the declared size.
    pub fn read(&mut self, entry: &PackageEntry) -> Result<Vec<u8>> {
        let index = entry.index;
        let declared = entry.size;

        self.inner.with_zip_mut(|zip| {
            let file = zip
                .by_index(index)
                .map_err(|e| ArchiveCorrupt(e.to_string()))?;

            // Capacity hint only; a hostile declared size must not drive allocation
            let mut data = Vec::with_capacity(declared.min(1 << 24) as usize);
            file.take(declared.saturating_add(1))
                .read_to_end(&mut data)
                .map_err(|e| ArchiveCorrupt(e.to_string()))?;

            if data.len() as u64 > declared {
                return Err(ArchiveCorrupt(format!(
                    "entry {} exceeds its declared size of {} bytes",
                    index, declared
                )));
            }

            Ok(data)
        })
    }

    /// Read the package id and version from the `.nuspec` manifest entry.
    ///
    /// Absence of a manifest, or one that does not parse, is not an error - the
    /// manifest only labels the report.
    pub fn manifest(&mut self) -> Option<PackageManifest> {
        let entry = self
            .entries
            .iter()
            .find(|e| {
                !e.path.contains('/') && e.path.to_ascii_lowercase().ends_with(".nuspec")
            })?
            .clone();

        let data = match self.read(&entry) {
            Ok(data) => data,
            Err(error) => {
                log::warn!("Manifest entry {} unreadable ({error})", entry.path);
                return None;
            }
        };

        match parse_manifest(&data) {
            Ok(manifest) => manifest,
            Err(error) => {
                log::warn!("Manifest entry {} did not parse ({error})", entry.path);
                None
            }
        }
    }
}

/// Package identity read from the manifest.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PackageManifest {
    /// Package id
    pub id: String,
    /// Package version string
    pub version: String,
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_ascii_lowercase()
}

fn parse_manifest(data: &[u8]) -> Result<Option<PackageManifest>> {
    let text = std::str::from_utf8(data)
        .map_err(|_| malformed_error!("Manifest is not UTF-8 text"))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut id = None;
    let mut version = None;

    loop {
        match reader
            .read_event()
            .map_err(|e| malformed_error!("Manifest XML error - {}", e))?
        {
            Event::Start(element) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref())
                    .to_ascii_lowercase();
                path.push(name);
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Text(content) => {
                let in_metadata = path.len() >= 2 && path[path.len() - 2] == "metadata";
                if in_metadata {
                    let value = content
                        .unescape()
                        .map_err(|e| malformed_error!("Manifest XML error - {}", e))?;
                    match path.last().map(String::as_str) {
                        Some("id") => id = Some(value.into_owned()),
                        Some("version") => version = Some(value.into_owned()),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(match (id, version) {
        (Some(id), Some(version)) => Some(PackageManifest { id, version }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn entry_listing_and_read() {
        let data = build_zip(&[
            ("lib/net8.0/A.dll", b"fake-binary"),
            ("lib/net8.0/A.pdb", b"fake-symbols"),
        ]);

        let mut archive = PackageArchive::from_mem(data).unwrap();
        assert_eq!(archive.entries().len(), 2);

        let entry = archive.find("lib/net8.0/A.dll").unwrap().clone();
        assert_eq!(entry.size, 11);
        assert_eq!(archive.read(&entry).unwrap(), b"fake-binary");
    }

    #[test]
    fn find_is_case_and_separator_insensitive() {
        let data = build_zip(&[("lib/net8.0/A.pdb", b"x")]);
        let archive = PackageArchive::from_mem(data).unwrap();

        assert!(archive.find("LIB/NET8.0/a.PDB").is_some());
        assert!(archive.find(r"lib\net8.0\A.pdb").is_some());
        assert!(archive.find("lib/net8.0/B.pdb").is_none());
    }

    #[test]
    fn corrupt_container() {
        let result = PackageArchive::from_mem(b"PK\x03\x04 not a real zip".to_vec());
        assert!(matches!(result, Err(ArchiveCorrupt(_))));
    }

    #[test]
    fn missing_file() {
        let result = PackageArchive::open(Path::new("/definitely/not/here.nupkg"));
        assert!(matches!(result, Err(ArchiveNotFound(_))));
    }

    #[test]
    fn manifest_extraction() {
        let nuspec = br#"<?xml version="1.0"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>Contoso.Widgets</id>
    <version>1.2.3</version>
    <authors>Contoso</authors>
  </metadata>
</package>"#;
        let data = build_zip(&[("Contoso.Widgets.nuspec", nuspec), ("lib/A.dll", b"x")]);

        let mut archive = PackageArchive::from_mem(data).unwrap();
        let manifest = archive.manifest().unwrap();
        assert_eq!(manifest.id, "Contoso.Widgets");
        assert_eq!(manifest.version, "1.2.3");
    }

    #[test]
    fn manifest_absent() {
        let data = build_zip(&[("lib/A.dll", b"x")]);
        let mut archive = PackageArchive::from_mem(data).unwrap();
        assert!(archive.manifest().is_none());
    }
}
