//! Managed binary classification and header parsing.
//!
//! This module decides which package entries are managed binaries and pulls everything
//! provenance validation needs out of their headers:
//!
//! - the CLR runtime header (the marker of managed code) via [`crate::pe::cor20`]
//! - the module version id, read from the physical metadata's Module row
//! - the debug directory table with its CodeView, reproducible-marker and
//!   embedded-debug-data records via [`crate::pe::debugdir`]
//!
//! PE-level structure (DOS/COFF/optional headers, sections, data directories) is
//! delegated to `goblin`; everything below the data-directory level is decoded here.
//!
//! # Classification
//!
//! [`classify`] is deliberately permissive by default: a file whose header cannot be
//! parsed is treated as "not a managed binary" and excluded from provenance checks,
//! exactly like a native-only executable. `strict` mode turns such files into
//! per-binary failures instead. Native images are excluded in both modes - provenance
//! claims only apply to managed code.

pub mod cor20;
pub mod debugdir;

use ouroboros::self_referencing;
use serde::Serialize;

use goblin::pe::PE;

use crate::{
    file::{
        io::{read_le_at, read_le_at_dyn},
        Backend, Memory,
    },
    metadata::{root::Root, streams::Guid},
    pe::{
        cor20::Cor20Header,
        debugdir::{CodeViewRecord, DebugDirectoryEntry, DebugDirectoryType},
    },
    Result,
};

/// The kind of managed binary, derived from the entry's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssemblyKind {
    /// A managed library
    Dll,
    /// A managed executable
    Exe,
    /// A Windows metadata file
    WinMd,
}

impl AssemblyKind {
    /// Derive the kind from a path's extension; `None` for non-binary extensions.
    #[must_use]
    pub fn from_path(path: &str) -> Option<AssemblyKind> {
        let extension = path.rsplit('.').next()?;
        if extension.eq_ignore_ascii_case("dll") {
            Some(AssemblyKind::Dll)
        } else if extension.eq_ignore_ascii_case("exe") {
            Some(AssemblyKind::Exe)
        } else if extension.eq_ignore_ascii_case("winmd") {
            Some(AssemblyKind::WinMd)
        } else {
            None
        }
    }
}

fn serialize_guid<S: serde::Serializer>(guid: &uguid::Guid, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&guid.to_string())
}

/// Identity of one managed binary inside the package.
///
/// Cheap to clone; this is what survives into verdicts and the final report. The
/// parsing artifacts needed to evaluate the binary travel separately in
/// [`BinaryDebugData`] and are dropped once evaluation finishes.
#[derive(Debug, Clone, Serialize)]
pub struct BinaryCandidate {
    /// Entry path inside the package
    pub path: String,
    /// Binary kind
    pub kind: AssemblyKind,
    /// Module version identifier from the metadata Module row
    #[serde(serialize_with = "serialize_guid")]
    pub mvid: uguid::Guid,
}

/// Debug-related header data extracted from one managed binary.
///
/// Scoped to a single candidate's evaluation; the embedded debug record in particular
/// must not outlive it.
#[derive(Debug)]
pub struct BinaryDebugData {
    /// All debug directory records
    pub entries: Vec<DebugDirectoryEntry>,
    /// The CodeView record, when present
    pub codeview: Option<CodeViewRecord>,
    /// Whether the deterministic-build marker record is present
    pub reproducible: bool,
    /// Raw (still compressed) embedded portable debug record data
    pub embedded_pdb_raw: Option<Vec<u8>>,
}

/// A classified managed binary: identity plus the debug data needed to evaluate it.
#[derive(Debug)]
pub struct ClassifiedBinary {
    /// Identity carried into the verdict
    pub candidate: BinaryCandidate,
    /// Evaluation-scoped header data
    pub debug: BinaryDebugData,
}

/// A loaded PE image over an owned byte backend.
///
/// Ties the backend to the `goblin` parse borrowed from it, so a classified binary can
/// be carried around as a single owned value while header access stays reference-based.
#[self_referencing]
pub struct PeFile {
    /// The underlying data source.
    data: Box<dyn Backend>,
    /// The parsed PE structure, referencing the data.
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl PeFile {
    /// Parse a PE image from a memory buffer.
    ///
    /// # Arguments
    /// * `data` - The bytes of the PE file
    ///
    /// # Errors
    /// Returns an error if the buffer is empty or not a valid PE image.
    pub fn from_mem(data: Vec<u8>) -> Result<PeFile> {
        Self::load(Box::new(Memory::new(data)))
    }

    fn load(backend: Box<dyn Backend>) -> Result<PeFile> {
        if backend.is_empty() {
            return Err(crate::Error::Empty);
        }

        PeFileTryBuilder {
            data: backend,
            pe_builder: |data| PE::parse(data.data()).map_err(crate::Error::GoblinErr),
        }
        .try_build()
    }

    /// Total length of the underlying image.
    #[must_use]
    pub fn len(&self) -> usize {
        self.borrow_data().len()
    }

    /// Returns `true` if the image holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.borrow_data().is_empty()
    }

    /// Returns a slice of the image at the given file offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.borrow_data().data_slice(offset, len)
    }

    /// Converts a relative virtual address to a file offset via the section table.
    ///
    /// # Arguments
    /// * `rva` - The RVA to convert.
    ///
    /// # Errors
    /// Returns an error if the RVA falls outside every section.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        self.with_pe(|pe| {
            let rva_u32 =
                u32::try_from(rva).map_err(|_| malformed_error!("RVA too large: {}", rva))?;

            for section in &pe.sections {
                let Some(section_max) = section.virtual_address.checked_add(section.virtual_size)
                else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        section.virtual_size
                    ));
                };

                if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }

    /// The CLR runtime header data directory, if this is a managed image.
    ///
    /// A zeroed directory entry counts as absent; that is how native images present.
    #[must_use]
    pub fn clr(&self) -> Option<(usize, usize)> {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .as_ref()
                .and_then(|header| header.data_directories.get_clr_runtime_header())
                .filter(|dd| dd.virtual_address != 0 && dd.size != 0)
                .map(|dd| (dd.virtual_address as usize, dd.size as usize))
        })
    }

    /// The debug data directory extent, if present. A zeroed entry counts as absent.
    #[must_use]
    pub fn debug_table(&self) -> Option<(usize, usize)> {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .as_ref()
                .and_then(|header| header.data_directories.get_debug_table())
                .filter(|dd| dd.virtual_address != 0 && dd.size != 0)
                .map(|dd| (dd.virtual_address as usize, dd.size as usize))
        })
    }

    /// Parse the debug directory table. An image without one yields an empty list.
    ///
    /// # Errors
    /// Returns an error when the directory extent cannot be resolved or its records
    /// are malformed.
    pub fn debug_directory(&self) -> Result<Vec<DebugDirectoryEntry>> {
        let Some((rva, size)) = self.debug_table() else {
            return Ok(Vec::new());
        };

        if size == 0 {
            return Ok(Vec::new());
        }

        let offset = self.rva_to_offset(rva)?;
        let data = self.data_slice(offset, size)?;
        DebugDirectoryEntry::read_table(data)
    }

    /// Raw data of one debug directory record.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] when the record's pointer/size extent
    /// exceeds the image.
    pub fn debug_entry_data(&self, entry: &DebugDirectoryEntry) -> Result<&[u8]> {
        self.data_slice(entry.pointer_to_raw_data as usize, entry.size_of_data as usize)
    }

    /// The module version identifier, read from the metadata Module row.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for images without a CLR header, or a
    /// malformed-structure error when the metadata cannot be decoded.
    pub fn mvid(&self) -> Result<uguid::Guid> {
        let Some((clr_rva, clr_size)) = self.clr() else {
            return Err(crate::Error::NotSupported);
        };

        if clr_size < 72 {
            return Err(malformed_error!("CLR data directory too small: {}", clr_size));
        }

        let clr_offset = self.rva_to_offset(clr_rva)?;
        let cor20 = Cor20Header::read(self.data_slice(clr_offset, 72)?)?;

        let meta_offset = self.rva_to_offset(cor20.meta_data_rva as usize)?;
        let meta = self.data_slice(meta_offset, cor20.meta_data_size as usize)?;

        let root = Root::read(meta)?;
        let tables = root
            .stream_data(meta, "#~")
            .or_else(|_| root.stream_data(meta, "#-"))?;
        let guid_heap = Guid::from(root.stream_data(meta, "#GUID")?)?;

        read_module_mvid(tables, &guid_heap)
    }
}

/// Read the Module row's version id out of a tables stream.
fn read_module_mvid(tables: &[u8], guid_heap: &Guid<'_>) -> Result<uguid::Guid> {
    if tables.len() < 24 {
        return Err(out_of_bounds_error!());
    }

    let heap_sizes = tables[6];
    let valid = {
        let mut offset = 8;
        read_le_at::<u64>(tables, &mut offset)?
    };

    if valid & 1 == 0 {
        return Err(malformed_error!("Metadata has no Module table"));
    }

    let string_large = heap_sizes & 0x01 != 0;
    let guid_large = heap_sizes & 0x02 != 0;

    // Module is table 0, so it is described by the first row count and its rows open
    // the table data.
    let module_row_offset = 24 + valid.count_ones() as usize * 4;

    // generation, then the name string index, then the mvid guid index
    let mut offset = module_row_offset + 2 + if string_large { 4 } else { 2 };
    let mvid_index = read_le_at_dyn(tables, &mut offset, guid_large)?;

    guid_heap.get(mvid_index as usize)
}

/// Classify one package entry, extracting provenance-relevant header data when it is a
/// managed binary.
///
/// Returns `Ok(None)` for entries that are not managed binaries: wrong extension,
/// native images, and - in the default permissive mode - files whose headers fail to
/// parse. With `strict` set, header parse failures are returned as errors so the
/// caller can surface them as per-binary failures instead.
///
/// # Arguments
/// * `path` - The entry path inside the package
/// * `data` - The entry's bytes, owned for the duration of classification
/// * `strict` - Whether malformed headers become errors instead of exclusions
///
/// # Errors
/// In strict mode only: the underlying parse error for a malformed candidate.
pub fn classify(path: &str, data: Vec<u8>, strict: bool) -> Result<Option<ClassifiedBinary>> {
    let Some(kind) = AssemblyKind::from_path(path) else {
        return Ok(None);
    };

    let pe = match PeFile::from_mem(data) {
        Ok(pe) => pe,
        Err(error) => {
            if strict {
                return Err(error);
            }
            log::warn!("{path}: unreadable PE image, excluded from validation ({error})");
            return Ok(None);
        }
    };

    if pe.clr().is_none() {
        log::debug!("{path}: native image, no provenance expected");
        return Ok(None);
    }

    match read_managed(path, kind, &pe) {
        Ok(classified) => Ok(Some(classified)),
        Err(error) => {
            if strict {
                return Err(error);
            }
            log::warn!("{path}: malformed managed headers, excluded from validation ({error})");
            Ok(None)
        }
    }
}

fn read_managed(path: &str, kind: AssemblyKind, pe: &PeFile) -> Result<ClassifiedBinary> {
    let mvid = pe.mvid()?;
    let entries = pe.debug_directory()?;

    let codeview = entries
        .iter()
        .find(|e| e.entry_type == DebugDirectoryType::CodeView)
        .and_then(|e| pe.debug_entry_data(e).ok())
        .and_then(|data| CodeViewRecord::read(data).ok());

    let reproducible = entries
        .iter()
        .any(|e| e.entry_type == DebugDirectoryType::Reproducible);

    let embedded_pdb_raw = entries
        .iter()
        .find(|e| e.entry_type == DebugDirectoryType::EmbeddedPortablePdb)
        .map(|e| pe.debug_entry_data(e).map(<[u8]>::to_vec))
        .transpose()?;

    Ok(ClassifiedBinary {
        candidate: BinaryCandidate {
            path: path.to_string(),
            kind,
            mvid,
        },
        debug: BinaryDebugData {
            entries,
            codeview,
            reproducible,
            embedded_pdb_raw,
        },
    })
}
