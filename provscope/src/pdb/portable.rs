//! Portable debug format decoding.
//!
//! A portable debug file is a physical metadata container with a `#Pdb` stream and a
//! set of debug tables in `#~`. This module decodes exactly what provenance validation
//! consumes:
//!
//! - the `#Pdb` stream: the 20-byte debug id plus row counts of the referenced
//!   type-system tables (needed to size cross-file indexes)
//! - `Document` rows: source paths, hash algorithm and digest per document
//! - `CustomDebugInformation` rows: source link, compiler options/metadata, and
//!   embedded-source markers, selected by kind GUID
//!
//! All remaining debug tables are sized and skipped. Index columns widen from 2 to 4
//! bytes once the referenced heap or table outgrows 16-bit addressing, so row sizes are
//! computed per file from the heap-size bits and the combined (local + referenced) row
//! counts.

use std::collections::BTreeMap;

use crate::{
    file::{
        io::{read_le_at, read_le_at_dyn},
        parser::Parser,
    },
    metadata::{
        root::Root,
        streams::{Blob, Guid},
    },
    pdb::debuginfo::{parse_compiler_options, CustomDebugKind},
    Error::OutOfBounds,
    Result,
};

const TABLE_DOCUMENT: usize = 0x30;
const TABLE_METHOD_DEBUG_INFORMATION: usize = 0x31;
const TABLE_LOCAL_SCOPE: usize = 0x32;
const TABLE_LOCAL_VARIABLE: usize = 0x33;
const TABLE_LOCAL_CONSTANT: usize = 0x34;
const TABLE_IMPORT_SCOPE: usize = 0x35;
const TABLE_STATE_MACHINE_METHOD: usize = 0x36;
const TABLE_CUSTOM_DEBUG_INFORMATION: usize = 0x37;

const TABLE_METHOD_DEF: usize = 0x06;

/// Tables referenced by the `HasCustomDebugInformation` coded index, in tag order.
#[rustfmt::skip]
const HAS_CUSTOM_DEBUG_INFORMATION: [usize; 27] = [
    0x06, 0x04, 0x01, 0x02, 0x08, 0x09, 0x0A, 0x00, 0x0E, 0x17, 0x14, 0x11, 0x1A, 0x1B,
    0x20, 0x23, 0x26, 0x27, 0x28, 0x2A, 0x2C, 0x2B, 0x30, 0x32, 0x33, 0x34, 0x35,
];

const HCDI_TAG_BITS: u32 = 5;
const HCDI_TAG_MASK: u32 = (1 << HCDI_TAG_BITS) - 1;
const HCDI_MODULE_TAG: u32 = 7;
const HCDI_DOCUMENT_TAG: u32 = 22;

/// Hash algorithm of a document's checksum, identified by GUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-1 (ff1816ec-aa5e-4d10-87f7-6f4963833460)
    Sha1,
    /// SHA-256 (8829d00f-11b8-4213-878b-770e8597ac16)
    Sha256,
    /// Any other or absent algorithm id
    Unknown(uguid::Guid),
}

impl From<uguid::Guid> for HashAlgorithm {
    fn from(guid: uguid::Guid) -> Self {
        if guid == uguid::guid!("ff1816ec-aa5e-4d10-87f7-6f4963833460") {
            HashAlgorithm::Sha1
        } else if guid == uguid::guid!("8829d00f-11b8-4213-878b-770e8597ac16") {
            HashAlgorithm::Sha256
        } else {
            HashAlgorithm::Unknown(guid)
        }
    }
}

/// One source document referenced by the debug information.
#[derive(Debug, Clone)]
pub struct Document {
    /// Full document path, parts joined by the blob's separator character
    pub name: String,
    /// Checksum algorithm
    pub hash_algorithm: HashAlgorithm,
    /// Checksum bytes (empty when the row carries none)
    pub hash: Vec<u8>,
    /// Whether an embedded-source record exists for this document
    pub has_embedded_source: bool,
}

/// A decoded portable debug file.
pub struct PortablePdb {
    /// Producer version string from the metadata root
    pub version: String,
    /// The 20-byte debug id (16-byte signature + stamp)
    pub pdb_id: [u8; 20],
    /// Entry point token (0 for libraries)
    pub entry_point: u32,
    /// All document rows
    pub documents: Vec<Document>,
    /// Raw source-link blob attached to the module, when present
    pub source_link: Option<Vec<u8>>,
    /// Compiler options record decoded to key/value pairs, when present
    pub compiler_options: Option<BTreeMap<String, String>>,
    /// Compilation metadata record (UTF-8 text), when present
    pub compilation_metadata: Option<String>,
}

impl PortablePdb {
    /// Decode a portable debug file from a byte buffer.
    ///
    /// # Arguments
    /// * `data` - The complete debug file contents
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] when the
    /// buffer is not a portable debug file or its structures are inconsistent.
    pub fn parse(data: &[u8]) -> Result<PortablePdb> {
        let root = Root::read(data)?;

        if root.stream("#Pdb").is_none() {
            return Err(malformed_error!("Metadata has no #Pdb stream"));
        }

        let pdb_stream = PdbStream::read(root.stream_data(data, "#Pdb")?)?;
        let tables_data = root.stream_data(data, "#~")?;
        let blob = Blob::from(root.stream_data(data, "#Blob")?)?;
        let guid_heap = Guid::from(root.stream_data(data, "#GUID")?)?;

        let mut pdb = PortablePdb {
            version: root.version.clone(),
            pdb_id: pdb_stream.id,
            entry_point: pdb_stream.entry_point,
            documents: Vec::new(),
            source_link: None,
            compiler_options: None,
            compilation_metadata: None,
        };

        pdb.read_tables(tables_data, &pdb_stream, &blob, &guid_heap)?;

        Ok(pdb)
    }

    fn read_tables(
        &mut self,
        tables: &[u8],
        pdb_stream: &PdbStream,
        blob: &Blob<'_>,
        guid_heap: &Guid<'_>,
    ) -> Result<()> {
        if tables.len() < 24 {
            return Err(OutOfBounds);
        }

        let heap_sizes = tables[6];
        let valid = {
            let mut offset = 8;
            read_le_at::<u64>(tables, &mut offset)?
        };

        let mut offset = 24;
        let mut local_rows = [0u32; 64];
        for table in 0..64 {
            if valid & (1 << table) != 0 {
                local_rows[table] = read_le_at::<u32>(tables, &mut offset)?;
            }
        }

        // Cross-file indexes (e.g. LocalScope's method column) are sized against the
        // type-system tables living in the binary, whose row counts come from #Pdb.
        let mut combined_rows = pdb_stream.referenced_rows;
        for table in 0..64 {
            if local_rows[table] != 0 {
                combined_rows[table] = local_rows[table];
            }
        }

        let sizes = IndexSizes {
            string_large: heap_sizes & 0x01 != 0,
            guid_large: heap_sizes & 0x02 != 0,
            blob_large: heap_sizes & 0x04 != 0,
            rows: combined_rows,
        };

        for table in 0..64 {
            if valid & (1 << table) == 0 {
                continue;
            }

            let count = local_rows[table];
            match table {
                TABLE_DOCUMENT => {
                    for _ in 0..count {
                        let document = read_document(tables, &mut offset, &sizes, blob, guid_heap)?;
                        self.documents.push(document);
                    }
                }
                TABLE_CUSTOM_DEBUG_INFORMATION => {
                    for _ in 0..count {
                        self.read_custom_debug_row(tables, &mut offset, &sizes, blob, guid_heap)?;
                    }
                }
                _ => {
                    let row_size = sizes.row_size(table)?;
                    let Some(skip) = (count as usize).checked_mul(row_size) else {
                        return Err(OutOfBounds);
                    };
                    if offset + skip > tables.len() {
                        return Err(OutOfBounds);
                    }
                    offset += skip;
                }
            }
        }

        Ok(())
    }

    fn read_custom_debug_row(
        &mut self,
        tables: &[u8],
        offset: &mut usize,
        sizes: &IndexSizes,
        blob: &Blob<'_>,
        guid_heap: &Guid<'_>,
    ) -> Result<()> {
        let parent = read_le_at_dyn(tables, offset, sizes.hcdi_large())?;
        let kind_index = read_le_at_dyn(tables, offset, sizes.guid_large)?;
        let value_index = read_le_at_dyn(tables, offset, sizes.blob_large)?;

        let tag = parent & HCDI_TAG_MASK;
        let row = parent >> HCDI_TAG_BITS;

        let kind = if kind_index == 0 {
            return Ok(());
        } else {
            CustomDebugKind::from_guid(guid_heap.get(kind_index as usize)?.to_bytes())
        };

        match kind {
            CustomDebugKind::SourceLink if tag == HCDI_MODULE_TAG => {
                if self.source_link.is_none() {
                    self.source_link = Some(blob.get(value_index as usize)?.to_vec());
                }
            }
            CustomDebugKind::CompilationOptions if tag == HCDI_MODULE_TAG => {
                let data = blob.get(value_index as usize)?;
                self.compiler_options = Some(parse_compiler_options(data)?);
            }
            CustomDebugKind::CompilationMetadata if tag == HCDI_MODULE_TAG => {
                let data = blob.get(value_index as usize)?;
                let text = std::str::from_utf8(data)
                    .map_err(|_| malformed_error!("Compilation metadata is not UTF-8"))?;
                self.compilation_metadata = Some(text.to_string());
            }
            CustomDebugKind::EmbeddedSource if tag == HCDI_DOCUMENT_TAG => {
                let index = row as usize;
                if index >= 1 && index <= self.documents.len() {
                    self.documents[index - 1].has_embedded_source = true;
                }
            }
            _ => {
                log::debug!("Skipping custom debug information entry ({kind:?}, tag {tag})");
            }
        }

        Ok(())
    }
}

/// The `#Pdb` stream: debug id plus the referenced type-system table row counts.
pub struct PdbStream {
    /// The 20-byte debug id
    pub id: [u8; 20],
    /// Entry point token
    pub entry_point: u32,
    /// Row counts of referenced type-system tables, indexed by table id
    pub referenced_rows: [u32; 64],
}

impl PdbStream {
    /// Read a `#Pdb` stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] when the stream is shorter than its
    /// declared referenced-table list.
    pub fn read(data: &[u8]) -> Result<PdbStream> {
        if data.len() < 32 {
            return Err(OutOfBounds);
        }

        let mut id = [0u8; 20];
        id.copy_from_slice(&data[..20]);

        let mut offset = 20;
        let entry_point = read_le_at::<u32>(data, &mut offset)?;
        let referenced = read_le_at::<u64>(data, &mut offset)?;

        let mut referenced_rows = [0u32; 64];
        for (table, rows) in referenced_rows.iter_mut().enumerate() {
            if referenced & (1 << table) != 0 {
                *rows = read_le_at::<u32>(data, &mut offset)?;
            }
        }

        Ok(PdbStream {
            id,
            entry_point,
            referenced_rows,
        })
    }
}

/// Per-file index widths, derived from heap-size bits and combined row counts.
struct IndexSizes {
    string_large: bool,
    guid_large: bool,
    blob_large: bool,
    rows: [u32; 64],
}

impl IndexSizes {
    fn string(&self) -> usize {
        if self.string_large {
            4
        } else {
            2
        }
    }

    fn guid(&self) -> usize {
        if self.guid_large {
            4
        } else {
            2
        }
    }

    fn blob(&self) -> usize {
        if self.blob_large {
            4
        } else {
            2
        }
    }

    fn table_large(&self, table: usize) -> bool {
        self.rows[table] > 0xFFFF
    }

    fn table(&self, table: usize) -> usize {
        if self.table_large(table) {
            4
        } else {
            2
        }
    }

    fn hcdi_large(&self) -> bool {
        HAS_CUSTOM_DEBUG_INFORMATION
            .iter()
            .any(|&table| self.rows[table] > (0xFFFF >> HCDI_TAG_BITS))
    }

    fn hcdi(&self) -> usize {
        if self.hcdi_large() {
            4
        } else {
            2
        }
    }

    /// Byte size of one row of the given debug table.
    fn row_size(&self, table: usize) -> Result<usize> {
        let size = match table {
            TABLE_DOCUMENT => self.blob() + self.guid() + self.blob() + self.guid(),
            TABLE_METHOD_DEBUG_INFORMATION => self.table(TABLE_DOCUMENT) + self.blob(),
            TABLE_LOCAL_SCOPE => {
                self.table(TABLE_METHOD_DEF)
                    + self.table(TABLE_IMPORT_SCOPE)
                    + self.table(TABLE_LOCAL_VARIABLE)
                    + self.table(TABLE_LOCAL_CONSTANT)
                    + 8
            }
            TABLE_LOCAL_VARIABLE => 4 + self.string(),
            TABLE_LOCAL_CONSTANT => self.string() + self.blob(),
            TABLE_IMPORT_SCOPE => self.table(TABLE_IMPORT_SCOPE) + self.blob(),
            TABLE_STATE_MACHINE_METHOD => 2 * self.table(TABLE_METHOD_DEF),
            TABLE_CUSTOM_DEBUG_INFORMATION => self.hcdi() + self.guid() + self.blob(),
            _ => {
                return Err(malformed_error!(
                    "Unexpected table {:#04X} in debug metadata",
                    table
                ))
            }
        };

        Ok(size)
    }
}

fn read_document(
    tables: &[u8],
    offset: &mut usize,
    sizes: &IndexSizes,
    blob: &Blob<'_>,
    guid_heap: &Guid<'_>,
) -> Result<Document> {
    let name_index = read_le_at_dyn(tables, offset, sizes.blob_large)?;
    let hash_algorithm_index = read_le_at_dyn(tables, offset, sizes.guid_large)?;
    let hash_index = read_le_at_dyn(tables, offset, sizes.blob_large)?;
    let _language_index = read_le_at_dyn(tables, offset, sizes.guid_large)?;

    let name = decode_document_name(blob, name_index as usize)?;

    let hash_algorithm = if hash_algorithm_index == 0 {
        HashAlgorithm::Unknown(uguid::Guid::ZERO)
    } else {
        HashAlgorithm::from(guid_heap.get(hash_algorithm_index as usize)?)
    };

    let hash = if hash_index == 0 {
        Vec::new()
    } else {
        blob.get(hash_index as usize)?.to_vec()
    };

    Ok(Document {
        name,
        hash_algorithm,
        hash,
        has_embedded_source: false,
    })
}

/// Decode a document-name blob: a separator byte followed by blob indexes of the parts.
fn decode_document_name(blob: &Blob<'_>, index: usize) -> Result<String> {
    let data = blob.get(index)?;
    if data.is_empty() {
        return Ok(String::new());
    }

    let mut parser = Parser::new(data);
    let separator_byte = parser.read_le::<u8>()?;
    let separator = if separator_byte == 0 {
        None
    } else {
        Some(char::from(separator_byte))
    };

    let mut name = String::new();
    let mut first = true;
    while parser.has_more_data() {
        let part_index = parser.read_compressed_uint()? as usize;

        if !first {
            if let Some(sep) = separator {
                name.push(sep);
            }
        }
        first = false;

        if part_index != 0 {
            let part = blob.get(part_index)?;
            let text = std::str::from_utf8(part)
                .map_err(|_| malformed_error!("Document name part is not UTF-8"))?;
            name.push_str(text);
        }
    }

    Ok(name)
}
