//! Shared builders for synthesizing packages, managed PE images, and portable debug
//! files fully in memory. No fixtures on disk: every test constructs exactly the
//! container shape it needs.

use std::io::{Cursor, Write};

use flate2::{write::DeflateEncoder, Compression};
use zip::{write::SimpleFileOptions, ZipWriter};

/// Source link custom debug information kind.
pub const SOURCE_LINK_GUID: [u8; 16] = [
    0x56, 0x05, 0x11, 0xCC, 0x91, 0xA0, 0x38, 0x4D, 0x9F, 0xEC, 0x25, 0xAB, 0x9A, 0x35, 0x1A,
    0x6A,
];

/// Compilation options custom debug information kind.
pub const COMPILATION_OPTIONS_GUID: [u8; 16] = [
    0xE1, 0xAB, 0xC2, 0xB1, 0xF0, 0x8B, 0x7A, 0x49, 0xA9, 0xB1, 0x02, 0xFA, 0x85, 0x71, 0xE5,
    0x44,
];

/// Zip a list of (path, contents) pairs into a package.
pub fn build_package(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn push_compressed_uint(out: &mut Vec<u8>, value: u32) {
    if value < 0x80 {
        out.push(value as u8);
    } else if value < 0x4000 {
        out.push(0x80 | (value >> 8) as u8);
        out.push(value as u8);
    } else {
        out.push(0xC0 | (value >> 24) as u8);
        out.push((value >> 16) as u8);
        out.push((value >> 8) as u8);
        out.push(value as u8);
    }
}

struct HeapBuilder {
    data: Vec<u8>,
}

impl HeapBuilder {
    fn new() -> HeapBuilder {
        HeapBuilder { data: vec![0] }
    }

    fn push(&mut self, blob: &[u8]) -> u32 {
        let index = self.data.len() as u32;
        push_compressed_uint(&mut self.data, blob.len() as u32);
        self.data.extend_from_slice(blob);
        index
    }
}

/// Assemble a physical metadata container from named streams.
pub fn build_metadata(version: &str, streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let padded_version_len = (version.len() + 1).div_ceil(4) * 4;

    let mut directory_size = 0usize;
    for (name, _) in streams {
        directory_size += 8 + (name.len() + 1).div_ceil(4) * 4;
    }
    let header_size = 16 + padded_version_len + 4 + directory_size;

    let mut data = Vec::new();
    data.extend_from_slice(&0x424A_5342u32.to_le_bytes()); // BSJB
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&(padded_version_len as u32).to_le_bytes());
    data.extend_from_slice(version.as_bytes());
    data.extend_from_slice(&vec![0u8; padded_version_len - version.len()]);
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&(streams.len() as u16).to_le_bytes());

    let mut running_offset = header_size;
    for (name, stream_data) in streams {
        data.extend_from_slice(&(running_offset as u32).to_le_bytes());
        data.extend_from_slice(&(stream_data.len() as u32).to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        let padded = (name.len() + 1).div_ceil(4) * 4;
        data.extend_from_slice(&vec![0u8; padded - name.len()]);
        running_offset += stream_data.len();
    }

    assert_eq!(data.len(), header_size);
    for (_, stream_data) in streams {
        data.extend_from_slice(stream_data);
    }

    data
}

/// Minimal assembly metadata: a Module table row carrying the given mvid.
pub fn build_assembly_metadata(mvid: [u8; 16]) -> Vec<u8> {
    let mut tables = Vec::new();
    tables.extend_from_slice(&0u32.to_le_bytes()); // reserved
    tables.push(2); // major
    tables.push(0); // minor
    tables.push(0); // heap sizes: all small
    tables.push(1); // reserved
    tables.extend_from_slice(&1u64.to_le_bytes()); // valid: Module
    tables.extend_from_slice(&0u64.to_le_bytes()); // sorted
    tables.extend_from_slice(&1u32.to_le_bytes()); // Module rows
    tables.extend_from_slice(&0u16.to_le_bytes()); // generation
    tables.extend_from_slice(&0u16.to_le_bytes()); // name
    tables.extend_from_slice(&1u16.to_le_bytes()); // mvid -> guid 1
    tables.extend_from_slice(&0u16.to_le_bytes()); // encid
    tables.extend_from_slice(&0u16.to_le_bytes()); // encbaseid

    build_metadata(
        "v4.0.30319",
        &[("#~", tables), ("#GUID", mvid.to_vec())],
    )
}

/// Shape of a synthetic portable debug file.
pub struct PdbSpec<'a> {
    /// The 20-byte debug id (first 16 bytes pair with the CodeView signature)
    pub pdb_id: [u8; 20],
    /// Document paths, '/'-separated absolute form
    pub documents: &'a [&'a str],
    /// Raw source-link blob bytes
    pub source_link: Option<&'a [u8]>,
    /// Compiler option name/value pairs
    pub compiler_options: Option<&'a [(&'a str, &'a str)]>,
}

/// Build a portable debug file from a [`PdbSpec`].
pub fn build_portable_pdb(spec: &PdbSpec<'_>) -> Vec<u8> {
    let mut blobs = HeapBuilder::new();

    let mut document_name_indexes = Vec::new();
    for path in spec.documents {
        let mut part_indexes = Vec::new();
        for part in path.split('/') {
            if part.is_empty() {
                part_indexes.push(0);
            } else {
                part_indexes.push(blobs.push(part.as_bytes()));
            }
        }

        let mut name_blob = vec![b'/'];
        for index in part_indexes {
            push_compressed_uint(&mut name_blob, index);
        }
        document_name_indexes.push(blobs.push(&name_blob));
    }

    let source_link_index = spec.source_link.map(|json| blobs.push(json));
    let options_index = spec.compiler_options.map(|options| {
        let mut blob = Vec::new();
        for (name, value) in options {
            blob.extend_from_slice(name.as_bytes());
            blob.push(0);
            blob.extend_from_slice(value.as_bytes());
            blob.push(0);
        }
        blobs.push(&blob)
    });

    let mut guid_heap = Vec::new();
    guid_heap.extend_from_slice(&SOURCE_LINK_GUID); // index 1
    guid_heap.extend_from_slice(&COMPILATION_OPTIONS_GUID); // index 2

    let mut custom_debug_rows: Vec<(u16, u16)> = Vec::new(); // (kind guid index, value)
    if let Some(index) = source_link_index {
        custom_debug_rows.push((1, index as u16));
    }
    if let Some(index) = options_index {
        custom_debug_rows.push((2, index as u16));
    }

    let mut tables = Vec::new();
    tables.extend_from_slice(&0u32.to_le_bytes()); // reserved
    tables.push(2); // major
    tables.push(0); // minor
    tables.push(0); // heap sizes: all small
    tables.push(1); // reserved
    let mut valid = 0u64;
    if !spec.documents.is_empty() {
        valid |= 1 << 0x30;
    }
    if !custom_debug_rows.is_empty() {
        valid |= 1 << 0x37;
    }
    tables.extend_from_slice(&valid.to_le_bytes());
    tables.extend_from_slice(&0u64.to_le_bytes()); // sorted
    if !spec.documents.is_empty() {
        tables.extend_from_slice(&(spec.documents.len() as u32).to_le_bytes());
    }
    if !custom_debug_rows.is_empty() {
        tables.extend_from_slice(&(custom_debug_rows.len() as u32).to_le_bytes());
    }
    for index in &document_name_indexes {
        tables.extend_from_slice(&(*index as u16).to_le_bytes());
        tables.extend_from_slice(&0u16.to_le_bytes()); // hash algorithm
        tables.extend_from_slice(&0u16.to_le_bytes()); // hash
        tables.extend_from_slice(&0u16.to_le_bytes()); // language
    }
    for (kind, value) in &custom_debug_rows {
        // parent: Module row 1 under the HasCustomDebugInformation encoding
        tables.extend_from_slice(&((1u16 << 5) | 7).to_le_bytes());
        tables.extend_from_slice(&kind.to_le_bytes());
        tables.extend_from_slice(&value.to_le_bytes());
    }

    let mut pdb_stream = Vec::new();
    pdb_stream.extend_from_slice(&spec.pdb_id);
    pdb_stream.extend_from_slice(&0u32.to_le_bytes()); // entry point
    pdb_stream.extend_from_slice(&1u64.to_le_bytes()); // references the Module table
    pdb_stream.extend_from_slice(&1u32.to_le_bytes()); // Module rows

    build_metadata(
        "PDB v1.0",
        &[
            ("#Pdb", pdb_stream),
            ("#~", tables),
            ("#GUID", guid_heap),
            ("#Blob", blobs.data),
        ],
    )
}

/// Shape of a synthetic managed PE image.
pub struct PeSpec {
    /// Module version id written to the metadata Module row
    pub mvid: [u8; 16],
    /// CodeView record: signature, age, debug file path
    pub codeview: Option<([u8; 16], u32, String)>,
    /// Whether to emit the deterministic-build marker record
    pub reproducible: bool,
    /// Uncompressed portable debug file to embed (Deflate-compressed on write)
    pub embedded_pdb: Option<Vec<u8>>,
}

/// Build a single-section PE32 image with a CLR header and the requested debug
/// directory records.
pub fn build_managed_pe(spec: &PeSpec) -> Vec<u8> {
    const SECTION_RVA: u32 = 0x1000;
    const SECTION_FILE_OFFSET: u32 = 0x200;

    // Section contents: CLR header at 0, metadata at 0x100, debug payloads after
    let metadata = build_assembly_metadata(spec.mvid);
    let metadata_offset = 0x100usize;

    let mut payload_offset = metadata_offset + metadata.len();
    payload_offset = (payload_offset + 3) & !3;

    struct DebugRecord {
        entry_type: u32,
        data: Vec<u8>,
        offset: usize,
    }

    let mut records = Vec::new();
    if let Some((signature, age, path)) = &spec.codeview {
        let mut data = Vec::new();
        data.extend_from_slice(b"RSDS");
        data.extend_from_slice(signature);
        data.extend_from_slice(&age.to_le_bytes());
        data.extend_from_slice(path.as_bytes());
        data.push(0);
        records.push(DebugRecord {
            entry_type: 2,
            data,
            offset: 0,
        });
    }
    if spec.reproducible {
        // Length-prefixed hash form of the reproducible record
        let mut data = Vec::new();
        data.extend_from_slice(&32u32.to_le_bytes());
        data.extend_from_slice(&[0x11; 32]);
        records.push(DebugRecord {
            entry_type: 16,
            data,
            offset: 0,
        });
    }
    if let Some(pdb) = &spec.embedded_pdb {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(pdb).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut data = Vec::new();
        data.extend_from_slice(b"MPDB");
        data.extend_from_slice(&(pdb.len() as u32).to_le_bytes());
        data.extend_from_slice(&compressed);
        records.push(DebugRecord {
            entry_type: 17,
            data,
            offset: 0,
        });
    }

    for record in &mut records {
        record.offset = payload_offset;
        payload_offset += record.data.len();
        payload_offset = (payload_offset + 3) & !3;
    }

    let debug_dir_offset = payload_offset;
    let debug_dir_size = records.len() * 28;
    let section_len = debug_dir_offset + debug_dir_size;

    let mut section = vec![0u8; section_len];

    // CLR header
    section[0..4].copy_from_slice(&72u32.to_le_bytes());
    section[4..6].copy_from_slice(&2u16.to_le_bytes());
    section[6..8].copy_from_slice(&5u16.to_le_bytes());
    section[8..12].copy_from_slice(&(SECTION_RVA + metadata_offset as u32).to_le_bytes());
    section[12..16].copy_from_slice(&(metadata.len() as u32).to_le_bytes());
    section[16..20].copy_from_slice(&1u32.to_le_bytes()); // IL_ONLY

    section[metadata_offset..metadata_offset + metadata.len()].copy_from_slice(&metadata);

    for record in &records {
        section[record.offset..record.offset + record.data.len()].copy_from_slice(&record.data);
    }

    // Debug directory table
    let mut cursor = debug_dir_offset;
    for record in &records {
        let (address, pointer) = if record.data.is_empty() {
            (0u32, 0u32)
        } else {
            (
                SECTION_RVA + record.offset as u32,
                SECTION_FILE_OFFSET + record.offset as u32,
            )
        };

        section[cursor..cursor + 4].copy_from_slice(&0u32.to_le_bytes());
        section[cursor + 4..cursor + 8].copy_from_slice(&0u32.to_le_bytes());
        section[cursor + 8..cursor + 10].copy_from_slice(&0u16.to_le_bytes());
        section[cursor + 10..cursor + 12].copy_from_slice(&0u16.to_le_bytes());
        section[cursor + 12..cursor + 16].copy_from_slice(&record.entry_type.to_le_bytes());
        section[cursor + 16..cursor + 20]
            .copy_from_slice(&(record.data.len() as u32).to_le_bytes());
        section[cursor + 20..cursor + 24].copy_from_slice(&address.to_le_bytes());
        section[cursor + 24..cursor + 28].copy_from_slice(&pointer.to_le_bytes());
        cursor += 28;
    }

    let raw_size = (section_len as u32 + 0x1FF) & !0x1FF;
    let virtual_size = section_len as u32;
    let size_of_image = SECTION_RVA + ((virtual_size + 0xFFF) & !0xFFF);

    // Headers
    let mut image = vec![0u8; SECTION_FILE_OFFSET as usize];
    image[0] = b'M';
    image[1] = b'Z';
    image[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());

    image[0x80..0x84].copy_from_slice(b"PE\0\0");

    // COFF header
    image[0x84..0x86].copy_from_slice(&0x014Cu16.to_le_bytes()); // i386
    image[0x86..0x88].copy_from_slice(&1u16.to_le_bytes()); // one section
    image[0x94..0x96].copy_from_slice(&0x00E0u16.to_le_bytes()); // optional header size
    image[0x96..0x98].copy_from_slice(&0x2102u16.to_le_bytes()); // EXECUTABLE | DLL | 32BIT

    // Optional header (PE32)
    let opt = 0x98;
    image[opt..opt + 2].copy_from_slice(&0x010Bu16.to_le_bytes());
    image[opt + 16..opt + 20].copy_from_slice(&0u32.to_le_bytes()); // entry point
    image[opt + 20..opt + 24].copy_from_slice(&SECTION_RVA.to_le_bytes()); // base of code
    image[opt + 24..opt + 28].copy_from_slice(&SECTION_RVA.to_le_bytes()); // base of data
    image[opt + 28..opt + 32].copy_from_slice(&0x0040_0000u32.to_le_bytes()); // image base
    image[opt + 32..opt + 36].copy_from_slice(&0x1000u32.to_le_bytes()); // section alignment
    image[opt + 36..opt + 40].copy_from_slice(&0x200u32.to_le_bytes()); // file alignment
    image[opt + 40..opt + 42].copy_from_slice(&4u16.to_le_bytes()); // os major
    image[opt + 48..opt + 50].copy_from_slice(&4u16.to_le_bytes()); // subsystem major
    image[opt + 56..opt + 60].copy_from_slice(&size_of_image.to_le_bytes());
    image[opt + 60..opt + 64].copy_from_slice(&(SECTION_FILE_OFFSET).to_le_bytes()); // headers
    image[opt + 68..opt + 70].copy_from_slice(&3u16.to_le_bytes()); // console subsystem
    image[opt + 72..opt + 76].copy_from_slice(&0x0010_0000u32.to_le_bytes()); // stack reserve
    image[opt + 76..opt + 80].copy_from_slice(&0x1000u32.to_le_bytes()); // stack commit
    image[opt + 80..opt + 84].copy_from_slice(&0x0010_0000u32.to_le_bytes()); // heap reserve
    image[opt + 84..opt + 88].copy_from_slice(&0x1000u32.to_le_bytes()); // heap commit
    image[opt + 92..opt + 96].copy_from_slice(&16u32.to_le_bytes()); // rva/size count

    // Data directories: debug (6) and CLR runtime header (14)
    let dds = opt + 96;
    if !records.is_empty() {
        image[dds + 6 * 8..dds + 6 * 8 + 4]
            .copy_from_slice(&(SECTION_RVA + debug_dir_offset as u32).to_le_bytes());
        image[dds + 6 * 8 + 4..dds + 6 * 8 + 8]
            .copy_from_slice(&(debug_dir_size as u32).to_le_bytes());
    }
    image[dds + 14 * 8..dds + 14 * 8 + 4].copy_from_slice(&SECTION_RVA.to_le_bytes());
    image[dds + 14 * 8 + 4..dds + 14 * 8 + 8].copy_from_slice(&72u32.to_le_bytes());

    // Section table
    let sect = opt + 224;
    image[sect..sect + 5].copy_from_slice(b".text");
    image[sect + 8..sect + 12].copy_from_slice(&virtual_size.to_le_bytes());
    image[sect + 12..sect + 16].copy_from_slice(&SECTION_RVA.to_le_bytes());
    image[sect + 16..sect + 20].copy_from_slice(&raw_size.to_le_bytes());
    image[sect + 20..sect + 24].copy_from_slice(&SECTION_FILE_OFFSET.to_le_bytes());
    image[sect + 36..sect + 40].copy_from_slice(&0x6000_0020u32.to_le_bytes());

    image.extend_from_slice(&section);
    image.resize(SECTION_FILE_OFFSET as usize + raw_size as usize, 0);

    image
}
