//! Synthetic EWF image builder for tests
//!
//! Produces minimal but structurally complete EWF v1 segment files that the
//! parser in [`crate::ewf`] accepts: checksummed section descriptors, a
//! volume section, per-segment sectors/table pairs and a stored MD5.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::ewf::types::{
    adler32, SectionDescriptor, SectionType, TableHeader, VolumeSection, EVF_SIGNATURE,
};

/// Options for building a synthetic EWF image
#[derive(Debug, Clone)]
pub struct EwfBuildOptions {
    /// Sectors per chunk (default 2 -> 1024-byte chunks)
    pub sectors_per_chunk: u32,
    /// Bytes per sector
    pub bytes_per_sector: u32,
    /// Number of segment files to spread the chunks over
    pub segments: usize,
    /// Compress chunks with zlib (otherwise raw + trailing Adler-32)
    pub compress: bool,
    /// Write a hash section with the MD5 of the data
    pub with_hash: bool,
}

impl Default for EwfBuildOptions {
    fn default() -> Self {
        Self {
            sectors_per_chunk: 2,
            bytes_per_sector: 512,
            segments: 1,
            compress: true,
            with_hash: true,
        }
    }
}

/// Offset of the first chunk's stored bytes within the first segment
///
/// Fixed by construction: file header, volume section, sectors descriptor.
pub fn first_chunk_data_offset() -> usize {
    13 + (SectionDescriptor::SIZE + VolumeSection::SIZE) + SectionDescriptor::SIZE
}

/// Build EWF segment files containing `data` as the logical image
///
/// `data` must be a whole number of sectors long.
pub fn build_ewf(data: &[u8], options: &EwfBuildOptions) -> Vec<Vec<u8>> {
    assert!(options.segments >= 1, "at least one segment");
    assert_eq!(
        data.len() % options.bytes_per_sector as usize,
        0,
        "data must be sector aligned"
    );

    let chunk_size = (options.sectors_per_chunk * options.bytes_per_sector) as usize;
    let chunks: Vec<&[u8]> = data.chunks(chunk_size).collect();
    let per_segment = chunks.len().div_ceil(options.segments).max(1);

    let volume = VolumeSection {
        media_type: 0x01,
        chunk_count: chunks.len() as u32,
        sectors_per_chunk: options.sectors_per_chunk,
        bytes_per_sector: options.bytes_per_sector,
        sector_count: (data.len() / options.bytes_per_sector as usize) as u64,
        compression: if options.compress { 1 } else { 0 },
    };

    let groups: Vec<&[&[u8]]> = chunks.chunks(per_segment).collect();
    let mut segments = Vec::with_capacity(groups.len());

    for (i, group) in groups.iter().enumerate() {
        let last = i + 1 == groups.len();
        let mut buf = Vec::new();

        // Segment file header
        buf.extend_from_slice(&EVF_SIGNATURE);
        buf.push(0x01);
        buf.extend_from_slice(&((i + 1) as u16).to_le_bytes());
        buf.extend_from_slice(&13u16.to_le_bytes());

        if i == 0 {
            emit_section(&mut buf, SectionType::Volume, &volume.encode(), false);
        }

        // Sectors section: encoded chunk blobs, offsets recorded for the table
        let data_start = buf.len() + SectionDescriptor::SIZE;
        let mut payload = Vec::new();
        let mut entries: Vec<(usize, bool)> = Vec::new();
        for chunk in group.iter() {
            entries.push((data_start + payload.len(), options.compress));
            if options.compress {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(chunk).expect("in-memory write");
                payload.extend_from_slice(&encoder.finish().expect("in-memory finish"));
            } else {
                payload.extend_from_slice(chunk);
                payload.extend_from_slice(&adler32(chunk).to_le_bytes());
            }
        }
        emit_section(&mut buf, SectionType::Sectors, &payload, false);

        // Table section: header + entries + entry checksum
        let mut table = TableHeader::encode(entries.len() as u32, 0).to_vec();
        let mut entry_block = Vec::new();
        for (offset, compressed) in entries {
            let mut value = offset as u32;
            if compressed {
                value |= 0x8000_0000;
            }
            entry_block.extend_from_slice(&value.to_le_bytes());
        }
        table.extend_from_slice(&entry_block);
        table.extend_from_slice(&adler32(&entry_block).to_le_bytes());
        emit_section(&mut buf, SectionType::Table, &table, false);

        if last {
            if options.with_hash {
                let digest = md5::compute(data);
                let mut hash_payload = digest.0.to_vec();
                hash_payload.extend_from_slice(&adler32(&digest.0).to_le_bytes());
                emit_section(&mut buf, SectionType::Hash, &hash_payload, false);
            }
            emit_section(&mut buf, SectionType::Done, &[], true);
        } else {
            emit_section(&mut buf, SectionType::Next, &[], true);
        }

        segments.push(buf);
    }

    segments
}

fn emit_section(buf: &mut Vec<u8>, section_type: SectionType, payload: &[u8], terminal: bool) {
    let section_size = (SectionDescriptor::SIZE + payload.len()) as u64;
    let next_offset = if terminal {
        0
    } else {
        (buf.len() + SectionDescriptor::SIZE + payload.len()) as u64
    };
    buf.extend_from_slice(&SectionDescriptor::encode(
        section_type,
        next_offset,
        section_size,
    ));
    buf.extend_from_slice(payload);
}
