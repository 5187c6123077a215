//! EWF (Expert Witness Format) version 1 container
//!
//! Layout of one segment file:
//!
//! ```text
//! ┌───────────────────────────┐
//! │ file header (13 bytes)    │  EVF signature + segment number
//! ├───────────────────────────┤
//! │ volume section            │  media geometry (first segment)
//! ├───────────────────────────┤
//! │ sectors section           │  chunk data, zlib or raw+Adler-32
//! ├───────────────────────────┤
//! │ table section             │  chunk offset table
//! ├───────────────────────────┤
//! │ hash section              │  stored MD5 (last segment)
//! ├───────────────────────────┤
//! │ next / done section       │  continue in next segment / end
//! └───────────────────────────┘
//! ```
//!
//! Every chunk carries an integrity digest: compressed chunks through the
//! zlib stream's own Adler-32, uncompressed chunks through a trailing
//! Adler-32 word. A mismatch surfaces as `Error::ChunkIntegrity` on the read
//! that touches the chunk; corrupted evidence is never silently zero-filled.

pub mod types;

use std::io::Read;

use flate2::read::ZlibDecoder;

use diskimage_core::limits::{validate_allocation_size, MAX_ALLOCATION_SIZE};
use diskimage_core::{Container, Error, Result};
use diskimage_stream::SegmentedStream;

pub use types::{EwfFileHeader, HashSection, SectionDescriptor, SectionType, TableHeader, VolumeSection};

/// Location of one chunk within the segment stream
#[derive(Debug, Clone)]
struct ChunkInfo {
    /// Offset of the stored chunk within the whole segment stream
    offset: u64,
    /// Stored size in bytes (compressed size, or data + trailing checksum)
    size: u32,
    /// True when the chunk is a zlib stream
    compressed: bool,
}

/// Cache holding the single most recently decompressed chunk
#[derive(Debug)]
struct ChunkCache {
    index: Option<usize>,
    data: Vec<u8>,
}

/// EWF/E01 container reader
#[derive(Debug)]
pub struct EwfContainer {
    stream: SegmentedStream,
    volume: VolumeSection,
    chunks: Vec<ChunkInfo>,
    hash: Option<HashSection>,
    cache: ChunkCache,
    identifier: String,
    length: u64,
}

impl EwfContainer {
    /// Open an EWF image over its segment stream
    ///
    /// Walks every segment's section chain, verifying descriptor and table
    /// checksums, and assembles the global chunk table.
    pub fn open(mut stream: SegmentedStream) -> Result<Self> {
        let mut volume: Option<VolumeSection> = None;
        let mut hash: Option<HashSection> = None;
        let mut chunks: Vec<ChunkInfo> = Vec::new();
        let mut finished = false;

        for segment in 0..stream.segment_count() {
            let base = stream
                .segment_start(segment)
                .ok_or_else(|| Error::corrupt_header("segment index out of range"))?;
            let segment_len = stream.segment_len(segment).unwrap_or(0);

            let mut header_bytes = [0u8; EwfFileHeader::SIZE];
            stream.read_exact_at(base, &mut header_bytes)?;
            let header = EwfFileHeader::parse(&header_bytes)?;

            if header.segment_number as usize != segment + 1 {
                return Err(Error::segment_order(format!(
                    "segment file {} carries segment number {}",
                    segment + 1,
                    header.segment_number
                )));
            }

            let mut local = header.fields_start as u64;
            let mut sectors_end: Option<u64> = None;

            loop {
                if local + SectionDescriptor::SIZE as u64 > segment_len {
                    return Err(Error::corrupt_header(
                        "section chain runs past the end of its segment",
                    ));
                }

                let mut descriptor_bytes = [0u8; SectionDescriptor::SIZE];
                stream.read_exact_at(base + local, &mut descriptor_bytes)?;
                let descriptor = SectionDescriptor::parse(&descriptor_bytes)?;

                let payload_offset = local + SectionDescriptor::SIZE as u64;
                let payload_size = descriptor
                    .section_size
                    .saturating_sub(SectionDescriptor::SIZE as u64);

                tracing::trace!(
                    segment,
                    section = ?descriptor.section_type,
                    offset = local,
                    size = descriptor.section_size,
                    "EWF section"
                );

                match descriptor.section_type {
                    SectionType::Volume | SectionType::Disk => {
                        let want = payload_size.min(1024);
                        let size = validate_allocation_size(want, 1024, "EWF volume section")?;
                        let mut payload = vec![0u8; size];
                        stream.read_exact_at(base + payload_offset, &mut payload)?;
                        if volume.is_none() {
                            volume = Some(VolumeSection::parse(&payload)?);
                        }
                    }
                    SectionType::Sectors => {
                        sectors_end = Some(payload_offset + payload_size);
                    }
                    SectionType::Table => {
                        let end = sectors_end.ok_or_else(|| {
                            Error::corrupt_header("EWF table section without sectors data")
                        })?;
                        parse_table(
                            &mut stream,
                            base,
                            payload_offset,
                            payload_size,
                            end,
                            &mut chunks,
                        )?;
                    }
                    SectionType::Table2 => {
                        // Mirror of the primary table; the primary already
                        // yielded the chunk list.
                    }
                    SectionType::Hash => {
                        let mut payload = [0u8; HashSection::SIZE];
                        stream.read_exact_at(base + payload_offset, &mut payload)?;
                        hash = Some(HashSection::parse(&payload)?);
                    }
                    SectionType::Next => break,
                    SectionType::Done => {
                        finished = true;
                        break;
                    }
                    SectionType::Header | SectionType::Data | SectionType::Unknown => {}
                }

                if descriptor.next_offset == 0 || descriptor.next_offset <= local {
                    return Err(Error::corrupt_header("EWF section chain does not advance"));
                }
                local = descriptor.next_offset;
            }

            if finished {
                break;
            }
        }

        if !finished {
            return Err(Error::corrupt_header("EWF image ends without a done section"));
        }
        let volume = volume.ok_or_else(|| Error::corrupt_header("EWF missing volume section"))?;

        let length = volume.media_size();
        let chunk_size = volume.chunk_size() as u64;
        if chunk_size == 0 {
            return Err(Error::corrupt_header("EWF volume has zero chunk size"));
        }

        let needed = length.div_ceil(chunk_size) as usize;
        if chunks.len() < needed {
            return Err(Error::corrupt_header(format!(
                "EWF chunk table covers {} of {} chunks",
                chunks.len(),
                needed
            )));
        }
        if chunks.len() as u32 != volume.chunk_count {
            tracing::warn!(
                table = chunks.len(),
                volume = volume.chunk_count,
                "EWF chunk count differs between table and volume section"
            );
        }

        let identifier = format!(
            "EWF image, {} sectors of {} bytes in {} chunks",
            volume.sector_count,
            volume.bytes_per_sector,
            chunks.len()
        );

        Ok(Self {
            stream,
            volume,
            chunks,
            hash,
            cache: ChunkCache {
                index: None,
                data: Vec::new(),
            },
            identifier,
            length,
        })
    }

    /// Media geometry parsed from the volume section
    pub fn volume(&self) -> &VolumeSection {
        &self.volume
    }

    /// Number of chunks in the image
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// The MD5 stored in the hash section, as a hex string
    pub fn stored_md5(&self) -> Option<String> {
        self.hash.as_ref().map(|h| h.md5_hex())
    }

    /// Recompute the logical stream's MD5 and compare with the stored hash
    ///
    /// Returns `Ok(None)` when the image carries no hash section. Streams the
    /// whole image chunk by chunk; integrity failures surface as
    /// [`Error::ChunkIntegrity`].
    pub fn verify_stored_md5(&mut self) -> Result<Option<bool>> {
        let Some(stored) = self.hash.as_ref().map(|h| h.md5) else {
            return Ok(None);
        };

        let chunk_size = self.volume.chunk_size() as u64;
        let needed = self.length.div_ceil(chunk_size) as usize;

        let mut context = md5::Context::new();
        for index in 0..needed {
            self.ensure_chunk(index)?;
            context.consume(&self.cache.data);
        }

        let digest = context.compute();
        Ok(Some(digest.0 == stored))
    }

    /// Expected decompressed length of chunk `index`
    fn expected_chunk_len(&self, index: usize) -> usize {
        let chunk_size = self.volume.chunk_size() as u64;
        let start = index as u64 * chunk_size;
        chunk_size.min(self.length - start) as usize
    }

    /// Decompress and verify chunk `index` into the cache
    fn ensure_chunk(&mut self, index: usize) -> Result<()> {
        if self.cache.index == Some(index) {
            return Ok(());
        }

        let info = self
            .chunks
            .get(index)
            .cloned()
            .ok_or_else(|| Error::chunk_integrity(index, "chunk missing from table"))?;
        let expected = self.expected_chunk_len(index);

        let size = validate_allocation_size(info.size as u64, MAX_ALLOCATION_SIZE, "EWF chunk")?;
        let mut raw = vec![0u8; size];
        self.stream.read_exact_at(info.offset, &mut raw)?;

        let data = if info.compressed {
            let mut decoded = Vec::with_capacity(expected);
            ZlibDecoder::new(&raw[..])
                .read_to_end(&mut decoded)
                .map_err(|e| Error::chunk_integrity(index, format!("zlib: {}", e)))?;
            if decoded.len() != expected {
                return Err(Error::chunk_integrity(
                    index,
                    format!("decompressed {} bytes, expected {}", decoded.len(), expected),
                ));
            }
            decoded
        } else {
            if raw.len() < 4 {
                return Err(Error::chunk_integrity(index, "stored chunk too small"));
            }
            let (payload, checksum_bytes) = raw.split_at(raw.len() - 4);
            let stored = u32::from_le_bytes([
                checksum_bytes[0],
                checksum_bytes[1],
                checksum_bytes[2],
                checksum_bytes[3],
            ]);
            if types::adler32(payload) != stored {
                return Err(Error::chunk_integrity(index, "Adler-32 mismatch"));
            }
            if payload.len() != expected {
                return Err(Error::chunk_integrity(
                    index,
                    format!("stored {} bytes, expected {}", payload.len(), expected),
                ));
            }
            payload.to_vec()
        };

        self.cache.index = Some(index);
        self.cache.data = data;
        Ok(())
    }
}

/// Parse one chunk table section and append its chunks to the global list
fn parse_table(
    stream: &mut SegmentedStream,
    base: u64,
    payload_offset: u64,
    payload_size: u64,
    sectors_end: u64,
    chunks: &mut Vec<ChunkInfo>,
) -> Result<()> {
    if payload_size < TableHeader::SIZE as u64 {
        return Err(Error::corrupt_header("EWF table section too short"));
    }

    let mut header_bytes = [0u8; TableHeader::SIZE];
    stream.read_exact_at(base + payload_offset, &mut header_bytes)?;
    let header = TableHeader::parse(&header_bytes)?;

    let entries_size = header.entry_count as u64 * 4;
    if TableHeader::SIZE as u64 + entries_size + 4 > payload_size {
        return Err(Error::corrupt_header("EWF table entries exceed section size"));
    }
    let entries_size = validate_allocation_size(entries_size, MAX_ALLOCATION_SIZE, "EWF table")?;

    let mut entry_bytes = vec![0u8; entries_size];
    let entries_offset = base + payload_offset + TableHeader::SIZE as u64;
    stream.read_exact_at(entries_offset, &mut entry_bytes)?;

    let mut footer = [0u8; 4];
    stream.read_exact_at(entries_offset + entries_size as u64, &mut footer)?;
    if types::adler32(&entry_bytes) != u32::from_le_bytes(footer) {
        return Err(Error::corrupt_header("EWF table entries checksum mismatch"));
    }

    let mut local_offsets = Vec::with_capacity(header.entry_count as usize);
    for entry in entry_bytes.chunks_exact(4) {
        let value = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
        let compressed = value & 0x8000_0000 != 0;
        let offset = header.base_offset + (value & 0x7FFF_FFFF) as u64;
        local_offsets.push((offset, compressed));
    }

    for (i, &(offset, compressed)) in local_offsets.iter().enumerate() {
        let end = if i + 1 < local_offsets.len() {
            local_offsets[i + 1].0
        } else {
            sectors_end
        };
        if end <= offset {
            return Err(Error::corrupt_header("EWF chunk offsets not ascending"));
        }
        let size = end - offset;
        if size > u32::MAX as u64 {
            return Err(Error::corrupt_header("EWF chunk larger than 4 GiB"));
        }

        chunks.push(ChunkInfo {
            offset: base + offset,
            size: size as u32,
            compressed,
        });
    }

    Ok(())
}

impl Container for EwfContainer {
    fn identify(&self) -> &str {
        &self.identifier
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn read_logical_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.length || buf.is_empty() {
            return Ok(0);
        }

        let chunk_size = self.volume.chunk_size() as u64;
        let index = (offset / chunk_size) as usize;
        let within = (offset % chunk_size) as usize;

        self.ensure_chunk(index)?;

        let available = self.cache.data.len().saturating_sub(within);
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.cache.data[within..within + n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{build_ewf, first_chunk_data_offset, EwfBuildOptions};

    fn sample_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    fn open_segments(segments: Vec<Vec<u8>>) -> Result<EwfContainer> {
        // Concatenate via a memory stream per segment boundary
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            let path = dir.path().join(format!("img.e{:02}", i + 1));
            std::fs::write(&path, segment).unwrap();
            paths.push(path);
        }
        EwfContainer::open(SegmentedStream::open(&paths)?)
    }

    #[test]
    fn test_single_segment_roundtrip() {
        let data = sample_data(4096);
        let segments = build_ewf(&data, &EwfBuildOptions::default());
        let mut container = open_segments(segments).unwrap();

        assert_eq!(container.length(), 4096);
        let mut out = vec![0u8; 4096];
        container.read_logical_exact(0, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_read_across_chunk_boundary() {
        let data = sample_data(4096);
        let opts = EwfBuildOptions::default(); // 1024-byte chunks
        let mut container = open_segments(build_ewf(&data, &opts)).unwrap();

        let mut out = vec![0u8; 512];
        container.read_logical_exact(768, &mut out).unwrap();
        assert_eq!(out, &data[768..1280]);
    }

    #[test]
    fn test_multi_segment_matches_single() {
        let data = sample_data(8192);

        let single = build_ewf(&data, &EwfBuildOptions::default());
        let multi = build_ewf(
            &data,
            &EwfBuildOptions {
                segments: 3,
                ..Default::default()
            },
        );
        assert_eq!(multi.len(), 3);

        let mut a = open_segments(single).unwrap();
        let mut b = open_segments(multi).unwrap();

        let mut out_a = vec![0u8; 8192];
        let mut out_b = vec![0u8; 8192];
        a.read_logical_exact(0, &mut out_a).unwrap();
        b.read_logical_exact(0, &mut out_b).unwrap();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_uncompressed_chunks() {
        let data = sample_data(2048);
        let opts = EwfBuildOptions {
            compress: false,
            ..Default::default()
        };
        let mut container = open_segments(build_ewf(&data, &opts)).unwrap();

        let mut out = vec![0u8; 2048];
        container.read_logical_exact(0, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_tampered_chunk_is_reported() {
        let data = sample_data(4096);
        for compress in [true, false] {
            let opts = EwfBuildOptions {
                compress,
                ..Default::default()
            };
            let mut segments = build_ewf(&data, &opts);
            segments[0][first_chunk_data_offset() + 4] ^= 0xFF;

            let mut container = open_segments(segments).unwrap();
            let mut out = vec![0u8; 512];
            let err = container.read_logical_exact(0, &mut out).unwrap_err();
            assert!(
                matches!(err, Error::ChunkIntegrity { chunk: 0, .. }),
                "compress={}: got {:?}",
                compress,
                err
            );

            // Later chunks remain readable
            container.read_logical_exact(2048, &mut out).unwrap();
            assert_eq!(out, &data[2048..2560]);
        }
    }

    #[test]
    fn test_stored_md5_verifies() {
        let data = sample_data(4096);
        let mut container = open_segments(build_ewf(&data, &EwfBuildOptions::default())).unwrap();

        let expected: String = md5::compute(&data)
            .0
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        assert_eq!(container.stored_md5().as_deref(), Some(expected.as_str()));
        assert_eq!(container.verify_stored_md5().unwrap(), Some(true));
    }

    #[test]
    fn test_segment_number_mismatch() {
        let data = sample_data(4096);
        let mut segments = build_ewf(
            &data,
            &EwfBuildOptions {
                segments: 2,
                ..Default::default()
            },
        );
        // Swap the stored segment numbers
        segments[1][9..11].copy_from_slice(&9u16.to_le_bytes());

        let err = open_segments(segments).unwrap_err();
        assert!(matches!(err, Error::SegmentOrder(_)));
    }

    #[test]
    fn test_truncated_image_rejected() {
        let data = sample_data(4096);
        let mut segments = build_ewf(&data, &EwfBuildOptions::default());
        let len = segments[0].len();
        segments[0].truncate(len - 100);

        assert!(open_segments(segments).is_err());
    }
}
