//! GPT (GUID Partition Table)
//!
//! ```text
//! LBA 0:    Protective MBR
//! LBA 1:    Primary GPT header
//! LBA 2..:  Partition entry array (typically 128 entries of 128 bytes)
//! ```
//!
//! Both the header and the partition entry array carry CRC32 checksums;
//! a mismatch rejects the table rather than yielding half-trusted volumes.

pub mod types;

use diskimage_core::limits::validate_allocation_size;
use diskimage_core::{Error, Result, Volume};
use diskimage_stream::LogicalStream;
use types::{GptHeader, GptPartitionEntry};

/// Upper bound on partition entries accepted from a header
const MAX_PARTITION_ENTRIES: u32 = 512;

/// Parsed GPT partition table
#[derive(Debug, Clone)]
pub struct GptTable {
    header: GptHeader,
    entries: Vec<(usize, GptPartitionEntry)>,
}

impl GptTable {
    /// Parse the primary GPT from a logical stream
    pub fn parse(stream: &mut LogicalStream, sector_size: u32) -> Result<Self> {
        let header_offset = sector_size as u64;
        let mut header_sector = vec![0u8; sector_size as usize];
        stream
            .read_exact_at(header_offset, &mut header_sector)
            .map_err(|_| Error::invalid_volume_table("GPT header outside stream"))?;

        let header = GptHeader::from_bytes(&header_sector)
            .ok_or_else(|| Error::invalid_volume_table("missing GPT header signature"))?;

        if !header.verify_header_crc32(&header_sector) {
            return Err(Error::invalid_volume_table(
                "GPT header CRC32 verification failed",
            ));
        }

        if header.num_partition_entries > MAX_PARTITION_ENTRIES {
            return Err(Error::invalid_volume_table(format!(
                "GPT advertises {} partition entries",
                header.num_partition_entries
            )));
        }
        if (header.partition_entry_size as usize) < GptPartitionEntry::SIZE {
            return Err(Error::invalid_volume_table("GPT partition entries too small"));
        }

        let array_size = header.num_partition_entries as u64 * header.partition_entry_size as u64;
        let array_size = validate_allocation_size(
            array_size,
            diskimage_core::limits::MAX_ALLOCATION_SIZE,
            "GPT entry array",
        )
        .map_err(|_| Error::invalid_volume_table("GPT entry array too large"))?;

        let array_offset = header.partition_entries_lba * sector_size as u64;
        let mut array = vec![0u8; array_size];
        stream
            .read_exact_at(array_offset, &mut array)
            .map_err(|_| Error::invalid_volume_table("GPT entry array outside stream"))?;

        if !header.verify_partition_entries_crc32(&array) {
            return Err(Error::invalid_volume_table(
                "GPT partition entries CRC32 verification failed",
            ));
        }

        let entry_size = header.partition_entry_size as usize;
        let mut entries = Vec::new();
        for i in 0..header.num_partition_entries as usize {
            let bytes = &array[i * entry_size..i * entry_size + entry_size];
            let Some(entry) = GptPartitionEntry::from_bytes(bytes) else {
                continue;
            };
            if entry.is_unused() {
                continue;
            }
            entries.push((i, entry));
        }

        tracing::debug!(
            partitions = entries.len(),
            disk_guid = %header.disk_guid,
            "parsed GPT"
        );

        Ok(Self { header, entries })
    }

    /// The parsed GPT header
    pub fn header(&self) -> &GptHeader {
        &self.header
    }

    /// Used partition entries with their slot indices
    pub fn entries(&self) -> &[(usize, GptPartitionEntry)] {
        &self.entries
    }

    /// Convert the entries to volumes using a sector size
    pub fn volumes(&self, sector_size: u32) -> Vec<Volume> {
        self.entries
            .iter()
            .map(|(i, e)| {
                let type_hint = if e.name.is_empty() {
                    e.type_name().to_string()
                } else {
                    format!("{} ({})", e.type_name(), e.name)
                };
                Volume::new(
                    *i,
                    e.first_lba * sector_size as u64,
                    e.size_lba() * sector_size as u64,
                    type_hint,
                )
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use diskimage_core::Container;
    use diskimage_stream::share_container;

    /// Pass-through container for in-memory fixtures
    struct MemoryContainer(Vec<u8>);

    impl Container for MemoryContainer {
        fn identify(&self) -> &str {
            "memory"
        }

        fn length(&self) -> u64 {
            self.0.len() as u64
        }

        fn read_logical_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            if offset >= self.0.len() as u64 {
                return Ok(0);
            }
            let start = offset as usize;
            let end = (start + buf.len()).min(self.0.len());
            buf[..end - start].copy_from_slice(&self.0[start..end]);
            Ok(end - start)
        }
    }

    fn stream_over(data: Vec<u8>) -> LogicalStream {
        LogicalStream::whole(&share_container(Box::new(MemoryContainer(data))))
    }

    /// Disk with a valid primary GPT holding one partition
    pub(crate) fn build_test_gpt_disk() -> Vec<u8> {
        let sector = 512usize;
        let mut disk = vec![0u8; sector * 128];

        // Partition entry array at LBA 2: one Linux filesystem partition
        let mut entry = [0u8; 128];
        entry[0..16].copy_from_slice(&[
            0xAF, 0x3D, 0xC6, 0x0F, 0x83, 0x84, 0x72, 0x47, 0x8E, 0x79, 0x3D, 0x69, 0xD8, 0x47,
            0x7D, 0xE4,
        ]);
        entry[16] = 0x01;
        entry[32..40].copy_from_slice(&34u64.to_le_bytes());
        entry[40..48].copy_from_slice(&97u64.to_le_bytes());
        let array_offset = sector * 2;
        disk[array_offset..array_offset + 128].copy_from_slice(&entry);

        let entries_crc = crc32fast::hash(&disk[array_offset..array_offset + 128 * 128]);

        // Primary header at LBA 1
        let mut header = vec![0u8; 92];
        header[0..8].copy_from_slice(b"EFI PART");
        header[8..12].copy_from_slice(&0x00010000u32.to_le_bytes());
        header[12..16].copy_from_slice(&92u32.to_le_bytes());
        header[24..32].copy_from_slice(&1u64.to_le_bytes());
        header[32..40].copy_from_slice(&127u64.to_le_bytes());
        header[40..48].copy_from_slice(&34u64.to_le_bytes());
        header[48..56].copy_from_slice(&97u64.to_le_bytes());
        header[72..80].copy_from_slice(&2u64.to_le_bytes());
        header[80..84].copy_from_slice(&128u32.to_le_bytes());
        header[84..88].copy_from_slice(&128u32.to_le_bytes());
        header[88..92].copy_from_slice(&entries_crc.to_le_bytes());
        let header_crc = crc32fast::hash(&header);
        header[16..20].copy_from_slice(&header_crc.to_le_bytes());
        disk[sector..sector + 92].copy_from_slice(&header);

        disk
    }

    #[test]
    fn test_parse_valid_gpt() {
        let mut stream = stream_over(build_test_gpt_disk());
        let table = GptTable::parse(&mut stream, 512).unwrap();

        assert_eq!(table.entries().len(), 1);
        let volumes = table.volumes(512);
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].start_offset, 34 * 512);
        assert_eq!(volumes[0].length, 64 * 512);
        assert_eq!(volumes[0].type_hint, "Linux Filesystem");
    }

    #[test]
    fn test_header_crc_enforced() {
        let mut disk = build_test_gpt_disk();
        disk[512 + 40] ^= 0xFF; // first_usable_lba

        let mut stream = stream_over(disk);
        let err = GptTable::parse(&mut stream, 512).unwrap_err();
        assert!(matches!(err, Error::InvalidVolumeTable(_)));
    }

    #[test]
    fn test_entries_crc_enforced() {
        let mut disk = build_test_gpt_disk();
        disk[2 * 512 + 32] ^= 0xFF; // first_lba of entry 0

        let mut stream = stream_over(disk);
        let err = GptTable::parse(&mut stream, 512).unwrap_err();
        assert!(matches!(err, Error::InvalidVolumeTable(_)));
    }

    #[test]
    fn test_missing_signature() {
        let mut stream = stream_over(vec![0u8; 4096]);
        let err = GptTable::parse(&mut stream, 512).unwrap_err();
        assert!(matches!(err, Error::InvalidVolumeTable(_)));
    }
}
