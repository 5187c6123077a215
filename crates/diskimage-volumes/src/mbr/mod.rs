//! MBR (Master Boot Record) partition table
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0x000   446   Bootstrap code
//! 0x1B8   4     Disk signature
//! 0x1BE   16    Partition entry 1
//! 0x1CE   16    Partition entry 2
//! 0x1DE   16    Partition entry 3
//! 0x1EE   16    Partition entry 4
//! 0x1FE   2     Boot signature (0xAA55)
//! ```
//!
//! Only the LBA fields of an entry are consulted; CHS addressing is ignored.

pub mod types;

use diskimage_core::{Error, Result, Volume};
use types::MbrPartitionType;

/// One non-empty MBR partition entry
#[derive(Debug, Clone)]
pub struct MbrEntry {
    /// Entry slot (0-3), preserved as the volume index
    pub index: usize,
    /// Partition type code
    pub partition_type: MbrPartitionType,
    /// First sector (LBA)
    pub lba_start: u32,
    /// Sector count
    pub lba_length: u32,
}

/// Parsed MBR partition table
#[derive(Debug, Clone)]
pub struct MbrTable {
    entries: Vec<MbrEntry>,
    disk_signature: u32,
}

impl MbrTable {
    /// Boot signature at offset 0x1FE
    pub const BOOT_SIGNATURE: u16 = 0xAA55;

    /// Size of the MBR sector
    pub const MBR_SIZE: usize = 512;

    /// Offset of the first partition entry
    pub const PARTITION_TABLE_OFFSET: usize = 0x1BE;

    /// Offset of the disk signature
    pub const DISK_SIGNATURE_OFFSET: usize = 0x1B8;

    /// Size of each partition entry
    pub const PARTITION_ENTRY_SIZE: usize = 16;

    /// Number of primary partition entries
    pub const NUM_PARTITIONS: usize = 4;

    /// Parse an MBR from its 512-byte sector
    pub fn parse(sector: &[u8]) -> Result<Self> {
        if sector.len() < Self::MBR_SIZE {
            return Err(Error::invalid_volume_table("MBR sector too short"));
        }

        let boot_signature = u16::from_le_bytes([sector[0x1FE], sector[0x1FF]]);
        if boot_signature != Self::BOOT_SIGNATURE {
            return Err(Error::invalid_volume_table(format!(
                "invalid MBR boot signature: expected 0x{:04X}, got 0x{:04X}",
                Self::BOOT_SIGNATURE,
                boot_signature
            )));
        }

        let disk_signature = u32::from_le_bytes([
            sector[Self::DISK_SIGNATURE_OFFSET],
            sector[Self::DISK_SIGNATURE_OFFSET + 1],
            sector[Self::DISK_SIGNATURE_OFFSET + 2],
            sector[Self::DISK_SIGNATURE_OFFSET + 3],
        ]);

        let mut entries = Vec::new();
        for i in 0..Self::NUM_PARTITIONS {
            let offset = Self::PARTITION_TABLE_OFFSET + i * Self::PARTITION_ENTRY_SIZE;
            let entry = &sector[offset..offset + Self::PARTITION_ENTRY_SIZE];

            let partition_type = MbrPartitionType::from_byte(entry[4]);
            let lba_start = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]);
            let lba_length = u32::from_le_bytes([entry[12], entry[13], entry[14], entry[15]]);

            // Skip empty/zero-length slots, preserving the slot index
            if partition_type == MbrPartitionType::Empty || lba_length == 0 {
                continue;
            }

            entries.push(MbrEntry {
                index: i,
                partition_type,
                lba_start,
                lba_length,
            });
        }

        Ok(Self {
            entries,
            disk_signature,
        })
    }

    /// Disk signature at offset 0x1B8
    pub fn disk_signature(&self) -> u32 {
        self.disk_signature
    }

    /// Non-empty partition entries in table order
    pub fn entries(&self) -> &[MbrEntry] {
        &self.entries
    }

    /// True when this MBR only shields a GPT
    pub fn is_gpt_protective(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.partition_type == MbrPartitionType::GptProtective)
    }

    /// Convert the entries to volumes using a sector size
    pub fn volumes(&self, sector_size: u32) -> Vec<Volume> {
        self.entries
            .iter()
            .map(|e| {
                Volume::new(
                    e.index,
                    e.lba_start as u64 * sector_size as u64,
                    e.lba_length as u64 * sector_size as u64,
                    e.partition_type.name().to_string(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal MBR with one FAT32 partition at LBA 2048
    pub(crate) fn build_test_mbr() -> Vec<u8> {
        let mut mbr = vec![0u8; 512];

        mbr[0x1B8..0x1BC].copy_from_slice(&0x78563412u32.to_le_bytes());

        let entry = 0x1BE;
        mbr[entry] = 0x80; // bootable
        mbr[entry + 4] = 0x0C; // FAT32 LBA
        mbr[entry + 8..entry + 12].copy_from_slice(&2048u32.to_le_bytes());
        mbr[entry + 12..entry + 16].copy_from_slice(&2048u32.to_le_bytes());

        mbr[0x1FE] = 0x55;
        mbr[0x1FF] = 0xAA;
        mbr
    }

    #[test]
    fn test_parse_valid_mbr() {
        let table = MbrTable::parse(&build_test_mbr()).unwrap();
        assert_eq!(table.disk_signature(), 0x78563412);
        assert_eq!(table.entries().len(), 1);

        let volumes = table.volumes(512);
        assert_eq!(volumes[0].index, 0);
        assert_eq!(volumes[0].start_offset, 2048 * 512);
        assert_eq!(volumes[0].length, 2048 * 512);
        assert_eq!(volumes[0].type_hint, "FAT32 (LBA)");
    }

    #[test]
    fn test_parse_invalid_boot_signature() {
        let mut mbr = build_test_mbr();
        mbr[0x1FE] = 0x00;
        let err = MbrTable::parse(&mbr).unwrap_err();
        assert!(matches!(err, Error::InvalidVolumeTable(_)));
    }

    #[test]
    fn test_parse_empty_mbr() {
        let mut mbr = vec![0u8; 512];
        mbr[0x1FE] = 0x55;
        mbr[0x1FF] = 0xAA;

        let table = MbrTable::parse(&mbr).unwrap();
        assert!(table.entries().is_empty());
        assert!(!table.is_gpt_protective());
    }

    #[test]
    fn test_gpt_protective_detection() {
        let mut mbr = vec![0u8; 512];
        let entry = 0x1BE;
        mbr[entry + 4] = 0xEE;
        mbr[entry + 8] = 0x01;
        mbr[entry + 12..entry + 16].copy_from_slice(&0x0800u32.to_le_bytes());
        mbr[0x1FE] = 0x55;
        mbr[0x1FF] = 0xAA;

        let table = MbrTable::parse(&mbr).unwrap();
        assert!(table.is_gpt_protective());
    }
}
