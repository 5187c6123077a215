//! GPT on-disk structures

use uuid::Uuid;

/// GPT header signature ("EFI PART")
pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";

/// GPT header (LBA 1)
#[derive(Debug, Clone)]
pub struct GptHeader {
    /// Header size in bytes (usually 92)
    pub header_size: u32,
    /// CRC32 of the header with this field zeroed
    pub header_crc32: u32,
    /// LBA of this header
    pub current_lba: u64,
    /// LBA of the backup header
    pub backup_lba: u64,
    /// First usable LBA for partitions
    pub first_usable_lba: u64,
    /// Last usable LBA for partitions
    pub last_usable_lba: u64,
    /// Disk GUID
    pub disk_guid: Uuid,
    /// LBA of the partition entry array
    pub partition_entries_lba: u64,
    /// Number of partition entries
    pub num_partition_entries: u32,
    /// Size of one partition entry (usually 128)
    pub partition_entry_size: u32,
    /// CRC32 of the partition entry array
    pub partition_entries_crc32: u32,
}

impl GptHeader {
    /// Minimum header size
    pub const MIN_SIZE: usize = 92;

    /// Parse a GPT header from its sector; `None` when the signature is
    /// absent
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::MIN_SIZE || &bytes[0..8] != GPT_SIGNATURE {
            return None;
        }

        let header_size = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let header_crc32 = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let current_lba = u64_at(bytes, 24);
        let backup_lba = u64_at(bytes, 32);
        let first_usable_lba = u64_at(bytes, 40);
        let last_usable_lba = u64_at(bytes, 48);
        let disk_guid = guid_at(bytes, 56);
        let partition_entries_lba = u64_at(bytes, 72);
        let num_partition_entries = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]);
        let partition_entry_size = u32::from_le_bytes([bytes[84], bytes[85], bytes[86], bytes[87]]);
        let partition_entries_crc32 =
            u32::from_le_bytes([bytes[88], bytes[89], bytes[90], bytes[91]]);

        Some(Self {
            header_size,
            header_crc32,
            current_lba,
            backup_lba,
            first_usable_lba,
            last_usable_lba,
            disk_guid,
            partition_entries_lba,
            num_partition_entries,
            partition_entry_size,
            partition_entries_crc32,
        })
    }

    /// Verify the header CRC32 against the raw header sector
    pub fn verify_header_crc32(&self, raw: &[u8]) -> bool {
        let size = self.header_size as usize;
        if size < Self::MIN_SIZE || size > raw.len() {
            return false;
        }

        let mut copy = raw[..size].to_vec();
        copy[16..20].fill(0);
        crc32fast::hash(&copy) == self.header_crc32
    }

    /// Verify the partition entry array CRC32
    pub fn verify_partition_entries_crc32(&self, entries: &[u8]) -> bool {
        crc32fast::hash(entries) == self.partition_entries_crc32
    }
}

/// One GPT partition entry (128 bytes)
#[derive(Debug, Clone)]
pub struct GptPartitionEntry {
    /// Partition type GUID (zero for unused slots)
    pub type_guid: Uuid,
    /// Unique partition GUID
    pub unique_guid: Uuid,
    /// First LBA of the partition
    pub first_lba: u64,
    /// Last LBA of the partition (inclusive)
    pub last_lba: u64,
    /// Attribute flags
    pub attributes: u64,
    /// Partition name (UTF-16LE on disk)
    pub name: String,
}

impl GptPartitionEntry {
    /// Standard entry size
    pub const SIZE: usize = 128;

    /// Parse one partition entry
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }

        let type_guid = guid_at(bytes, 0);
        let unique_guid = guid_at(bytes, 16);
        let first_lba = u64_at(bytes, 32);
        let last_lba = u64_at(bytes, 40);
        let attributes = u64_at(bytes, 48);

        let name_units: Vec<u16> = bytes[56..128]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        let name = String::from_utf16_lossy(&name_units);

        Some(Self {
            type_guid,
            unique_guid,
            first_lba,
            last_lba,
            attributes,
            name,
        })
    }

    /// True for all-zero (unused) slots
    pub fn is_unused(&self) -> bool {
        self.type_guid.is_nil()
    }

    /// Partition length in sectors
    pub fn size_lba(&self) -> u64 {
        self.last_lba.saturating_sub(self.first_lba) + 1
    }

    /// Human-readable name for the partition type GUID
    pub fn type_name(&self) -> &'static str {
        match self.type_guid.to_string().as_str() {
            "c12a7328-f81f-11d2-ba4b-00a0c93ec93b" => "EFI System",
            "ebd0a0a2-b9e5-4433-87c0-68b6b72699c7" => "Microsoft Basic Data",
            "e3c9e316-0b5c-4db8-817d-f92df00215ae" => "Microsoft Reserved",
            "de94bba4-06d1-4d40-a16a-bfd50179d6ac" => "Windows Recovery",
            "0fc63daf-8483-4772-8e79-3d69d8477de4" => "Linux Filesystem",
            "0657fd6d-a4ab-43c4-84e5-0933c84b4f4f" => "Linux Swap",
            _ => "GPT Partition",
        }
    }
}

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

/// GPT GUIDs store the first three fields little-endian
fn guid_at(bytes: &[u8], offset: usize) -> Uuid {
    let d1 = u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]);
    let d2 = u16::from_le_bytes([bytes[offset + 4], bytes[offset + 5]]);
    let d3 = u16::from_le_bytes([bytes[offset + 6], bytes[offset + 7]]);
    let mut d4 = [0u8; 8];
    d4.copy_from_slice(&bytes[offset + 8..offset + 16]);
    Uuid::from_fields(d1, d2, d3, &d4)
}
