//! FAT on-disk structures
//!
//! The BIOS parameter block, 32-byte directory entries and long-file-name
//! entries, plus the DOS date/time conversions.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use diskimage_core::limits::{checked_multiply_u64, validate_sector_size};
use diskimage_core::{Error, Result};

/// FAT variant, decided by the data-region cluster count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatKind {
    Fat12,
    Fat16,
    Fat32,
}

impl fmt::Display for FatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatKind::Fat12 => write!(f, "FAT12"),
            FatKind::Fat16 => write!(f, "FAT16"),
            FatKind::Fat32 => write!(f, "FAT32"),
        }
    }
}

/// BIOS parameter block, common to all FAT variants
#[derive(Debug, Clone)]
pub struct BiosParameterBlock {
    /// Bytes per sector
    pub bytes_per_sector: u16,
    /// Sectors per cluster
    pub sectors_per_cluster: u8,
    /// Reserved sectors before the first FAT (includes the boot sector)
    pub reserved_sectors: u16,
    /// Number of FAT copies
    pub num_fats: u8,
    /// Fixed root directory entry count (0 for FAT32)
    pub root_entries: u16,
    /// Media descriptor byte
    pub media_descriptor: u8,
    /// Sectors per FAT (16-bit field, 0 for FAT32)
    pub sectors_per_fat_16: u16,
    /// Sectors per FAT (FAT32 extended field)
    pub sectors_per_fat_32: u32,
    /// Total sectors on the volume
    pub total_sectors: u32,
    /// Variant decided from the cluster count
    pub kind: FatKind,
}

impl BiosParameterBlock {
    /// Parse the BPB out of a boot sector
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 512 {
            return Err(Error::unsupported("FAT boot sector too short"));
        }

        let bytes_per_sector = u16::from_le_bytes([bytes[11], bytes[12]]);
        let sectors_per_cluster = bytes[13];
        let reserved_sectors = u16::from_le_bytes([bytes[14], bytes[15]]);
        let num_fats = bytes[16];
        let root_entries = u16::from_le_bytes([bytes[17], bytes[18]]);
        let total_sectors_16 = u16::from_le_bytes([bytes[19], bytes[20]]);
        let media_descriptor = bytes[21];
        let sectors_per_fat_16 = u16::from_le_bytes([bytes[22], bytes[23]]);
        let sectors_per_fat_32 =
            u32::from_le_bytes([bytes[36], bytes[37], bytes[38], bytes[39]]);
        let total_sectors_32 =
            u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]);

        validate_sector_size(bytes_per_sector as u32)
            .map_err(|_| Error::unsupported(format!("bad FAT sector size {}", bytes_per_sector)))?;
        if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
            return Err(Error::unsupported(format!(
                "bad sectors per cluster {}",
                sectors_per_cluster
            )));
        }
        if num_fats == 0 {
            return Err(Error::unsupported("zero FAT copies"));
        }
        if reserved_sectors == 0 {
            return Err(Error::unsupported("zero reserved sectors"));
        }

        let total_sectors = if total_sectors_16 != 0 {
            total_sectors_16 as u32
        } else {
            total_sectors_32
        };
        let sectors_per_fat = if sectors_per_fat_16 != 0 {
            sectors_per_fat_16 as u32
        } else {
            sectors_per_fat_32
        };
        if sectors_per_fat == 0 {
            return Err(Error::unsupported("zero sectors per FAT"));
        }

        let root_dir_sectors = (root_entries as u32 * DirectoryEntry::SIZE as u32)
            .div_ceil(bytes_per_sector as u32);
        let non_data = (reserved_sectors as u64)
            .checked_add(num_fats as u64 * sectors_per_fat as u64)
            .and_then(|v| v.checked_add(root_dir_sectors as u64))
            .ok_or_else(|| Error::unsupported("FAT geometry overflow"))?;
        let data_sectors = (total_sectors as u64)
            .checked_sub(non_data)
            .ok_or_else(|| Error::unsupported("FAT data region smaller than its metadata"))?;

        let cluster_count = data_sectors / sectors_per_cluster as u64;
        let kind = if cluster_count < 4085 {
            FatKind::Fat12
        } else if cluster_count < 65525 {
            FatKind::Fat16
        } else {
            FatKind::Fat32
        };

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            root_entries,
            media_descriptor,
            sectors_per_fat_16,
            sectors_per_fat_32,
            total_sectors,
            kind,
        })
    }

    /// Sectors per FAT, whichever field carries the value
    pub fn sectors_per_fat(&self) -> u32 {
        if self.sectors_per_fat_16 != 0 {
            self.sectors_per_fat_16 as u32
        } else {
            self.sectors_per_fat_32
        }
    }

    /// Bytes per cluster
    pub fn bytes_per_cluster(&self) -> u32 {
        self.sectors_per_cluster as u32 * self.bytes_per_sector as u32
    }

    /// Byte offset of the first FAT copy
    pub fn fat_offset(&self) -> u64 {
        self.reserved_sectors as u64 * self.bytes_per_sector as u64
    }

    /// Size of one FAT copy in bytes
    pub fn fat_size(&self) -> Result<u64> {
        checked_multiply_u64(
            self.sectors_per_fat() as u64,
            self.bytes_per_sector as u64,
            "FAT table size",
        )
    }

    /// Byte offset of the fixed root directory (FAT12/16)
    pub fn root_dir_offset(&self) -> Result<u64> {
        let fats = checked_multiply_u64(
            self.num_fats as u64,
            self.fat_size()?,
            "FAT region size",
        )?;
        self.fat_offset()
            .checked_add(fats)
            .ok_or_else(|| Error::unsupported("root directory offset overflow"))
    }

    /// Byte offset of the data region (cluster 2)
    pub fn data_offset(&self) -> Result<u64> {
        let root_dir_bytes = (self.root_entries as u64 * DirectoryEntry::SIZE as u64)
            .next_multiple_of(self.bytes_per_sector as u64);
        self.root_dir_offset()?
            .checked_add(root_dir_bytes)
            .ok_or_else(|| Error::unsupported("data region offset overflow"))
    }

    /// Volume-relative byte offset of a data cluster
    pub fn cluster_offset(&self, cluster: u32) -> Result<u64> {
        let index = cluster.saturating_sub(2) as u64;
        let bytes = checked_multiply_u64(
            index,
            self.bytes_per_cluster() as u64,
            "cluster offset",
        )?;
        self.data_offset()?
            .checked_add(bytes)
            .ok_or_else(|| Error::unsupported("cluster offset overflow"))
    }
}

/// One 32-byte FAT directory entry
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// 8.3 name with the dot restored; a deleted entry's lost first byte is
    /// rendered as `_`
    pub name: String,
    /// Attribute flags
    pub attributes: u8,
    /// True when the first name byte carries the 0xE5 deletion marker
    pub is_deleted: bool,
    /// Creation time (DOS encoding)
    pub create_time: u16,
    /// Creation date (DOS encoding)
    pub create_date: u16,
    /// Last access date (DOS encoding, day precision)
    pub access_date: u16,
    /// High half of the first cluster (FAT32)
    pub first_cluster_high: u16,
    /// Modification time (DOS encoding)
    pub modify_time: u16,
    /// Modification date (DOS encoding)
    pub modify_date: u16,
    /// Low half of the first cluster
    pub first_cluster_low: u16,
    /// File size in bytes
    pub file_size: u32,
}

impl DirectoryEntry {
    /// Entry size on disk
    pub const SIZE: usize = 32;

    /// Read-only
    pub const ATTR_READ_ONLY: u8 = 0x01;
    /// Hidden
    pub const ATTR_HIDDEN: u8 = 0x02;
    /// System
    pub const ATTR_SYSTEM: u8 = 0x04;
    /// Volume label
    pub const ATTR_VOLUME_ID: u8 = 0x08;
    /// Directory
    pub const ATTR_DIRECTORY: u8 = 0x10;
    /// Archive
    pub const ATTR_ARCHIVE: u8 = 0x20;
    /// Long-file-name marker (all four low attribute bits)
    pub const ATTR_LONG_NAME: u8 = 0x0F;

    /// First byte marking the end of a directory
    pub const END_OF_DIRECTORY: u8 = 0x00;
    /// First byte marking a deleted entry
    pub const DELETED_MARKER: u8 = 0xE5;

    /// True for the 0x00 end-of-directory sentinel
    pub fn is_end_marker(raw: &[u8]) -> bool {
        raw.first() == Some(&Self::END_OF_DIRECTORY)
    }

    /// True for a long-file-name entry
    pub fn is_lfn(raw: &[u8]) -> bool {
        raw.len() >= 12 && raw[11] == Self::ATTR_LONG_NAME
    }

    /// Parse one entry; `None` for short buffers and the end sentinel
    ///
    /// Deleted entries parse with `is_deleted` set; their remaining metadata
    /// (size, timestamps, attributes) is still on disk and surfaced as-is.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < Self::SIZE || Self::is_end_marker(raw) {
            return None;
        }

        let is_deleted = raw[0] == Self::DELETED_MARKER;
        let mut name_bytes = [0u8; 11];
        name_bytes.copy_from_slice(&raw[0..11]);
        if is_deleted {
            name_bytes[0] = b'_';
        }

        Some(Self {
            name: short_name(&name_bytes),
            attributes: raw[11],
            is_deleted,
            create_time: u16::from_le_bytes([raw[14], raw[15]]),
            create_date: u16::from_le_bytes([raw[16], raw[17]]),
            access_date: u16::from_le_bytes([raw[18], raw[19]]),
            first_cluster_high: u16::from_le_bytes([raw[20], raw[21]]),
            modify_time: u16::from_le_bytes([raw[22], raw[23]]),
            modify_date: u16::from_le_bytes([raw[24], raw[25]]),
            first_cluster_low: u16::from_le_bytes([raw[26], raw[27]]),
            file_size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        })
    }

    /// True when the directory attribute bit is set
    pub fn is_directory(&self) -> bool {
        self.attributes & Self::ATTR_DIRECTORY != 0
    }

    /// True when the entry is a volume label
    pub fn is_volume_label(&self) -> bool {
        self.attributes & Self::ATTR_VOLUME_ID != 0
    }

    /// True for the `.` and `..` self references
    pub fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    /// First cluster of the entry's data
    pub fn first_cluster(&self) -> u32 {
        ((self.first_cluster_high as u32) << 16) | self.first_cluster_low as u32
    }
}

/// Assemble an 8.3 name from its padded on-disk form
fn short_name(bytes: &[u8; 11]) -> String {
    let base: String = bytes[0..8]
        .iter()
        .take_while(|&&b| b != 0x20)
        .map(|&b| b as char)
        .collect();
    let ext: String = bytes[8..11]
        .iter()
        .take_while(|&&b| b != 0x20)
        .map(|&b| b as char)
        .collect();

    if ext.is_empty() {
        base
    } else {
        format!("{}.{}", base, ext)
    }
}

/// One long-file-name entry: a sequence number and 13 UTF-16 units
#[derive(Debug, Clone)]
pub struct LfnEntry {
    /// Sequence number (1-based; bit 6 marks the final chunk)
    pub sequence: u8,
    /// The 13 name units carried by this entry
    pub units: [u16; 13],
}

impl LfnEntry {
    /// Sequence bit marking the last (highest) chunk of a name
    pub const LAST_ENTRY: u8 = 0x40;

    /// Parse a long-file-name entry
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < DirectoryEntry::SIZE || !DirectoryEntry::is_lfn(raw) {
            return None;
        }

        let mut units = [0u16; 13];
        let positions = [1usize, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
        for (unit, &pos) in units.iter_mut().zip(positions.iter()) {
            *unit = u16::from_le_bytes([raw[pos], raw[pos + 1]]);
        }

        Some(Self {
            sequence: raw[0],
            units,
        })
    }

    /// Chunk position within the assembled name (1-based)
    pub fn ordinal(&self) -> u8 {
        self.sequence & 0x1F
    }
}

/// Assemble a long name from its accumulated entries
///
/// Entries are stored on disk last-chunk-first; ordering here goes by the
/// ordinal so accumulation order does not matter. `None` when no entries
/// were collected or the chunks do not form a contiguous 1..n run.
pub fn assemble_long_name(entries: &[LfnEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    let mut ordered: Vec<&LfnEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.ordinal());
    for (i, entry) in ordered.iter().enumerate() {
        if entry.ordinal() as usize != i + 1 {
            return None;
        }
    }

    let mut units = Vec::with_capacity(ordered.len() * 13);
    for entry in ordered {
        units.extend_from_slice(&entry.units);
    }
    // Names are null-terminated and 0xFFFF-padded to the chunk boundary
    let end = units
        .iter()
        .position(|&u| u == 0x0000)
        .unwrap_or(units.len());
    units.truncate(end);
    while units.last() == Some(&0xFFFF) {
        units.pop();
    }

    if units.is_empty() {
        None
    } else {
        Some(String::from_utf16_lossy(&units))
    }
}

/// Convert a DOS date/time pair to UTC; a zero date maps to `None`
pub fn dos_datetime_to_utc(date: u16, time: u16) -> Option<DateTime<Utc>> {
    if date == 0 {
        return None;
    }

    let day = (date & 0x1F) as u32;
    let month = ((date >> 5) & 0x0F) as u32;
    let year = 1980 + ((date >> 9) & 0x7F) as i32;

    let second = ((time & 0x1F) * 2) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let hour = ((time >> 11) & 0x1F) as u32;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

/// Convert a DOS date (no time half) to UTC midnight
pub fn dos_date_to_utc(date: u16) -> Option<DateTime<Utc>> {
    dos_datetime_to_utc(date, 0)
}
