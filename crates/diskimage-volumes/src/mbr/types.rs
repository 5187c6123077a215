//! MBR partition type codes

use std::fmt;

/// MBR partition type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbrPartitionType {
    /// Empty/unused entry
    Empty,
    /// FAT12, CHS
    Fat12,
    /// FAT16 < 32MB
    Fat16Small,
    /// Extended partition, CHS
    Extended,
    /// FAT16 >= 32MB
    Fat16,
    /// NTFS/exFAT/HPFS
    Ntfs,
    /// FAT32, CHS
    Fat32Chs,
    /// FAT32, LBA
    Fat32Lba,
    /// FAT16, LBA
    Fat16Lba,
    /// Extended partition, LBA
    ExtendedLba,
    /// Linux swap
    LinuxSwap,
    /// Linux native
    LinuxNative,
    /// GPT protective MBR
    GptProtective,
    /// EFI system partition
    EfiSystem,
    /// Anything else
    Unknown(u8),
}

impl MbrPartitionType {
    /// Partition type from its on-disk byte
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::Empty,
            0x01 => Self::Fat12,
            0x04 => Self::Fat16Small,
            0x05 => Self::Extended,
            0x06 => Self::Fat16,
            0x07 => Self::Ntfs,
            0x0B => Self::Fat32Chs,
            0x0C => Self::Fat32Lba,
            0x0E => Self::Fat16Lba,
            0x0F => Self::ExtendedLba,
            0x82 => Self::LinuxSwap,
            0x83 => Self::LinuxNative,
            0xEE => Self::GptProtective,
            0xEF => Self::EfiSystem,
            _ => Self::Unknown(b),
        }
    }

    /// Human-readable name for this partition type
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Fat12 => "FAT12",
            Self::Fat16Small => "FAT16 (<32MB)",
            Self::Extended => "Extended",
            Self::Fat16 => "FAT16",
            Self::Ntfs => "NTFS/exFAT",
            Self::Fat32Chs => "FAT32 (CHS)",
            Self::Fat32Lba => "FAT32 (LBA)",
            Self::Fat16Lba => "FAT16 (LBA)",
            Self::ExtendedLba => "Extended (LBA)",
            Self::LinuxSwap => "Linux swap",
            Self::LinuxNative => "Linux",
            Self::GptProtective => "GPT Protective",
            Self::EfiSystem => "EFI System",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for MbrPartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_type_from_byte() {
        assert_eq!(MbrPartitionType::from_byte(0x00), MbrPartitionType::Empty);
        assert_eq!(MbrPartitionType::from_byte(0x07), MbrPartitionType::Ntfs);
        assert_eq!(MbrPartitionType::from_byte(0x0C), MbrPartitionType::Fat32Lba);
        assert_eq!(
            MbrPartitionType::from_byte(0xEE),
            MbrPartitionType::GptProtective
        );
        assert!(matches!(
            MbrPartitionType::from_byte(0xFF),
            MbrPartitionType::Unknown(0xFF)
        ));
    }

    #[test]
    fn test_partition_type_name() {
        assert_eq!(MbrPartitionType::Fat32Lba.name(), "FAT32 (LBA)");
        assert_eq!(MbrPartitionType::LinuxNative.name(), "Linux");
        assert_eq!(MbrPartitionType::Unknown(0x42).name(), "Unknown");
    }
}
