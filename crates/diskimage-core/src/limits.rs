//! Parsing limits and checked-arithmetic helpers
//!
//! Disk images are untrusted input. Every size that ends up in an allocation
//! or a multiplication goes through these helpers so that a crafted image
//! cannot exhaust memory or overflow an offset calculation.

use crate::Error;

/// Maximum sector size accepted (4KB, advanced format)
pub const MAX_SECTOR_SIZE: u32 = 4096;

/// Maximum allocation for a single parse buffer (256 MB)
pub const MAX_ALLOCATION_SIZE: usize = 256 * 1024 * 1024;

/// Maximum FAT table size (100 MB, covers very large FAT32)
pub const MAX_FAT_TABLE_SIZE: usize = 100 * 1024 * 1024;

/// Maximum NTFS MFT record size (64 KB)
pub const MAX_MFT_RECORD_SIZE: u32 = 64 * 1024;

/// Maximum directory entries read from one directory
pub const MAX_DIRECTORY_ENTRIES: usize = 100_000;

/// Maximum traversal depth for directory walks
pub const MAX_DIRECTORY_DEPTH: usize = 256;

/// Maximum file size extracted into memory (1 GB)
pub const MAX_FILE_EXTRACT_SIZE: u64 = 1024 * 1024 * 1024;

/// Maximum cluster chain length followed before assuming a loop
pub const MAX_CLUSTER_CHAIN_LENGTH: usize = 1_000_000;

/// Maximum file size eligible for memory mapping (16 GB)
pub const MAX_MMAP_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// Maximum number of image segment files
pub const MAX_SEGMENT_COUNT: usize = 1024;

/// Validate that a size is within an allocation limit
pub fn validate_allocation_size(size: u64, limit: usize, context: &str) -> crate::Result<usize> {
    if size > limit as u64 {
        return Err(Error::corrupt_header(format!(
            "{} size {} exceeds limit {}",
            context, size, limit
        )));
    }

    size.try_into()
        .map_err(|_| Error::corrupt_header(format!("{} size exceeds platform limits", context)))
}

/// Multiply two u64 values with overflow checking
pub fn checked_multiply_u64(a: u64, b: u64, context: &str) -> crate::Result<u64> {
    a.checked_mul(b)
        .ok_or_else(|| Error::corrupt_header(format!("{}: multiplication overflow", context)))
}

/// Multiply u32 values into a u64 with overflow checking
pub fn checked_multiply_u32_to_u64(a: u32, b: u32, context: &str) -> crate::Result<u64> {
    (a as u64)
        .checked_mul(b as u64)
        .ok_or_else(|| Error::corrupt_header(format!("{}: multiplication overflow", context)))
}

/// Convert u64 to usize, failing on 32-bit truncation
pub fn u64_to_usize(value: u64, context: &str) -> crate::Result<usize> {
    value.try_into().map_err(|_| {
        Error::corrupt_header(format!(
            "{}: value {} exceeds platform usize limit",
            context, value
        ))
    })
}

/// Validate that a sector size is a power of two within bounds
pub fn validate_sector_size(sector_size: u32) -> crate::Result<()> {
    if sector_size == 0 || sector_size > MAX_SECTOR_SIZE {
        return Err(Error::corrupt_header(format!(
            "invalid sector size: {} (must be 1-{})",
            sector_size, MAX_SECTOR_SIZE
        )));
    }

    if !sector_size.is_power_of_two() {
        return Err(Error::corrupt_header(format!(
            "sector size {} is not a power of 2",
            sector_size
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_allocation_size() {
        assert!(validate_allocation_size(1024, MAX_ALLOCATION_SIZE, "test").is_ok());
        assert!(validate_allocation_size(
            MAX_ALLOCATION_SIZE as u64 + 1,
            MAX_ALLOCATION_SIZE,
            "test"
        )
        .is_err());
    }

    #[test]
    fn test_checked_multiply_u64() {
        assert_eq!(checked_multiply_u64(1000, 512, "test").unwrap(), 512_000);
        assert!(checked_multiply_u64(u64::MAX, 2, "test").is_err());
    }

    #[test]
    fn test_validate_sector_size() {
        assert!(validate_sector_size(512).is_ok());
        assert!(validate_sector_size(4096).is_ok());
        assert!(validate_sector_size(0).is_err());
        assert!(validate_sector_size(8192).is_err());
        assert!(validate_sector_size(1000).is_err());
    }
}
