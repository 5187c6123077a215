//! Volume locator
//!
//! Scans the start of the logical stream for a partition table and yields
//! the ordered volume list. When no table is recognized (or sector 0 already
//! carries a filesystem boot sector, whose 0xAA55 marker would otherwise be
//! mistaken for an MBR) the whole stream becomes one unpartitioned volume.

use diskimage_core::{Error, Result, Volume};
use diskimage_stream::LogicalStream;

use crate::gpt::GptTable;
use crate::mbr::MbrTable;

/// Sector size assumed for partition table addressing
pub const SECTOR_SIZE: u32 = 512;

/// Locate the volumes of a logical stream
///
/// Returned volumes never overlap and all lie within `[0, stream.length())`;
/// a table violating that fails with [`Error::InvalidVolumeTable`]. An empty
/// stream fails with [`Error::NoVolumesFound`].
pub fn locate(stream: &mut LogicalStream) -> Result<Vec<Volume>> {
    let total = stream.length();
    if total == 0 {
        return Err(Error::NoVolumesFound);
    }
    if total < SECTOR_SIZE as u64 {
        return Ok(vec![Volume::unpartitioned(total)]);
    }

    let mut sector = [0u8; SECTOR_SIZE as usize];
    stream.read_exact_at(0, &mut sector)?;

    if boot_sector_is_filesystem(&sector) {
        tracing::debug!("sector 0 is a filesystem boot sector, image is unpartitioned");
        return Ok(vec![Volume::unpartitioned(total)]);
    }

    let boot_signature = u16::from_le_bytes([sector[0x1FE], sector[0x1FF]]);
    if boot_signature != MbrTable::BOOT_SIGNATURE {
        return Ok(vec![Volume::unpartitioned(total)]);
    }

    let mbr = MbrTable::parse(&sector)?;
    let volumes = if mbr.is_gpt_protective() {
        GptTable::parse(stream, SECTOR_SIZE)?.volumes(SECTOR_SIZE)
    } else {
        mbr.volumes(SECTOR_SIZE)
    };

    if volumes.is_empty() {
        return Ok(vec![Volume::unpartitioned(total)]);
    }

    validate_volumes(&volumes, total)?;
    Ok(volumes)
}

/// Heuristic for NTFS/FAT boot sectors
fn boot_sector_is_filesystem(sector: &[u8]) -> bool {
    if &sector[3..11] == b"NTFS    " {
        return true;
    }

    // FAT-family boot sector: jump instruction plus plausible BPB geometry
    if sector[0] != 0xEB && sector[0] != 0xE9 {
        return false;
    }
    let bytes_per_sector = u16::from_le_bytes([sector[11], sector[12]]);
    let sectors_per_cluster = sector[13];
    let num_fats = sector[16];

    bytes_per_sector.is_power_of_two()
        && (512..=4096).contains(&bytes_per_sector)
        && sectors_per_cluster != 0
        && sectors_per_cluster.is_power_of_two()
        && (1..=2).contains(&num_fats)
}

/// Reject overlapping, self-referencing or out-of-bounds volumes
fn validate_volumes(volumes: &[Volume], total: u64) -> Result<()> {
    for volume in volumes {
        if volume.start_offset == 0 {
            return Err(Error::invalid_volume_table(format!(
                "partition {} starts inside the partition table",
                volume.index
            )));
        }
        if volume.end() > total {
            return Err(Error::invalid_volume_table(format!(
                "partition {} extends to {} but the stream ends at {}",
                volume.index,
                volume.end(),
                total
            )));
        }
    }

    let mut sorted: Vec<&Volume> = volumes.iter().collect();
    sorted.sort_by_key(|v| v.start_offset);
    for pair in sorted.windows(2) {
        if pair[1].start_offset < pair[0].end() {
            return Err(Error::invalid_volume_table(format!(
                "partitions {} and {} overlap",
                pair[0].index, pair[1].index
            )));
        }
    }

    Ok(())
}
