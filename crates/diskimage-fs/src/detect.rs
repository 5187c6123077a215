//! Filesystem detection
//!
//! Probes a fixed, ordered list of boot-sector signatures at the start of a
//! volume. No match is a normal outcome (the volume is simply not listed);
//! a positive signature whose deeper parse fails is logged and likewise
//! yields no filesystem rather than failing the whole image.

use diskimage_core::{FileSystem, Result, Volume};
use diskimage_stream::LogicalStream;

use crate::fat::FatFileSystem;
use crate::ntfs::NtfsFileSystem;

/// Detect and open the filesystem of one volume
///
/// `stream` must window exactly the volume's byte range. Probe order is
/// fixed: NTFS, then FAT.
pub fn detect_filesystem(
    volume: &Volume,
    stream: LogicalStream,
) -> Result<Option<Box<dyn FileSystem>>> {
    if stream.length() < 512 {
        return Ok(None);
    }

    let mut boot = [0u8; 512];
    let mut probe_stream = stream.clone();
    probe_stream.read_exact_at(0, &mut boot)?;

    if crate::ntfs::probe(&boot) {
        match NtfsFileSystem::open(stream) {
            Ok(fs) => return Ok(Some(Box::new(fs))),
            Err(e) => {
                tracing::warn!(volume = volume.index, error = %e, "NTFS signature but unparsable volume");
                return Ok(None);
            }
        }
    }

    if crate::fat::probe(&boot) {
        match FatFileSystem::open(stream) {
            Ok(fs) => return Ok(Some(Box::new(fs))),
            Err(e) => {
                tracing::warn!(volume = volume.index, error = %e, "FAT signature but unparsable volume");
                return Ok(None);
            }
        }
    }

    tracing::debug!(volume = volume.index, "no filesystem signature matched");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;
    use diskimage_core::Container;
    use diskimage_stream::share_container;

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

    #[test]
    fn test_detect_ntfs() {
        let volume = Volume::unpartitioned(0);
        let fs = detect_filesystem(&volume, stream_over(testkit::build_ntfs_image()))
            .unwrap()
            .expect("NTFS volume should be detected");
        assert!(fs.identify().contains("NTFS"));
    }

    #[test]
    fn test_detect_fat() {
        let volume = Volume::unpartitioned(0);
        let fs = detect_filesystem(&volume, stream_over(testkit::build_fat12_image(false)))
            .unwrap()
            .expect("FAT volume should be detected");
        assert!(fs.identify().contains("FAT12"));
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let volume = Volume::unpartitioned(0);
        let result = detect_filesystem(&volume, stream_over(vec![0u8; 4096])).unwrap();
        assert!(result.is_none());

        // Too-small volumes are skipped, not failed
        let result = detect_filesystem(&volume, stream_over(vec![0u8; 64])).unwrap();
        assert!(result.is_none());
    }
}
