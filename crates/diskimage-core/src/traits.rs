//! Core traits implemented by container and filesystem variants

use crate::error::{Error, Result};
use crate::types::{DirHandle, Item};

/// A lazy, finite sequence of items
///
/// Per-item corruption is reported in-band: a corrupt metadata record yields
/// one `Err(Error::CorruptEntry { .. })` and the sequence continues.
pub type ItemIter<'a> = Box<dyn Iterator<Item = Result<Item>> + Send + 'a>;

/// One opened disk-image container, presented as a logical byte stream
///
/// The logical stream is the decompressed, reassembled image content. For a
/// raw image the logical offset equals the physical offset; a structured
/// container translates it through its chunk layout.
pub trait Container: Send {
    /// Human-readable identifier for this container type
    fn identify(&self) -> &str;

    /// Total length of the logical stream in bytes
    fn length(&self) -> u64;

    /// Read at `offset`, returning the number of bytes read
    ///
    /// The read is short only at the end of the logical stream; an offset at
    /// or past the end reads zero bytes.
    fn read_logical_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Read exactly `buf.len()` bytes at `offset`
    ///
    /// Fails with [`Error::OutOfRange`] when the requested range extends past
    /// the logical stream length.
    fn read_logical_exact(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let length = buf.len() as u64;
        let end = offset
            .checked_add(length)
            .ok_or_else(|| Error::out_of_range(offset, length, self.length()))?;
        if end > self.length() {
            return Err(Error::out_of_range(offset, length, self.length()));
        }

        let mut done = 0usize;
        while done < buf.len() {
            let n = self.read_logical_at(offset + done as u64, &mut buf[done..])?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "container stream ended early",
                )));
            }
            done += n;
        }
        Ok(())
    }
}

/// One parsed filesystem within a volume
///
/// Implementations are read-only and immutable after open; all enumeration
/// sequences are restartable and deterministic against the same image.
pub trait FileSystem: Send + Sync {
    /// Human-readable identifier for this filesystem type
    fn identify(&self) -> &str;

    /// Filesystem metadata version ("3.1" for NTFS, "FAT16", ...)
    fn metadata_version(&self) -> &str;

    /// Allocation unit (cluster/block) size in bytes
    fn block_size(&self) -> u64;

    /// Handle of the root directory
    fn root(&self) -> DirHandle;

    /// Children of one directory (not recursive), in on-disk order
    fn list_directory(&self, dir: DirHandle) -> Result<ItemIter<'_>>;

    /// Directory handle for an item, or `None` when the item is not a
    /// directory
    fn directory_handle(&self, item: &Item) -> Result<Option<DirHandle>>;

    /// Handle of the item's parent directory; `None` signals an orphan
    fn resolve_parent(&self, item: &Item) -> Result<Option<DirHandle>>;

    /// Every item known to the filesystem's master metadata, including
    /// entries unreachable from the root (tagged orphan)
    fn all_items(&self) -> Result<ItemIter<'_>>;

    /// Read a file's content into memory
    ///
    /// Bounded by [`crate::limits::MAX_FILE_EXTRACT_SIZE`].
    fn read_file(&self, item: &Item) -> Result<Vec<u8>>;
}
