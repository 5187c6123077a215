//! FAT filesystem (FAT12/FAT16/FAT32, read-only)
//!
//! FAT keeps no master metadata table beyond its directory tree, so
//! `all_items` is a depth-first walk from the root and the orphan residual
//! is always empty. Deleted entries still present in their directory are
//! surfaced with the deleted flag; a deleted directory is listed but not
//! descended into, since its cluster chain may have been reallocated.
//!
//! Item identifiers are the volume-relative byte offset of the entry's
//! 8.3 directory record, which is unique and stable across runs. The root
//! directory has no record of its own and uses a reserved sentinel.

pub mod types;

use std::collections::HashSet;

use diskimage_core::limits::{
    validate_allocation_size, MAX_CLUSTER_CHAIN_LENGTH, MAX_DIRECTORY_DEPTH,
    MAX_DIRECTORY_ENTRIES, MAX_FAT_TABLE_SIZE, MAX_FILE_EXTRACT_SIZE,
};
use diskimage_core::{DirHandle, Error, FileSystem, Item, ItemIter, Result};
use diskimage_stream::LogicalStream;

use types::*;

/// Reserved item id of the root directory
///
/// Offset 0 is the boot sector, so no real directory entry can carry it.
pub const FAT_ROOT_ID: u64 = 0;

/// Probe for a FAT boot sector: jump opcode plus plausible BPB geometry
pub fn probe(boot: &[u8]) -> bool {
    if boot.len() < 512 || (boot[0] != 0xEB && boot[0] != 0xE9) {
        return false;
    }

    let bytes_per_sector = u16::from_le_bytes([boot[11], boot[12]]);
    let sectors_per_cluster = boot[13];
    let reserved_sectors = u16::from_le_bytes([boot[14], boot[15]]);
    let num_fats = boot[16];

    (512..=4096).contains(&bytes_per_sector)
        && bytes_per_sector.is_power_of_two()
        && sectors_per_cluster != 0
        && sectors_per_cluster.is_power_of_two()
        && reserved_sectors != 0
        && (1..=2).contains(&num_fats)
}

/// Where a directory's entries live
#[derive(Debug, Clone, Copy)]
enum DirSource {
    /// The fixed FAT12/16 root region
    FixedRoot,
    /// A cluster chain (subdirectories, and the FAT32 root)
    Cluster(u32),
}

/// FAT filesystem over one volume window
pub struct FatFileSystem {
    stream: LogicalStream,
    bpb: BiosParameterBlock,
    fat: Vec<u8>,
    fat32_root_cluster: u32,
    identifier: String,
    version: String,
}

impl FatFileSystem {
    /// Parse the BPB and load the first FAT copy of a volume
    pub fn open(stream: LogicalStream) -> Result<Self> {
        let mut boot = [0u8; 512];
        let mut setup = stream.clone();
        setup.read_exact_at(0, &mut boot)?;

        let bpb = BiosParameterBlock::from_bytes(&boot)?;
        let fat_size = validate_allocation_size(bpb.fat_size()?, MAX_FAT_TABLE_SIZE, "FAT table")?;

        let mut fat = vec![0u8; fat_size];
        setup.read_exact_at(bpb.fat_offset(), &mut fat)?;

        let fat32_root_cluster = if bpb.kind == FatKind::Fat32 {
            u32::from_le_bytes([boot[44], boot[45], boot[46], boot[47]])
        } else {
            0
        };

        let version = bpb.kind.to_string();
        let identifier = format!("{} filesystem", bpb.kind);

        tracing::debug!(
            kind = %bpb.kind,
            cluster_size = bpb.bytes_per_cluster(),
            total_sectors = bpb.total_sectors,
            "opened FAT volume"
        );

        Ok(Self {
            stream,
            bpb,
            fat,
            fat32_root_cluster,
            identifier,
            version,
        })
    }

    /// The parsed BIOS parameter block
    pub fn bpb(&self) -> &BiosParameterBlock {
        &self.bpb
    }

    /// Next cluster in a chain, or `None` at end of chain
    fn fat_entry(&self, cluster: u32) -> Option<u32> {
        fat_entry(&self.fat, self.bpb.kind, cluster)
    }

    /// Cluster chain from `start`, bounded against loops
    fn cluster_chain(&self, start: u32) -> Vec<u32> {
        let mut chain = Vec::new();
        let mut cluster = start;

        while cluster >= 2 && chain.len() < MAX_CLUSTER_CHAIN_LENGTH {
            chain.push(cluster);
            match self.fat_entry(cluster) {
                Some(next) => cluster = next,
                None => break,
            }
        }
        chain
    }

    /// Resolve a handle to the place its entries are stored
    ///
    /// Fails with `CorruptEntry` when the handle's record is not a live
    /// directory.
    fn directory_source(&self, stream: &mut LogicalStream, dir: DirHandle) -> Result<DirSource> {
        if dir.0 == FAT_ROOT_ID {
            return Ok(match self.bpb.kind {
                FatKind::Fat32 => DirSource::Cluster(self.fat32_root_cluster),
                _ => DirSource::FixedRoot,
            });
        }

        let mut raw = [0u8; DirectoryEntry::SIZE];
        stream.read_exact_at(dir.0, &mut raw)?;
        let entry = DirectoryEntry::from_bytes(&raw)
            .ok_or_else(|| Error::corrupt_entry(dir.0, "not a directory entry"))?;
        if !entry.is_directory() {
            return Err(Error::corrupt_entry(dir.0, "entry is not a directory"));
        }
        if entry.is_deleted {
            return Err(Error::corrupt_entry(dir.0, "directory entry is deleted"));
        }
        Ok(DirSource::Cluster(entry.first_cluster()))
    }

    /// Raw (offset, bytes) pairs of a directory's entry records
    fn directory_records(
        &self,
        stream: &mut LogicalStream,
        source: DirSource,
    ) -> Result<Vec<(u64, [u8; DirectoryEntry::SIZE])>> {
        let mut records = Vec::new();

        match source {
            DirSource::FixedRoot => {
                let offset = self.bpb.root_dir_offset()?;
                for index in 0..self.bpb.root_entries as u64 {
                    let entry_offset = offset + index * DirectoryEntry::SIZE as u64;
                    let mut raw = [0u8; DirectoryEntry::SIZE];
                    stream.read_exact_at(entry_offset, &mut raw)?;
                    if DirectoryEntry::is_end_marker(&raw) {
                        return Ok(records);
                    }
                    records.push((entry_offset, raw));
                }
            }
            DirSource::Cluster(start) => {
                let per_cluster = self.bpb.bytes_per_cluster() as u64 / DirectoryEntry::SIZE as u64;
                for cluster in self.cluster_chain(start) {
                    let base = self.bpb.cluster_offset(cluster)?;
                    for index in 0..per_cluster {
                        let entry_offset = base + index * DirectoryEntry::SIZE as u64;
                        let mut raw = [0u8; DirectoryEntry::SIZE];
                        stream.read_exact_at(entry_offset, &mut raw)?;
                        if DirectoryEntry::is_end_marker(&raw) {
                            return Ok(records);
                        }
                        records.push((entry_offset, raw));
                        if records.len() >= MAX_DIRECTORY_ENTRIES {
                            tracing::warn!(start, "directory entry limit reached");
                            return Ok(records);
                        }
                    }
                }
            }
        }

        Ok(records)
    }

    /// Children of one directory, in on-disk entry order
    fn read_children(&self, stream: &mut LogicalStream, source: DirSource, parent: u64) -> Result<Vec<Item>> {
        let records = self.directory_records(stream, source)?;
        let mut items = Vec::new();
        let mut pending_lfn: Vec<LfnEntry> = Vec::new();

        for (offset, raw) in records {
            if DirectoryEntry::is_lfn(&raw) {
                // LFN chunks of a deleted file lose their sequence byte too
                if raw[0] == DirectoryEntry::DELETED_MARKER {
                    pending_lfn.clear();
                } else if let Some(lfn) = LfnEntry::from_bytes(&raw) {
                    pending_lfn.push(lfn);
                }
                continue;
            }

            let Some(entry) = DirectoryEntry::from_bytes(&raw) else {
                pending_lfn.clear();
                continue;
            };
            if entry.is_volume_label() || entry.is_dot_entry() {
                pending_lfn.clear();
                continue;
            }

            let name = if entry.is_deleted {
                entry.name.clone()
            } else {
                assemble_long_name(&pending_lfn).unwrap_or_else(|| entry.name.clone())
            };
            pending_lfn.clear();

            let mut item = if entry.is_directory() {
                Item::directory(offset, name)
            } else {
                Item::file(offset, name, entry.file_size as u64)
            };
            item.is_deleted = entry.is_deleted;
            item.parent = Some(parent);
            item.created = dos_datetime_to_utc(entry.create_date, entry.create_time);
            item.modified = dos_datetime_to_utc(entry.modify_date, entry.modify_time);
            item.accessed = dos_date_to_utc(entry.access_date);
            items.push(item);
        }

        Ok(items)
    }

    /// Load the entry record behind an item id
    fn load_entry(&self, stream: &mut LogicalStream, id: u64) -> Result<DirectoryEntry> {
        if id == FAT_ROOT_ID {
            return Err(Error::not_found("the root directory has no entry record"));
        }
        let mut raw = [0u8; DirectoryEntry::SIZE];
        stream.read_exact_at(id, &mut raw)?;
        DirectoryEntry::from_bytes(&raw)
            .ok_or_else(|| Error::corrupt_entry(id, "not a directory entry"))
    }
}

/// Decode one FAT entry; `None` for end-of-chain and reserved values
fn fat_entry(table: &[u8], kind: FatKind, cluster: u32) -> Option<u32> {
    let value = match kind {
        FatKind::Fat12 => {
            let offset = cluster as usize + cluster as usize / 2;
            if offset + 1 >= table.len() {
                return None;
            }
            let pair = u16::from_le_bytes([table[offset], table[offset + 1]]);
            let value = if cluster & 1 == 0 {
                pair & 0x0FFF
            } else {
                pair >> 4
            };
            if value >= 0xFF8 {
                return None;
            }
            value as u32
        }
        FatKind::Fat16 => {
            let offset = cluster as usize * 2;
            if offset + 1 >= table.len() {
                return None;
            }
            let value = u16::from_le_bytes([table[offset], table[offset + 1]]);
            if value >= 0xFFF8 {
                return None;
            }
            value as u32
        }
        FatKind::Fat32 => {
            let offset = cluster as usize * 4;
            if offset + 3 >= table.len() {
                return None;
            }
            let value = u32::from_le_bytes([
                table[offset],
                table[offset + 1],
                table[offset + 2],
                table[offset + 3],
            ]) & 0x0FFF_FFFF;
            if value >= 0x0FFF_FFF8 {
                return None;
            }
            value
        }
    };

    // 0 (free) and 1 (reserved) terminate a chain as well
    if value < 2 {
        None
    } else {
        Some(value)
    }
}

impl FileSystem for FatFileSystem {
    fn identify(&self) -> &str {
        &self.identifier
    }

    fn metadata_version(&self) -> &str {
        &self.version
    }

    fn block_size(&self) -> u64 {
        self.bpb.bytes_per_cluster() as u64
    }

    fn root(&self) -> DirHandle {
        DirHandle(FAT_ROOT_ID)
    }

    fn list_directory(&self, dir: DirHandle) -> Result<ItemIter<'_>> {
        let mut stream = self.stream.clone();
        let source = self.directory_source(&mut stream, dir)?;
        let parent = dir.0;
        let items = self.read_children(&mut stream, source, parent)?;
        Ok(Box::new(items.into_iter().map(Ok)))
    }

    fn directory_handle(&self, item: &Item) -> Result<Option<DirHandle>> {
        // Deleted directories are not descendable: their chains may be
        // reallocated to live data.
        Ok((item.is_directory && !item.is_deleted).then_some(DirHandle(item.id)))
    }

    fn resolve_parent(&self, item: &Item) -> Result<Option<DirHandle>> {
        if item.is_orphan {
            return Ok(None);
        }
        let Some(parent) = item.parent else {
            return Ok(None);
        };
        if parent == FAT_ROOT_ID {
            return Ok(Some(self.root()));
        }

        let mut stream = self.stream.clone();
        match self.load_entry(&mut stream, parent) {
            Ok(entry) if entry.is_directory() && !entry.is_deleted => {
                Ok(Some(DirHandle(parent)))
            }
            Ok(_) | Err(_) => Ok(None),
        }
    }

    fn all_items(&self) -> Result<ItemIter<'_>> {
        let mut stream = self.stream.clone();
        let root_source = self.directory_source(&mut stream, self.root())?;
        let root_items = self.read_children(&mut stream, root_source, FAT_ROOT_ID)?;

        let mut visited = HashSet::new();
        if let DirSource::Cluster(cluster) = root_source {
            visited.insert(cluster);
        }

        Ok(Box::new(FatWalk {
            fs: self,
            stream,
            stack: vec![root_items.into_iter()],
            visited,
            deferred: None,
        }))
    }

    fn read_file(&self, item: &Item) -> Result<Vec<u8>> {
        let mut stream = self.stream.clone();
        let entry = self.load_entry(&mut stream, item.id)?;
        if entry.is_directory() {
            return Err(Error::not_found(format!("{} is a directory", entry.name)));
        }

        let size = entry.file_size as u64;
        if size > MAX_FILE_EXTRACT_SIZE {
            return Err(Error::unsupported(format!(
                "file size {} exceeds extraction limit {}",
                size, MAX_FILE_EXTRACT_SIZE
            )));
        }
        if size == 0 || entry.first_cluster() < 2 {
            return Ok(Vec::new());
        }

        let cluster_size = self.bpb.bytes_per_cluster() as u64;
        let mut content = Vec::with_capacity(size as usize);
        let mut remaining = size;

        for cluster in self.cluster_chain(entry.first_cluster()) {
            if remaining == 0 {
                break;
            }
            let want = remaining.min(cluster_size) as usize;
            let start = content.len();
            content.resize(start + want, 0);
            stream.read_exact_at(self.bpb.cluster_offset(cluster)?, &mut content[start..])?;
            remaining -= want as u64;
        }

        if remaining > 0 {
            return Err(Error::corrupt_entry(
                item.id,
                format!("cluster chain ends {} bytes short", remaining),
            ));
        }
        Ok(content)
    }
}

/// Depth-first preorder walk over the directory tree
///
/// An explicit stack of per-directory entry iterators bounds the depth; a
/// directory whose children cannot be read is still yielded, followed by one
/// `CorruptEntry` in place of its subtree, and the walk continues.
struct FatWalk<'a> {
    fs: &'a FatFileSystem,
    stream: LogicalStream,
    stack: Vec<std::vec::IntoIter<Item>>,
    visited: HashSet<u32>,
    deferred: Option<Error>,
}

impl Iterator for FatWalk<'_> {
    type Item = Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.deferred.take() {
            return Some(Err(error));
        }

        loop {
            let top = self.stack.last_mut()?;
            let Some(item) = top.next() else {
                self.stack.pop();
                continue;
            };

            if item.is_directory && !item.is_deleted && self.stack.len() < MAX_DIRECTORY_DEPTH {
                match self
                    .fs
                    .directory_source(&mut self.stream, DirHandle(item.id))
                {
                    Ok(DirSource::Cluster(cluster)) if !self.visited.insert(cluster) => {
                        tracing::warn!(cluster, "directory cluster chain loops, not descending");
                    }
                    Ok(source) => {
                        match self.fs.read_children(&mut self.stream, source, item.id) {
                            Ok(children) => self.stack.push(children.into_iter()),
                            Err(e) => {
                                tracing::warn!(id = item.id, error = %e, "unreadable directory");
                                self.deferred = Some(Error::corrupt_entry(
                                    item.id,
                                    format!("unreadable directory: {}", e),
                                ));
                            }
                        }
                    }
                    Err(e) => self.deferred = Some(e),
                }
            }

            return Some(Ok(item));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{build_fat12_image, FAT12_DELETED_NAME};
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

    fn open_image(data: Vec<u8>) -> FatFileSystem {
        let stream = LogicalStream::whole(&share_container(Box::new(MemoryContainer(data))));
        FatFileSystem::open(stream).unwrap()
    }

    fn collect_items(iter: ItemIter<'_>) -> Vec<Item> {
        iter.map(|i| i.unwrap()).collect()
    }

    #[test]
    fn test_open_reads_geometry() {
        let fs = open_image(build_fat12_image(false));
        assert_eq!(fs.identify(), "FAT12 filesystem");
        assert_eq!(fs.metadata_version(), "FAT12");
        assert_eq!(fs.block_size(), 512);
    }

    #[test]
    fn test_list_root_in_entry_order() {
        let fs = open_image(build_fat12_image(false));
        let items = collect_items(fs.list_directory(fs.root()).unwrap());
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["README.TXT", "DOCS"]);

        let readme = &items[0];
        assert!(!readme.is_directory);
        assert_eq!(readme.size, 10);
        assert_eq!(readme.parent, Some(FAT_ROOT_ID));
        assert!(readme.created.is_some());
        assert!(readme.modified.is_some());
        assert!(readme.accessed.is_some());

        assert!(items[1].is_directory);
    }

    #[test]
    fn test_list_directory_is_restartable() {
        let fs = open_image(build_fat12_image(true));
        let first: Vec<String> = collect_items(fs.list_directory(fs.root()).unwrap())
            .into_iter()
            .map(|i| i.name)
            .collect();
        let second: Vec<String> = collect_items(fs.list_directory(fs.root()).unwrap())
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_walk_descends_and_assembles_long_names() {
        let fs = open_image(build_fat12_image(false));
        let items = collect_items(fs.all_items().unwrap());
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["README.TXT", "DOCS", "A long file name.txt"]);

        let long = &items[2];
        assert_eq!(long.parent, Some(items[1].id));
        assert!(!long.is_orphan);

        // FAT has no master table beyond its directories: no orphans
        assert!(items.iter().all(|i| !i.is_orphan));
    }

    #[test]
    fn test_deleted_entry_surfaced_not_descended() {
        let fs = open_image(build_fat12_image(true));
        let items = collect_items(fs.all_items().unwrap());
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&FAT12_DELETED_NAME));

        let deleted = items.iter().find(|i| i.name == FAT12_DELETED_NAME).unwrap();
        assert!(deleted.is_deleted);
        assert_eq!(fs.directory_handle(deleted).unwrap(), None);
    }

    #[test]
    fn test_resolve_parent() {
        let fs = open_image(build_fat12_image(false));
        let items = collect_items(fs.all_items().unwrap());

        let docs = items.iter().find(|i| i.name == "DOCS").unwrap();
        let nested = items
            .iter()
            .find(|i| i.name == "A long file name.txt")
            .unwrap();

        assert_eq!(fs.resolve_parent(docs).unwrap(), Some(fs.root()));
        assert_eq!(fs.resolve_parent(nested).unwrap(), Some(DirHandle(docs.id)));
    }

    #[test]
    fn test_read_file_content() {
        let fs = open_image(build_fat12_image(false));
        let items = collect_items(fs.all_items().unwrap());

        let readme = items.iter().find(|i| i.name == "README.TXT").unwrap();
        assert_eq!(fs.read_file(readme).unwrap(), b"hello fat\n");

        let docs = items.iter().find(|i| i.name == "DOCS").unwrap();
        assert!(fs.read_file(docs).is_err());
    }

    #[test]
    fn test_fat_entry_decoding() {
        // FAT12: chain 2 -> 3 -> end
        let mut table = vec![0xF0, 0xFF, 0xFF, 0x00, 0x00, 0x00];
        table[3] = 0x03; // entry 2 = 3
        table[4] = 0x80; // entry 3 = 0xFF8 (end)
        table[5] = 0xFF;
        assert_eq!(fat_entry(&table, FatKind::Fat12, 2), Some(3));
        assert_eq!(fat_entry(&table, FatKind::Fat12, 3), None);
        assert_eq!(fat_entry(&table, FatKind::Fat12, 99), None);

        // FAT16: chain 2 -> 5 -> end
        let mut table = vec![0u8; 16];
        table[4..6].copy_from_slice(&5u16.to_le_bytes());
        table[10..12].copy_from_slice(&0xFFFFu16.to_le_bytes());
        assert_eq!(fat_entry(&table, FatKind::Fat16, 2), Some(5));
        assert_eq!(fat_entry(&table, FatKind::Fat16, 5), None);

        // FAT32: top nibble is reserved and masked off
        let mut table = vec![0u8; 16];
        table[8..12].copy_from_slice(&0xF000_0003u32.to_le_bytes());
        assert_eq!(fat_entry(&table, FatKind::Fat32, 2), Some(3));
        table[12..16].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
        assert_eq!(fat_entry(&table, FatKind::Fat32, 3), None);
    }
}
