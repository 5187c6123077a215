//! NTFS filesystem (read-only, hand-parsed MFT)
//!
//! The Master File Table is the filesystem's master metadata: one record per
//! file or directory. Enumeration is driven entirely by the MFT:
//!
//! - `list_directory` yields the records whose parent reference points at
//!   the directory, in MFT record order (this variant's deterministic
//!   on-disk order)
//! - `all_items` composes two passes: an explicit-stack walk from the root
//!   record over a parent index, then a residual sweep of every master-table
//!   record the walk never reached; residual entries are the orphans
//!
//! Records that fail their signature or fixup checks surface as
//! `CorruptEntry` results in the sequence and never abort the traversal.

pub mod types;

use std::collections::{BTreeMap, HashMap, HashSet};

use diskimage_core::limits::{
    MAX_DIRECTORY_DEPTH, MAX_FILE_EXTRACT_SIZE, MAX_MFT_RECORD_SIZE,
};
use diskimage_core::{DirHandle, Error, FileSystem, Item, ItemIter, Result};
use diskimage_stream::LogicalStream;

use types::*;

/// Probe for an NTFS boot sector
pub fn probe(boot: &[u8]) -> bool {
    boot.len() >= 512 && &boot[3..11] == b"NTFS    "
}

/// One contiguous extent of the MFT
#[derive(Debug, Clone)]
struct MftExtent {
    vcn: u64,
    lcn: u64,
    clusters: u64,
}

/// A parsed base MFT record, reduced to what enumeration needs
#[derive(Debug, Clone)]
struct NtfsRecord {
    number: u64,
    name: String,
    parent: u64,
    is_directory: bool,
    in_use: bool,
    size: u64,
    created: u64,
    modified: u64,
    accessed: u64,
}

/// NTFS filesystem over one volume window
pub struct NtfsFileSystem {
    stream: LogicalStream,
    record_size: u32,
    bytes_per_cluster: u32,
    mft_extents: Vec<MftExtent>,
    record_count: u64,
    version: String,
    identifier: String,
}

impl NtfsFileSystem {
    /// Parse the boot sector and MFT layout of a volume
    pub fn open(stream: LogicalStream) -> Result<Self> {
        let mut boot_bytes = [0u8; 512];
        let mut setup = stream.clone();
        setup.read_exact_at(0, &mut boot_bytes)?;

        let boot = NtfsBootSector::from_bytes(&boot_bytes)
            .filter(|b| b.is_valid())
            .ok_or_else(|| Error::unsupported("not an NTFS boot sector"))?;

        let record_size = boot.bytes_per_mft_record();
        if record_size < 256 || record_size > MAX_MFT_RECORD_SIZE || !record_size.is_power_of_two()
        {
            return Err(Error::unsupported(format!(
                "implausible MFT record size {}",
                record_size
            )));
        }
        let bytes_per_cluster = boot.bytes_per_cluster();

        // Record 0 describes the MFT itself; its $DATA runs give us the
        // extent map and the total record count.
        let mft_offset = boot.mft_cluster_number * bytes_per_cluster as u64;
        let mut record0 = vec![0u8; record_size as usize];
        setup.read_exact_at(mft_offset, &mut record0)?;

        let header = MftRecordHeader::from_bytes(&record0)
            .filter(|h| h.is_file_record())
            .ok_or_else(|| Error::unsupported("MFT record 0 is not a FILE record"))?;
        apply_fixup(&mut record0, &header)
            .map_err(|e| Error::unsupported(format!("MFT record 0: {}", e)))?;

        let (extents, data_size) = parse_mft_extents(&record0, &header, bytes_per_cluster)?;
        let mut record_count = data_size / record_size as u64;
        let stream_cap = setup.length() / record_size as u64;
        if record_count > stream_cap {
            tracing::warn!(
                record_count,
                stream_cap,
                "MFT claims more records than the volume can hold"
            );
            record_count = stream_cap;
        }

        let mut fs = Self {
            stream,
            record_size,
            bytes_per_cluster,
            mft_extents: extents,
            record_count,
            version: String::from("3.1"),
            identifier: String::new(),
        };

        // Best-effort $Volume version; the 3.1 default stands otherwise
        if let Ok(Some(version)) = fs.read_volume_version(&mut setup) {
            fs.version = version;
        }
        fs.identifier = format!("NTFS v{} filesystem", fs.version);

        tracing::debug!(
            records = fs.record_count,
            record_size = fs.record_size,
            cluster_size = fs.bytes_per_cluster,
            "opened NTFS volume"
        );

        Ok(fs)
    }

    /// Number of records in the master file table
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Map a VCN within the MFT to an absolute LCN
    fn mft_vcn_to_lcn(&self, vcn: u64) -> Option<u64> {
        self.mft_extents
            .iter()
            .find(|e| vcn >= e.vcn && vcn < e.vcn + e.clusters)
            .map(|e| e.lcn + (vcn - e.vcn))
    }

    /// Read a byte range out of the MFT, following its extents
    fn read_mft_bytes(
        &self,
        stream: &mut LogicalStream,
        byte_index: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        let bpc = self.bytes_per_cluster as u64;
        let mut done = 0usize;

        while done < buf.len() {
            let cur = byte_index + done as u64;
            let vcn = cur / bpc;
            let within = cur % bpc;
            let lcn = self
                .mft_vcn_to_lcn(vcn)
                .ok_or_else(|| Error::corrupt_entry(cur / self.record_size as u64, "record outside MFT extents"))?;

            let want = ((bpc - within) as usize).min(buf.len() - done);
            stream.read_exact_at(lcn * bpc + within, &mut buf[done..done + want])?;
            done += want;
        }
        Ok(())
    }

    /// Load one base record; `Ok(None)` for free slots, extension records
    /// and nameless metadata holders
    fn load_record(&self, stream: &mut LogicalStream, number: u64) -> Result<Option<NtfsRecord>> {
        let raw = self.read_record_raw(stream, number)?;
        let Some((header, data)) = self.decode_record(number, raw)? else {
            return Ok(None);
        };

        let mut best_rank = 0u8;
        let mut name: Option<FileNameAttribute> = None;
        let mut info: Option<StandardInformation> = None;
        let mut size = 0u64;

        for (attr, slice) in attributes(&data, &header) {
            match attr.attribute_type {
                ATTR_STANDARD_INFORMATION => {
                    if let Some(value) =
                        ResidentAttribute::from_bytes(slice).and_then(|r| r.value(slice).map(|v| v.to_vec()))
                    {
                        info = StandardInformation::from_bytes(&value);
                    }
                }
                ATTR_FILE_NAME => {
                    if let Some(parsed) = ResidentAttribute::from_bytes(slice)
                        .and_then(|r| r.value(slice))
                        .and_then(FileNameAttribute::from_bytes)
                    {
                        let rank = namespace_rank(parsed.namespace);
                        if name.is_none() || rank > best_rank {
                            best_rank = rank;
                            name = Some(parsed);
                        }
                    }
                }
                ATTR_DATA if attr.name_length == 0 => {
                    if attr.non_resident {
                        if let Some(nr) = NonResidentAttribute::from_bytes(slice) {
                            size = nr.data_size;
                        }
                    } else if let Some(r) = ResidentAttribute::from_bytes(slice) {
                        size = r.value_length as u64;
                    }
                }
                _ => {}
            }
        }

        let Some(file_name) = name else {
            // Metadata holders without a $FILE_NAME are not items
            return Ok(None);
        };

        let (created, modified, accessed) = match &info {
            Some(si) => (si.creation_time, si.modification_time, si.access_time),
            None => (
                file_name.creation_time,
                file_name.modification_time,
                file_name.access_time,
            ),
        };

        Ok(Some(NtfsRecord {
            number,
            parent: file_name.parent_record_number(),
            name: file_name.name,
            is_directory: header.is_directory(),
            in_use: header.is_in_use(),
            size: if header.is_directory() { 0 } else { size.max(file_name.data_size) },
            created,
            modified,
            accessed,
        }))
    }

    /// Read the raw bytes of record `number`
    fn read_record_raw(&self, stream: &mut LogicalStream, number: u64) -> Result<Vec<u8>> {
        if number >= self.record_count {
            return Err(Error::out_of_range(
                number * self.record_size as u64,
                self.record_size as u64,
                self.record_count * self.record_size as u64,
            ));
        }

        let mut raw = vec![0u8; self.record_size as usize];
        self.read_mft_bytes(stream, number * self.record_size as u64, &mut raw)?;
        Ok(raw)
    }

    /// Validate the signature and fixups of a raw record
    ///
    /// `Ok(None)` for free (zeroed) slots and extension records;
    /// `CorruptEntry` for torn or mislabeled records.
    fn decode_record(
        &self,
        number: u64,
        mut raw: Vec<u8>,
    ) -> Result<Option<(MftRecordHeader, Vec<u8>)>> {
        if raw[0..4] == [0, 0, 0, 0] {
            return Ok(None);
        }

        let header = MftRecordHeader::from_bytes(&raw)
            .ok_or_else(|| Error::corrupt_entry(number, "record header too short"))?;
        if !header.is_file_record() {
            return Err(Error::corrupt_entry(number, "bad record signature"));
        }
        apply_fixup(&mut raw, &header).map_err(|e| Error::corrupt_entry(number, e))?;

        if !header.is_base_record() {
            return Ok(None);
        }
        Ok(Some((header, raw)))
    }

    /// NTFS version from `$Volume`'s `$VOLUME_INFORMATION`
    fn read_volume_version(&self, stream: &mut LogicalStream) -> Result<Option<String>> {
        if VOLUME_RECORD >= self.record_count {
            return Ok(None);
        }
        let raw = self.read_record_raw(stream, VOLUME_RECORD)?;
        let Some((header, data)) = self.decode_record(VOLUME_RECORD, raw)? else {
            return Ok(None);
        };

        for (attr, slice) in attributes(&data, &header) {
            if attr.attribute_type == ATTR_VOLUME_INFORMATION && !attr.non_resident {
                if let Some(vi) = ResidentAttribute::from_bytes(slice)
                    .and_then(|r| r.value(slice))
                    .and_then(VolumeInformation::from_bytes)
                {
                    return Ok(Some(format!("{}.{}", vi.major_version, vi.minor_version)));
                }
            }
        }
        Ok(None)
    }

    fn record_to_item(&self, record: &NtfsRecord) -> Item {
        let mut item = if record.is_directory {
            Item::directory(record.number, record.name.clone())
        } else {
            Item::file(record.number, record.name.clone(), record.size)
        };
        item.is_deleted = !record.in_use;
        item.parent = Some(record.parent);
        item.created = filetime_to_datetime(record.created);
        item.modified = filetime_to_datetime(record.modified);
        item.accessed = filetime_to_datetime(record.accessed);
        item
    }

    /// One sweep over the master table: parent index, directory flags and
    /// the records that failed to parse
    #[allow(clippy::type_complexity)]
    fn sweep_master_table(
        &self,
        stream: &mut LogicalStream,
    ) -> Result<(BTreeMap<u64, Vec<u64>>, HashMap<u64, bool>, HashMap<u64, String>)> {
        let mut children: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        let mut directories: HashMap<u64, bool> = HashMap::new();
        let mut corrupt: HashMap<u64, String> = HashMap::new();

        for number in 0..self.record_count {
            match self.load_record(stream, number) {
                Ok(Some(record)) => {
                    directories.insert(number, record.is_directory);
                    if record.parent != number {
                        children.entry(record.parent).or_default().push(number);
                    }
                }
                Ok(None) => {}
                Err(Error::CorruptEntry { id, reason }) => {
                    corrupt.insert(id, reason);
                }
                Err(e) => return Err(e),
            }
        }

        Ok((children, directories, corrupt))
    }
}

/// Iterate a record's attribute list
fn attributes<'a>(data: &'a [u8], header: &MftRecordHeader) -> AttributeCursor<'a> {
    AttributeCursor {
        data,
        offset: header.first_attribute_offset as usize,
    }
}

struct AttributeCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for AttributeCursor<'a> {
    type Item = (AttributeHeader, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + 16 > self.data.len() {
            return None;
        }
        let header = AttributeHeader::from_bytes(&self.data[self.offset..])?;
        if header.attribute_type == ATTR_END_MARKER || header.length < 16 {
            return None;
        }
        let end = self.offset.checked_add(header.length as usize)?;
        if end > self.data.len() {
            return None;
        }

        let slice = &self.data[self.offset..end];
        self.offset = end;
        Some((header, slice))
    }
}

/// Extract the MFT's own extent map from record 0
fn parse_mft_extents(
    record0: &[u8],
    header: &MftRecordHeader,
    bytes_per_cluster: u32,
) -> Result<(Vec<MftExtent>, u64)> {
    for (attr, slice) in attributes(record0, header) {
        if attr.attribute_type != ATTR_DATA || attr.name_length != 0 {
            continue;
        }
        if !attr.non_resident {
            return Err(Error::unsupported("resident MFT $DATA attribute"));
        }
        let nr = NonResidentAttribute::from_bytes(slice)
            .ok_or_else(|| Error::unsupported("truncated MFT $DATA attribute"))?;

        let runs_offset = nr.data_runs_offset as usize;
        if runs_offset >= slice.len() {
            return Err(Error::unsupported("MFT data runs out of bounds"));
        }
        let (runs, _) = decode_runs(&slice[runs_offset..]);

        let mut extents = Vec::with_capacity(runs.len());
        let mut vcn = nr.lowest_vcn;
        for run in runs {
            if run.is_sparse {
                return Err(Error::unsupported("sparse run inside the MFT"));
            }
            extents.push(MftExtent {
                vcn,
                lcn: run.lcn,
                clusters: run.cluster_count,
            });
            vcn += run.cluster_count;
        }
        if extents.is_empty() {
            return Err(Error::unsupported("MFT $DATA has no runs"));
        }

        let covered = vcn * bytes_per_cluster as u64;
        return Ok((extents, nr.data_size.min(covered)));
    }

    Err(Error::unsupported("MFT record 0 has no $DATA attribute"))
}

impl FileSystem for NtfsFileSystem {
    fn identify(&self) -> &str {
        &self.identifier
    }

    fn metadata_version(&self) -> &str {
        &self.version
    }

    fn block_size(&self) -> u64 {
        self.bytes_per_cluster as u64
    }

    fn root(&self) -> DirHandle {
        DirHandle(ROOT_RECORD)
    }

    fn list_directory(&self, dir: DirHandle) -> Result<ItemIter<'_>> {
        let mut stream = self.stream.clone();
        let record = self
            .load_record(&mut stream, dir.0)?
            .ok_or_else(|| Error::not_found(format!("no record {}", dir.0)))?;
        if !record.is_directory {
            return Err(Error::not_found(format!("record {} is not a directory", dir.0)));
        }

        Ok(Box::new(DirectoryScan {
            fs: self,
            stream,
            next: 0,
            parent: dir.0,
        }))
    }

    fn directory_handle(&self, item: &Item) -> Result<Option<DirHandle>> {
        Ok(item.is_directory.then_some(DirHandle(item.id)))
    }

    fn resolve_parent(&self, item: &Item) -> Result<Option<DirHandle>> {
        if item.is_orphan {
            return Ok(None);
        }
        let Some(parent) = item.parent else {
            return Ok(None);
        };

        let mut stream = self.stream.clone();
        match self.load_record(&mut stream, parent) {
            Ok(Some(record)) if record.is_directory => Ok(Some(DirHandle(parent))),
            Ok(_) | Err(_) => Ok(None),
        }
    }

    fn all_items(&self) -> Result<ItemIter<'_>> {
        let mut stream = self.stream.clone();
        let (children, directories, corrupt) = self.sweep_master_table(&mut stream)?;

        // Pass (a): explicit-stack preorder walk from the root record
        let mut plan: Vec<Planned> = Vec::new();
        let mut visited: HashSet<u64> = HashSet::new();
        visited.insert(ROOT_RECORD);

        let empty: Vec<u64> = Vec::new();
        let mut stack: Vec<(u64, usize)> = vec![(ROOT_RECORD, 0)];
        while let Some((dir, index)) = stack.last_mut() {
            let kids = children.get(dir).unwrap_or(&empty);
            let Some(&child) = kids.get(*index) else {
                stack.pop();
                continue;
            };
            *index += 1;

            if !visited.insert(child) {
                continue;
            }
            plan.push(Planned::Record {
                number: child,
                orphan: false,
            });
            if directories.get(&child).copied().unwrap_or(false)
                && stack.len() < MAX_DIRECTORY_DEPTH
            {
                stack.push((child, 0));
            }
        }

        // Pass (b): residual master-table records, in record order
        for number in 0..self.record_count {
            if let Some(reason) = corrupt.get(&number) {
                plan.push(Planned::Corrupt {
                    number,
                    reason: reason.clone(),
                });
            } else if directories.contains_key(&number) && !visited.contains(&number) {
                plan.push(Planned::Record {
                    number,
                    orphan: true,
                });
            }
        }

        Ok(Box::new(AllItems {
            fs: self,
            stream: self.stream.clone(),
            plan: plan.into_iter(),
        }))
    }

    fn read_file(&self, item: &Item) -> Result<Vec<u8>> {
        let mut stream = self.stream.clone();
        let raw = self.read_record_raw(&mut stream, item.id)?;
        let (header, data) = self
            .decode_record(item.id, raw)?
            .ok_or_else(|| Error::not_found(format!("no record {}", item.id)))?;

        for (attr, slice) in attributes(&data, &header) {
            if attr.attribute_type != ATTR_DATA || attr.name_length != 0 {
                continue;
            }

            if !attr.non_resident {
                let resident = ResidentAttribute::from_bytes(slice)
                    .and_then(|r| r.value(slice).map(|v| v.to_vec()))
                    .ok_or_else(|| Error::corrupt_entry(item.id, "truncated resident data"))?;
                return Ok(resident);
            }

            let nr = NonResidentAttribute::from_bytes(slice)
                .ok_or_else(|| Error::corrupt_entry(item.id, "truncated data attribute"))?;
            if nr.data_size > MAX_FILE_EXTRACT_SIZE {
                return Err(Error::unsupported(format!(
                    "file size {} exceeds extraction limit {}",
                    nr.data_size, MAX_FILE_EXTRACT_SIZE
                )));
            }

            let runs_offset = nr.data_runs_offset as usize;
            if runs_offset >= slice.len() {
                return Err(Error::corrupt_entry(item.id, "data runs out of bounds"));
            }
            let (runs, _) = decode_runs(&slice[runs_offset..]);

            let bpc = self.bytes_per_cluster as u64;
            let mut content = Vec::with_capacity(nr.data_size as usize);
            let mut remaining = nr.data_size;
            for run in runs {
                if remaining == 0 {
                    break;
                }
                let run_bytes = (run.cluster_count * bpc).min(remaining);
                if run.is_sparse {
                    content.resize(content.len() + run_bytes as usize, 0);
                } else {
                    let start = content.len();
                    content.resize(start + run_bytes as usize, 0);
                    stream.read_exact_at(run.lcn * bpc, &mut content[start..])?;
                }
                remaining -= run_bytes;
            }
            return Ok(content);
        }

        // No unnamed $DATA at all: an empty file
        Ok(Vec::new())
    }
}

enum Planned {
    Record { number: u64, orphan: bool },
    Corrupt { number: u64, reason: String },
}

/// Lazy scan of the MFT filtered by parent directory
struct DirectoryScan<'a> {
    fs: &'a NtfsFileSystem,
    stream: LogicalStream,
    next: u64,
    parent: u64,
}

impl Iterator for DirectoryScan<'_> {
    type Item = Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.fs.record_count {
            let number = self.next;
            self.next += 1;

            match self.fs.load_record(&mut self.stream, number) {
                Ok(Some(record)) => {
                    if record.parent == self.parent && record.number != self.parent {
                        return Some(Ok(self.fs.record_to_item(&record)));
                    }
                }
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Lazy materialization of the planned walk + residual order
struct AllItems<'a> {
    fs: &'a NtfsFileSystem,
    stream: LogicalStream,
    plan: std::vec::IntoIter<Planned>,
}

impl Iterator for AllItems<'_> {
    type Item = Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.plan.next()? {
                Planned::Corrupt { number, reason } => {
                    return Some(Err(Error::corrupt_entry(number, reason)));
                }
                Planned::Record { number, orphan } => {
                    match self.fs.load_record(&mut self.stream, number) {
                        Ok(Some(record)) => {
                            let mut item = self.fs.record_to_item(&record);
                            if orphan {
                                item.is_orphan = true;
                                item.parent = None;
                            }
                            return Some(Ok(item));
                        }
                        Ok(None) => continue,
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{build_ntfs_image, corrupt_ntfs_record};
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

    fn open_image(data: Vec<u8>) -> NtfsFileSystem {
        let stream = LogicalStream::whole(&share_container(Box::new(MemoryContainer(data))));
        NtfsFileSystem::open(stream).unwrap()
    }

    fn names(items: Vec<Result<Item>>) -> Vec<String> {
        items
            .into_iter()
            .filter_map(|i| i.ok())
            .map(|i| i.name)
            .collect()
    }

    #[test]
    fn test_open_reads_geometry_and_version() {
        let fs = open_image(build_ntfs_image());
        assert_eq!(fs.identify(), "NTFS v3.1 filesystem");
        assert_eq!(fs.metadata_version(), "3.1");
        assert_eq!(fs.block_size(), 512);
        assert_eq!(fs.record_count(), 24);
    }

    #[test]
    fn test_list_root_directory() {
        let fs = open_image(build_ntfs_image());
        let items = fs.list_directory(fs.root()).unwrap().collect::<Vec<_>>();
        let names = names(items);
        assert_eq!(names, vec!["$MFT", "$Volume", "alpha.txt", "logs", "old.tmp"]);
    }

    #[test]
    fn test_list_directory_is_restartable() {
        let fs = open_image(build_ntfs_image());
        let first = names(fs.list_directory(fs.root()).unwrap().collect());
        let second = names(fs.list_directory(fs.root()).unwrap().collect());
        assert_eq!(first, second);
    }

    #[test]
    fn test_all_items_walk_then_orphans() {
        let fs = open_image(build_ntfs_image());
        let items: Vec<Item> = fs
            .all_items()
            .unwrap()
            .collect::<Vec<_>>()
            .into_iter()
            .map(|i| i.unwrap())
            .collect();

        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["$MFT", "$Volume", "alpha.txt", "logs", "app.log", "old.tmp", "ghost.txt"]
        );

        let orphans: Vec<&Item> = items.iter().filter(|i| i.is_orphan).collect();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].name, "ghost.txt");
        assert!(orphans[0].parent.is_none());

        let deleted: Vec<&Item> = items.iter().filter(|i| i.is_deleted).collect();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].name, "old.tmp");

        // Walk count plus orphan count equals the full enumeration
        let reachable = items.iter().filter(|i| !i.is_orphan).count();
        assert_eq!(reachable + orphans.len(), items.len());
    }

    #[test]
    fn test_corrupt_record_is_reported_not_fatal() {
        let mut image = build_ntfs_image();
        corrupt_ntfs_record(&mut image, 16); // alpha.txt

        let fs = open_image(image);
        let results: Vec<Result<Item>> = fs.all_items().unwrap().collect();

        let errors: Vec<&Error> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::CorruptEntry { id: 16, .. }));

        let names: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.ok())
            .map(|i| i.name)
            .collect();
        assert!(names.contains(&"logs".to_string()));
        assert!(!names.contains(&"alpha.txt".to_string()));
    }

    #[test]
    fn test_resolve_parent_and_handles() {
        let fs = open_image(build_ntfs_image());
        let items: Vec<Item> = fs
            .all_items()
            .unwrap()
            .filter_map(|i| i.ok())
            .collect();

        let logs = items.iter().find(|i| i.name == "logs").unwrap();
        let app = items.iter().find(|i| i.name == "app.log").unwrap();
        let ghost = items.iter().find(|i| i.name == "ghost.txt").unwrap();

        assert_eq!(
            fs.directory_handle(logs).unwrap(),
            Some(DirHandle(logs.id))
        );
        assert_eq!(fs.directory_handle(app).unwrap(), None);

        assert_eq!(fs.resolve_parent(app).unwrap(), Some(DirHandle(logs.id)));
        assert_eq!(fs.resolve_parent(ghost).unwrap(), None);

        let children = names(fs.list_directory(DirHandle(logs.id)).unwrap().collect());
        assert_eq!(children, vec!["app.log"]);
    }

    #[test]
    fn test_read_resident_file() {
        let fs = open_image(build_ntfs_image());
        let items: Vec<Item> = fs
            .all_items()
            .unwrap()
            .filter_map(|i| i.ok())
            .collect();

        let alpha = items.iter().find(|i| i.name == "alpha.txt").unwrap();
        assert_eq!(alpha.size, 6);
        assert_eq!(fs.read_file(alpha).unwrap(), b"alpha!");
    }

    #[test]
    fn test_timestamps_populated() {
        let fs = open_image(build_ntfs_image());
        let items: Vec<Item> = fs
            .all_items()
            .unwrap()
            .filter_map(|i| i.ok())
            .collect();
        let alpha = items.iter().find(|i| i.name == "alpha.txt").unwrap();
        assert!(alpha.created.is_some());
        assert!(alpha.modified.is_some());
        assert!(alpha.accessed.is_some());
    }
}
