//! The disk image façade
//!
//! Composes the workspace layers into one read-only handle: segment
//! discovery, container probing, volume location and filesystem detection
//! all happen at open time; enumeration afterwards is lazy and repeatable.

use std::path::{Path, PathBuf};

use diskimage_core::{Error, FileSystem, Item, ItemIter, Result, Verbosity, Volume};
use diskimage_fs::detect_filesystem;
use diskimage_stream::{share_container, LogicalStream, SegmentedStream, SharedContainer, StreamConfig};
use diskimage_volumes::locate;

/// Filename extensions recognized as disk images
///
/// Used by [`DiskImage::find_disk_images`] to surface nested images that a
/// caller may want to open with [`DiskImage::from_bytes`].
pub const EXTENSIONS: &[&str] = &[
    ".dd", ".raw", ".img", ".000", ".001", ".00001", ".e01", ".s01", ".ex01", ".lx01", ".l01",
];

/// Options threaded through every open call
///
/// Verbosity is an explicit value handed down by the embedding front end;
/// the library keeps no process-wide default and never touches logging
/// subscriber configuration.
#[derive(Debug, Clone)]
pub struct DiskImageOptions {
    /// Diagnostic verbosity for open-time summaries
    pub verbosity: Verbosity,
    /// Memory-map segment files instead of issuing file reads
    pub use_mmap: bool,
}

impl Default for DiskImageOptions {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Quiet,
            use_mmap: true,
        }
    }
}

impl DiskImageOptions {
    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            use_mmap: self.use_mmap,
        }
    }
}

/// One volume that matched a filesystem variant
pub struct FileSystemEntry {
    /// The volume the filesystem was found in
    pub volume: Volume,
    /// The parsed filesystem
    pub filesystem: Box<dyn FileSystem>,
}

/// An opened disk image
///
/// Holds the shared container plus everything discovered at open time. The
/// handle is read-only for its whole lifetime; dropping it (and any
/// outstanding iterators) releases the segment file handles.
pub struct DiskImage {
    name: String,
    container: SharedContainer,
    container_type: String,
    length: u64,
    volumes: Vec<Volume>,
    filesystems: Vec<FileSystemEntry>,
}

impl DiskImage {
    /// Open an image file, auto-discovering further segments by naming
    /// convention (`.E01` -> `.E02` ..., `.001` -> `.002` ...)
    pub fn from_file(path: &Path, options: &DiskImageOptions) -> Result<Self> {
        let stream = SegmentedStream::discover_with(path, options.stream_config())?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::open(stream, name, options)
    }

    /// Open an explicit, ordered list of segment files
    pub fn from_segments(paths: &[PathBuf], options: &DiskImageOptions) -> Result<Self> {
        let stream = SegmentedStream::open_with(paths, options.stream_config())?;
        let name = paths
            .first()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::open(stream, name, options)
    }

    /// Open an in-memory image, e.g. one extracted from another filesystem
    pub fn from_bytes(data: Vec<u8>, name: &str, options: &DiskImageOptions) -> Result<Self> {
        Self::open(SegmentedStream::from_bytes(data), name.to_string(), options)
    }

    fn open(stream: SegmentedStream, name: String, options: &DiskImageOptions) -> Result<Self> {
        let container = diskimage_containers::open_container(stream)?;
        let container_type = container.identify().to_string();
        let length = container.length();
        let container = share_container(container);

        let mut whole = LogicalStream::whole(&container);
        let volumes = locate(&mut whole)?;

        let mut filesystems = Vec::new();
        for volume in &volumes {
            let window = LogicalStream::window(&container, volume.start_offset, volume.length);
            if let Some(filesystem) = detect_filesystem(volume, window)? {
                filesystems.push(FileSystemEntry {
                    volume: volume.clone(),
                    filesystem,
                });
            }
        }

        match options.verbosity {
            Verbosity::Quiet => tracing::debug!(
                name = %name,
                container = %container_type,
                volumes = volumes.len(),
                filesystems = filesystems.len(),
                "opened disk image"
            ),
            _ => tracing::info!(
                name = %name,
                container = %container_type,
                volumes = volumes.len(),
                filesystems = filesystems.len(),
                "opened disk image"
            ),
        }

        Ok(Self {
            name,
            container,
            container_type,
            length,
            volumes,
            filesystems,
        })
    }

    /// Name of the image (first segment's filename, or a caller-given label)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable container type
    pub fn container_type(&self) -> &str {
        &self.container_type
    }

    /// Length of the logical (decompressed, reassembled) stream in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    /// All located volumes, in table order
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// One entry per volume that matched a filesystem, in volume order
    pub fn filesystems(&self) -> &[FileSystemEntry] {
        &self.filesystems
    }

    /// A window over the raw logical stream
    ///
    /// Mostly useful for inspecting volumes that matched no filesystem.
    pub fn logical_stream(&self) -> LogicalStream {
        LogicalStream::whole(&self.container)
    }

    /// Every item of every filesystem, lazily, in filesystem order
    ///
    /// Each filesystem contributes its full master enumeration including
    /// orphans; duplicates across volumes are preserved. Corrupt metadata
    /// records surface as in-band `Err` elements and never end the sequence.
    pub fn get_items(&self) -> ItemIter<'_> {
        Box::new(Items {
            entries: self.filesystems.iter(),
            current: None,
        })
    }

    /// Read a file's content out of filesystem `fs_index`
    ///
    /// Combined with [`DiskImage::from_bytes`] this opens images nested
    /// inside other images.
    pub fn read_file(&self, fs_index: usize, item: &Item) -> Result<Vec<u8>> {
        let entry = self
            .filesystems
            .get(fs_index)
            .ok_or_else(|| Error::not_found(format!("no filesystem {}", fs_index)))?;
        entry.filesystem.read_file(item)
    }

    /// Items whose name matches `pattern`; see [`crate::FindOptions`]
    pub fn find<'a>(
        &'a self,
        pattern: &str,
        options: &crate::FindOptions,
    ) -> Result<ItemIter<'a>> {
        let matcher = crate::find::Matcher::new(pattern, options)?;
        Ok(Box::new(self.get_items().filter(move |result| {
            result.as_ref().map_or(true, |item| matcher.matches(&item.name))
        })))
    }

    /// Items whose extension marks them as disk images ([`EXTENSIONS`])
    pub fn find_disk_images(&self) -> ItemIter<'_> {
        Box::new(self.get_items().filter(|result| {
            result.as_ref().map_or(true, |item| {
                let name = item.name.to_lowercase();
                !item.is_directory && EXTENSIONS.iter().any(|ext| name.ends_with(ext))
            })
        }))
    }
}

/// Lazy concatenation of every filesystem's `all_items`
struct Items<'a> {
    entries: std::slice::Iter<'a, FileSystemEntry>,
    current: Option<ItemIter<'a>>,
}

impl<'a> Iterator for Items<'a> {
    type Item = Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = &mut self.current {
                if let Some(item) = current.next() {
                    return Some(item);
                }
                self.current = None;
            }

            let entry = self.entries.next()?;
            match entry.filesystem.all_items() {
                Ok(iter) => self.current = Some(iter),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
