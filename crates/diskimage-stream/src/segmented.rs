//! Segmented stream - ordered segment files as one contiguous byte source
//!
//! A split acquisition stores one logical image across several files
//! (`image.001`, `image.002`, ... or `case.E01`, `case.E02`, ...). This
//! module presents those files as a single randomly-seekable stream whose
//! length is the sum of the segment lengths. Reads spanning a segment
//! boundary are reassembled transparently.

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use diskimage_core::limits::{MAX_MMAP_SIZE, MAX_SEGMENT_COUNT};
use diskimage_core::{Error, Result};

/// Configuration for opening a segmented stream
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Map segment files into memory instead of issuing file reads
    pub use_mmap: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { use_mmap: true }
    }
}

#[derive(Debug)]
enum SegmentBacking {
    File(File),
    Mmap(Mmap),
    Memory(Vec<u8>),
}

#[derive(Debug)]
struct Segment {
    path: PathBuf,
    /// Offset of this segment within the whole stream
    start: u64,
    len: u64,
    backing: SegmentBacking,
}

impl Segment {
    /// Read within this segment at a segment-local offset
    fn read_local(&mut self, local: u64, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.backing {
            SegmentBacking::Mmap(map) => {
                let start = local as usize;
                let end = (start + buf.len()).min(map.len());
                let n = end.saturating_sub(start);
                buf[..n].copy_from_slice(&map[start..end]);
                Ok(n)
            }
            SegmentBacking::Memory(data) => {
                let start = local as usize;
                let end = (start + buf.len()).min(data.len());
                let n = end.saturating_sub(start);
                buf[..n].copy_from_slice(&data[start..end]);
                Ok(n)
            }
            SegmentBacking::File(file) => {
                let mut handle = &*file;
                handle.seek(SeekFrom::Start(local))?;
                handle.read(buf)
            }
        }
    }
}

/// N ordered segment files presented as one contiguous byte source
#[derive(Debug)]
pub struct SegmentedStream {
    segments: Vec<Segment>,
    total: u64,
    position: u64,
}

impl SegmentedStream {
    /// Open an explicit, ordered list of segment files
    ///
    /// When every filename carries a recognized monotonic suffix the list
    /// order must match the suffix order; lists without such suffixes bypass
    /// the check.
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        Self::open_with(paths, StreamConfig::default())
    }

    /// Open an explicit segment list with a configuration
    pub fn open_with(paths: &[PathBuf], config: StreamConfig) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::segment_order("empty segment list"));
        }
        if paths.len() > MAX_SEGMENT_COUNT {
            return Err(Error::segment_order(format!(
                "{} segments exceed the limit of {}",
                paths.len(),
                MAX_SEGMENT_COUNT
            )));
        }
        validate_suffix_order(paths)?;

        let mut segments = Vec::with_capacity(paths.len());
        let mut start = 0u64;

        for path in paths {
            let metadata = match std::fs::metadata(path) {
                Ok(m) if m.is_file() => m,
                _ => return Err(Error::SegmentMissing(path.clone())),
            };
            let len = metadata.len();
            let file = File::open(path)?;

            let backing = if config.use_mmap && len > 0 && len <= MAX_MMAP_SIZE {
                // SAFETY: the path was just verified to be a regular file and
                // its size checked against MAX_MMAP_SIZE; the mapping is
                // read-only. Truncation of the file during access is the
                // caller's responsibility, as with any mapped input.
                match unsafe { Mmap::map(&file) } {
                    Ok(map) => SegmentBacking::Mmap(map),
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "mmap failed, using file I/O");
                        SegmentBacking::File(file)
                    }
                }
            } else {
                SegmentBacking::File(file)
            };

            segments.push(Segment {
                path: path.clone(),
                start,
                len,
                backing,
            });
            start += len;
        }

        Ok(Self {
            segments,
            total: start,
            position: 0,
        })
    }

    /// Discover segment files next to `first` by naming convention
    ///
    /// Recognized conventions: numeric suffixes (`.001` -> `.002` -> ...) and
    /// EWF-style suffixes (`.E01` -> `.E02` -> ... -> `.E99` -> `.EAA` ->
    /// ...). The suffix match is case-insensitive. A file without a
    /// recognized suffix is opened as a single segment.
    pub fn discover(first: &Path) -> Result<Self> {
        Self::discover_with(first, StreamConfig::default())
    }

    /// Discover segments with a configuration
    pub fn discover_with(first: &Path, config: StreamConfig) -> Result<Self> {
        if !first.is_file() {
            return Err(Error::SegmentMissing(first.to_path_buf()));
        }

        let mut paths = vec![first.to_path_buf()];
        if segment_ordinal(first).is_some() {
            let mut current = first
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string();
            while paths.len() < MAX_SEGMENT_COUNT {
                let Some(next) = next_suffix(&current) else {
                    break;
                };
                let candidate = first.with_extension(&next);
                if candidate.is_file() {
                    paths.push(candidate);
                    current = next;
                    continue;
                }
                let alt = flip_case(&next);
                let candidate = first.with_extension(&alt);
                if candidate.is_file() {
                    paths.push(candidate);
                    current = alt;
                    continue;
                }
                break;
            }
        }

        tracing::debug!(segments = paths.len(), "discovered image segments");
        Self::open_with(&paths, config)
    }

    /// Build a single-segment stream over an in-memory buffer
    ///
    /// Used to open a disk image that was itself extracted from another
    /// filesystem.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            segments: vec![Segment {
                path: PathBuf::new(),
                start: 0,
                len,
                backing: SegmentBacking::Memory(data),
            }],
            total: len,
            position: 0,
        }
    }

    /// Total stream length in bytes
    pub fn len(&self) -> u64 {
        self.total
    }

    /// True when the stream holds no bytes
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of segment files
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Stream offset where segment `index` begins
    pub fn segment_start(&self, index: usize) -> Option<u64> {
        self.segments.get(index).map(|s| s.start)
    }

    /// Length of segment `index`
    pub fn segment_len(&self, index: usize) -> Option<u64> {
        self.segments.get(index).map(|s| s.len)
    }

    /// Path of segment `index`
    pub fn segment_path(&self, index: usize) -> Option<&Path> {
        self.segments.get(index).map(|s| s.path.as_path())
    }

    /// Read at `offset`, spanning segment boundaries, short only at the end
    /// of the stream
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.read_at_io(offset, buf).map_err(Error::from)
    }

    /// Read exactly `buf.len()` bytes at `offset`
    ///
    /// Fails with [`Error::OutOfRange`] when the range extends past the end
    /// of the stream.
    pub fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let length = buf.len() as u64;
        let end = offset
            .checked_add(length)
            .ok_or_else(|| Error::out_of_range(offset, length, self.total))?;
        if end > self.total {
            return Err(Error::out_of_range(offset, length, self.total));
        }

        let mut done = 0usize;
        while done < buf.len() {
            let n = self.read_at_io(offset + done as u64, &mut buf[done..])?;
            if n == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "segment stream ended early",
                )));
            }
            done += n;
        }
        Ok(())
    }

    fn read_at_io(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.total || buf.is_empty() {
            return Ok(0);
        }

        let mut idx = self
            .segments
            .partition_point(|s| s.start + s.len <= offset);
        let mut done = 0usize;

        while done < buf.len() && idx < self.segments.len() {
            let cur = offset + done as u64;
            if cur >= self.total {
                break;
            }
            let seg = &mut self.segments[idx];
            if cur < seg.start {
                break;
            }
            let local = cur - seg.start;
            if local >= seg.len {
                idx += 1;
                continue;
            }
            let avail = (seg.len - local) as usize;
            let want = (buf.len() - done).min(avail);
            let n = seg.read_local(local, &mut buf[done..done + want])?;
            if n == 0 {
                break;
            }
            done += n;
            if local + n as u64 >= seg.len {
                idx += 1;
            }
        }

        Ok(done)
    }
}

impl Read for SegmentedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at_io(self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for SegmentedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.total as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before beginning of stream",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}

/// Ordinal of a segment filename suffix, if it carries a recognized one
///
/// Numeric suffixes map to their value (`.001` -> 1). EWF-style suffixes map
/// `e01`..`e99` to 1..99 and `eaa`.. onward to 100.. so the whole family is
/// monotonic. Plain extensions (`.img`, `.dd`) carry no ordinal.
fn segment_ordinal(path: &Path) -> Option<u64> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();

    if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_digit()) {
        return ext.parse().ok();
    }

    let chars: Vec<char> = ext.chars().collect();
    if chars.len() != 3 || !matches!(chars[0], 'e' | 'l' | 's') {
        return None;
    }
    let (c1, c2) = (chars[1], chars[2]);
    if c1.is_ascii_digit() && c2.is_ascii_digit() {
        return Some((c1 as u8 - b'0') as u64 * 10 + (c2 as u8 - b'0') as u64);
    }
    if c1.is_ascii_alphabetic() && c2.is_ascii_alphabetic() {
        return Some(100 + (c1 as u8 - b'a') as u64 * 26 + (c2 as u8 - b'a') as u64);
    }
    None
}

/// Successor of a segment filename suffix (`e01` -> `e02`, `e99` -> `eaa`,
/// `001` -> `002`); `None` once the convention is exhausted
fn next_suffix(ext: &str) -> Option<String> {
    if ext.is_empty() {
        return None;
    }

    if ext.chars().all(|c| c.is_ascii_digit()) {
        let width = ext.len();
        let n: u64 = ext.parse().ok()?;
        let s = format!("{:0width$}", n + 1, width = width);
        if s.len() > width {
            return None;
        }
        return Some(s);
    }

    let chars: Vec<char> = ext.chars().collect();
    if chars.len() != 3
        || !matches!(chars[0].to_ascii_lowercase(), 'e' | 'l' | 's')
    {
        return None;
    }
    let (c0, c1, c2) = (chars[0], chars[1], chars[2]);
    let upper = c0.is_ascii_uppercase();
    let letter_base = if upper { b'A' } else { b'a' };

    if c1.is_ascii_digit() && c2.is_ascii_digit() {
        let n = (c1 as u8 - b'0') * 10 + (c2 as u8 - b'0');
        if n < 99 {
            let next = n + 1;
            return Some(format!(
                "{}{}{}",
                c0,
                (b'0' + next / 10) as char,
                (b'0' + next % 10) as char
            ));
        }
        return Some(format!(
            "{}{}{}",
            c0, letter_base as char, letter_base as char
        ));
    }

    if c1.is_ascii_alphabetic() && c2.is_ascii_alphabetic() {
        let mut v0 = c0.to_ascii_lowercase() as u8 - b'a';
        let mut v1 = c1.to_ascii_lowercase() as u8 - b'a';
        let mut v2 = c2.to_ascii_lowercase() as u8 - b'a';
        v2 += 1;
        if v2 == 26 {
            v2 = 0;
            v1 += 1;
        }
        if v1 == 26 {
            v1 = 0;
            v0 += 1;
        }
        if v0 == 26 {
            return None;
        }
        return Some(format!(
            "{}{}{}",
            (letter_base + v0) as char,
            (letter_base + v1) as char,
            (letter_base + v2) as char
        ));
    }

    None
}

fn flip_case(suffix: &str) -> String {
    if suffix.chars().any(|c| c.is_ascii_uppercase()) {
        suffix.to_ascii_lowercase()
    } else {
        suffix.to_ascii_uppercase()
    }
}

/// Reject explicit lists whose recognized suffixes are out of order
fn validate_suffix_order(paths: &[PathBuf]) -> Result<()> {
    if paths.len() < 2 {
        return Ok(());
    }

    let ordinals: Vec<Option<u64>> = paths.iter().map(|p| segment_ordinal(p)).collect();
    if ordinals.iter().any(|o| o.is_none()) {
        // No usable naming convention; the explicit order stands as given.
        return Ok(());
    }

    for window in ordinals.windows(2) {
        let (a, b) = (window[0].unwrap_or(0), window[1].unwrap_or(0));
        if b <= a {
            return Err(Error::segment_order(format!(
                "segment suffixes not in ascending order ({} then {})",
                a, b
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_segments(dir: &Path, stem: &str, parts: &[&[u8]]) -> Vec<PathBuf> {
        parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let path = dir.join(format!("{}.{:03}", stem, i + 1));
                fs::write(&path, part).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_read_across_segment_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_segments(dir.path(), "img", &[&[0, 1, 2, 3], &[4, 5, 6, 7, 8]]);

        let mut stream = SegmentedStream::open(&paths).unwrap();
        assert_eq!(stream.len(), 9);
        assert_eq!(stream.segment_count(), 2);

        // One read across the boundary...
        let mut joined = [0u8; 6];
        stream.read_exact_at(2, &mut joined).unwrap();

        // ...equals the two sub-range reads concatenated
        let mut left = [0u8; 2];
        let mut right = [0u8; 4];
        stream.read_exact_at(2, &mut left).unwrap();
        stream.read_exact_at(4, &mut right).unwrap();

        assert_eq!(&joined[..2], &left);
        assert_eq!(&joined[2..], &right);
        assert_eq!(joined, [2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_read_exact_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_segments(dir.path(), "img", &[&[0u8; 8]]);

        let mut stream = SegmentedStream::open(&paths).unwrap();
        let mut buf = [0u8; 4];
        let err = stream.read_exact_at(6, &mut buf).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { offset: 6, .. }));
    }

    #[test]
    fn test_missing_segment() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.001");
        let err = SegmentedStream::open(&[missing.clone()]).unwrap_err();
        assert!(matches!(err, Error::SegmentMissing(p) if p == missing));
    }

    #[test]
    fn test_out_of_order_segments_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_segments(dir.path(), "img", &[&[0u8; 4], &[0u8; 4]]);
        paths.swap(0, 1);

        let err = SegmentedStream::open(&paths).unwrap_err();
        assert!(matches!(err, Error::SegmentOrder(_)));
    }

    #[test]
    fn test_discover_numeric_segments() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_segments(dir.path(), "disk", &[b"abc", b"def", b"gh"]);

        let mut stream = SegmentedStream::discover(&paths[0]).unwrap();
        assert_eq!(stream.segment_count(), 3);
        assert_eq!(stream.len(), 8);

        let mut buf = [0u8; 8];
        stream.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"abcdefgh");
    }

    #[test]
    fn test_discover_single_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        fs::write(&path, b"raw-bytes").unwrap();

        let stream = SegmentedStream::discover(&path).unwrap();
        assert_eq!(stream.segment_count(), 1);
        assert_eq!(stream.len(), 9);
    }

    #[test]
    fn test_read_seek_adapter() {
        let mut stream = SegmentedStream::from_bytes((0u8..100).collect());
        stream.seek(SeekFrom::Start(50)).unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [50, 51, 52, 53, 54]);

        // Reads past the end are clamped, not errors
        stream.seek(SeekFrom::End(-2)).unwrap();
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], &[98, 99]);
    }

    #[test]
    fn test_open_without_mmap() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_segments(dir.path(), "img", &[&[9u8; 16]]);

        let config = StreamConfig { use_mmap: false };
        let mut stream = SegmentedStream::open_with(&paths, config).unwrap();
        let mut buf = [0u8; 16];
        stream.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(buf, [9u8; 16]);
    }

    #[test]
    fn test_segment_ordinal() {
        assert_eq!(segment_ordinal(Path::new("a.001")), Some(1));
        assert_eq!(segment_ordinal(Path::new("a.000")), Some(0));
        assert_eq!(segment_ordinal(Path::new("a.E01")), Some(1));
        assert_eq!(segment_ordinal(Path::new("a.e99")), Some(99));
        assert_eq!(segment_ordinal(Path::new("a.EAA")), Some(100));
        assert_eq!(segment_ordinal(Path::new("a.eab")), Some(101));
        assert_eq!(segment_ordinal(Path::new("a.img")), None);
        assert_eq!(segment_ordinal(Path::new("a.dd")), None);
    }

    #[test]
    fn test_next_suffix() {
        assert_eq!(next_suffix("001").as_deref(), Some("002"));
        assert_eq!(next_suffix("099").as_deref(), Some("100"));
        assert_eq!(next_suffix("999"), None);
        assert_eq!(next_suffix("e01").as_deref(), Some("e02"));
        assert_eq!(next_suffix("E99").as_deref(), Some("EAA"));
        assert_eq!(next_suffix("eaz").as_deref(), Some("eba"));
        assert_eq!(next_suffix("img"), None);
    }
}
