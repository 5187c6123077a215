//! Logical stream - a window into a shared, opened container
//!
//! Volume locators and filesystem parsers consume the logical image through
//! windows: the whole stream for partition scanning, one partition's byte
//! range for a filesystem. Every window keeps its own read position and
//! locks the shared container only for the duration of a single read, so
//! independent windows (and therefore independent item iterators) never
//! disturb each other.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

use diskimage_core::{Container, Error, Result};

/// A container shared between all windows of one opened image
pub type SharedContainer = Arc<Mutex<Box<dyn Container>>>;

/// Wrap an opened container for shared window access
pub fn share_container(container: Box<dyn Container>) -> SharedContainer {
    Arc::new(Mutex::new(container))
}

fn lock(container: &SharedContainer) -> MutexGuard<'_, Box<dyn Container>> {
    // A poisoned lock only means another thread panicked mid-read; the
    // container itself holds no partial state worth rejecting.
    match container.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A clonable window over a shared container's logical byte stream
#[derive(Clone)]
pub struct LogicalStream {
    container: SharedContainer,
    start: u64,
    length: u64,
    position: u64,
}

impl LogicalStream {
    /// Window over the whole logical stream
    pub fn whole(container: &SharedContainer) -> Self {
        let length = lock(container).length();
        Self {
            container: Arc::clone(container),
            start: 0,
            length,
            position: 0,
        }
    }

    /// Window over `[start, start + length)` of the logical stream
    pub fn window(container: &SharedContainer, start: u64, length: u64) -> Self {
        Self {
            container: Arc::clone(container),
            start,
            length,
            position: 0,
        }
    }

    /// Start offset of this window within the logical stream
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Length of this window in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Current position within this window
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Remaining bytes from the current position to the window end
    pub fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }

    /// Read exactly `buf.len()` bytes at a window-relative offset
    ///
    /// Fails with [`Error::OutOfRange`] when the range extends past the
    /// window.
    pub fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let length = buf.len() as u64;
        let end = offset
            .checked_add(length)
            .ok_or_else(|| Error::out_of_range(offset, length, self.length))?;
        if end > self.length {
            return Err(Error::out_of_range(offset, length, self.length));
        }

        lock(&self.container).read_logical_exact(self.start + offset, buf)
    }
}

impl Read for LogicalStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let to_read = (buf.len() as u64).min(remaining) as usize;
        let offset = self.start + self.position;
        let n = lock(&self.container)
            .read_logical_at(offset, &mut buf[..to_read])
            .map_err(|e| match e {
                Error::Io(io_err) => io_err,
                other => io::Error::other(other.to_string()),
            })?;

        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for LogicalStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.length as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before beginning of stream window",
            ));
        }

        let new_pos = new_pos as u64;
        if new_pos > self.length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek beyond end of stream window",
            ));
        }

        self.position = new_pos;
        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal pass-through container over an in-memory buffer
    struct TestContainer {
        data: Vec<u8>,
    }

    impl Container for TestContainer {
        fn identify(&self) -> &str {
            "test container"
        }

        fn length(&self) -> u64 {
            self.data.len() as u64
        }

        fn read_logical_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            if offset >= self.data.len() as u64 {
                return Ok(0);
            }
            let start = offset as usize;
            let end = (start + buf.len()).min(self.data.len());
            buf[..end - start].copy_from_slice(&self.data[start..end]);
            Ok(end - start)
        }
    }

    fn shared(data: Vec<u8>) -> SharedContainer {
        share_container(Box::new(TestContainer { data }))
    }

    #[test]
    fn test_whole_window() {
        let container = shared((0..100).collect());
        let mut stream = LogicalStream::whole(&container);
        assert_eq!(stream.length(), 100);

        let mut buf = [0u8; 4];
        stream.read_exact_at(10, &mut buf).unwrap();
        assert_eq!(buf, [10, 11, 12, 13]);
    }

    #[test]
    fn test_window_offsets() {
        let container = shared((0..100).collect());
        let mut window = LogicalStream::window(&container, 20, 10);

        let mut buf = [0u8; 5];
        window.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(buf, [20, 21, 22, 23, 24]);

        // Reads clamp to the window, not the container
        let err = window.read_exact_at(8, &mut buf).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
    }

    #[test]
    fn test_independent_clones() {
        let container = shared((0..100).collect());
        let mut a = LogicalStream::window(&container, 0, 100);
        let mut b = a.clone();

        a.seek(SeekFrom::Start(50)).unwrap();
        let mut buf = [0u8; 2];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0, 1]);

        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [50, 51]);
    }

    #[test]
    fn test_seek_bounds() {
        let container = shared(vec![0u8; 64]);
        let mut window = LogicalStream::window(&container, 0, 64);

        assert!(window.seek(SeekFrom::Start(64)).is_ok());
        assert!(window.seek(SeekFrom::Start(65)).is_err());
        assert!(window.seek(SeekFrom::Current(-128)).is_err());
        assert_eq!(window.seek(SeekFrom::End(-4)).unwrap(), 60);
    }
}
