//! Raw container - direct pass-through to the segment stream
//!
//! The simplest container: no envelope at all. The logical stream is the
//! byte-for-byte concatenation of the segment files.

use diskimage_core::{Container, Result};
use diskimage_stream::SegmentedStream;

/// Raw sector image container
pub struct RawContainer {
    stream: SegmentedStream,
    length: u64,
}

impl RawContainer {
    /// Wrap a segment stream as a raw container
    pub fn new(stream: SegmentedStream) -> Self {
        let length = stream.len();
        Self { stream, length }
    }
}

impl Container for RawContainer {
    fn identify(&self) -> &str {
        "raw image"
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn read_logical_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.stream.read_at(offset, buf)
    }
}
