//! Error types for disk image handling

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for diskimage operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error on the underlying segment files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A segment file of a split image is missing or not a regular file
    #[error("missing segment file: {0}")]
    SegmentMissing(PathBuf),

    /// Segment files were supplied out of sequence
    #[error("segment order: {0}")]
    SegmentOrder(String),

    /// A container header or section structure failed to parse
    #[error("corrupt container header: {0}")]
    CorruptHeader(String),

    /// The container format was recognized but its version is not supported
    #[error("unsupported container version: {0}")]
    UnsupportedVersion(String),

    /// A container chunk failed its integrity digest
    #[error("chunk {chunk} failed integrity check: {reason}")]
    ChunkIntegrity { chunk: usize, reason: String },

    /// The partition table is structurally invalid (overlap, self-reference)
    #[error("invalid volume table: {0}")]
    InvalidVolumeTable(String),

    /// The logical stream contains no usable volume at all
    #[error("no volumes found in image")]
    NoVolumesFound,

    /// A single filesystem metadata record is corrupt; traversal continues
    #[error("corrupt entry {id}: {reason}")]
    CorruptEntry { id: u64, reason: String },

    /// Catch-all failure while opening a container
    #[error("cannot open container: {0}")]
    ContainerOpen(String),

    /// A read was requested outside the stream bounds
    #[error("read of {length} bytes at offset {offset} is outside stream of {size} bytes")]
    OutOfRange { offset: u64, length: u64, size: u64 },

    /// Unsupported format or feature
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// File or directory not found
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type alias for diskimage operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a segment order error
    pub fn segment_order(msg: impl Into<String>) -> Self {
        Error::SegmentOrder(msg.into())
    }

    /// Create a corrupt header error
    pub fn corrupt_header(msg: impl Into<String>) -> Self {
        Error::CorruptHeader(msg.into())
    }

    /// Create an unsupported version error
    pub fn unsupported_version(msg: impl Into<String>) -> Self {
        Error::UnsupportedVersion(msg.into())
    }

    /// Create a chunk integrity error
    pub fn chunk_integrity(chunk: usize, reason: impl Into<String>) -> Self {
        Error::ChunkIntegrity {
            chunk,
            reason: reason.into(),
        }
    }

    /// Create an invalid volume table error
    pub fn invalid_volume_table(msg: impl Into<String>) -> Self {
        Error::InvalidVolumeTable(msg.into())
    }

    /// Create a per-entry corruption error
    pub fn corrupt_entry(id: u64, reason: impl Into<String>) -> Self {
        Error::CorruptEntry {
            id,
            reason: reason.into(),
        }
    }

    /// Create a container open error
    pub fn container_open(msg: impl Into<String>) -> Self {
        Error::ContainerOpen(msg.into())
    }

    /// Create an out of range error
    pub fn out_of_range(offset: u64, length: u64, size: u64) -> Self {
        Error::OutOfRange {
            offset,
            length,
            size,
        }
    }

    /// Create an unsupported error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }
}
