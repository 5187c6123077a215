//! Core types for disk image enumeration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type hint used for a volume spanning the whole unpartitioned stream
pub const UNPARTITIONED: &str = "unpartitioned";

/// Opaque per-filesystem directory key
///
/// The meaning of the inner value is filesystem-specific (an MFT record
/// number for NTFS, a directory entry offset for FAT). Handles are only
/// valid against the filesystem that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirHandle(pub u64);

/// One file, directory or orphan entry surfaced by a filesystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Filesystem-native identifier, unique within its filesystem
    pub id: u64,

    /// Entry name (long name where the filesystem records one)
    pub name: String,

    /// True if this entry is a directory
    pub is_directory: bool,

    /// True if the entry is deleted/unallocated on disk
    pub is_deleted: bool,

    /// True if the entry is only reachable via the master metadata table,
    /// not from the root directory tree
    pub is_orphan: bool,

    /// Size in bytes (0 for directories)
    pub size: u64,

    /// Creation timestamp
    pub created: Option<DateTime<Utc>>,

    /// Last modified timestamp
    pub modified: Option<DateTime<Utc>>,

    /// Last accessed timestamp
    pub accessed: Option<DateTime<Utc>>,

    /// Identifier of the parent directory; `None` for orphans
    pub parent: Option<u64>,
}

impl Item {
    /// Create a new file item
    pub fn file(id: u64, name: String, size: u64) -> Self {
        Self {
            id,
            name,
            is_directory: false,
            is_deleted: false,
            is_orphan: false,
            size,
            created: None,
            modified: None,
            accessed: None,
            parent: None,
        }
    }

    /// Create a new directory item
    pub fn directory(id: u64, name: String) -> Self {
        Self {
            is_directory: true,
            ..Self::file(id, name, 0)
        }
    }

    /// Set the parent identifier
    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the creation timestamp
    pub fn with_created(mut self, created: Option<DateTime<Utc>>) -> Self {
        self.created = created;
        self
    }

    /// Set the modification timestamp
    pub fn with_modified(mut self, modified: Option<DateTime<Utc>>) -> Self {
        self.modified = modified;
        self
    }

    /// Set the access timestamp
    pub fn with_accessed(mut self, accessed: Option<DateTime<Utc>>) -> Self {
        self.accessed = accessed;
        self
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = String::new();
        flags.push(if self.is_directory { 'd' } else { 'f' });
        flags.push(if self.is_deleted { 'x' } else { '-' });
        flags.push(if self.is_orphan { 'o' } else { '-' });

        write!(
            f,
            "{} {:>12} {}",
            flags,
            if self.is_directory {
                "<DIR>".to_string()
            } else {
                format_size(self.size)
            },
            self.name
        )
    }
}

/// Format size in human-readable form
fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// A volume (partition) within a logical image stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Index of this volume, preserving partition table order
    pub index: usize,

    /// Offset from the start of the logical stream in bytes
    pub start_offset: u64,

    /// Length of the volume in bytes
    pub length: u64,

    /// Type hint ("NTFS/exFAT", "FAT32 (LBA)", "unpartitioned", ...)
    pub type_hint: String,
}

impl Volume {
    /// Create a new volume
    pub fn new(index: usize, start_offset: u64, length: u64, type_hint: String) -> Self {
        Self {
            index,
            start_offset,
            length,
            type_hint,
        }
    }

    /// Create the single volume covering a whole unpartitioned stream
    pub fn unpartitioned(length: u64) -> Self {
        Self::new(0, 0, length, UNPARTITIONED.to_string())
    }

    /// End offset (exclusive) of this volume
    pub fn end(&self) -> u64 {
        self.start_offset + self.length
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Volume {} [{} @ 0x{:08X}, {} bytes]",
            self.index, self.type_hint, self.start_offset, self.length
        )
    }
}

/// Diagnostic verbosity threaded through open calls
///
/// This is an explicit value the embedding front end passes down; the core
/// keeps no process-wide default and never configures a logging subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Warnings only
    #[default]
    Quiet,
    /// Informational diagnostics (-v)
    Verbose,
    /// Full debug diagnostics (-vv)
    Debug,
}

impl Verbosity {
    /// Map a `-v` occurrence count to a verbosity level
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Quiet,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    }

    /// The tracing filter directive matching this level
    pub fn env_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Verbose => "info",
            Verbosity::Debug => "debug",
        }
    }
}
