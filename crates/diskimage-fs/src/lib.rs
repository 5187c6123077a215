//! # diskimage filesystems
//!
//! Filesystem variants and the filesystem detector.
//!
//! Each variant parses one volume's metadata and implements the shared
//! [`diskimage_core::FileSystem`] contract: directory listing in on-disk
//! order, a full master-table enumeration including orphans, and bounded
//! file content extraction.
//!
//! - **NTFS**: hand-parsed Master File Table (fixups, attributes, data runs)
//! - **FAT**: FAT12/FAT16/FAT32 with long file name assembly
//!
//! ## Example
//!
//! ```rust,no_run
//! use diskimage_fs::detect_filesystem;
//! use diskimage_core::Volume;
//! use diskimage_stream::LogicalStream;
//!
//! # fn volume_stream() -> (Volume, LogicalStream) { unimplemented!() }
//! let (volume, stream) = volume_stream();
//! if let Some(fs) = detect_filesystem(&volume, stream).unwrap() {
//!     println!("{} on {}", fs.identify(), volume);
//! }
//! ```

pub mod detect;
pub mod fat;
pub mod ntfs;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use detect::detect_filesystem;
pub use fat::FatFileSystem;
pub use ntfs::NtfsFileSystem;
