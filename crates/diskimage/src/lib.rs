//! # diskimage
//!
//! Read-only access to forensic disk images: open a possibly segmented
//! container, locate its volumes, and enumerate the files, directories and
//! orphan entries of every recognized filesystem.
//!
//! [`DiskImage`] is the façade over the workspace's layers: segment stream,
//! container format, volume table, filesystem parsers. Everything it opens
//! is immutable for the handle's lifetime; item sequences are lazy and can
//! be regenerated identically.
//!
//! ## Example
//!
//! ```rust,no_run
//! use diskimage::{DiskImage, DiskImageOptions};
//! use std::path::Path;
//!
//! let image = DiskImage::from_file(Path::new("case.E01"), &DiskImageOptions::default()).unwrap();
//! for entry in image.filesystems() {
//!     println!("{}: {}", entry.volume, entry.filesystem.identify());
//! }
//! for item in image.get_items().flatten() {
//!     println!("{}", item);
//! }
//! ```

pub mod find;
pub mod image;

pub use diskimage_core::{DirHandle, Error, FileSystem, Item, ItemIter, Result, Verbosity, Volume};
pub use find::FindOptions;
pub use image::{DiskImage, DiskImageOptions, FileSystemEntry, EXTENSIONS};
