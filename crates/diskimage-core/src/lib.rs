//! # diskimage core
//!
//! Shared types, traits and error handling for the diskimage workspace.
//!
//! This crate defines the vocabulary the other crates speak:
//! - **Containers**: an opened image presented as one logical byte stream
//! - **Volumes**: partitions (or the whole unpartitioned stream)
//! - **FileSystems**: parsed filesystem metadata exposing item enumeration
//! - **Items**: files, directories and orphan entries surfaced by a filesystem
//!
//! ## Example
//!
//! ```rust,no_run
//! use diskimage_core::{Container, Result};
//!
//! fn describe(container: &mut dyn Container) -> Result<()> {
//!     println!("Container type: {}", container.identify());
//!     println!("Logical size: {} bytes", container.length());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod limits;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{Error, Result};
pub use limits::*;
pub use traits::{Container, FileSystem, ItemIter};
pub use types::{DirHandle, Item, Verbosity, Volume};
