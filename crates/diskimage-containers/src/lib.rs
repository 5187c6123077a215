//! # diskimage containers
//!
//! Container format handlers for the diskimage workspace.
//!
//! A container is the outer binary envelope of an acquisition. Two formats
//! are implemented:
//! - **RawContainer**: plain sector images (.img, .dd, .raw, split .001 ...),
//!   where the logical offset equals the physical offset
//! - **EwfContainer**: EWF/E01 version 1 evidence files with segmented,
//!   zlib-compressed, checksummed chunks
//!
//! ## Example
//!
//! ```rust,no_run
//! use diskimage_containers::open_container;
//! use diskimage_stream::SegmentedStream;
//! use std::path::Path;
//!
//! let stream = SegmentedStream::discover(Path::new("case.E01")).unwrap();
//! let container = open_container(stream).unwrap();
//! println!("Type: {}", container.identify());
//! println!("Logical size: {} bytes", container.length());
//! ```

pub mod ewf;
pub mod probe;
pub mod raw;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use ewf::EwfContainer;
pub use probe::{open_container, probe, ContainerFormat};
pub use raw::RawContainer;
