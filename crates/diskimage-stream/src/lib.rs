//! # diskimage stream
//!
//! Byte-stream plumbing for the diskimage workspace:
//! - **SegmentedStream**: N ordered segment files presented as one
//!   contiguous, randomly-seekable byte source
//! - **LogicalStream**: a clonable window over a shared, opened container,
//!   used to hand a partition (or the whole image) to a parser
//!
//! ## Example
//!
//! ```rust,no_run
//! use diskimage_stream::SegmentedStream;
//! use std::path::Path;
//!
//! // Auto-discover image.001, image.002, ... next to the first segment
//! let mut stream = SegmentedStream::discover(Path::new("image.001")).unwrap();
//! let mut sector = [0u8; 512];
//! stream.read_exact_at(0, &mut sector).unwrap();
//! ```

pub mod logical;
pub mod segmented;

pub use logical::{share_container, LogicalStream, SharedContainer};
pub use segmented::{SegmentedStream, StreamConfig};
