//! # diskimage volumes
//!
//! Partition table handlers and the volume locator.
//!
//! - **MBR**: Master Boot Record (legacy partitioning)
//! - **GPT**: GUID Partition Table, reached through a protective MBR
//! - **Unpartitioned**: a single volume spanning the whole stream when no
//!   table is recognized (or sector 0 already carries a filesystem)
//!
//! ## Example
//!
//! ```rust,no_run
//! use diskimage_stream::{share_container, LogicalStream};
//! use diskimage_volumes::locate;
//!
//! # fn open() -> diskimage_stream::SharedContainer { unimplemented!() }
//! let container = open();
//! let mut stream = LogicalStream::whole(&container);
//! for volume in locate(&mut stream).unwrap() {
//!     println!("{}", volume);
//! }
//! ```

pub mod gpt;
pub mod locator;
pub mod mbr;

pub use gpt::GptTable;
pub use locator::{locate, SECTOR_SIZE};
pub use mbr::MbrTable;
