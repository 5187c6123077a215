//! Container format probing and opening
//!
//! `probe` is total: for any stream, including an empty one, it returns a
//! format. Streams without a recognized signature are treated as raw images
//! (logical offset = physical offset).

use std::io::{Read, Seek, SeekFrom};

use diskimage_core::{Container, Error, Result};
use diskimage_stream::SegmentedStream;

use crate::ewf::types::{EVF2_SIGNATURE, EVF_SIGNATURE};
use crate::ewf::EwfContainer;
use crate::raw::RawContainer;

/// Detected container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Raw sector image (also the fallback for unknown signatures)
    Raw,
    /// EWF/E01 version 1 evidence container
    Ewf,
    /// EWF version 2 (Ex01) - recognized but not supported
    EwfVersion2,
}

impl ContainerFormat {
    /// Human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            ContainerFormat::Raw => "raw image",
            ContainerFormat::Ewf => "EWF (E01)",
            ContainerFormat::EwfVersion2 => "EWF version 2 (Ex01)",
        }
    }
}

/// Probe the container format from a stream's leading bytes
pub fn probe<R: Read + Seek + ?Sized>(reader: &mut R) -> ContainerFormat {
    let mut magic = [0u8; 8];

    if reader.seek(SeekFrom::Start(0)).is_err() {
        return ContainerFormat::Raw;
    }

    let mut filled = 0usize;
    while filled < magic.len() {
        match reader.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => break,
        }
    }
    let _ = reader.seek(SeekFrom::Start(0));

    if filled < magic.len() {
        return ContainerFormat::Raw;
    }
    if magic == EVF_SIGNATURE {
        return ContainerFormat::Ewf;
    }
    if magic == EVF2_SIGNATURE {
        return ContainerFormat::EwfVersion2;
    }
    ContainerFormat::Raw
}

/// Probe a segment stream and open the matching container handler
pub fn open_container(mut stream: SegmentedStream) -> Result<Box<dyn Container>> {
    let format = probe(&mut stream);
    tracing::debug!(format = format.name(), "container format probed");

    match format {
        ContainerFormat::Raw => Ok(Box::new(RawContainer::new(stream))),
        ContainerFormat::Ewf => Ok(Box::new(EwfContainer::open(stream)?)),
        ContainerFormat::EwfVersion2 => Err(Error::unsupported_version(
            "EWF version 2 (Ex01) containers are not supported",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_probe_is_total() {
        // Empty, short and garbage streams all probe as raw
        assert_eq!(probe(&mut Cursor::new(Vec::<u8>::new())), ContainerFormat::Raw);
        assert_eq!(probe(&mut Cursor::new(vec![0x55])), ContainerFormat::Raw);
        assert_eq!(
            probe(&mut Cursor::new(vec![0xFF; 4096])),
            ContainerFormat::Raw
        );
    }

    #[test]
    fn test_probe_ewf_signature() {
        let mut data = EVF_SIGNATURE.to_vec();
        data.extend_from_slice(&[0u8; 64]);
        assert_eq!(probe(&mut Cursor::new(data)), ContainerFormat::Ewf);
    }

    #[test]
    fn test_probe_ewf_v2_signature() {
        let mut data = EVF2_SIGNATURE.to_vec();
        data.extend_from_slice(&[0u8; 64]);
        assert_eq!(probe(&mut Cursor::new(data)), ContainerFormat::EwfVersion2);
    }

    #[test]
    fn test_probe_restores_position() {
        let mut cursor = Cursor::new(vec![0u8; 32]);
        probe(&mut cursor);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_open_rejects_ewf_v2() {
        let mut data = EVF2_SIGNATURE.to_vec();
        data.extend_from_slice(&[0u8; 64]);
        let result = open_container(SegmentedStream::from_bytes(data));
        assert!(matches!(result, Err(Error::UnsupportedVersion(_))));
    }
}
