//! EWF (Expert Witness Format) version 1 on-disk types
//!
//! EWF stores an image as one or more segment files, each a 13-byte file
//! header followed by a chain of sections. Sections carry case metadata,
//! media geometry, compressed chunk data, the chunk offset table and stored
//! hashes. Section descriptors and the chunk table are protected by Adler-32
//! checksums.

use diskimage_core::{Error, Result};

/// EWF version 1 signature ("EVF\x09\x0d\x0a\xff\x00")
pub const EVF_SIGNATURE: [u8; 8] = [0x45, 0x56, 0x46, 0x09, 0x0D, 0x0A, 0xFF, 0x00];

/// EWF version 2 signature ("EVF2\x0d\x0a\x81\x00")
pub const EVF2_SIGNATURE: [u8; 8] = [0x45, 0x56, 0x46, 0x32, 0x0D, 0x0A, 0x81, 0x00];

/// Adler-32 checksum as used by EWF section descriptors and chunk data
pub(crate) fn adler32(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    let mut a: u32 = 1;
    let mut b: u32 = 0;

    // Process in blocks small enough that a and b cannot overflow u32
    for block in data.chunks(5552) {
        for &byte in block {
            a += byte as u32;
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }

    (b << 16) | a
}

/// Section type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    /// Case metadata (compressed)
    Header,
    /// Media geometry and chunk layout
    Volume,
    /// Alternative volume section name
    Disk,
    /// Chunk data
    Sectors,
    /// Chunk offset table
    Table,
    /// Mirror of the chunk offset table
    Table2,
    /// Stored MD5 of the logical image
    Hash,
    /// End of this segment, continue in the next
    Next,
    /// End of the image
    Done,
    /// Uncompressed data section
    Data,
    /// Anything else
    Unknown,
}

impl SectionType {
    /// Parse a section type from its 16-byte null-padded name field
    pub fn from_bytes(bytes: &[u8; 16]) -> Self {
        let name = std::str::from_utf8(bytes)
            .unwrap_or("")
            .trim_end_matches('\0');

        match name {
            "header" | "header2" => Self::Header,
            "volume" => Self::Volume,
            "disk" => Self::Disk,
            "sectors" => Self::Sectors,
            "table" => Self::Table,
            "table2" => Self::Table2,
            "hash" => Self::Hash,
            "next" => Self::Next,
            "done" => Self::Done,
            "data" => Self::Data,
            _ => Self::Unknown,
        }
    }

    /// Null-padded 16-byte name field for this type
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        let s = match self {
            Self::Header => "header",
            Self::Volume => "volume",
            Self::Disk => "disk",
            Self::Sectors => "sectors",
            Self::Table => "table",
            Self::Table2 => "table2",
            Self::Hash => "hash",
            Self::Next => "next",
            Self::Done => "done",
            Self::Data => "data",
            Self::Unknown => "unknown",
        };
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        bytes
    }
}

/// EWF segment file header (13 bytes)
#[derive(Debug, Clone)]
pub struct EwfFileHeader {
    /// Format signature
    pub signature: [u8; 8],
    /// 1-based segment number
    pub segment_number: u16,
    /// Offset of the first section within the segment file
    pub fields_start: u16,
}

impl EwfFileHeader {
    /// Size of the file header
    pub const SIZE: usize = 13;

    /// Parse the file header from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::corrupt_header("EWF file header too short"));
        }

        let mut signature = [0u8; 8];
        signature.copy_from_slice(&data[0..8]);

        if signature == EVF2_SIGNATURE {
            return Err(Error::unsupported_version(
                "EWF version 2 segment encountered",
            ));
        }
        if signature != EVF_SIGNATURE {
            return Err(Error::corrupt_header("invalid EWF signature"));
        }

        let segment_number = u16::from_le_bytes([data[9], data[10]]);
        let fields_start = u16::from_le_bytes([data[11], data[12]]);

        Ok(Self {
            signature,
            segment_number,
            fields_start,
        })
    }
}

/// EWF section descriptor (76 bytes)
#[derive(Debug, Clone)]
pub struct SectionDescriptor {
    /// Section type
    pub section_type: SectionType,
    /// Offset of the next section, absolute within the segment file
    pub next_offset: u64,
    /// Section size including this descriptor
    pub section_size: u64,
    /// Adler-32 over the first 72 descriptor bytes
    pub checksum: u32,
}

impl SectionDescriptor {
    /// Size of a section descriptor
    pub const SIZE: usize = 76;

    /// Parse and checksum-verify a section descriptor
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::corrupt_header("EWF section descriptor too short"));
        }

        let checksum = u32::from_le_bytes([data[72], data[73], data[74], data[75]]);
        if adler32(&data[0..72]) != checksum {
            return Err(Error::corrupt_header(
                "EWF section descriptor checksum mismatch",
            ));
        }

        let mut type_bytes = [0u8; 16];
        type_bytes.copy_from_slice(&data[0..16]);
        let section_type = SectionType::from_bytes(&type_bytes);

        let next_offset = u64::from_le_bytes([
            data[16], data[17], data[18], data[19], data[20], data[21], data[22], data[23],
        ]);
        let section_size = u64::from_le_bytes([
            data[24], data[25], data[26], data[27], data[28], data[29], data[30], data[31],
        ]);

        Ok(Self {
            section_type,
            next_offset,
            section_size,
            checksum,
        })
    }

    /// Encode a descriptor, computing its checksum
    pub fn encode(section_type: SectionType, next_offset: u64, section_size: u64) -> [u8; 76] {
        let mut bytes = [0u8; 76];
        bytes[0..16].copy_from_slice(&section_type.to_bytes());
        bytes[16..24].copy_from_slice(&next_offset.to_le_bytes());
        bytes[24..32].copy_from_slice(&section_size.to_le_bytes());
        let checksum = adler32(&bytes[0..72]);
        bytes[72..76].copy_from_slice(&checksum.to_le_bytes());
        bytes
    }
}

/// EWF volume section payload (media geometry)
#[derive(Debug, Clone)]
pub struct VolumeSection {
    /// Media type byte
    pub media_type: u8,
    /// Number of chunks in the image
    pub chunk_count: u32,
    /// Sectors per chunk
    pub sectors_per_chunk: u32,
    /// Bytes per sector
    pub bytes_per_sector: u32,
    /// Total sectors of the acquired media
    pub sector_count: u64,
    /// Compression level byte
    pub compression: u8,
}

impl VolumeSection {
    /// Minimum payload size
    pub const SIZE: usize = 94;

    /// Parse the volume section payload
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::corrupt_header("EWF volume section too short"));
        }

        let media_type = data[0];
        let chunk_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let sectors_per_chunk = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        let bytes_per_sector = u32::from_le_bytes([data[12], data[13], data[14], data[15]]);
        let sector_count = u64::from_le_bytes([
            data[16], data[17], data[18], data[19], data[20], data[21], data[22], data[23],
        ]);
        let compression = data[88];

        diskimage_core::limits::validate_sector_size(bytes_per_sector)?;
        if sectors_per_chunk == 0 {
            return Err(Error::corrupt_header("EWF volume has zero-sector chunks"));
        }

        Ok(Self {
            media_type,
            chunk_count,
            sectors_per_chunk,
            bytes_per_sector,
            sector_count,
            compression,
        })
    }

    /// Encode a volume section payload
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.media_type;
        bytes[4..8].copy_from_slice(&self.chunk_count.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.sectors_per_chunk.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.sector_count.to_le_bytes());
        bytes[88] = self.compression;
        bytes
    }

    /// Total logical image size in bytes
    pub fn media_size(&self) -> u64 {
        self.sector_count * self.bytes_per_sector as u64
    }

    /// Chunk size in bytes
    pub fn chunk_size(&self) -> u32 {
        self.sectors_per_chunk * self.bytes_per_sector
    }
}

/// EWF chunk table header (24 bytes, precedes the entry array)
#[derive(Debug, Clone)]
pub struct TableHeader {
    /// Number of `u32` entries that follow
    pub entry_count: u32,
    /// Base added to every entry offset
    pub base_offset: u64,
    /// Adler-32 over the first 20 header bytes
    pub checksum: u32,
}

impl TableHeader {
    /// Size of the table header
    pub const SIZE: usize = 24;

    /// Parse and checksum-verify a chunk table header
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::corrupt_header("EWF table header too short"));
        }

        let checksum = u32::from_le_bytes([data[20], data[21], data[22], data[23]]);
        if adler32(&data[0..20]) != checksum {
            return Err(Error::corrupt_header("EWF table header checksum mismatch"));
        }

        let entry_count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let base_offset = u64::from_le_bytes([
            data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
        ]);

        Ok(Self {
            entry_count,
            base_offset,
            checksum,
        })
    }

    /// Encode a chunk table header
    pub fn encode(entry_count: u32, base_offset: u64) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&entry_count.to_le_bytes());
        bytes[8..16].copy_from_slice(&base_offset.to_le_bytes());
        let checksum = adler32(&bytes[0..20]);
        bytes[20..24].copy_from_slice(&checksum.to_le_bytes());
        bytes
    }
}

/// EWF hash section payload (stored MD5 of the logical image)
#[derive(Debug, Clone)]
pub struct HashSection {
    /// MD5 of the uncompressed logical stream
    pub md5: [u8; 16],
    /// Section checksum
    pub checksum: u32,
}

impl HashSection {
    /// Size of the hash section payload
    pub const SIZE: usize = 20;

    /// Parse the hash section payload
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::corrupt_header("EWF hash section too short"));
        }

        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&data[0..16]);
        let checksum = u32::from_le_bytes([data[16], data[17], data[18], data[19]]);

        Ok(Self { md5, checksum })
    }

    /// Stored MD5 as a lowercase hex string
    pub fn md5_hex(&self) -> String {
        self.md5.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
