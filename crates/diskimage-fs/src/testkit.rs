//! Synthetic filesystem image builders for tests
//!
//! Hand-assembled NTFS and FAT12 volumes, minimal but structurally complete:
//! valid boot sectors, MFT records with correct fixups, FAT chains and
//! long-file-name entry runs. Shared with downstream integration tests via
//! the `testkit` feature.

/// Parsed name of the deleted root entry in [`build_fat12_image`]
///
/// The 0xE5 deletion marker destroys the first name byte, rendered as `_`.
pub const FAT12_DELETED_NAME: &str = "_LD.TMP";

/// MFT record size used by [`build_ntfs_image`]
const NTFS_RECORD_SIZE: usize = 1024;

/// Volume offset of the MFT in [`build_ntfs_image`] (cluster 4, 512-byte
/// clusters)
const NTFS_MFT_OFFSET: usize = 2048;

/// Records in the synthetic MFT
const NTFS_RECORD_COUNT: usize = 24;

/// FILETIME for 2024-01-10T12:00:00Z
const TEST_FILETIME: u64 = 116_444_736_000_000_000 + 1_704_888_000 * 10_000_000;

// ---------------------------------------------------------------------------
// NTFS
// ---------------------------------------------------------------------------

/// Build a minimal NTFS volume image
///
/// Geometry: 512-byte sectors and clusters, 1024-byte MFT records, a
/// 24-record MFT at cluster 4. Contents:
///
/// - `$MFT` (0), `$Volume` (3, version 3.1), root directory (5)
/// - `alpha.txt` (16, resident content `alpha!`)
/// - `logs` (17) containing `app.log` (18)
/// - `old.tmp` (19, deleted in place, still linked to the root)
/// - `ghost.txt` (20, parented to a free record: unreachable from the root)
pub fn build_ntfs_image() -> Vec<u8> {
    let mut image = vec![0u8; 64 * 512];

    // Boot sector
    image[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    image[3..11].copy_from_slice(b"NTFS    ");
    image[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
    image[0x0D] = 1; // sectors per cluster
    image[0x28..0x30].copy_from_slice(&64u64.to_le_bytes());
    image[0x30..0x38].copy_from_slice(&4u64.to_le_bytes()); // MFT cluster
    image[0x38..0x40].copy_from_slice(&8u64.to_le_bytes()); // MFT mirror
    image[0x40] = 0xF6; // -10: 1024-byte records
    image[0x48..0x50].copy_from_slice(&0x1234_5678u64.to_le_bytes());
    image[510] = 0x55;
    image[511] = 0xAA;

    let t = TEST_FILETIME;
    let in_use = 0x0001u16;
    let directory = 0x0002u16;

    // $MFT: the non-resident $DATA run describes the 24-record table itself
    let mft_bytes = (NTFS_RECORD_COUNT * NTFS_RECORD_SIZE) as u64;
    put_record(
        &mut image,
        0,
        ntfs_record(
            in_use,
            &[
                standard_information(t),
                file_name(5, "$MFT", 3, mft_bytes, t),
                non_resident_data(0, 47, mft_bytes, &[0x11, 48, 0x04, 0x00]),
            ],
        ),
    );

    put_record(
        &mut image,
        3,
        ntfs_record(
            in_use,
            &[
                standard_information(t),
                file_name(5, "$Volume", 3, 0, t),
                volume_information(3, 1),
            ],
        ),
    );

    put_record(
        &mut image,
        5,
        ntfs_record(
            in_use | directory,
            &[standard_information(t), file_name(5, ".", 3, 0, t)],
        ),
    );

    put_record(
        &mut image,
        16,
        ntfs_record(
            in_use,
            &[
                standard_information(t),
                file_name(5, "alpha.txt", 1, 6, t),
                resident_data(b"alpha!"),
            ],
        ),
    );

    put_record(
        &mut image,
        17,
        ntfs_record(
            in_use | directory,
            &[standard_information(t), file_name(5, "logs", 1, 0, t)],
        ),
    );

    put_record(
        &mut image,
        18,
        ntfs_record(
            in_use,
            &[
                standard_information(t),
                file_name(17, "app.log", 1, 9, t),
                resident_data(b"line one\n"),
            ],
        ),
    );

    // Deleted in place: the record stays parsable but the in-use flag is gone
    put_record(
        &mut image,
        19,
        ntfs_record(
            0,
            &[
                standard_information(t),
                file_name(5, "old.tmp", 1, 4, t),
                resident_data(b"tmp\n"),
            ],
        ),
    );

    // Parented to record 21, which is free: only the master-table sweep
    // finds this one
    put_record(
        &mut image,
        20,
        ntfs_record(
            in_use,
            &[
                standard_information(t),
                file_name(21, "ghost.txt", 1, 5, t),
                resident_data(b"boo!\n"),
            ],
        ),
    );

    image
}

/// Overwrite one MFT record's signature so it parses as corrupt
pub fn corrupt_ntfs_record(image: &mut [u8], number: u64) {
    let offset = NTFS_MFT_OFFSET + number as usize * NTFS_RECORD_SIZE;
    image[offset..offset + 4].copy_from_slice(b"BAAD");
}

fn put_record(image: &mut [u8], number: usize, record: Vec<u8>) {
    let offset = NTFS_MFT_OFFSET + number * NTFS_RECORD_SIZE;
    image[offset..offset + NTFS_RECORD_SIZE].copy_from_slice(&record);
}

/// Assemble one MFT record: header, attributes, end marker, fixups
fn ntfs_record(flags: u16, attributes: &[Vec<u8>]) -> Vec<u8> {
    let mut record = vec![0u8; NTFS_RECORD_SIZE];
    record[0..4].copy_from_slice(b"FILE");
    record[4..6].copy_from_slice(&48u16.to_le_bytes()); // USA offset
    record[6..8].copy_from_slice(&3u16.to_le_bytes()); // USA count (2 sectors)
    record[16..18].copy_from_slice(&1u16.to_le_bytes()); // sequence
    record[18..20].copy_from_slice(&1u16.to_le_bytes()); // hard links
    record[20..22].copy_from_slice(&56u16.to_le_bytes()); // first attribute
    record[22..24].copy_from_slice(&flags.to_le_bytes());
    record[28..32].copy_from_slice(&(NTFS_RECORD_SIZE as u32).to_le_bytes());

    let mut offset = 56usize;
    for attribute in attributes {
        record[offset..offset + attribute.len()].copy_from_slice(attribute);
        offset += attribute.len();
    }
    record[offset..offset + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    record[24..28].copy_from_slice(&((offset + 8) as u32).to_le_bytes());

    // Stamp the fixup sequence over the sector ends, stashing the originals
    let sequence = 0x0107u16;
    record[48..50].copy_from_slice(&sequence.to_le_bytes());
    let (a, b) = (record[510], record[511]);
    record[50..52].copy_from_slice(&[a, b]);
    let (c, d) = (record[1022], record[1023]);
    record[52..54].copy_from_slice(&[c, d]);
    record[510..512].copy_from_slice(&sequence.to_le_bytes());
    record[1022..1024].copy_from_slice(&sequence.to_le_bytes());

    record
}

fn resident_attribute(attribute_type: u32, value: &[u8]) -> Vec<u8> {
    let length = (24 + value.len() + 7) & !7;
    let mut attribute = vec![0u8; length];
    attribute[0..4].copy_from_slice(&attribute_type.to_le_bytes());
    attribute[4..8].copy_from_slice(&(length as u32).to_le_bytes());
    attribute[10..12].copy_from_slice(&24u16.to_le_bytes()); // name offset
    attribute[16..20].copy_from_slice(&(value.len() as u32).to_le_bytes());
    attribute[20..22].copy_from_slice(&24u16.to_le_bytes()); // value offset
    attribute[24..24 + value.len()].copy_from_slice(value);
    attribute
}

fn standard_information(filetime: u64) -> Vec<u8> {
    let mut value = vec![0u8; 48];
    value[0..8].copy_from_slice(&filetime.to_le_bytes());
    value[8..16].copy_from_slice(&filetime.to_le_bytes());
    value[16..24].copy_from_slice(&filetime.to_le_bytes());
    value[24..32].copy_from_slice(&filetime.to_le_bytes());
    resident_attribute(0x10, &value)
}

fn file_name(parent: u64, name: &str, namespace: u8, data_size: u64, filetime: u64) -> Vec<u8> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let mut value = vec![0u8; 66 + units.len() * 2];
    value[0..8].copy_from_slice(&parent.to_le_bytes());
    value[8..16].copy_from_slice(&filetime.to_le_bytes());
    value[16..24].copy_from_slice(&filetime.to_le_bytes());
    value[24..32].copy_from_slice(&filetime.to_le_bytes());
    value[32..40].copy_from_slice(&filetime.to_le_bytes());
    value[40..48].copy_from_slice(&data_size.to_le_bytes());
    value[48..56].copy_from_slice(&data_size.to_le_bytes());
    value[64] = units.len() as u8;
    value[65] = namespace;
    for (i, unit) in units.iter().enumerate() {
        value[66 + i * 2..68 + i * 2].copy_from_slice(&unit.to_le_bytes());
    }
    resident_attribute(0x30, &value)
}

fn volume_information(major: u8, minor: u8) -> Vec<u8> {
    let mut value = vec![0u8; 12];
    value[8] = major;
    value[9] = minor;
    resident_attribute(0x70, &value)
}

fn resident_data(content: &[u8]) -> Vec<u8> {
    resident_attribute(0x80, content)
}

fn non_resident_data(lowest_vcn: u64, highest_vcn: u64, size: u64, runs: &[u8]) -> Vec<u8> {
    let length = (64 + runs.len() + 7) & !7;
    let mut attribute = vec![0u8; length];
    attribute[0..4].copy_from_slice(&0x80u32.to_le_bytes());
    attribute[4..8].copy_from_slice(&(length as u32).to_le_bytes());
    attribute[8] = 1; // non-resident
    attribute[16..24].copy_from_slice(&lowest_vcn.to_le_bytes());
    attribute[24..32].copy_from_slice(&highest_vcn.to_le_bytes());
    attribute[32..34].copy_from_slice(&64u16.to_le_bytes()); // runs offset
    attribute[40..48].copy_from_slice(&size.to_le_bytes()); // allocated
    attribute[48..56].copy_from_slice(&size.to_le_bytes()); // data size
    attribute[56..64].copy_from_slice(&size.to_le_bytes()); // initialized
    attribute[64..64 + runs.len()].copy_from_slice(runs);
    attribute
}

// ---------------------------------------------------------------------------
// FAT12
// ---------------------------------------------------------------------------

/// Build a minimal FAT12 volume image (64 sectors of 512 bytes)
///
/// Geometry: 1 reserved sector, two 1-sector FATs, a 32-entry fixed root.
/// Contents:
///
/// - `README.TXT` (10 bytes at cluster 2, full DOS timestamps)
/// - `DOCS/` (cluster 3) containing `A long file name.txt` (cluster 4),
///   stored behind a two-chunk LFN run
/// - with `with_deleted`, a deleted `OLD.TMP` root entry
///   ([`FAT12_DELETED_NAME`] once the marker byte is rendered)
pub fn build_fat12_image(with_deleted: bool) -> Vec<u8> {
    let mut disk = vec![0u8; 64 * 512];

    // Boot sector
    disk[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
    disk[3..11].copy_from_slice(b"MSDOS5.0");
    disk[11..13].copy_from_slice(&512u16.to_le_bytes());
    disk[13] = 1; // sectors per cluster
    disk[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved
    disk[16] = 2; // FAT copies
    disk[17..19].copy_from_slice(&32u16.to_le_bytes()); // root entries
    disk[19..21].copy_from_slice(&64u16.to_le_bytes()); // total sectors
    disk[21] = 0xF0;
    disk[22..24].copy_from_slice(&1u16.to_le_bytes()); // sectors per FAT
    disk[510] = 0x55;
    disk[511] = 0xAA;

    // Both FAT copies: media entries, then single-cluster chains 2, 3, 4
    let mut fat = vec![0u8; 512];
    fat[0] = 0xF0;
    fat[1] = 0xFF;
    fat[2] = 0xFF;
    for cluster in [2u32, 3, 4] {
        set_fat12_entry(&mut fat, cluster, 0xFFF);
    }
    disk[512..1024].copy_from_slice(&fat);
    disk[1024..1536].copy_from_slice(&fat);

    // 2024-03-15 14:30:10
    let date = (44u16 << 9) | (3 << 5) | 15;
    let time = (14u16 << 11) | (30 << 5) | 5;

    // Root directory at 1536 (32 entries over 2 sectors)
    let root = 1536usize;
    write_dir_entry(
        &mut disk,
        root,
        &fat_entry_bytes(*b"README  TXT", 0x20, 2, 10, date, time),
    );
    write_dir_entry(
        &mut disk,
        root + 32,
        &fat_entry_bytes(*b"DOCS       ", 0x10, 3, 0, date, time),
    );
    if with_deleted {
        let mut deleted = fat_entry_bytes(*b"OLD     TMP", 0x20, 0, 44, date, time);
        deleted[0] = 0xE5;
        write_dir_entry(&mut disk, root + 64, &deleted);
    }

    // Data region starts at sector 5 (offset 2560); cluster 2 is first
    let cluster2 = 2560usize;
    disk[cluster2..cluster2 + 10].copy_from_slice(b"hello fat\n");

    // DOCS at cluster 3: dot entries, then the LFN run and its 8.3 record
    let cluster3 = cluster2 + 512;
    write_dir_entry(
        &mut disk,
        cluster3,
        &fat_entry_bytes(*b".          ", 0x10, 3, 0, date, time),
    );
    write_dir_entry(
        &mut disk,
        cluster3 + 32,
        &fat_entry_bytes(*b"..         ", 0x10, 0, 0, date, time),
    );

    let short_name = *b"ALONGF~1TXT";
    let checksum = lfn_checksum(&short_name);
    write_dir_entry(
        &mut disk,
        cluster3 + 64,
        &lfn_entry_bytes(0x42, "ame.txt", checksum),
    );
    write_dir_entry(
        &mut disk,
        cluster3 + 96,
        &lfn_entry_bytes(0x01, "A long file n", checksum),
    );
    write_dir_entry(
        &mut disk,
        cluster3 + 128,
        &fat_entry_bytes(short_name, 0x20, 4, 18, date, time),
    );

    // The long-named file's content at cluster 4
    let cluster4 = cluster3 + 512;
    disk[cluster4..cluster4 + 18].copy_from_slice(b"long name content\n");

    disk
}

/// Pack one 12-bit FAT entry
fn set_fat12_entry(table: &mut [u8], cluster: u32, value: u16) {
    let offset = cluster as usize + cluster as usize / 2;
    if cluster & 1 == 0 {
        table[offset] = (value & 0xFF) as u8;
        table[offset + 1] = (table[offset + 1] & 0xF0) | ((value >> 8) & 0x0F) as u8;
    } else {
        table[offset] = (table[offset] & 0x0F) | ((value & 0x0F) << 4) as u8;
        table[offset + 1] = (value >> 4) as u8;
    }
}

fn write_dir_entry(disk: &mut [u8], offset: usize, entry: &[u8; 32]) {
    disk[offset..offset + 32].copy_from_slice(entry);
}

fn fat_entry_bytes(
    short_name: [u8; 11],
    attributes: u8,
    cluster: u16,
    size: u32,
    date: u16,
    time: u16,
) -> [u8; 32] {
    let mut entry = [0u8; 32];
    entry[0..11].copy_from_slice(&short_name);
    entry[11] = attributes;
    entry[14..16].copy_from_slice(&time.to_le_bytes()); // created
    entry[16..18].copy_from_slice(&date.to_le_bytes());
    entry[18..20].copy_from_slice(&date.to_le_bytes()); // accessed
    entry[22..24].copy_from_slice(&time.to_le_bytes()); // modified
    entry[24..26].copy_from_slice(&date.to_le_bytes());
    entry[26..28].copy_from_slice(&cluster.to_le_bytes());
    entry[28..32].copy_from_slice(&size.to_le_bytes());
    entry
}

/// One long-file-name entry carrying a 13-unit chunk of the name
fn lfn_entry_bytes(sequence: u8, chunk: &str, checksum: u8) -> [u8; 32] {
    let mut entry = [0u8; 32];
    entry[0] = sequence;
    entry[11] = 0x0F;
    entry[13] = checksum;

    let mut units: Vec<u16> = chunk.encode_utf16().collect();
    if units.len() < 13 {
        units.push(0x0000);
    }
    while units.len() < 13 {
        units.push(0xFFFF);
    }

    let positions = [1usize, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
    for (&unit, &pos) in units.iter().zip(positions.iter()) {
        entry[pos..pos + 2].copy_from_slice(&unit.to_le_bytes());
    }
    entry
}

/// Checksum of the 8.3 name carried by every entry of its LFN run
fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    short_name
        .iter()
        .fold(0u8, |sum, &b| ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(b))
}
