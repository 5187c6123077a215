//! End-to-end enumeration tests over synthetic images
//!
//! Images are built by the container/filesystem testkits: a FAT12 floppy, an
//! NTFS volume with a deleted file and an orphan record, and EWF containers
//! wrapping them.

use std::fs;
use std::path::PathBuf;

use diskimage::{DiskImage, DiskImageOptions, Error, FindOptions};
use diskimage_containers::testkit::{build_ewf, first_chunk_data_offset, EwfBuildOptions};
use diskimage_fs::testkit::{build_fat12_image, build_ntfs_image, corrupt_ntfs_record};

fn open_bytes(data: Vec<u8>) -> DiskImage {
    DiskImage::from_bytes(data, "test.img", &DiskImageOptions::default()).unwrap()
}

/// (name, size, timestamps) tuples of every successfully enumerated item
fn item_tuples(image: &DiskImage) -> Vec<(String, u64, String)> {
    image
        .get_items()
        .filter_map(|r| r.ok())
        .map(|i| {
            let stamps = format!("{:?}/{:?}/{:?}", i.created, i.modified, i.accessed);
            (i.name, i.size, stamps)
        })
        .collect()
}

fn write_segments(dir: &std::path::Path, stem: &str, ext0: &str, segments: &[Vec<u8>]) -> Vec<PathBuf> {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let suffix = format!("{}{:02}", &ext0[..1], i + 1);
            let path = dir.join(format!("{}.{}", stem, suffix));
            fs::write(&path, segment).unwrap();
            path
        })
        .collect()
}

#[test]
fn raw_unpartitioned_fat_image_yields_expected_items() {
    let image = open_bytes(build_fat12_image(false));

    assert_eq!(image.container_type(), "raw image");
    assert_eq!(image.volumes().len(), 1);
    assert_eq!(image.volumes()[0].type_hint, "unpartitioned");
    assert_eq!(image.filesystems().len(), 1);

    let names: Vec<String> = image
        .get_items()
        .filter_map(|r| r.ok())
        .map(|i| i.name)
        .collect();
    assert_eq!(names, vec!["README.TXT", "DOCS", "A long file name.txt"]);

    let items: Vec<_> = image.get_items().filter_map(|r| r.ok()).collect();
    assert!(items.iter().find(|i| i.name == "DOCS").unwrap().is_directory);
    assert!(!items.iter().find(|i| i.name == "README.TXT").unwrap().is_directory);
}

#[test]
fn reopening_the_same_image_yields_identical_output() {
    let data = build_fat12_image(true);
    let a = open_bytes(data.clone());
    let b = open_bytes(data);

    assert_eq!(item_tuples(&a), item_tuples(&b));
    // A second enumeration of the same handle is identical too
    assert_eq!(item_tuples(&a), item_tuples(&a));
}

#[test]
fn split_raw_image_matches_whole_image() {
    let data = build_ntfs_image();
    let dir = tempfile::tempdir().unwrap();

    let half = data.len() / 2;
    let segments = vec![data[..half].to_vec(), data[half..].to_vec()];
    let paths = write_segments(dir.path(), "disk", "001", &segments);

    let split = DiskImage::from_file(&paths[0], &DiskImageOptions::default()).unwrap();
    let whole = open_bytes(data);

    assert_eq!(split.length(), whole.length());
    assert_eq!(item_tuples(&split), item_tuples(&whole));
}

#[test]
fn ewf_container_matches_raw_image() {
    let data = build_fat12_image(false);
    let raw = open_bytes(data.clone());

    for segments in [1usize, 3] {
        let dir = tempfile::tempdir().unwrap();
        let built = build_ewf(
            &data,
            &EwfBuildOptions {
                segments,
                ..Default::default()
            },
        );
        let paths = write_segments(dir.path(), "case", "E01", &built);

        let ewf = DiskImage::from_file(&paths[0], &DiskImageOptions::default()).unwrap();
        assert!(ewf.container_type().contains("EWF"));
        assert_eq!(ewf.length(), raw.length());
        assert_eq!(item_tuples(&ewf), item_tuples(&raw), "segments={}", segments);
    }
}

#[test]
fn tampered_ewf_chunk_fails_with_integrity_error() {
    let data = build_fat12_image(false);
    let mut segments = build_ewf(&data, &EwfBuildOptions::default());
    // Flip a byte inside the first chunk's stored data; the boot sector
    // lives there, so opening must trip over it
    segments[0][first_chunk_data_offset() + 8] ^= 0xFF;

    let dir = tempfile::tempdir().unwrap();
    let paths = write_segments(dir.path(), "case", "E01", &segments);

    let result = DiskImage::from_file(&paths[0], &DiskImageOptions::default());
    assert!(matches!(result, Err(Error::ChunkIntegrity { chunk: 0, .. })));
}

#[test]
fn corrupt_metadata_record_is_skipped_not_fatal() {
    let mut data = build_ntfs_image();
    corrupt_ntfs_record(&mut data, 16); // alpha.txt

    let image = open_bytes(data);
    let results: Vec<_> = image.get_items().collect();

    let errors: Vec<_> = results.iter().filter(|r| r.is_err()).collect();
    assert_eq!(errors.len(), 1);

    let names: Vec<String> = results
        .into_iter()
        .filter_map(|r| r.ok())
        .map(|i| i.name)
        .collect();
    assert!(!names.contains(&"alpha.txt".to_string()));
    assert!(names.contains(&"logs".to_string()));
    assert!(names.contains(&"app.log".to_string()));
}

#[test]
fn orphan_excess_over_root_walk() {
    let image = open_bytes(build_ntfs_image());
    let items: Vec<_> = image.get_items().filter_map(|r| r.ok()).collect();

    let orphans = items.iter().filter(|i| i.is_orphan).count();
    let reachable = items.iter().filter(|i| !i.is_orphan).count();
    assert_eq!(orphans, 1);
    assert_eq!(items.len(), reachable + orphans);
    assert!(items
        .iter()
        .filter(|i| i.is_orphan)
        .all(|i| i.parent.is_none()));
}

#[test]
fn two_identical_volumes_report_items_twice() {
    // One MBR disk carrying the same FAT12 volume in two partitions: every
    // item must appear once per volume, not deduplicated
    let volume = build_fat12_image(false);
    let sectors = volume.len() / 512;
    let mut disk = vec![0u8; (1 + 2 * sectors) * 512];

    for (slot, lba) in [(0usize, 1u32), (1, 1 + sectors as u32)] {
        let entry = 0x1BE + slot * 16;
        disk[entry + 4] = 0x01; // FAT12
        disk[entry + 8..entry + 12].copy_from_slice(&lba.to_le_bytes());
        disk[entry + 12..entry + 16].copy_from_slice(&(sectors as u32).to_le_bytes());
        let offset = lba as usize * 512;
        disk[offset..offset + volume.len()].copy_from_slice(&volume);
    }
    disk[0x1FE] = 0x55;
    disk[0x1FF] = 0xAA;

    let image = open_bytes(disk);
    assert_eq!(image.volumes().len(), 2);
    assert_eq!(image.filesystems().len(), 2);

    let names: Vec<String> = image
        .get_items()
        .filter_map(|r| r.ok())
        .map(|i| i.name)
        .collect();
    assert_eq!(
        names,
        vec![
            "README.TXT",
            "DOCS",
            "A long file name.txt",
            "README.TXT",
            "DOCS",
            "A long file name.txt"
        ]
    );
}

#[test]
fn empty_image_has_no_volumes() {
    let result =
        DiskImage::from_bytes(Vec::new(), "empty.img", &DiskImageOptions::default());
    assert!(matches!(result, Err(Error::NoVolumesFound)));
}

#[test]
fn unformatted_volume_is_omitted_without_error() {
    let image = open_bytes(vec![0u8; 8192]);
    assert_eq!(image.volumes().len(), 1);
    assert!(image.filesystems().is_empty());
    assert_eq!(image.get_items().count(), 0);
}

#[test]
fn find_matches_names() {
    let image = open_bytes(build_fat12_image(false));

    let hits: Vec<String> = image
        .find("readme.txt", &FindOptions::default())
        .unwrap()
        .filter_map(|r| r.ok())
        .map(|i| i.name)
        .collect();
    assert_eq!(hits, vec!["README.TXT"]);

    let regex = FindOptions {
        ignore_case: true,
        regex: true,
    };
    let hits: Vec<String> = image
        .find(r"\.txt$", &regex)
        .unwrap()
        .filter_map(|r| r.ok())
        .map(|i| i.name)
        .collect();
    assert_eq!(hits, vec!["README.TXT", "A long file name.txt"]);
}

#[test]
fn read_file_extracts_content_through_the_facade() {
    let image = open_bytes(build_fat12_image(false));
    let items: Vec<_> = image.get_items().filter_map(|r| r.ok()).collect();

    let readme = items.iter().find(|i| i.name == "README.TXT").unwrap();
    assert_eq!(image.read_file(0, readme).unwrap(), b"hello fat\n");

    let err = image.read_file(7, readme).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
