use tempfile::TempDir;

use unpak::archive::Archive;
use unpak::pak;

use crate::common::{self, Result};

#[cfg(feature = "mem-map")]
use filebuffer::FileBuffer;
#[cfg(feature = "mem-map")]
use std::collections::HashMap;
#[cfg(feature = "mem-map")]
use unpak::pak::SELF_ARCHIVE_INDEX;

#[test]
fn extract_from_the_archive_itself() -> Result<()> {
    let dir = TempDir::new()?;
    let path = common::write_file(dir.path(), common::GAME_DIR_VPK, &common::self_contained_v1())?;

    let archive = Archive::open(&path)?;
    let entry = archive
        .tree()
        .find(common::HELLO_PATH)
        .expect("entry should exist")
        .clone();

    let payload = archive.extract(&entry)?;
    assert_eq!(payload.data, common::HELLO_CONTENT);
    assert!(!payload.short_read);
    Ok(())
}

#[test]
fn extract_from_numbered_sibling() -> Result<()> {
    let dir = TempDir::new()?;

    // v2 index whose single entry lives in archive 0 at offset 4.
    let tree = common::single_file_tree(0, 4, 5);
    let path = common::write_file(dir.path(), common::GAME_DIR_VPK, &common::v2_archive(&tree, &[]))?;

    let mut sibling = b"xxxx".to_vec();
    sibling.extend_from_slice(common::HELLO_CONTENT);
    sibling.extend_from_slice(b"trailing");
    common::write_file(dir.path(), common::GAME_000_VPK, &sibling)?;

    let archive = Archive::open(&path)?;
    let entry = archive
        .tree()
        .find(common::HELLO_PATH)
        .expect("entry should exist")
        .clone();

    let payload = archive.extract(&entry)?;
    assert_eq!(payload.data, common::HELLO_CONTENT);
    Ok(())
}

#[test]
fn fallback_scan_finds_a_sibling_with_the_data() -> Result<()> {
    let dir = TempDir::new()?;

    // The index says archive 5, but only game_002.vpk exists and holds the
    // bytes at the requested offset.
    let tree = common::single_file_tree(5, 8, 5);
    let path = common::write_file(dir.path(), common::GAME_DIR_VPK, &common::v1_archive(&tree, &[]))?;

    let mut sibling = vec![0; 8];
    sibling.extend_from_slice(common::HELLO_CONTENT);
    common::write_file(dir.path(), common::GAME_002_VPK, &sibling)?;

    let archive = Archive::open(&path)?;
    let entry = archive
        .tree()
        .find(common::HELLO_PATH)
        .expect("entry should exist")
        .clone();

    let payload = archive.extract(&entry)?;
    assert_eq!(payload.data, common::HELLO_CONTENT);
    Ok(())
}

#[test]
fn fallback_only_scans_matching_siblings() -> Result<()> {
    let dir = TempDir::new()?;

    let tree = common::single_file_tree(5, 8, 5);
    let path = common::write_file(dir.path(), common::GAME_DIR_VPK, &common::v1_archive(&tree, &[]))?;

    // Holds the bytes, but belongs to a different archive family.
    let mut foreign = vec![0; 8];
    foreign.extend_from_slice(common::HELLO_CONTENT);
    common::write_file(dir.path(), "other_002.vpk", &foreign)?;

    let archive = Archive::open(&path)?;
    let entry = archive
        .tree()
        .find(common::HELLO_PATH)
        .expect("entry should exist")
        .clone();

    match archive.extract(&entry) {
        Err(pak::Error::ExtractFailed { attempted }) => {
            assert!(
                attempted
                    .iter()
                    .any(|p| p.ends_with(common::GAME_005_VPK)),
                "the derived sibling should have been attempted: {attempted:?}"
            );
        }
        Err(other) => panic!("expected ExtractFailed, got {other:?}"),
        Ok(_) => panic!("no matching sibling exists, extraction should fail"),
    }
    Ok(())
}

#[test]
fn sibling_too_short_for_the_range_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;

    let tree = common::single_file_tree(0, 4, 64);
    let path = common::write_file(dir.path(), common::GAME_DIR_VPK, &common::v1_archive(&tree, &[]))?;

    // Shorter than offset + size, so the candidate must be rejected rather
    // than partially read.
    common::write_file(dir.path(), common::GAME_000_VPK, &vec![0xCD; 16])?;

    let archive = Archive::open(&path)?;
    let entry = archive
        .tree()
        .find(common::HELLO_PATH)
        .expect("entry should exist")
        .clone();

    assert!(matches!(
        archive.extract(&entry),
        Err(pak::Error::ExtractFailed { .. })
    ));
    Ok(())
}

#[cfg(feature = "mem-map")]
#[test]
fn extract_with_memory_mapped_archives() -> Result<()> {
    let dir = TempDir::new()?;
    let path = common::write_file(dir.path(), common::GAME_DIR_VPK, &common::self_contained_v1())?;

    let archive = Archive::open(&path)?;
    let entry = archive
        .tree()
        .find(common::HELLO_PATH)
        .expect("entry should exist")
        .clone();

    let mut archive_mmaps = HashMap::new();
    archive_mmaps.insert(SELF_ARCHIVE_INDEX, FileBuffer::open(&path)?);

    let payload = archive.extract_mem_map(&archive_mmaps, &entry)?;
    assert_eq!(payload.data, common::HELLO_CONTENT);
    Ok(())
}
