use tempfile::TempDir;

use unpak::archive::Archive;

use crate::common::{self, Result};

#[test]
fn extract_a_payload() -> Result<()> {
    let dir = TempDir::new()?;

    let mut entries = [("data.bin", 0, 4)];
    let table = common::ue_table_len(&entries);
    entries[0].1 = table + 4; // payload begins 4 filler bytes into the body

    let mut payload = b"xxxx".to_vec();
    payload.extend_from_slice(b"DATA");
    let bytes = common::ue_archive(b"PAK\x01", &entries, &payload, 1);
    let path = common::write_file(dir.path(), "assets.pak", &bytes)?;

    let archive = Archive::open(&path)?;
    let entry = archive
        .tree()
        .find("data.bin")
        .expect("entry should exist")
        .clone();

    let extracted = archive.extract(&entry)?;
    assert_eq!(extracted.data, b"DATA");
    assert!(!extracted.short_read);
    Ok(())
}

#[test]
fn truncated_payload_returns_the_prefix() -> Result<()> {
    let dir = TempDir::new()?;

    let mut entries = [("data.bin", 0, 20)];
    let table = common::ue_table_len(&entries);
    entries[0].1 = table + 4;

    // Only 4 payload bytes exist past the requested offset (plus the 4-byte
    // footer), far fewer than the 20 the entry promises.
    let bytes = common::ue_archive(b"PAK\x01", &entries, b"xxxxEFGH", 1);
    let path = common::write_file(dir.path(), "short.pak", &bytes)?;

    let archive = Archive::open(&path)?;
    let entry = archive
        .tree()
        .find("data.bin")
        .expect("entry should exist")
        .clone();

    let extracted = archive.extract(&entry)?;
    assert!(extracted.short_read);
    assert!(extracted.data.len() < 20);
    assert_eq!(&extracted.data[..4], b"EFGH");
    Ok(())
}
