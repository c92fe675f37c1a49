use tempfile::TempDir;

use unpak::archive::Archive;
use unpak::detect::PakFormat;

use crate::common::{self, Result};

#[test]
fn open_ue4_archive() -> Result<()> {
    let dir = TempDir::new()?;
    let entries = [("maps/arena.umap", 8, 4), ("core.uasset", 12, 2)];
    let bytes = common::ue_archive(b"PAK\x01", &entries, &[0; 32], 2);
    let path = common::write_file(dir.path(), "assets.pak", &bytes)?;

    let archive = Archive::open(&path)?;

    assert_eq!(archive.format(), PakFormat::UnrealEngine4_5);
    assert_eq!(archive.file_count(), 2);

    let entry = archive
        .tree()
        .find("maps/arena.umap")
        .expect("entry should exist");
    assert_eq!(entry.name, "arena.umap");

    // The tree splits the path into a real directory level.
    let maps = archive.tree().root().subdirectories[0];
    assert_eq!(archive.tree().dir(maps).name, "maps");
    Ok(())
}

#[test]
fn ue3_magic_gets_its_own_format_tag() -> Result<()> {
    let dir = TempDir::new()?;
    let bytes = common::ue_archive(b"Pak\x00", &[("a.tex", 8, 2)], &[0; 32], 1);
    let path = common::write_file(dir.path(), "old.pak", &bytes)?;

    let archive = Archive::open(&path)?;
    assert_eq!(archive.format(), PakFormat::UnrealEngine3);
    Ok(())
}

#[test]
fn inflated_entry_count_is_capped_and_flagged() -> Result<()> {
    let dir = TempDir::new()?;
    let entries = [("a.uasset", 8, 1), ("b.uasset", 9, 1), ("c.uasset", 10, 1)];
    let bytes = common::ue_archive(b"PAK\x01", &entries, &[0; 32], 0x7FFF_FFFF);
    let path = common::write_file(dir.path(), "broken.pak", &bytes)?;

    let archive = Archive::open(&path)?;
    assert_eq!(archive.file_count(), 3);

    let report = archive.validate();
    assert!(
        report.warnings.iter().any(|w| w.contains("capped")),
        "the capped entry count should be surfaced: {:?}",
        report.warnings
    );
    Ok(())
}
