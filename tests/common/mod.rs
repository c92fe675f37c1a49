use const_format::concatcp;
use std::fs;
use std::path::{Path, PathBuf};

use unpak::pak::SELF_ARCHIVE_INDEX;

pub type Result<T> = std::result::Result<T, Error>;
pub type Error = Box<dyn std::error::Error>;

// Fixture names
pub const VPK_EXT: &str = ".vpk";
pub const DIR_SUFFIX: &str = "_dir";
pub const GAME_BASE: &str = "game";
pub const GAME_DIR_VPK: &str = concatcp!(GAME_BASE, DIR_SUFFIX, VPK_EXT);
pub const GAME_000_VPK: &str = concatcp!(GAME_BASE, "_000", VPK_EXT);
pub const GAME_002_VPK: &str = concatcp!(GAME_BASE, "_002", VPK_EXT);
pub const GAME_005_VPK: &str = concatcp!(GAME_BASE, "_005", VPK_EXT);

pub const HELLO_PATH: &str = "folder/hello.txt";
pub const HELLO_CONTENT: &[u8] = b"HELLO";

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, bytes)?;
    Ok(path)
}

// Byte-level archive builders; the library itself never writes archives.

pub fn cstr(s: &str) -> Vec<u8> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

pub fn pak_record(crc: u32, archive_index: u32, offset: u32, size: u32, terminator: u16) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes.extend_from_slice(&archive_index.to_le_bytes());
    bytes.extend_from_slice(&offset.to_le_bytes());
    bytes.extend_from_slice(&size.to_le_bytes());
    bytes.extend_from_slice(&terminator.to_le_bytes());
    bytes
}

pub fn dir_record(
    crc: u32,
    preload: u32,
    archive_index: u32,
    offset: u32,
    size: u32,
    terminator: u16,
) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes.extend_from_slice(&preload.to_le_bytes());
    bytes.extend_from_slice(&archive_index.to_le_bytes());
    bytes.extend_from_slice(&offset.to_le_bytes());
    bytes.extend_from_slice(&size.to_le_bytes());
    bytes.extend_from_slice(&terminator.to_le_bytes());
    bytes
}

/// End of the file loop, the directory loop, and the whole tree.
pub fn tree_tail() -> Vec<u8> {
    vec![0, 0, 0, 0xFF, 0xFF]
}

pub fn v1_archive(tree: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x55AA_1234_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u32.to_le_bytes());
    bytes.extend_from_slice(&u32::try_from(tree.len()).unwrap().to_le_bytes());
    bytes.extend_from_slice(tree);
    bytes.extend_from_slice(payload);
    bytes
}

pub fn v2_archive(tree: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x55AA_1234_u32.to_le_bytes());
    bytes.extend_from_slice(&2_u32.to_le_bytes());
    bytes.extend_from_slice(&u32::try_from(tree.len()).unwrap().to_le_bytes());
    bytes.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_le_bytes());
    bytes.extend_from_slice(&[0; 12]); // tree, file and metadata CRCs
    bytes.extend_from_slice(tree);
    bytes.extend_from_slice(payload);
    bytes
}

pub fn dir_archive(tree_size_field: u32, tree: &[u8], padding: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x0046_5456_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u32.to_le_bytes());
    bytes.extend_from_slice(&[0; 4]); // tree CRC
    bytes.extend_from_slice(&tree_size_field.to_le_bytes());
    bytes.extend_from_slice(&[0; 12]); // file, metadata and content CRCs
    bytes.extend_from_slice(tree);
    bytes.extend_from_slice(&vec![0; padding]);
    bytes
}

/// A tree holding exactly `folder/hello.txt`.
pub fn single_file_tree(archive_index: u32, offset: u32, size: u32) -> Vec<u8> {
    let mut tree = Vec::new();
    tree.extend_from_slice(&cstr("txt"));
    tree.extend_from_slice(&cstr("folder"));
    tree.extend_from_slice(&cstr("hello"));
    tree.extend_from_slice(&pak_record(0, archive_index, offset, size, 0xFFFF));
    tree.extend_from_slice(&tree_tail());
    tree
}

/// A VPK v1 archive whose single file lives in the archive itself, 16 bytes
/// past the end of the index tree.
pub fn self_contained_v1() -> Vec<u8> {
    let tree = single_file_tree(SELF_ARCHIVE_INDEX, 0x10, 5);
    let mut payload = vec![0; 16];
    payload.extend_from_slice(HELLO_CONTENT);
    v1_archive(&tree, &payload)
}

pub fn ue_archive(
    magic: &[u8; 4],
    entries: &[(&str, u64, u64)],
    payload: &[u8],
    footer_count: u32,
) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(magic);
    bytes.extend_from_slice(&4_u32.to_le_bytes()); // version

    for (path, offset, size) in entries {
        bytes.extend_from_slice(&u32::try_from(path.len()).unwrap().to_le_bytes());
        bytes.extend_from_slice(path.as_bytes());
        bytes.extend_from_slice(&offset.to_le_bytes());
        bytes.extend_from_slice(&size.to_le_bytes());
    }

    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&footer_count.to_le_bytes());
    bytes
}

/// Size of the UE header plus an entry table, so payload offsets can be
/// computed before the archive is assembled.
pub fn ue_table_len(entries: &[(&str, u64, u64)]) -> u64 {
    8 + entries
        .iter()
        .map(|(path, _, _)| 4 + path.len() as u64 + 16)
        .sum::<u64>()
}
