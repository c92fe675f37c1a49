//! Support for the Unreal Engine PAK format.
//!
//! Both the UE3 layout (`"Pak\0"` magic) and the UE4/5 layout (`"PAK"`
//! prefix) use the same index: length-prefixed paths with 64-bit ranges from
//! offset 8, and the entry count stored in the last 4 bytes of the file.

use std::path::Path;

use log::{debug, info, warn};

use super::{Error, FileEntry, Limits, ParsedIndex, Payload, Result, SELF_ARCHIVE_INDEX};
use crate::util;
use crate::util::file::ArchiveFile;

/// The exact 4-byte magic of an Unreal Engine 3 archive.
pub const UE3_MAGIC: [u8; 4] = *b"Pak\0";

/// The magic prefix shared by Unreal Engine 4 and 5 archives.
pub const UE_MAGIC_PREFIX: [u8; 3] = *b"PAK";

/// Anything smaller cannot hold a header, one entry and the count footer.
const MIN_FILE_LEN: u64 = 36;

/// Offset of the first index entry.
const ENTRY_TABLE_OFFSET: u64 = 8;

/// Longest accepted entry path, in bytes.
const PATH_READ_LIMIT: u32 = 512;

/// Decoder for Unreal Engine PAK archives.
#[derive(Debug, Default)]
pub struct UeDecoder;

impl UeDecoder {
    /// Decodes the entry table of an Unreal PAK archive.
    ///
    /// Entry counts above [`Limits::ue_suspect_entry_count`] are treated as
    /// corruption and replaced by [`Limits::ue_entry_cap`]; the substitution
    /// is recorded in the returned index.
    /// # Errors
    /// - [`Error::BadMagic`] when the magic matches neither UE layout
    /// - [`Error::ParseFailed`] when the table yields no entries
    /// - [`Error::Util`] when the index file cannot be read
    pub fn parse(&mut self, file: &mut ArchiveFile, limits: &Limits) -> Result<ParsedIndex> {
        if file.len() < MIN_FILE_LEN {
            return Err(Error::ParseFailed(format!(
                "file too small for an Unreal PAK archive ({} bytes)",
                file.len()
            )));
        }

        file.seek_to(0).map_err(|e| Error::Util {
            source: e,
            context: "Failed to seek to header".to_string(),
        })?;

        let magic = file.read_bytes(4).map_err(|e| Error::Util {
            source: e,
            context: "Failed to read magic".to_string(),
        })?;

        if magic != UE3_MAGIC && !magic.starts_with(&UE_MAGIC_PREFIX) {
            return Err(Error::BadMagic(format!(
                "Unreal PAK magic should be \"Pak\\0\" or start with \"PAK\" but is {magic:02X?}"
            )));
        }

        let version = file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read version".to_string(),
        })?;

        file.seek_to(file.len() - 4).map_err(|e| Error::Util {
            source: e,
            context: "Failed to seek to entry count".to_string(),
        })?;

        let mut entry_count = file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read entry count".to_string(),
        })?;

        debug!("ue: version {version}, footer declares {entry_count} entries");

        let mut index = ParsedIndex::default();

        if entry_count > limits.ue_suspect_entry_count {
            warn!(
                "ue: suspicious entry count {entry_count}, adjusting to {}",
                limits.ue_entry_cap
            );
            entry_count = limits.ue_entry_cap;
            index.entry_cap_applied = true;
        }

        file.seek_to(ENTRY_TABLE_OFFSET).map_err(|e| Error::Util {
            source: e,
            context: "Failed to seek to entry table".to_string(),
        })?;

        for i in 0..entry_count {
            let path_len = match file.read_u32() {
                Ok(len) => len,
                Err(util::Error::Io(e)) => return Err(fatal(e, "Failed to read path length")),
                Err(_) => {
                    debug!("ue: reached end of entries at entry {i}");
                    break;
                }
            };

            if path_len == 0 || path_len > PATH_READ_LIMIT {
                debug!("ue: implausible path length {path_len} at entry {i}, stopping");
                break;
            }

            let raw_path = match file.read_bytes(path_len as usize) {
                Ok(bytes) if bytes.len() == path_len as usize => bytes,
                Ok(_) => break,
                Err(util::Error::Io(e)) => return Err(fatal(e, "Failed to read path")),
                Err(_) => break,
            };

            let offset = match file.read_u64() {
                Ok(v) => v,
                Err(util::Error::Io(e)) => return Err(fatal(e, "Failed to read entry offset")),
                Err(_) => break,
            };

            let size = match file.read_u64() {
                Ok(v) => v,
                Err(util::Error::Io(e)) => return Err(fatal(e, "Failed to read entry size")),
                Err(_) => break,
            };

            if offset > file.len() || size > file.len() {
                debug!("ue: entry {i} range escapes the archive, skipping");
                index.rejected += 1;
                continue;
            }

            if !raw_path.iter().all(|b| (0x20..=0x7E).contains(b)) {
                warn!("ue: skipping entry {i} with non-printable path bytes");
                index.rejected += 1;
                continue;
            }

            let Ok(path) = String::from_utf8(raw_path) else {
                index.rejected += 1;
                continue;
            };
            let path = path.replace('\\', "/");

            index.entries.push(FileEntry {
                name: path.clone(),
                path,
                offset,
                size,
                archive_index: SELF_ARCHIVE_INDEX,
            });
        }

        info!("ue: parsed {} file entries", index.entries.len());

        if index.entries.is_empty() {
            return Err(Error::ParseFailed(
                "Unreal PAK index contains no entries".to_string(),
            ));
        }

        Ok(index)
    }

    /// Reads the payload bytes for `entry` from the archive itself, returning
    /// the available prefix when the archive is truncated.
    /// # Errors
    /// - [`Error::ExtractFailed`] when the archive cannot be read
    pub fn read_file(&self, archive_path: &Path, entry: &FileEntry) -> Result<Payload> {
        super::read_self_range(archive_path, entry.offset, entry.size).map_err(|e| {
            debug!("ue: read of {} failed: {e}", archive_path.display());
            Error::ExtractFailed {
                attempted: vec![archive_path.to_path_buf()],
            }
        })
    }
}

fn fatal(e: std::io::Error, context: &str) -> Error {
    Error::Util {
        source: util::Error::Io(e),
        context: context.to_string(),
    }
}
