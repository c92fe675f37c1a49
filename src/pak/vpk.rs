//! Support for the Source-engine VPK container family.
//!
//! Covers single-file VPK v1/v2 archives, `_dir.vpk` indexes paired with
//! numbered data archives, and the directory-only header variant. Checksum
//! fields are read and reported but never verified.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::{Error, FileEntry, Limits, ParsedIndex, Payload, Result, SELF_ARCHIVE_INDEX};
use crate::util;
use crate::util::file::ArchiveFile;

#[cfg(feature = "mem-map")]
use filebuffer::FileBuffer;
#[cfg(feature = "mem-map")]
use std::collections::HashMap;

/// The 4-byte signature found in the header of a VPK v1/v2 archive.
pub const VPK_SIGNATURE: u32 = 0x55AA_1234;

/// The 4-byte signature of the directory-only VPK variant.
pub const VPK_DIR_SIGNATURE: u32 = 0x0046_5456;

/// The terminator sequence (2 bytes) closing every VPK tree entry.
pub const VPK_ENTRY_TERMINATOR: u16 = 0xFFFF;

// Read caps for the null-terminated tree strings.
const EXTENSION_READ_LIMIT: usize = 64;
const NAME_READ_LIMIT: usize = 512;

// Resync scan bounds for directory files whose header tree size is unusable.
const SCAN_SPAN: u64 = 10_000;
const SCAN_STEP: u64 = 4;
const SCAN_EOF_MARGIN: u64 = 100;
const SCAN_EXTENSION_MAX: usize = 20;
const SCAN_DIRECTORY_MAX: usize = 256;

// Trailing checksum sections assumed to follow the tree when the header tree
// size cannot be trusted.
const DIR_TAIL_RESERVE: u64 = 48;

/// Which per-entry metadata record a tree uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordLayout {
    /// `crc, archive_index, entry_offset, entry_size, terminator` (18 bytes).
    Pak,
    /// The same with a preload length after the CRC (22 bytes).
    Directory,
}

impl RecordLayout {
    fn len(self) -> u64 {
        match self {
            Self::Pak => 18,
            Self::Directory => 22,
        }
    }
}

struct RawRecord {
    crc: u32,
    archive_index: u32,
    entry_offset: u32,
    entry_size: u32,
    terminator: u16,
}

/// Decoder for the VPK container family.
///
/// `parse` records where payload data begins so that entries stored in the
/// index file itself (archive index [`SELF_ARCHIVE_INDEX`]) can be resolved
/// at extraction time; their stored offsets count from the end of the tree.
#[derive(Debug, Default)]
pub struct VpkDecoder {
    data_start: u64,
}

impl VpkDecoder {
    /// Decodes the index tree of a VPK archive into a flat entry list.
    /// # Errors
    /// - [`Error::BadMagic`] when neither VPK signature matches
    /// - [`Error::ParseFailed`] when the tree yields no entries
    /// - [`Error::Util`] when the index file cannot be read
    pub fn parse(&mut self, file: &mut ArchiveFile, limits: &Limits) -> Result<ParsedIndex> {
        if file.len() < 8 {
            return Err(Error::ParseFailed(format!(
                "file too small for a VPK header ({} bytes)",
                file.len()
            )));
        }

        file.seek_to(0).map_err(|e| Error::Util {
            source: e,
            context: "Failed to seek to header".to_string(),
        })?;

        let signature = file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read signature".to_string(),
        })?;

        match signature {
            VPK_SIGNATURE => self.parse_pak(file, limits),
            VPK_DIR_SIGNATURE => self.parse_dir(file, limits),
            _ => Err(Error::BadMagic(format!(
                "VPK signature should be {VPK_SIGNATURE:#010X} or {VPK_DIR_SIGNATURE:#010X} but is {signature:#010X}"
            ))),
        }
    }

    /// Reads the payload bytes for `entry`, opening the sibling data archive
    /// its index points at and falling back to a directory scan when the
    /// expected sibling is missing or too short.
    /// # Errors
    /// - [`Error::ExtractFailed`] listing every candidate that was attempted
    pub fn read_file(&self, archive_path: &Path, entry: &FileEntry) -> Result<Payload> {
        let mut attempted: Vec<PathBuf> = Vec::new();

        if entry.archive_index == SELF_ARCHIVE_INDEX {
            if let Some(offset) = self.data_start.checked_add(entry.offset) {
                match read_data_range(archive_path, offset, entry.size) {
                    Ok(payload) => return Ok(payload),
                    Err(e) => debug!("vpk: direct read of {} failed: {e}", archive_path.display()),
                }
            }
            attempted.push(archive_path.to_path_buf());
        } else {
            let sibling = sibling_archive_path(archive_path, entry.archive_index);
            match read_data_range(&sibling, entry.offset, entry.size) {
                Ok(payload) => return Ok(payload),
                Err(e) => debug!("vpk: direct read of {} failed: {e}", sibling.display()),
            }
            attempted.push(sibling);
        }

        warn!(
            "vpk: direct data read failed for {}, scanning sibling data archives",
            entry.path
        );

        if let Some(payload) = self.fallback_scan(archive_path, entry, &mut attempted) {
            return Ok(payload);
        }

        Err(Error::ExtractFailed { attempted })
    }

    /// Reads the payload bytes for `entry` from memory-mapped archives, keyed
    /// by archive index with [`SELF_ARCHIVE_INDEX`] for the index file.
    /// # Errors
    /// - [`Error::ExtractFailed`] when the mapping is missing or too short
    #[cfg(feature = "mem-map")]
    pub fn read_file_mem_map(
        &self,
        archive_mmaps: &HashMap<u32, FileBuffer>,
        entry: &FileEntry,
    ) -> Result<Payload> {
        let offset = if entry.archive_index == SELF_ARCHIVE_INDEX {
            self.data_start
                .checked_add(entry.offset)
                .ok_or(Error::ExtractFailed { attempted: vec![] })?
        } else {
            entry.offset
        };

        super::read_mem_map_range(archive_mmaps, entry, offset)
    }

    fn parse_pak(&mut self, file: &mut ArchiveFile, limits: &Limits) -> Result<ParsedIndex> {
        let version = file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read version".to_string(),
        })?;

        let mut tree_size = u64::from(file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read tree size".to_string(),
        })?);

        let mut tree_start = 12;
        if version == 2 {
            let file_data_section_size = file.read_u32().map_err(|e| Error::Util {
                source: e,
                context: "Failed to read file data section size".to_string(),
            })?;
            let tree_crc = file.read_u32().map_err(|e| Error::Util {
                source: e,
                context: "Failed to read tree CRC".to_string(),
            })?;
            let file_crc = file.read_u32().map_err(|e| Error::Util {
                source: e,
                context: "Failed to read file CRC".to_string(),
            })?;
            let meta_crc = file.read_u32().map_err(|e| Error::Util {
                source: e,
                context: "Failed to read metadata CRC".to_string(),
            })?;

            tree_start = 28;
            debug!(
                "vpk: file data section {file_data_section_size} bytes, tree crc {tree_crc:#010X}, file crc {file_crc:#010X}, meta crc {meta_crc:#010X}"
            );
        }

        info!("vpk: version {version}, tree of {tree_size} bytes at offset {tree_start}");

        let available = file.len().saturating_sub(tree_start);
        if tree_size > available {
            warn!("vpk: tree size {tree_size} exceeds the {available} available bytes, clamping");
            tree_size = available;
        }

        let tree_end = tree_start + tree_size;
        self.data_start = tree_end;

        let index = walk_tree(file, tree_start, tree_end, RecordLayout::Pak, limits)?;
        if index.entries.is_empty() {
            return Err(Error::ParseFailed("VPK tree contains no entries".to_string()));
        }

        Ok(index)
    }

    fn parse_dir(&mut self, file: &mut ArchiveFile, limits: &Limits) -> Result<ParsedIndex> {
        let version = file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read version".to_string(),
        })?;
        let tree_crc = file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read tree CRC".to_string(),
        })?;
        let tree_size = u64::from(file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read tree size".to_string(),
        })?);
        let file_crc = file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read file CRC".to_string(),
        })?;
        let meta_crc = file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read metadata CRC".to_string(),
        })?;
        let content_crc = file.read_u32().map_err(|e| Error::Util {
            source: e,
            context: "Failed to read content CRC".to_string(),
        })?;

        info!(
            "vpk: directory file version {version}, tree of {tree_size} bytes, tree crc {tree_crc:#010X}, file crc {file_crc:#010X}, meta crc {meta_crc:#010X}, content crc {content_crc:#010X}"
        );

        let mut tree_start = 28;
        let available = file.len().saturating_sub(tree_start);

        if tree_size == 0 || tree_size > available {
            warn!("vpk: unusable tree size {tree_size} in directory header, scanning for tree data");

            match scan_for_tree(file, tree_start)? {
                Some(found) => {
                    info!("vpk: found tree data at offset {found}");
                    tree_start = found;
                }
                None => {
                    warn!("vpk: no plausible tree start found, assuming offset 12");
                    tree_start = 12;
                }
            }
        }

        let tree_end = if tree_size > 0 && tree_size < file.len() {
            tree_start + tree_size
        } else {
            file.len().saturating_sub(DIR_TAIL_RESERVE)
        };
        self.data_start = tree_end;

        let index = walk_tree(file, tree_start, tree_end, RecordLayout::Directory, limits)?;
        if index.entries.is_empty() {
            return Err(Error::ParseFailed(
                "VPK directory tree contains no entries".to_string(),
            ));
        }

        Ok(index)
    }

    fn fallback_scan(
        &self,
        archive_path: &Path,
        entry: &FileEntry,
        attempted: &mut Vec<PathBuf>,
    ) -> Option<Payload> {
        let dir = archive_path.parent()?;
        let stem = archive_path.file_stem().and_then(OsStr::to_str)?;
        let base = stem.strip_suffix("_dir").unwrap_or(stem);
        let prefix = format!("{base}_");

        let candidates = fs::read_dir(dir).ok()?;
        for candidate in candidates.flatten() {
            let path = candidate.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(OsStr::to_str) != Some("vpk") {
                continue;
            }
            let Some(name) = path.file_name().and_then(OsStr::to_str) else {
                continue;
            };
            if name.contains("_dir.vpk") || !name.starts_with(&prefix) {
                continue;
            }

            debug!("vpk: fallback trying data archive {}", path.display());
            match read_data_range(&path, entry.offset, entry.size) {
                Ok(payload) => {
                    info!("vpk: fallback read {} from {}", entry.path, path.display());
                    return Some(payload);
                }
                Err(_) => attempted.push(path),
            }
        }

        warn!(
            "vpk: fallback search found no data for {} (prefix {prefix:?})",
            entry.path
        );
        None
    }
}

/// Walks the three-level interleaved tree of null-terminated strings.
///
/// Extension, directory and file loops each exit on their own structural
/// errors so damage from one corrupt record stays local; fixed-size metadata
/// records are consumed whole, which keeps the cursor aligned for the next
/// file name even when a terminator is wrong.
fn walk_tree(
    file: &mut ArchiveFile,
    tree_start: u64,
    tree_end: u64,
    layout: RecordLayout,
    limits: &Limits,
) -> Result<ParsedIndex> {
    let mut index = ParsedIndex::default();

    if tree_start >= file.len() {
        return Ok(index);
    }

    file.seek_to(tree_start).map_err(|e| Error::Util {
        source: e,
        context: "Failed to seek to tree".to_string(),
    })?;

    'extensions: while cursor(file)? < tree_end {
        let ext_name = match file.read_string(EXTENSION_READ_LIMIT) {
            Ok(name) => name,
            Err(util::Error::Io(e)) => return Err(fatal(e, "Failed to read extension")),
            Err(e) => {
                warn!("vpk: unreadable extension name, stopping parse: {e}");
                break 'extensions;
            }
        };

        if cursor(file)? > tree_end {
            break;
        }

        if ext_name.is_empty() {
            // An empty extension followed by the terminator ends the tree.
            // Anything else gets rewound so the scan continues byte by byte.
            if tree_end.saturating_sub(cursor(file)?) < 2 {
                break;
            }
            let peek_pos = cursor(file)?;
            let term = match file.read_u16() {
                Ok(term) => term,
                Err(util::Error::Io(e)) => return Err(fatal(e, "Failed to read terminator")),
                Err(_) => break,
            };
            if term == VPK_ENTRY_TERMINATOR {
                debug!("vpk: tree terminated cleanly at offset {peek_pos}");
                break;
            }
            file.seek_to(peek_pos).map_err(|e| Error::Util {
                source: e,
                context: "Failed to rewind after terminator probe".to_string(),
            })?;
            continue;
        }

        'directories: while cursor(file)? < tree_end {
            let dir_name = match file.read_string(NAME_READ_LIMIT) {
                Ok(name) => name,
                Err(util::Error::Io(e)) => return Err(fatal(e, "Failed to read directory name")),
                Err(e) => {
                    warn!("vpk: unreadable directory name, aborting extension {ext_name:?}: {e}");
                    break 'directories;
                }
            };

            if cursor(file)? > tree_end || dir_name.is_empty() {
                break;
            }

            'files: while cursor(file)? < tree_end {
                let name_start = cursor(file)?;
                let file_name = match file.read_string(NAME_READ_LIMIT) {
                    Ok(name) => name,
                    Err(util::Error::Io(e)) => return Err(fatal(e, "Failed to read file name")),
                    Err(e) => {
                        warn!("vpk: unreadable file name, aborting directory {dir_name:?}: {e}");
                        break 'files;
                    }
                };

                if cursor(file)? > tree_end {
                    warn!("vpk: read past tree boundary at offset {}", cursor(file)?);
                    break;
                }

                if file_name.is_empty() {
                    break;
                }

                // The string read must have advanced by exactly len + 1
                // bytes; re-seek before touching metadata if it did not.
                let expected = name_start + file_name.len() as u64 + 1;
                if cursor(file)? != expected {
                    warn!(
                        "vpk: cursor at {} after reading {file_name:?}, expected {expected}; re-seeking",
                        cursor(file)?
                    );
                    if expected > file.len() {
                        break;
                    }
                    file.seek_to(expected).map_err(|e| Error::Util {
                        source: e,
                        context: "Failed to re-seek after file name".to_string(),
                    })?;
                }

                if tree_end.saturating_sub(cursor(file)?) < layout.len() {
                    warn!(
                        "vpk: not enough space for entry metadata at offset {}, stopping parse",
                        cursor(file)?
                    );
                    let stop = tree_end.min(file.len());
                    file.seek_to(stop).map_err(|e| Error::Util {
                        source: e,
                        context: "Failed to seek to tree end".to_string(),
                    })?;
                    break 'files;
                }

                let record = match read_record(file, layout) {
                    Ok(record) => record,
                    Err(util::Error::Io(e)) => return Err(fatal(e, "Failed to read entry metadata")),
                    Err(e) => {
                        warn!("vpk: unreadable metadata for {file_name:?}: {e}");
                        index.rejected += 1;
                        break 'files;
                    }
                };

                if record.terminator != VPK_ENTRY_TERMINATOR {
                    warn!(
                        "vpk: entry terminator {:#06X} should be {VPK_ENTRY_TERMINATOR:#06X}, discarding {file_name:?}",
                        record.terminator
                    );
                    index.rejected += 1;
                    continue;
                }

                if ext_name.len() > limits.max_extension_len
                    || dir_name.len() > limits.max_directory_len
                    || file_name.len() > limits.max_filename_len
                {
                    warn!(
                        "vpk: skipping entry with suspiciously long names: ext={}, dir={}, file={}",
                        ext_name.len(),
                        dir_name.len(),
                        file_name.len()
                    );
                    index.rejected += 1;
                    continue;
                }

                if !is_printable(&ext_name) || !is_printable(&dir_name) || !is_printable(&file_name)
                {
                    warn!("vpk: skipping entry with invalid characters (file: {file_name:?})");
                    index.rejected += 1;
                    continue;
                }

                let name = format!("{file_name}.{ext_name}");
                let path = if dir_name == " " || dir_name.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{name}", dir_name.replace('\\', "/"))
                };

                debug!(
                    "vpk: entry {path}, archive {}, offset {}, size {}, crc {:#010X}",
                    record.archive_index, record.entry_offset, record.entry_size, record.crc
                );

                index.entries.push(FileEntry {
                    name,
                    path,
                    offset: u64::from(record.entry_offset),
                    size: u64::from(record.entry_size),
                    archive_index: record.archive_index,
                });
            }
        }
    }

    info!(
        "vpk: decoded {} file entries ({} rejected)",
        index.entries.len(),
        index.rejected
    );

    Ok(index)
}

fn read_record(file: &mut ArchiveFile, layout: RecordLayout) -> util::Result<RawRecord> {
    let crc = file.read_u32()?;

    if layout == RecordLayout::Directory {
        // Preload length; preload data is never materialized.
        let _preload_size = file.read_u32()?;
    }

    let archive_index = file.read_u32()?;
    let entry_offset = file.read_u32()?;
    let entry_size = file.read_u32()?;
    let terminator = file.read_u16()?;

    Ok(RawRecord {
        crc,
        archive_index,
        entry_offset,
        entry_size,
        terminator,
    })
}

/// Probes forward from `from` for something that looks like the start of a
/// tree: a short printable extension string followed by a printable directory
/// string.
fn scan_for_tree(file: &mut ArchiveFile, from: u64) -> Result<Option<u64>> {
    let limit = file.len().saturating_sub(SCAN_EOF_MARGIN);
    let mut scanned = 0;

    while scanned < SCAN_SPAN {
        let pos = from + scanned;
        if pos >= limit {
            break;
        }

        file.seek_to(pos).map_err(|e| Error::Util {
            source: e,
            context: "Failed to seek while scanning for tree data".to_string(),
        })?;

        if probe_string(file, SCAN_EXTENSION_MAX)? && probe_string(file, SCAN_DIRECTORY_MAX)? {
            return Ok(Some(pos));
        }

        scanned += SCAN_STEP;
    }

    Ok(None)
}

fn probe_string(file: &mut ArchiveFile, max_len: usize) -> Result<bool> {
    match file.read_string(max_len) {
        Ok(s) => Ok(!s.is_empty() && is_printable(&s)),
        Err(util::Error::Io(e)) => Err(fatal(e, "Failed to probe for tree data")),
        Err(_) => Ok(false),
    }
}

fn is_printable(s: &str) -> bool {
    s.chars().all(|c| ('\u{20}'..='\u{7E}').contains(&c))
}

fn cursor(file: &mut ArchiveFile) -> Result<u64> {
    file.pos().map_err(|e| Error::Util {
        source: e,
        context: "Failed to query cursor position".to_string(),
    })
}

fn fatal(e: std::io::Error, context: &str) -> Error {
    Error::Util {
        source: util::Error::Io(e),
        context: context.to_string(),
    }
}

/// Derives the numbered sibling archive path for an index file.
///
/// `pak01_dir.vpk` with index 5 becomes `pak01_005.vpk`; paths without the
/// `_dir.vpk` convention get a trailing `_dir` stripped from the stem before
/// `_NNN.vpk` is appended.
pub(crate) fn sibling_archive_path(archive_path: &Path, index: u32) -> PathBuf {
    let file_name = archive_path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or_default();

    if let Some(pos) = file_name.find("_dir.vpk") {
        let mut name = String::with_capacity(file_name.len() + 4);
        name.push_str(&file_name[..pos]);
        name.push_str(&format!("_{index:03}.vpk"));
        name.push_str(&file_name[pos + "_dir.vpk".len()..]);
        archive_path.with_file_name(name)
    } else {
        let stem = archive_path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or_default();
        let base = stem.strip_suffix("_dir").unwrap_or(stem);
        archive_path.with_file_name(format!("{base}_{index:03}.vpk"))
    }
}

/// Reads a full `(offset, size)` range out of a data archive. The whole range
/// must lie within the file; a candidate that cannot satisfy it is rejected
/// so the caller can try the next one.
fn read_data_range(path: &Path, offset: u64, size: u64) -> Result<Payload> {
    let mut file = ArchiveFile::open(path).map_err(|e| Error::Util {
        source: e,
        context: format!("Failed to open data archive {}", path.display()),
    })?;

    let end = offset.checked_add(size).ok_or(Error::Util {
        source: util::Error::OutOfBounds {
            position: offset,
            requested: size,
            length: file.len(),
        },
        context: "Entry range overflows".to_string(),
    })?;

    if offset >= file.len() || end > file.len() {
        return Err(Error::Util {
            source: util::Error::OutOfBounds {
                position: offset,
                requested: size,
                length: file.len(),
            },
            context: "Entry range escapes the data archive".to_string(),
        });
    }

    file.seek_to(offset).map_err(|e| Error::Util {
        source: e,
        context: "Failed to seek to entry data".to_string(),
    })?;

    let count = usize::try_from(size).map_err(|_| Error::Util {
        source: util::Error::OutOfBounds {
            position: offset,
            requested: size,
            length: file.len(),
        },
        context: "Entry size exceeds addressable memory".to_string(),
    })?;

    let data = file.read_bytes(count).map_err(|e| Error::Util {
        source: e,
        context: "Failed to read entry data".to_string(),
    })?;

    if data.is_empty() && size > 0 {
        return Err(Error::Util {
            source: util::Error::OutOfBounds {
                position: offset,
                requested: size,
                length: file.len(),
            },
            context: "Read no data from data archive".to_string(),
        });
    }

    let short_read = (data.len() as u64) < size;
    if short_read {
        warn!(
            "vpk: expected {size} bytes but read {} from {}",
            data.len(),
            path.display()
        );
    }

    Ok(Payload { data, short_read })
}
