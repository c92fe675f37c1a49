//! Container decoders and the shared archive data model.

use std::path::Path;

use crate::util::file::ArchiveFile;

pub use error::{Error, Result};

pub mod generic;
pub mod tree;
pub mod ue;
pub mod vpk;

mod error;

#[cfg(feature = "detect")]
use crate::detect::PakFormat;

use generic::GenericDecoder;
use ue::UeDecoder;
use vpk::VpkDecoder;

#[cfg(feature = "mem-map")]
use filebuffer::FileBuffer;
#[cfg(feature = "mem-map")]
use std::collections::HashMap;

/// Sentinel archive index meaning "the payload lives in the same file as the
/// index".
pub const SELF_ARCHIVE_INDEX: u32 = 0x7FFF;

/// One payload record decoded from an archive index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Leaf filename including the extension.
    pub name: String,

    /// Full logical path inside the archive, `/`-separated, no leading `/`.
    pub path: String,

    /// Byte offset of the payload within the file selected by
    /// [`archive_index`](Self::archive_index). For VPK entries stored in the
    /// index file itself this counts from the end of the index tree.
    pub offset: u64,

    /// Payload length in bytes.
    pub size: u64,

    /// Selects the physical file holding the payload. [`SELF_ARCHIVE_INDEX`]
    /// means the index file itself; any other value selects the numbered
    /// sibling `<base>_NNN.vpk`.
    pub archive_index: u32,
}

/// Extracted payload bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct Payload {
    pub data: Vec<u8>,

    /// True when the source file held fewer bytes than the entry promised and
    /// `data` is the available prefix.
    pub short_read: bool,
}

/// The flat result of decoding an archive index, before tree construction.
#[derive(Debug, Default)]
pub struct ParsedIndex {
    /// Decoded entries in index order.
    pub entries: Vec<FileEntry>,

    /// Per-entry rejections that did not stop the parse.
    pub rejected: u32,

    /// True when a suspicious entry count was replaced by the configured cap.
    pub entry_cap_applied: bool,
}

/// Decoder rejection thresholds and policies.
///
/// A plain value; pass your own to tighten or loosen the defaults.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Longest accepted extension name in a VPK tree.
    pub max_extension_len: usize,

    /// Longest accepted directory name in a VPK tree.
    pub max_directory_len: usize,

    /// Longest accepted filename in a VPK tree.
    pub max_filename_len: usize,

    /// Unreal PAK entry counts above this are treated as corruption.
    pub ue_suspect_entry_count: u32,

    /// Replacement entry count when the footer value is suspect.
    pub ue_entry_cap: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_extension_len: 50,
            max_directory_len: 512,
            max_filename_len: 512,
            ue_suspect_entry_count: 100_000,
            ue_entry_cap: 256,
        }
    }
}

/// The decoder variant chosen at detection time.
///
/// Each variant carries the full capability set for its container family:
/// parsing the index into a flat entry list and resolving entry payloads to
/// bytes.
#[derive(Debug)]
pub enum Decoder {
    Vpk(VpkDecoder),
    Ue(UeDecoder),
    Generic(GenericDecoder),
}

impl Decoder {
    /// Picks the decoder for a detected format. Unknown formats get the
    /// generic decoder, which cannot parse but can still extract
    /// caller-supplied ranges.
    #[cfg(feature = "detect")]
    #[must_use]
    pub fn for_format(format: &PakFormat) -> Self {
        match format {
            PakFormat::SourceEngine => Self::Vpk(VpkDecoder::default()),
            PakFormat::UnrealEngine3 | PakFormat::UnrealEngine4_5 => Self::Ue(UeDecoder),
            PakFormat::Generic | PakFormat::Unknown => Self::Generic(GenericDecoder),
        }
    }

    /// Decodes the archive index into a flat entry list.
    /// # Errors
    /// - [`Error::BadMagic`] when the header does not match the variant
    /// - [`Error::ParseFailed`] when no entries could be decoded
    /// - [`Error::Util`] when the index file cannot be read
    pub fn parse(&mut self, file: &mut ArchiveFile, limits: &Limits) -> Result<ParsedIndex> {
        match self {
            Self::Vpk(decoder) => decoder.parse(file, limits),
            Self::Ue(decoder) => decoder.parse(file, limits),
            Self::Generic(decoder) => decoder.parse(),
        }
    }

    /// Reads the payload bytes for `entry`, resolving sibling archives where
    /// needed.
    /// # Errors
    /// - [`Error::ExtractFailed`] when every candidate file failed
    pub fn read_file(&self, archive_path: &Path, entry: &FileEntry) -> Result<Payload> {
        match self {
            Self::Vpk(decoder) => decoder.read_file(archive_path, entry),
            Self::Ue(decoder) => decoder.read_file(archive_path, entry),
            Self::Generic(decoder) => decoder.read_file(archive_path, entry),
        }
    }

    /// Reads the payload bytes for `entry` from memory-mapped archives.
    /// The map is keyed by archive index, with [`SELF_ARCHIVE_INDEX`] for the
    /// index file itself.
    /// # Errors
    /// - [`Error::ExtractFailed`] when the mapping is missing or too short
    #[cfg(feature = "mem-map")]
    pub fn read_file_mem_map(
        &self,
        archive_mmaps: &HashMap<u32, FileBuffer>,
        entry: &FileEntry,
    ) -> Result<Payload> {
        match self {
            Self::Vpk(decoder) => decoder.read_file_mem_map(archive_mmaps, entry),
            Self::Ue(UeDecoder) | Self::Generic(GenericDecoder) => {
                read_mem_map_range(archive_mmaps, entry, entry.offset)
            }
        }
    }
}

/// Reads `size` bytes at `offset` from the archive itself, clamped at end of
/// file: a shorter file yields the available prefix with a short-read flag.
pub(crate) fn read_self_range(path: &Path, offset: u64, size: u64) -> Result<Payload> {
    let mut file = ArchiveFile::open(path).map_err(|e| Error::Util {
        source: e,
        context: format!("Failed to open archive {}", path.display()),
    })?;

    if offset > file.len() {
        return Err(Error::Util {
            source: crate::util::Error::OutOfBounds {
                position: offset,
                requested: size,
                length: file.len(),
            },
            context: "Entry offset is past the end of the archive".to_string(),
        });
    }

    file.seek_to(offset).map_err(|e| Error::Util {
        source: e,
        context: "Failed to seek to entry data".to_string(),
    })?;

    let available = file.len() - offset;
    let count = usize::try_from(size.min(available)).map_err(|_| Error::Util {
        source: crate::util::Error::OutOfBounds {
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

    let short_read = (data.len() as u64) < size;
    if short_read {
        log::warn!(
            "expected {size} bytes but read {} from {}",
            data.len(),
            path.display()
        );
    }

    Ok(Payload { data, short_read })
}

/// Slices `entry`'s range out of the mapped archive selected by its index.
#[cfg(feature = "mem-map")]
pub(crate) fn read_mem_map_range(
    archive_mmaps: &HashMap<u32, FileBuffer>,
    entry: &FileEntry,
    offset: u64,
) -> Result<Payload> {
    let buffer = archive_mmaps
        .get(&entry.archive_index)
        .ok_or(Error::ExtractFailed { attempted: vec![] })?;

    let start = usize::try_from(offset).map_err(|_| Error::ExtractFailed { attempted: vec![] })?;
    let size = usize::try_from(entry.size).map_err(|_| Error::ExtractFailed { attempted: vec![] })?;

    let end = start
        .checked_add(size)
        .filter(|end| *end <= buffer.len())
        .ok_or(Error::ExtractFailed { attempted: vec![] })?;

    Ok(Payload {
        data: buffer[start..end].to_vec(),
        short_read: false,
    })
}
