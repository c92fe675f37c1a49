//! High-level archive facade: detect, parse, browse, extract.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use log::info;

use crate::detect::{self, PakFormat};
use crate::pak::tree::{DirectoryTree, build_tree};
use crate::pak::{self, Decoder, FileEntry, Limits, Payload};
use crate::util::file::ArchiveFile;
use crate::validate::{self, ValidationResult};

#[cfg(feature = "mem-map")]
use filebuffer::FileBuffer;
#[cfg(feature = "mem-map")]
use std::collections::HashMap;

/// A parsed, read-only archive.
///
/// Owns the directory tree built from the archive index; dropping the archive
/// frees the whole tree as one unit. File handles are opened per operation,
/// never held between calls, so an `Archive` can be shared immutably across
/// threads once `open` returns.
pub struct Archive {
    path: PathBuf,
    format: PakFormat,
    decoder: Decoder,
    tree: DirectoryTree,
    file_count: u32,
    archive_size: u64,
    rejected_entries: u32,
    entry_cap_applied: bool,
}

impl Archive {
    /// Opens and parses the archive at `path` with default [`Limits`].
    /// # Errors
    /// - [`pak::Error::NotFound`] when the path does not exist
    /// - [`pak::Error::ParseFailed`] when no decoder produced entries
    /// - [`pak::Error::Util`] when the index file cannot be read
    pub fn open(path: &Path) -> pak::Result<Self> {
        Self::open_with(path, &Limits::default())
    }

    /// Opens and parses the archive at `path` with caller-supplied [`Limits`].
    /// # Errors
    /// See [`Archive::open`].
    pub fn open_with(path: &Path, limits: &Limits) -> pak::Result<Self> {
        if !path.exists() {
            return Err(pak::Error::NotFound(path.to_path_buf()));
        }

        let mut file = ArchiveFile::open(path).map_err(|e| pak::Error::Util {
            source: e,
            context: "Failed to open archive".to_string(),
        })?;
        let archive_size = file.len();

        info!("archive: {} ({archive_size} bytes)", path.display());

        let format = detect_format_for(&mut file);
        info!("archive: detected format: {format}");

        let mut decoder = Decoder::for_format(&format);
        let index = decoder
            .parse(&mut file, limits)
            .map_err(|e| hint_data_sibling(path, parse_error(e)))?;

        let root_name = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("/")
            .to_string();
        let tree = build_tree(&root_name, index.entries);
        let file_count = u32::try_from(tree.file_count()).unwrap_or(u32::MAX);

        info!("archive: parsed {file_count} files");

        Ok(Self {
            path: path.to_path_buf(),
            format,
            decoder,
            tree,
            file_count,
            archive_size,
            rejected_entries: index.rejected,
            entry_cap_applied: index.entry_cap_applied,
        })
    }

    /// Reads the payload bytes of an entry from this archive's tree,
    /// resolving sibling data archives where the index requires it.
    /// # Errors
    /// - [`pak::Error::ExtractFailed`] listing every file that was attempted
    pub fn extract(&self, entry: &FileEntry) -> pak::Result<Payload> {
        self.decoder.read_file(&self.path, entry)
    }

    /// Walks the tree and reports duplicates, malformed paths, zero-size
    /// files and out-of-archive ranges, folding in the counters collected
    /// during parsing.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = validate::validate_tree(&self.tree, self.archive_size);

        result.malformed_entries = self.rejected_entries;
        if self.rejected_entries > 0 {
            result.warnings.push(format!(
                "Discarded {} malformed index entries during parsing",
                self.rejected_entries
            ));
        }

        if self.entry_cap_applied {
            result.warnings.push(
                "Entry count exceeded the plausibility threshold and was capped; \
                 the index may be corrupt"
                    .to_string(),
            );
        }

        result
    }

    /// Reads the payload bytes of an entry from memory-mapped archives. The
    /// map is keyed by archive index, with
    /// [`SELF_ARCHIVE_INDEX`](pak::SELF_ARCHIVE_INDEX) for the index file.
    /// # Errors
    /// - [`pak::Error::ExtractFailed`] when the mapping is missing or too short
    #[cfg(feature = "mem-map")]
    pub fn extract_mem_map(
        &self,
        archive_mmaps: &HashMap<u32, FileBuffer>,
        entry: &FileEntry,
    ) -> pak::Result<Payload> {
        self.decoder.read_file_mem_map(archive_mmaps, entry)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> PakFormat {
        self.format
    }

    /// The directory tree decoded from the archive index. The root carries
    /// the archive filename.
    #[must_use]
    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    #[must_use]
    pub fn file_count(&self) -> u32 {
        self.file_count
    }

    /// Byte size of the index file, captured when the archive was opened.
    #[must_use]
    pub fn archive_size(&self) -> u64 {
        self.archive_size
    }
}

fn detect_format_for(file: &mut ArchiveFile) -> PakFormat {
    match detect::detect_pak_format(file) {
        PakFormat::Unknown => {
            info!("archive: could not detect format, trying generic decoder");
            PakFormat::Generic
        }
        format => format,
    }
}

/// A read failure on the index file is fatal to parsing and surfaces as
/// `ParseFailed`; decoders recover from everything less on their own.
fn parse_error(err: pak::Error) -> pak::Error {
    match err {
        pak::Error::Util { source, context } => {
            pak::Error::ParseFailed(format!("{context}: {source}"))
        }
        other => other,
    }
}

/// Opening a numbered data archive instead of its `_dir.vpk` index is a
/// common mistake; point at the index in the error message.
fn hint_data_sibling(path: &Path, err: pak::Error) -> pak::Error {
    if let pak::Error::ParseFailed(reason) = &err {
        let name = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default();

        if name.ends_with(".vpk")
            && !name.contains("_dir")
            && (name.contains("_0") || name.contains("_1") || name.contains("_2"))
        {
            return pak::Error::ParseFailed(format!(
                "{reason}; {name} looks like a data-only archive, open the _dir.vpk index instead"
            ));
        }
    }

    err
}
