//! Post-parse validation of an archive tree.

use std::collections::HashSet;

use crate::pak::tree::DirectoryTree;
use crate::pak::{FileEntry, SELF_ARCHIVE_INDEX};

/// Longest accepted logical path, in bytes.
const MAX_PATH_LEN: usize = 1024;

/// The outcome of walking a tree with [`validate_tree`].
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// False when any entry failed validation or escaped the archive bounds.
    pub is_valid: bool,

    pub total_files: u32,

    /// Entries sharing a full logical path with an earlier entry.
    pub duplicate_files: u32,

    /// Entries with an empty, overlong, or non-printable path.
    pub invalid_entries: u32,

    pub zero_size_files: u32,

    /// Index records discarded during parsing, folded in by
    /// [`Archive::validate`](crate::archive::Archive::validate).
    pub malformed_entries: u32,

    pub error_messages: Vec<String>,
    pub warnings: Vec<String>,
}

/// Walks the tree once, top down, without mutating it.
///
/// Collects the total file count, duplicates over the full path, entries
/// failing the per-entry checks, zero-size files, and same-archive entries
/// whose range extends past `archive_size`.
#[must_use]
pub fn validate_tree(tree: &DirectoryTree, archive_size: u64) -> ValidationResult {
    let mut result = ValidationResult {
        is_valid: true,
        ..ValidationResult::default()
    };

    let files: Vec<&FileEntry> = tree.walk_files().map(|(_, file)| file).collect();
    result.total_files = u32::try_from(files.len()).unwrap_or(u32::MAX);

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for file in &files {
        if !seen.insert(file.path.as_str()) {
            result.duplicate_files += 1;
            duplicates.push(file.path.clone());
        }
    }

    if result.duplicate_files > 0 {
        result.warnings.push(format!(
            "Found {} duplicate file entries",
            result.duplicate_files
        ));
        for duplicate in duplicates {
            result.warnings.push(format!("  Duplicate: {duplicate}"));
        }
    }

    for file in &files {
        if !entry_is_well_formed(file) {
            result.invalid_entries += 1;
            result.is_valid = false;
            result
                .error_messages
                .push(format!("Invalid entry: {}", file.path));
        }

        if file.size == 0 {
            result.zero_size_files += 1;
            result.warnings.push(format!("Zero-size file: {}", file.path));
        }

        if file.archive_index == SELF_ARCHIVE_INDEX
            && file
                .offset
                .checked_add(file.size)
                .is_none_or(|end| end > archive_size)
        {
            result.is_valid = false;
            result.error_messages.push(format!(
                "Entry extends past the end of the archive: {}",
                file.path
            ));
        }
    }

    result
}

fn entry_is_well_formed(entry: &FileEntry) -> bool {
    if entry.path.is_empty() || entry.path.len() > MAX_PATH_LEN {
        return false;
    }

    entry
        .path
        .bytes()
        .all(|b| (0x20..=0x7E).contains(&b) || b == b'/' || b == b'\\')
}
