//! Fallback decoder for containers with no recognized index.
//!
//! Parsing always fails; extraction works from caller-supplied
//! `(offset, size)` pairs so payloads can still be pulled out of containers
//! the library cannot parse.

use std::path::Path;

use log::{debug, info};

use super::{Error, FileEntry, ParsedIndex, Payload, Result};

/// The no-format decoder.
#[derive(Debug, Default)]
pub struct GenericDecoder;

impl GenericDecoder {
    /// Always fails: there is no index to decode.
    /// # Errors
    /// - [`Error::ParseFailed`] unconditionally
    pub fn parse(&self) -> Result<ParsedIndex> {
        info!("generic: no decoder matched this archive format");
        Err(Error::ParseFailed(
            "no decoder matched this archive format".to_string(),
        ))
    }

    /// Reads `entry.size` bytes at `entry.offset` from the archive itself,
    /// returning the available prefix when the archive is truncated.
    /// # Errors
    /// - [`Error::ExtractFailed`] when the archive cannot be read
    pub fn read_file(&self, archive_path: &Path, entry: &FileEntry) -> Result<Payload> {
        super::read_self_range(archive_path, entry.offset, entry.size).map_err(|e| {
            debug!("generic: read of {} failed: {e}", archive_path.display());
            Error::ExtractFailed {
                attempted: vec![archive_path.to_path_buf()],
            }
        })
    }
}
