//! This module contains functionality for detecting archive formats.

use log::debug;

use crate::pak::ue::{UE3_MAGIC, UE_MAGIC_PREFIX};
use crate::pak::vpk::{VPK_DIR_SIGNATURE, VPK_SIGNATURE};
use crate::util::file::ArchiveFile;

pub use format::PakFormat;

mod format;

/// Detects the format of an archive by peeking at its 4-byte magic prefix.
///
/// Leaves the cursor back at the start of the file; decoders re-read from
/// zero. Files shorter than 4 bytes are [`PakFormat::Unknown`].
pub fn detect_pak_format(file: &mut ArchiveFile) -> PakFormat {
    if file.seek_to(0).is_err() {
        return PakFormat::Unknown;
    }

    let Ok(magic) = file.read_bytes(4) else {
        return PakFormat::Unknown;
    };

    let _ = file.seek_to(0);

    if magic.len() < 4 {
        return PakFormat::Unknown;
    }

    let magic_int = u32::from_le_bytes([magic[0], magic[1], magic[2], magic[3]]);
    debug!("detect: file signature {magic_int:#010X}");

    if magic_int == VPK_SIGNATURE || magic_int == VPK_DIR_SIGNATURE {
        return PakFormat::SourceEngine;
    }

    if magic == UE3_MAGIC {
        return PakFormat::UnrealEngine3;
    }

    if magic.starts_with(&UE_MAGIC_PREFIX) {
        return PakFormat::UnrealEngine4_5;
    }

    PakFormat::Unknown
}
