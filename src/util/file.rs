//! Bounded file reading for archive data.

use super::{Error, Result};

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

/// How many bytes past an overlong string the reader will skip while looking
/// for the next null terminator.
pub const STRING_RESYNC_LIMIT: usize = 1000;

/// A seekable view over an archive file, bounded by the file length captured
/// when the view was opened.
///
/// Always uses little-endian byte order. Moves the cursor forward after
/// reading. Every read is checked against the captured length and fails with
/// [`Error::OutOfBounds`] instead of touching bytes past it.
pub struct ArchiveFile {
    file: File,
    length: u64,
}

impl ArchiveFile {
    /// Opens the file at `path` and captures its current length.
    /// # Errors
    /// - When the file cannot be opened or its metadata cannot be read
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(Error::Io)?;
        Self::from_file(file)
    }

    /// Wraps an already-open file, capturing its current length.
    /// # Errors
    /// - When the file metadata cannot be read
    pub fn from_file(file: File) -> Result<Self> {
        let length = file.metadata().map_err(Error::Io)?.len();
        Ok(Self { file, length })
    }

    /// The file length captured at open time.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The current cursor position.
    /// # Errors
    /// - When an IO operation fails
    pub fn pos(&mut self) -> Result<u64> {
        self.file.stream_position().map_err(Error::Io)
    }

    /// Bytes left between the cursor and the captured length.
    /// # Errors
    /// - When an IO operation fails
    pub fn remaining(&mut self) -> Result<u64> {
        Ok(self.length.saturating_sub(self.pos()?))
    }

    /// Moves the cursor to an absolute position within the captured length.
    /// # Errors
    /// - [`Error::OutOfBounds`] when `position` is past the captured length
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        if position > self.length {
            return Err(Error::OutOfBounds {
                position,
                requested: 0,
                length: self.length,
            });
        }

        self.file
            .seek(SeekFrom::Start(position))
            .map_err(Error::Io)?;

        Ok(())
    }

    /// Reads a single byte from the file into a [`u8`].
    /// # Errors
    /// - [`Error::OutOfBounds`] when the read would escape the captured length
    pub fn read_u8(&mut self) -> Result<u8> {
        self.check_range(1)?;

        let mut b: [u8; 1] = [0];
        self.file.read_exact(&mut b).map_err(Error::Io)?;

        Ok(b[0])
    }

    /// Reads 2 bytes from the file into a [`u16`].
    /// # Errors
    /// - [`Error::OutOfBounds`] when the read would escape the captured length
    pub fn read_u16(&mut self) -> Result<u16> {
        self.check_range(2)?;

        let mut b: [u8; 2] = [0; 2];
        self.file.read_exact(&mut b).map_err(Error::Io)?;

        Ok(u16::from_le_bytes(b))
    }

    /// Reads 4 bytes from the file into a [`u32`].
    /// # Errors
    /// - [`Error::OutOfBounds`] when the read would escape the captured length
    pub fn read_u32(&mut self) -> Result<u32> {
        self.check_range(4)?;

        let mut b: [u8; 4] = [0; 4];
        self.file.read_exact(&mut b).map_err(Error::Io)?;

        Ok(u32::from_le_bytes(b))
    }

    /// Reads 8 bytes from the file into a [`u64`].
    /// # Errors
    /// - [`Error::OutOfBounds`] when the read would escape the captured length
    pub fn read_u64(&mut self) -> Result<u64> {
        self.check_range(8)?;

        let mut b: [u8; 8] = [0; 8];
        self.file.read_exact(&mut b).map_err(Error::Io)?;

        Ok(u64::from_le_bytes(b))
    }

    /// Reads `count` bytes from the file into a [`Vec<u8>`].
    ///
    /// The range is checked against the captured length up front; the result
    /// can only be shorter than `count` if the file shrank after it was
    /// opened. Callers treat that as a short read.
    /// # Errors
    /// - [`Error::OutOfBounds`] when the range escapes the captured length
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.check_range(count as u64)?;

        let mut buffer = vec![0; count];
        let mut filled = 0;
        while filled < count {
            let n = self.file.read(&mut buffer[filled..]).map_err(Error::Io)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer.truncate(filled);

        Ok(buffer)
    }

    /// Reads a null-terminated string of at most `max_len` content bytes.
    ///
    /// Bytes outside the printable ASCII range are substituted with U+001A so
    /// the returned string stays byte-for-byte as long as what was consumed
    /// and so name validation downstream rejects the entry.
    /// # Errors
    /// - [`Error::TruncatedString`] when the file ends before the terminator
    /// - [`Error::OverlongString`] when more than `max_len` bytes arrive
    ///   without a terminator; the cursor is advanced past the next null
    ///   (at most [`STRING_RESYNC_LIMIT`] bytes further) so parsing can resync
    pub fn read_string(&mut self, max_len: usize) -> Result<String> {
        let start = self.pos()?;
        let mut bytes = Vec::new();

        loop {
            let b = match self.read_u8() {
                Ok(b) => b,
                Err(Error::OutOfBounds { .. }) => {
                    return Err(Error::TruncatedString { position: start });
                }
                Err(e) => return Err(e),
            };

            if b == 0 {
                break;
            }

            if bytes.len() == max_len {
                self.skip_to_null()?;
                return Err(Error::OverlongString {
                    position: start,
                    limit: max_len,
                });
            }

            bytes.push(b);
        }

        Ok(bytes.into_iter().map(printable_or_substitute).collect())
    }

    fn check_range(&mut self, count: u64) -> Result<()> {
        let position = self.pos()?;
        if position
            .checked_add(count)
            .is_none_or(|end| end > self.length)
        {
            return Err(Error::OutOfBounds {
                position,
                requested: count,
                length: self.length,
            });
        }

        Ok(())
    }

    fn skip_to_null(&mut self) -> Result<()> {
        let mut skipped = 0;
        while skipped < STRING_RESYNC_LIMIT {
            match self.read_u8() {
                Ok(0) => break,
                Ok(_) => skipped += 1,
                Err(Error::OutOfBounds { .. }) => break,
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}

fn printable_or_substitute(byte: u8) -> char {
    if (0x20..=0x7E).contains(&byte) {
        byte as char
    } else {
        '\u{1A}'
    }
}
