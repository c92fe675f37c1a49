use std::fmt;
use std::path::PathBuf;

use crate::util;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// The archive path does not exist.
    NotFound(PathBuf),

    /// The file's magic prefix matched no supported container family.
    BadMagic(String),

    /// The chosen decoder could not produce a non-empty index.
    ParseFailed(String),

    /// Every candidate physical file failed during extraction.
    ExtractFailed { attempted: Vec<PathBuf> },

    Util {
        source: util::Error,
        context: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", &self)
    }
}

impl std::error::Error for Error {}
