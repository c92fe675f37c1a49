use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),

    /// A read or seek escaped the file length captured at open time.
    OutOfBounds {
        position: u64,
        requested: u64,
        length: u64,
    },

    /// Hit end of file before the null terminator of a string.
    TruncatedString { position: u64 },

    /// A string exceeded its maximum length without a null terminator.
    /// The cursor has been advanced past the next null so parsing can resync.
    OverlongString { position: u64, limit: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", &self)
    }
}

impl std::error::Error for Error {}
