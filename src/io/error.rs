//! Errors raised while reading classification inputs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    /// The file exceeds the configured size limit.
    #[error("file of {found} bytes exceeds the {limit} byte limit")]
    FileTooLarge { limit: u64, found: u64 },

    /// A read ends beyond the bytes the window can see.
    #[error("{len} bytes at offset {offset} lie outside the {available} bytes available")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error(transparent)]
    StdIo(#[from] std::io::Error),
}

impl IoError {
    /// True for reads past the end of the source, which callers treat as
    /// "no match" rather than a failure.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, IoError::OutOfBounds { .. })
    }
}

pub type Result<T> = std::result::Result<T, IoError>;
