//! Bounded access to classification inputs.
//!
//! Files are memory-mapped through [`MappedFile`] and streams are pulled
//! through a `take` adaptor; [`InputWindow`](window::InputWindow) presents
//! either, or a borrowed buffer, as one lazily growing prefix.

pub mod error;
pub mod window;

use crate::io::error::{IoError, Result};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use window::InputWindow;

/// Initial number of bytes buffered for a classification (64KB).
pub const DEFAULT_WINDOW_SIZE: usize = 64 * 1024;
/// Hard cap on how far a window may grow (4MB).
pub const MAX_WINDOW_SIZE: usize = 4 * 1024 * 1024;
/// Granularity of window growth (16KB).
pub const WINDOW_CHUNK: usize = 16 * 1024;

/// Byte order of a multi-byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
    /// PDP-11 order for 32-bit values: the 16-bit halves are swapped.
    Middle,
}

impl Endian {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    /// Opposite order, used by `use ^name`.
    pub fn flipped(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
            Endian::Middle => Endian::Middle,
        }
    }

    /// Decode `bytes` (1, 2, 4 or 8 of them) as an unsigned integer.
    pub fn decode(self, bytes: &[u8]) -> u64 {
        match (self, bytes.len()) {
            (Endian::Middle, 4) => {
                ((bytes[1] as u64) << 24)
                    | ((bytes[0] as u64) << 16)
                    | ((bytes[3] as u64) << 8)
                    | (bytes[2] as u64)
            }
            (Endian::Big, _) => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
            _ => bytes
                .iter()
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | b as u64),
        }
    }
}

/// A read-only mapping of a regular file.
///
/// Empty files are not mapped; their contents are the empty slice.
pub struct MappedFile {
    path: PathBuf,
    map: Option<Mmap>,
}

impl MappedFile {
    /// Map the file at `path`, refusing files larger than `max_size` bytes.
    pub fn open<P: AsRef<Path>>(path: P, max_size: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        if size > max_size {
            warn!(path = %path.display(), size, limit = max_size, "refusing oversized file");
            return Err(IoError::FileTooLarge {
                limit: max_size,
                found: size,
            });
        }

        let map = if size == 0 {
            None
        } else {
            // Safety: the mapping is read-only and lives no longer than the
            // window of one classification call.
            Some(unsafe { Mmap::map(&file)? })
        };
        debug!(path = %path.display(), size, "mapped input file");

        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}
