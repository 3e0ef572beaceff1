//! Error types for the sigil content sniffer.
//!
//! Handle-level operations return [`SigilError`]. Rule-source problems are
//! carried as [`LoadError`], window reads as [`IoError`]; both convert into
//! the top-level type with `?`.

use crate::io::error::IoError;
pub use crate::magic::error::{LoadError, LoadErrorKind};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sigil operations.
#[derive(Debug, Error)]
pub enum SigilError {
    /// Malformed rule source or binary cache
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A source could not be opened or read
    #[error("cannot read `{}': {source}", display_path(.path))]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// Bounded window failures (file too large, read budget)
    #[error("input window: {0}")]
    Window(#[from] IoError),

    /// Flag bits that no flag defines
    #[error("invalid flags: {bits:#x}")]
    InvalidFlags { bits: u32 },

    /// Indirect offsets nested deeper than the configured cap
    #[error("indirection limit of {limit} exceeded")]
    IndirectionLimit { limit: u32 },

    /// `use` chains nested deeper than the configured cap
    #[error("name recursion limit of {limit} exceeded at `{name}'")]
    NameRecursion { name: String, limit: u32 },

    /// Evaluation step budget exhausted
    #[error("evaluation budget exhausted after {steps} rule evaluations")]
    Budget { steps: usize },

    /// Wall-clock budget exhausted
    #[error("classification timeout after {millis}ms")]
    Timeout { millis: u64 },

    /// Out-of-range engine parameter
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl SigilError {
    pub fn io(path: Option<PathBuf>, source: std::io::Error) -> Self {
        SigilError::Io { path, source }
    }

    /// OS error number behind this error, 0 when there is none.
    pub fn errno(&self) -> i32 {
        match self {
            SigilError::Io { source, .. } => source.raw_os_error().unwrap_or(0),
            SigilError::Window(IoError::StdIo(e)) => e.raw_os_error().unwrap_or(0),
            SigilError::Load(e) => e.errno(),
            _ => 0,
        }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "<stream>".to_string(),
    }
}

/// Result type alias for sigil operations
pub type Result<T> = std::result::Result<T, SigilError>;

/// Convert sigil errors to PyO3 exceptions
#[cfg(feature = "python-ext")]
impl From<SigilError> for pyo3::PyErr {
    fn from(err: SigilError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyException, PyIOError, PyTimeoutError, PyValueError};

        match err {
            SigilError::Io { .. } => PyIOError::new_err(err.to_string()),
            SigilError::Timeout { .. } => PyTimeoutError::new_err(err.to_string()),
            SigilError::Load(_) | SigilError::InvalidFlags { .. } | SigilError::Config(_) => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyException::new_err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SigilError::InvalidFlags { bits: 0x8000_0000 };
        assert_eq!(err.to_string(), "invalid flags: 0x80000000");

        let err = SigilError::io(
            Some(PathBuf::from("/nonexistent")),
            std::io::Error::from_raw_os_error(2),
        );
        assert!(err.to_string().starts_with("cannot read `/nonexistent'"));
        assert_eq!(err.errno(), 2);
    }

    #[test]
    fn load_errors_convert() {
        let load = LoadError::new(LoadErrorKind::LevelSkip, "test.magic", 3, "level 2 follows level 0");
        let err: SigilError = load.into();
        assert!(matches!(err, SigilError::Load(_)));
        assert!(err.to_string().contains("test.magic:3"));
        assert_eq!(err.errno(), 0);
    }
}
