//! Load-time errors for rule sources and binary caches.

use std::fmt;
use thiserror::Error;

/// What went wrong while loading a rule source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadErrorKind {
    UnknownType,
    MalformedOffset,
    LevelSkip,
    UnterminatedString,
    BadValue,
    BadFormat,
    BadRegex,
    BadAnnotation,
    UnknownName,
    CacheMagic,
    CacheVersion,
    CacheChecksum,
    CacheCorrupt,
    Io,
}

impl fmt::Display for LoadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LoadErrorKind::*;
        let s = match self {
            UnknownType => "unknown type",
            MalformedOffset => "malformed offset",
            LevelSkip => "level skip",
            UnterminatedString => "unterminated string",
            BadValue => "bad value",
            BadFormat => "bad format",
            BadRegex => "bad regex",
            BadAnnotation => "bad annotation",
            UnknownName => "unknown name",
            CacheMagic => "not a compiled database",
            CacheVersion => "cache version mismatch",
            CacheChecksum => "cache checksum mismatch",
            CacheCorrupt => "corrupt cache",
            Io => "i/o",
        };
        write!(f, "{}", s)
    }
}

/// A rule source or cache could not be loaded.
///
/// `line` is 1-based; 0 means the error is not tied to a line (cache
/// headers, unreadable files).
#[derive(Debug, Clone, Error)]
#[error("{source_name}:{line}: {kind}: {reason}")]
pub struct LoadError {
    pub kind: LoadErrorKind,
    pub source_name: String,
    pub line: usize,
    pub reason: String,
    /// OS error number when `kind` is `Io`.
    pub os_error: Option<i32>,
}

impl LoadError {
    pub fn new(
        kind: LoadErrorKind,
        source_name: impl Into<String>,
        line: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            source_name: source_name.into(),
            line,
            reason: reason.into(),
            os_error: None,
        }
    }

    pub fn io(source_name: impl Into<String>, err: &std::io::Error) -> Self {
        Self {
            kind: LoadErrorKind::Io,
            source_name: source_name.into(),
            line: 0,
            reason: err.to_string(),
            os_error: err.raw_os_error(),
        }
    }

    pub fn errno(&self) -> i32 {
        self.os_error.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_cites_source_and_line() {
        let err = LoadError::new(LoadErrorKind::UnknownType, "x.magic", 12, "`blong'");
        assert_eq!(err.to_string(), "x.magic:12: unknown type: `blong'");
    }

    #[test]
    fn io_errors_keep_errno() {
        let e = std::io::Error::from_raw_os_error(13);
        let err = LoadError::io("/etc/magic", &e);
        assert_eq!(err.kind, LoadErrorKind::Io);
        assert_eq!(err.errno(), 13);
    }
}
