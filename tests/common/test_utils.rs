//! Shared test utilities for creating temporary files and loaded handles.
//!
//! This module consolidates common test helper functions to avoid duplication
//! across test modules.

use sigil::{Magic, MagicFlags};
use std::io::Write;
use tempfile::NamedTempFile;

/// Creates a temporary file with the given content.
///
/// The file is removed when the returned `NamedTempFile` is dropped.
///
/// # Panics
///
/// Panics if the temporary file cannot be created or if writing to it fails
pub fn create_temp_file(content: &[u8]) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Creates a temporary file with a specific size filled with a repeating byte pattern.
///
/// This is useful for testing window limits and buffer handling.
pub fn create_temp_file_with_size(size: usize, pattern: u8) -> NamedTempFile {
    let content = vec![pattern; size];
    create_temp_file(&content)
}

/// A handle with `flags` and the embedded rules loaded.
pub fn loaded_magic(flags: MagicFlags) -> Magic {
    let mut magic = Magic::open(flags);
    magic.load_default().unwrap();
    magic
}

/// A handle with `flags` and only the rules in `text` loaded.
pub fn magic_with_rules(flags: MagicFlags, text: &str) -> Magic {
    let mut magic = Magic::open(flags);
    magic.load_buffers(&[text.as_bytes()]).unwrap();
    magic
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_create_temp_file() {
        let content = b"hello world";
        let temp_file = create_temp_file(content);

        let path = temp_file.path();
        assert!(path.exists());
        assert_eq!(fs::read(path).unwrap(), content);
    }

    #[test]
    fn test_create_temp_file_with_size() {
        let temp_file = create_temp_file_with_size(1024, 0xAA);
        let read_content = fs::read(temp_file.path()).unwrap();

        assert_eq!(read_content.len(), 1024);
        assert!(read_content.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_loaded_magic_has_rules() {
        let magic = loaded_magic(MagicFlags::NONE);
        assert!(magic.database().is_some_and(|db| !db.is_empty()));
    }
}
