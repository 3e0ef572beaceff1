//! Formats recognised by code rather than by rules: tar headers (checksum
//! validated), JSON documents and CSV text.

use crate::engine::text::TextInfo;
use crate::engine::Classification;
use serde::de::IgnoredAny;

pub const TAR_BLOCK: usize = 512;
const TAR_CHKSUM_OFFSET: usize = 148;
const TAR_CHKSUM_LEN: usize = 8;
const TAR_MAGIC_OFFSET: usize = 257;

/// Parse a space or NUL terminated octal field.
fn octal_field(field: &[u8]) -> Option<u64> {
    let trimmed = field
        .iter()
        .skip_while(|&&b| b == b' ')
        .take_while(|&&b| b != b' ' && b != 0);
    let mut value = 0u64;
    let mut digits = 0;
    for &b in trimmed {
        if !(b'0'..=b'7').contains(&b) {
            return None;
        }
        value = value.checked_mul(8)? + u64::from(b - b'0');
        digits += 1;
    }
    (digits > 0).then_some(value)
}

/// A tar header whose checksum verifies.
pub fn check_tar(data: &[u8]) -> Option<Classification> {
    let header = data.get(..TAR_BLOCK)?;
    let recorded = octal_field(&header[TAR_CHKSUM_OFFSET..TAR_CHKSUM_OFFSET + TAR_CHKSUM_LEN])?;
    let sum: u64 = header
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            if (TAR_CHKSUM_OFFSET..TAR_CHKSUM_OFFSET + TAR_CHKSUM_LEN).contains(&i) {
                u64::from(b' ')
            } else {
                u64::from(b)
            }
        })
        .sum();
    if sum != recorded {
        return None;
    }

    let magic = &header[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 8];
    let description = if magic == b"ustar  \0" {
        "POSIX tar archive (GNU)"
    } else if magic.starts_with(b"ustar\0") {
        "POSIX tar archive"
    } else {
        "tar archive"
    };
    Some(Classification::new(description, "application/x-tar").with_extensions(["tar"]))
}

/// A complete, well-formed JSON object or array.
pub fn check_json(data: &[u8]) -> Option<Classification> {
    let first = data.iter().find(|b| !b.is_ascii_whitespace())?;
    if *first != b'{' && *first != b'[' {
        return None;
    }
    serde_json::from_slice::<IgnoredAny>(data).ok()?;
    Some(Classification::new("JSON text data", "application/json").with_extensions(["json"]))
}

const CSV_MAX_LINES: usize = 10;

/// Comma-separated text with a consistent field count on every line.
///
/// The trailing line of an incomplete window is ignored.
pub fn check_csv(data: &[u8], text: &TextInfo, complete: bool) -> Option<Classification> {
    if text.lines < 2 {
        return None;
    }
    let mut lines: Vec<&[u8]> = data
        .split(|&b| b == b'\n')
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
        .collect();
    if !complete || lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut expected = None;
    let mut seen = 0;
    for line in lines.into_iter().take(CSV_MAX_LINES) {
        let fields = count_fields(line)?;
        match expected {
            None if fields < 2 => return None,
            None => expected = Some(fields),
            Some(n) if n != fields => return None,
            Some(_) => {}
        }
        seen += 1;
    }
    if seen < 2 {
        return None;
    }
    let description = format!("CSV {}", text.description());
    Some(Classification::new(description, "text/csv").with_extensions(["csv"]))
}

/// Fields on one line, honouring double-quoted fields. `None` for an
/// unbalanced quote.
fn count_fields(line: &[u8]) -> Option<usize> {
    let mut fields = 1;
    let mut quoted = false;
    let mut i = 0;
    while i < line.len() {
        match line[i] {
            b'"' if quoted && line.get(i + 1) == Some(&b'"') => i += 1,
            b'"' => quoted = !quoted,
            b',' if !quoted => fields += 1,
            _ => {}
        }
        i += 1;
    }
    (!quoted).then_some(fields)
}
