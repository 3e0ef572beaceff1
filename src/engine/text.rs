//! Character encoding detection and the plain-text heuristics.

use crate::config::TextConfig;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Ascii,
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Iso8859,
    ExtendedAscii,
}

impl TextEncoding {
    fn label(&self) -> &'static str {
        match self {
            TextEncoding::Ascii => "ASCII",
            TextEncoding::Utf8 => "Unicode text, UTF-8",
            TextEncoding::Utf8Bom => "Unicode text, UTF-8 (with BOM)",
            TextEncoding::Utf16Le => "Unicode text, UTF-16, little-endian",
            TextEncoding::Utf16Be => "Unicode text, UTF-16, big-endian",
            TextEncoding::Iso8859 => "ISO-8859",
            TextEncoding::ExtendedAscii => "Non-ISO extended-ASCII",
        }
    }

    /// MIME charset name.
    pub fn charset(&self) -> &'static str {
        match self {
            TextEncoding::Ascii => "us-ascii",
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Iso8859 => "iso-8859-1",
            TextEncoding::ExtendedAscii => "unknown-8bit",
        }
    }
}

/// What the heuristics learned about a text input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInfo {
    pub encoding: TextEncoding,
    pub crlf: bool,
    pub cr: bool,
    pub lf: bool,
    pub long_lines: bool,
    /// Complete lines seen, for the CSV check.
    pub lines: usize,
}

impl TextInfo {
    /// `ASCII text, with CRLF line terminators` and friends.
    pub fn description(&self) -> String {
        let mut out = format!("{} text", self.encoding.label());
        if self.long_lines {
            out.push_str(", with very long lines");
        }
        let mut terms = Vec::new();
        if self.crlf {
            terms.push("CRLF");
        }
        if self.cr {
            terms.push("CR");
        }
        if self.lf && !terms.is_empty() {
            terms.push("LF");
        }
        if !terms.is_empty() {
            out.push_str(&format!(", with {} line terminators", terms.join(", ")));
        } else if !self.lf {
            out.push_str(", with no line terminators");
        }
        out
    }

    pub fn mime_type(&self) -> &'static str {
        "text/plain"
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CharClass {
    /// Printable ASCII and the usual control characters.
    Text,
    /// 0xa0..=0xff.
    Iso,
    /// 0x80..=0x9f.
    Extended,
    Binary,
}

fn classify_byte(b: u8) -> CharClass {
    match b {
        0x07..=0x0d | 0x1b | 0x20..=0x7e => CharClass::Text,
        0xa0..=0xff => CharClass::Iso,
        0x80..=0x9f => CharClass::Extended,
        _ => CharClass::Binary,
    }
}

/// Detect the text encoding of `data`, or `None` for binary input.
///
/// `complete` says whether `data` is the whole source; a multi-byte
/// sequence cut by the end of an incomplete window is tolerated.
pub fn detect(data: &[u8], complete: bool, config: &TextConfig) -> Option<TextInfo> {
    let (data, complete) = if data.len() > config.encoding_max_bytes {
        (&data[..config.encoding_max_bytes], false)
    } else {
        (data, complete)
    };
    if data.is_empty() {
        return None;
    }

    if let Some(rest) = data.strip_prefix(b"\xef\xbb\xbf") {
        return utf8_text(rest, complete).then(|| analyze(rest, TextEncoding::Utf8Bom, config));
    }
    if let Some(rest) = data.strip_prefix(b"\xff\xfe") {
        return utf16_text(UTF_16LE, rest, config, TextEncoding::Utf16Le);
    }
    if let Some(rest) = data.strip_prefix(b"\xfe\xff") {
        return utf16_text(UTF_16BE, rest, config, TextEncoding::Utf16Be);
    }

    let worst = data.iter().map(|&b| classify_byte(b)).max()?;
    let encoding = match worst {
        CharClass::Text => TextEncoding::Ascii,
        _ if utf8_text(data, complete) => TextEncoding::Utf8,
        CharClass::Iso => TextEncoding::Iso8859,
        CharClass::Extended => TextEncoding::ExtendedAscii,
        CharClass::Binary => return None,
    };
    Some(analyze(data, encoding, config))
}

/// Valid UTF-8 without binary control characters.
fn utf8_text(data: &[u8], complete: bool) -> bool {
    let valid = Encoding::utf8_valid_up_to(data);
    let tail = &data[valid..];
    let tail_ok = tail.is_empty() || (!complete && tail.len() < 4 && is_utf8_prefix(tail));
    tail_ok
        && data[..valid]
            .iter()
            .all(|&b| b >= 0x80 || classify_byte(b) == CharClass::Text)
}

/// `tail` is the start of a multi-byte sequence cut short.
fn is_utf8_prefix(tail: &[u8]) -> bool {
    let need = match tail[0] {
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => return false,
    };
    tail.len() < need && tail[1..].iter().all(|b| (0x80..=0xbf).contains(b))
}

fn utf16_text(
    encoding: &'static Encoding,
    data: &[u8],
    config: &TextConfig,
    kind: TextEncoding,
) -> Option<TextInfo> {
    let even = &data[..data.len() & !1];
    let decoded: Cow<'_, str> = encoding.decode_without_bom_handling_and_without_replacement(even)?;
    let printable = decoded
        .chars()
        .all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r' | '\x07' | '\x08' | '\x0b' | '\x0c' | '\x1b'));
    printable.then(|| analyze(decoded.as_bytes(), kind, config))
}

/// Line terminators and line lengths.
fn analyze(data: &[u8], encoding: TextEncoding, config: &TextConfig) -> TextInfo {
    let mut info = TextInfo {
        encoding,
        crlf: false,
        cr: false,
        lf: false,
        long_lines: false,
        lines: 0,
    };
    let mut line_len = 0usize;
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\r' if data.get(i + 1) == Some(&b'\n') => {
                info.crlf = true;
                info.lines += 1;
                line_len = 0;
                i += 1;
            }
            b'\r' => {
                info.cr = true;
                info.lines += 1;
                line_len = 0;
            }
            b'\n' => {
                info.lf = true;
                info.lines += 1;
                line_len = 0;
            }
            _ => {
                line_len += 1;
                if line_len > config.long_line {
                    info.long_lines = true;
                }
            }
        }
        i += 1;
    }
    info
}
