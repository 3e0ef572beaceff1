//! Description templates.
//!
//! A rule's message is parsed once into literal and placeholder tokens;
//! rendering substitutes the matched value into each placeholder with
//! printf-compatible conversions.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// printf conversion character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conversion {
    Signed,
    Unsigned,
    LowerHex,
    UpperHex,
    Octal,
    Char,
    Str,
    Exp,
    Fixed,
    General,
}

impl Conversion {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'd' | 'i' => Conversion::Signed,
            'u' => Conversion::Unsigned,
            'x' => Conversion::LowerHex,
            'X' => Conversion::UpperHex,
            'o' => Conversion::Octal,
            'c' => Conversion::Char,
            's' => Conversion::Str,
            'e' | 'E' => Conversion::Exp,
            'f' | 'F' => Conversion::Fixed,
            'g' | 'G' => Conversion::General,
            _ => return None,
        })
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, Conversion::Str | Conversion::Char)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpecFlags {
    pub left: bool,
    pub zero: bool,
    pub alt: bool,
    pub plus: bool,
    pub space: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub flags: SpecFlags,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub conversion: Conversion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormatToken {
    Literal(String),
    Placeholder(FormatSpec),
}

/// Value produced by a successful match.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchValue {
    /// Integer masked to its type width.
    Int { bits: u64, size: u8, signed: bool },
    Float(f64),
    Bytes(Vec<u8>),
    /// Seconds since the epoch.
    Date { secs: i64, local: bool },
}

impl MatchValue {
    fn as_i64(&self) -> i64 {
        match self {
            MatchValue::Int { bits, size, signed } => {
                if *signed {
                    sign_extend(*bits, *size)
                } else {
                    *bits as i64
                }
            }
            MatchValue::Float(f) => *f as i64,
            MatchValue::Date { secs, .. } => *secs,
            MatchValue::Bytes(b) => b.first().copied().unwrap_or(0) as i64,
        }
    }

    fn as_u64(&self) -> u64 {
        match self {
            MatchValue::Int { bits, .. } => *bits,
            other => other.as_i64() as u64,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            MatchValue::Float(f) => *f,
            other => other.as_i64() as f64,
        }
    }
}

/// Sign-extend the low `size` bytes of `bits`.
pub fn sign_extend(bits: u64, size: u8) -> i64 {
    match size {
        1 => bits as u8 as i8 as i64,
        2 => bits as u16 as i16 as i64,
        4 => bits as u32 as i32 as i64,
        _ => bits as i64,
    }
}

/// Classic ctime-style rendering of a timestamp.
pub fn format_date(secs: i64, local: bool) -> String {
    const FMT: &str = "%a %b %e %H:%M:%S %Y";
    if local {
        match Local.timestamp_opt(secs, 0).single() {
            Some(t) => t.format(FMT).to_string(),
            None => "*Invalid time*".to_string(),
        }
    } else {
        match DateTime::<Utc>::from_timestamp(secs, 0) {
            Some(t) => t.format(FMT).to_string(),
            None => "*Invalid time*".to_string(),
        }
    }
}

/// Escape bytes that are not printable ASCII as `\ooo`.
pub fn printable(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (0x20..0x7f).contains(&b) {
            out.push(b as char);
        } else {
            let _ = write!(out, "\\{:03o}", b);
        }
    }
    out
}

/// Largest field width or precision a placeholder may carry.
pub const MAX_FIELD_WIDTH: usize = 1024;

/// A parsed description template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Description {
    /// Message as written, after the leading `\b` marker was removed.
    pub raw: String,
    /// The message started with `\b`: no separating space is inserted.
    pub no_space: bool,
    pub tokens: Vec<FormatToken>,
}

impl Description {
    /// Parse a message. Unknown conversions are reported as `Err` with the
    /// offending directive.
    pub fn parse(text: &str) -> Result<Self, String> {
        let (no_space, body) = match text.strip_prefix("\\b") {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = body.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if let Some(&(_, '%')) = chars.peek() {
                chars.next();
                literal.push('%');
                continue;
            }
            let mut flags = SpecFlags::default();
            while let Some(&(_, f)) = chars.peek() {
                match f {
                    '-' => flags.left = true,
                    '0' => flags.zero = true,
                    '#' => flags.alt = true,
                    '+' => flags.plus = true,
                    ' ' => flags.space = true,
                    _ => break,
                }
                chars.next();
            }
            let width = take_number(&mut chars);
            let precision = if let Some(&(_, '.')) = chars.peek() {
                chars.next();
                Some(take_number(&mut chars).unwrap_or(0))
            } else {
                None
            };
            if width.max(precision).is_some_and(|n| n > MAX_FIELD_WIDTH) {
                return Err(format!(
                    "field width or precision in `%{}' exceeds {}",
                    &body[start + 1..],
                    MAX_FIELD_WIDTH
                ));
            }
            while let Some(&(_, m)) = chars.peek() {
                if matches!(m, 'h' | 'l' | 'L' | 'q' | 'j' | 'z' | 't') {
                    chars.next();
                } else {
                    break;
                }
            }
            let conversion = match chars.next() {
                Some((_, conv)) => Conversion::from_char(conv)
                    .ok_or_else(|| format!("unsupported conversion `%{}'", &body[start..]))?,
                None => return Err("dangling `%' at end of message".to_string()),
            };
            if !literal.is_empty() {
                tokens.push(FormatToken::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(FormatToken::Placeholder(FormatSpec {
                flags,
                width,
                precision,
                conversion,
            }));
        }
        if !literal.is_empty() {
            tokens.push(FormatToken::Literal(literal));
        }
        Ok(Self {
            raw: body.to_string(),
            no_space,
            tokens,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn has_placeholder(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t, FormatToken::Placeholder(_)))
    }

    /// Substitute `value` into every placeholder. `raw` disables escaping of
    /// unprintable bytes in string values.
    pub fn render(&self, value: Option<&MatchValue>, raw: bool) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                FormatToken::Literal(s) => out.push_str(s),
                FormatToken::Placeholder(spec) => {
                    out.push_str(&render_placeholder(spec, value, raw));
                }
            }
        }
        out
    }
}

fn take_number<I>(chars: &mut std::iter::Peekable<I>) -> Option<usize>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut n: Option<usize> = None;
    while let Some(&(_, d)) = chars.peek() {
        match d.to_digit(10) {
            Some(v) => {
                n = Some(n.unwrap_or(0).saturating_mul(10).saturating_add(v as usize));
                chars.next();
            }
            None => break,
        }
    }
    n
}

fn render_placeholder(spec: &FormatSpec, value: Option<&MatchValue>, raw: bool) -> String {
    let value = match value {
        Some(v) => v,
        None => return String::new(),
    };
    // Cached databases skip the parser, so bound the fields here as well.
    let spec = &FormatSpec {
        width: spec.width.map(|w| w.min(MAX_FIELD_WIDTH)),
        precision: spec.precision.map(|p| p.min(MAX_FIELD_WIDTH)),
        ..*spec
    };
    let body = match spec.conversion {
        Conversion::Str => {
            let mut s = match value {
                MatchValue::Bytes(b) => {
                    if raw {
                        String::from_utf8_lossy(b).into_owned()
                    } else {
                        printable(b)
                    }
                }
                MatchValue::Date { secs, local } => format_date(*secs, *local),
                MatchValue::Float(f) => format_general(*f, 6, false),
                MatchValue::Int { .. } => value.as_i64().to_string(),
            };
            if let Some(p) = spec.precision {
                if let Some((idx, _)) = s.char_indices().nth(p) {
                    s.truncate(idx);
                }
            }
            s
        }
        Conversion::Char => {
            let b = value.as_u64() as u8;
            if raw || (0x20..0x7f).contains(&b) {
                (b as char).to_string()
            } else {
                format!("\\{:03o}", b)
            }
        }
        Conversion::Signed => with_sign(value.as_i64().to_string(), &spec.flags),
        Conversion::Unsigned => value.as_u64().to_string(),
        Conversion::LowerHex => {
            let v = value.as_u64();
            let s = format!("{:x}", v);
            if spec.flags.alt && v != 0 {
                format!("0x{}", s)
            } else {
                s
            }
        }
        Conversion::UpperHex => {
            let v = value.as_u64();
            let s = format!("{:X}", v);
            if spec.flags.alt && v != 0 {
                format!("0X{}", s)
            } else {
                s
            }
        }
        Conversion::Octal => {
            let v = value.as_u64();
            if spec.flags.alt && v != 0 {
                format!("0{:o}", v)
            } else {
                format!("{:o}", v)
            }
        }
        Conversion::Fixed => with_sign(
            format!("{:.*}", spec.precision.unwrap_or(6), value.as_f64()),
            &spec.flags,
        ),
        Conversion::Exp => with_sign(
            format_exp(value.as_f64(), spec.precision.unwrap_or(6)),
            &spec.flags,
        ),
        Conversion::General => with_sign(
            format_general(value.as_f64(), spec.precision.unwrap_or(6), spec.flags.alt),
            &spec.flags,
        ),
    };
    pad(body, spec)
}

fn with_sign(s: String, flags: &SpecFlags) -> String {
    if s.starts_with('-') {
        s
    } else if flags.plus {
        format!("+{}", s)
    } else if flags.space {
        format!(" {}", s)
    } else {
        s
    }
}

fn pad(body: String, spec: &FormatSpec) -> String {
    let width = match spec.width {
        Some(w) if w > body.chars().count() => w,
        _ => return body,
    };
    let fill = width - body.chars().count();
    if spec.flags.left {
        format!("{}{}", body, " ".repeat(fill))
    } else if spec.flags.zero && spec.conversion.is_numeric() {
        let split = body
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(0);
        let (sign, digits) = body.split_at(split);
        let digits_start = if digits.starts_with("0x") || digits.starts_with("0X") {
            2
        } else {
            0
        };
        let (prefix, rest) = digits.split_at(digits_start);
        format!("{}{}{}{}", sign, prefix, "0".repeat(fill), rest)
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

fn format_exp(v: f64, precision: usize) -> String {
    if v == 0.0 || !v.is_finite() {
        return if v.is_finite() {
            format!("{:.*}e+00", precision, 0.0)
        } else {
            v.to_string()
        };
    }
    let s = format!("{:.*e}", precision, v);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let e: i32 = exp.parse().unwrap_or(0);
            let sign = if e < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, e.abs())
        }
        None => s,
    }
}

fn format_general(v: f64, precision: usize, keep_zeros: bool) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let p = precision.max(1);
    let exp = if v == 0.0 {
        0
    } else {
        v.abs().log10().floor() as i32
    };
    let s = if exp < -4 || exp >= p as i32 {
        format_exp(v, p - 1)
    } else {
        format!("{:.*}", (p as i32 - 1 - exp).max(0) as usize, v)
    };
    if keep_zeros {
        return s;
    }
    match s.split_once('e') {
        Some((m, e)) => format!("{}e{}", trim_zeros(m), e),
        None => trim_zeros(&s).to_string(),
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
