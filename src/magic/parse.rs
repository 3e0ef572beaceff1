//! Text magic grammar.
//!
//! Each non-comment line is `[>...]offset type test [description]`, with
//! whitespace-separated fields. `!:` lines annotate the rule above them.

use crate::io::Endian;
use crate::magic::error::{LoadError, LoadErrorKind};
use crate::magic::format::Description;
use crate::magic::types::{
    build_regex, ArithOp, IndirectOffset, MagicRule, Offset, Operand, Relation, StrFlags,
    Strength, Test, TestValue, TypeKind,
};
use once_cell::sync::OnceCell;
use tracing::trace;

/// Range used by `search` and `regex` when none is given.
pub const DEFAULT_SEARCH_RANGE: u32 = 8192;

type LineError = (LoadErrorKind, String);

/// Parse one rule source into a flat, ordered rule list.
///
/// The tree structure is implied by `level`; level skips are rejected here
/// so every rule has a parent in the same source.
pub fn parse_rules(source_name: &str, text: &[u8]) -> Result<Vec<MagicRule>, LoadError> {
    let mut rules: Vec<MagicRule> = Vec::new();

    for (idx, raw_line) in text.split(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = trim_end(raw_line);
        let body = trim_start(line);
        if body.is_empty() || body[0] == b'#' {
            continue;
        }
        let fail = |(kind, reason): LineError| LoadError::new(kind, source_name, line_no, reason);

        if let Some(annotation) = body.strip_prefix(&b"!:"[..]) {
            let rule = rules.last_mut().ok_or_else(|| {
                fail((
                    LoadErrorKind::BadAnnotation,
                    "annotation with no preceding rule".to_string(),
                ))
            })?;
            apply_annotation(rule, annotation)
                .map_err(|reason| fail((LoadErrorKind::BadAnnotation, reason)))?;
            continue;
        }

        let rule = parse_line(body, line_no).map_err(fail)?;
        match rules.last() {
            None if rule.level > 0 => {
                return Err(fail((
                    LoadErrorKind::LevelSkip,
                    format!("level {} rule has no parent", rule.level),
                )))
            }
            Some(prev) if rule.level > prev.level + 1 => {
                return Err(fail((
                    LoadErrorKind::LevelSkip,
                    format!("level {} follows level {}", rule.level, prev.level),
                )))
            }
            _ => {}
        }
        trace!(source = source_name, line = line_no, level = rule.level, "parsed rule");
        rules.push(rule);
    }
    Ok(rules)
}

fn parse_line(body: &[u8], line: usize) -> Result<MagicRule, LineError> {
    let level_len = body.iter().take_while(|&&b| b == b'>').count();
    let level = u8::try_from(level_len)
        .map_err(|_| (LoadErrorKind::LevelSkip, "nesting too deep".to_string()))?;
    let rest = trim_start(&body[level_len..]);

    let (offset_tok, rest) = split_field(rest);
    let offset = parse_offset(offset_tok).map_err(|r| (LoadErrorKind::MalformedOffset, r))?;

    let (type_tok, rest) = split_field(rest);
    if type_tok.is_empty() {
        return Err((LoadErrorKind::UnknownType, "missing type".to_string()));
    }
    let parsed = parse_type(type_tok)?;
    let mut kind = parsed.kind;

    let (mut test_tok, mut rest) = split_test(rest)?;
    let mut joined = Vec::new();
    if kind.numeric_size().is_some()
        && test_tok.len() == 1
        && b"=!<>&^~".contains(&test_tok[0])
    {
        let (value_tok, after) = split_test(rest)?;
        joined.extend_from_slice(test_tok);
        joined.extend_from_slice(value_tok);
        test_tok = joined.as_slice();
        rest = after;
    }

    let test = match &mut kind {
        TypeKind::Name(name) => {
            *name = token_string(test_tok, "name")?;
            Test::any()
        }
        TypeKind::Use { name, flip } => {
            let raw = token_string(test_tok, "use")?;
            let raw = raw.strip_prefix('\\').unwrap_or(&raw);
            match raw.strip_prefix('^') {
                Some(n) => {
                    *flip = true;
                    *name = n.to_string();
                }
                None => *name = raw.to_string(),
            }
            if name.is_empty() {
                return Err((LoadErrorKind::BadValue, "`use' needs a name".to_string()));
            }
            Test::any()
        }
        other => parse_test(other, test_tok, parsed.str_flags)?,
    };
    if matches!(kind, TypeKind::Name(_)) && level != 0 {
        return Err((
            LoadErrorKind::BadValue,
            "`name' rules must be top-level".to_string(),
        ));
    }

    let desc_text = String::from_utf8_lossy(trim_start(rest));
    let description =
        Description::parse(&desc_text).map_err(|r| (LoadErrorKind::BadFormat, r))?;

    Ok(MagicRule {
        line,
        level,
        offset,
        kind,
        type_name: parsed.name,
        type_op: parsed.type_op,
        str_flags: parsed.str_flags,
        test,
        description,
        mime: None,
        extensions: Vec::new(),
        apple: None,
        strength: None,
        continues: false,
        regex: OnceCell::new(),
    })
}

fn token_string(tok: &[u8], what: &str) -> Result<String, LineError> {
    if tok.is_empty() {
        return Err((LoadErrorKind::BadValue, format!("`{}' needs a name", what)));
    }
    std::str::from_utf8(tok)
        .map(str::to_string)
        .map_err(|_| (LoadErrorKind::BadValue, "name is not valid UTF-8".to_string()))
}

/// Parse `0`, `-4`, `&2`, `(0x3c.l)`, `&(4.s*512)`, `(&0.b+(2))`.
pub fn parse_offset(tok: &[u8]) -> Result<Offset, String> {
    let s = std::str::from_utf8(tok).map_err(|_| "offset is not valid UTF-8".to_string())?;
    if s.is_empty() {
        return Err("missing offset".to_string());
    }
    let (relative, s) = match s.strip_prefix('&') {
        Some(r) => (true, r),
        None => (false, s),
    };

    if let Some(inner) = s.strip_prefix('(') {
        let inner = inner
            .strip_suffix(')')
            .ok_or_else(|| format!("unbalanced parenthesis in `{}'", s))?;
        return parse_indirect(inner, relative).map(|ind| Offset::Indirect(Box::new(ind)));
    }

    match parse_int(s) {
        Some((n, "")) if relative => Ok(Offset::Relative(n)),
        Some((n, "")) => Ok(Offset::Absolute(n)),
        _ => Err(format!("bad offset `{}'", s)),
    }
}

fn parse_indirect(inner: &str, result_relative: bool) -> Result<IndirectOffset, String> {
    let (base_relative, inner) = match inner.strip_prefix('&') {
        Some(r) => (true, r),
        None => (false, inner),
    };
    let (base, mut rest) =
        parse_int(inner).ok_or_else(|| format!("bad indirect base `{}'", inner))?;

    let mut size = 4u8;
    let mut endian = Endian::native();
    let mut signed = false;
    let mut id3 = false;
    if let Some(sep) = rest.chars().next().filter(|c| *c == '.' || *c == ',') {
        signed = sep == ',';
        let mut chars = rest[1..].chars();
        let c = chars
            .next()
            .ok_or_else(|| "missing indirect type".to_string())?;
        let (sz, en, is_id3) = match c {
            'b' | 'c' | 'B' | 'C' => (1, Endian::Little, false),
            's' | 'h' => (2, Endian::Little, false),
            'S' | 'H' => (2, Endian::Big, false),
            'l' => (4, Endian::Little, false),
            'L' => (4, Endian::Big, false),
            'm' => (4, Endian::Middle, false),
            'q' => (8, Endian::Little, false),
            'Q' => (8, Endian::Big, false),
            'i' => (4, Endian::Little, true),
            'I' => (4, Endian::Big, true),
            other => return Err(format!("unknown indirect type `{}'", other)),
        };
        size = sz;
        endian = en;
        id3 = is_id3;
        rest = chars.as_str();
    }

    let adjust = if rest.is_empty() {
        None
    } else {
        let op = ArithOp::from_char(rest.as_bytes()[0])
            .ok_or_else(|| format!("bad indirect operator in `{}'", rest))?;
        let operand_text = &rest[1..];
        let operand = match operand_text
            .strip_prefix('(')
            .and_then(|o| o.strip_suffix(')'))
        {
            Some(o) => match parse_int(o) {
                Some((n, "")) => Operand::Indirect(n),
                _ => return Err(format!("bad indirect operand `{}'", operand_text)),
            },
            None => match parse_int(operand_text) {
                Some((n, "")) => Operand::Const(n),
                _ => return Err(format!("bad indirect operand `{}'", operand_text)),
            },
        };
        Some((op, operand))
    };

    Ok(IndirectOffset {
        base,
        base_relative,
        size,
        endian,
        signed,
        id3,
        adjust,
        result_relative,
    })
}

/// Parse a C-style integer (decimal, `0x` hex, leading-zero octal, optional
/// sign). Values wider than `i64` wrap as two's complement.
pub fn parse_int(s: &str) -> Option<(i64, &str)> {
    let bytes = s.as_bytes();
    let (neg, i) = match bytes.first() {
        Some(b'-') => (true, 1),
        Some(b'+') => (false, 1),
        _ => (false, 0),
    };
    let tail = &bytes[i..];
    let (radix, start) = if tail.starts_with(b"0x") || tail.starts_with(b"0X") {
        (16, i + 2)
    } else if tail.len() > 1 && tail[0] == b'0' && tail[1].is_ascii_digit() {
        (8, i + 1)
    } else {
        (10, i)
    };
    let end = start
        + bytes[start..]
            .iter()
            .take_while(|b| (**b as char).is_digit(radix))
            .count();
    if end == start {
        return None;
    }
    let magnitude = u64::from_str_radix(&s[start..end], radix).ok()?;
    let value = if neg {
        (magnitude as i64).wrapping_neg()
    } else {
        magnitude as i64
    };
    Some((value, &s[end..]))
}

struct ParsedType {
    kind: TypeKind,
    name: String,
    type_op: Option<(ArithOp, u64)>,
    str_flags: StrFlags,
}

fn int(size: u8, endian: Endian) -> TypeKind {
    TypeKind::Int {
        size,
        endian,
        unsigned: false,
        id3: false,
    }
}

fn date(size: u8, endian: Endian, local: bool) -> TypeKind {
    TypeKind::Date {
        size,
        endian,
        local,
    }
}

fn keyword(kw: &str) -> Option<TypeKind> {
    use Endian::{Big, Little, Middle};
    let native = Endian::native();
    Some(match kw {
        "byte" => int(1, native),
        "short" => int(2, native),
        "long" => int(4, native),
        "quad" => int(8, native),
        "beshort" => int(2, Big),
        "belong" => int(4, Big),
        "bequad" => int(8, Big),
        "leshort" => int(2, Little),
        "lelong" => int(4, Little),
        "lequad" => int(8, Little),
        "melong" => int(4, Middle),
        "beid3" => TypeKind::Int {
            size: 4,
            endian: Big,
            unsigned: true,
            id3: true,
        },
        "leid3" => TypeKind::Int {
            size: 4,
            endian: Little,
            unsigned: true,
            id3: true,
        },
        "float" => TypeKind::Float { size: 4, endian: native },
        "double" => TypeKind::Float { size: 8, endian: native },
        "befloat" => TypeKind::Float { size: 4, endian: Big },
        "bedouble" => TypeKind::Float { size: 8, endian: Big },
        "lefloat" => TypeKind::Float { size: 4, endian: Little },
        "ledouble" => TypeKind::Float { size: 8, endian: Little },
        "date" => date(4, native, false),
        "ldate" => date(4, native, true),
        "bedate" => date(4, Big, false),
        "beldate" => date(4, Big, true),
        "ledate" => date(4, Little, false),
        "leldate" => date(4, Little, true),
        "medate" => date(4, Middle, false),
        "meldate" => date(4, Middle, true),
        "qdate" => date(8, native, false),
        "qldate" => date(8, native, true),
        "beqdate" => date(8, Big, false),
        "beqldate" => date(8, Big, true),
        "leqdate" => date(8, Little, false),
        "leqldate" => date(8, Little, true),
        "string" => TypeKind::String,
        "pstring" => TypeKind::PString {
            len_size: 1,
            endian: Big,
        },
        "bestring16" => TypeKind::String16 { endian: Big },
        "lestring16" => TypeKind::String16 { endian: Little },
        "search" => TypeKind::Search {
            range: DEFAULT_SEARCH_RANGE,
        },
        "regex" => TypeKind::Regex {
            range: DEFAULT_SEARCH_RANGE,
        },
        "default" => TypeKind::Default,
        "clear" => TypeKind::Clear,
        "name" => TypeKind::Name(String::new()),
        "use" => TypeKind::Use {
            name: String::new(),
            flip: false,
        },
        "indirect" => TypeKind::Indirect { relative: false },
        "offset" => TypeKind::Offset,
        _ => return None,
    })
}

fn parse_type(tok: &[u8]) -> Result<ParsedType, LineError> {
    let unknown = |what: &str| (LoadErrorKind::UnknownType, what.to_string());
    let s = std::str::from_utf8(tok).map_err(|_| unknown("type is not valid UTF-8"))?;
    let kw_len = s.bytes().take_while(u8::is_ascii_alphanumeric).count();
    let (kw, rest) = s.split_at(kw_len);

    let mut kind = match keyword(kw) {
        Some(k) => k,
        None => match kw.strip_prefix('u').and_then(keyword) {
            Some(TypeKind::Int {
                size, endian, id3, ..
            }) => TypeKind::Int {
                size,
                endian,
                unsigned: true,
                id3,
            },
            Some(k @ TypeKind::Date { .. }) => k,
            _ => return Err(unknown(&format!("unknown type `{}'", s))),
        },
    };

    let mut type_op = None;
    let mut str_flags = StrFlags::empty();

    if kind.numeric_size().is_some() {
        if !rest.is_empty() {
            if matches!(kind, TypeKind::Float { .. }) {
                return Err(unknown(&format!("operator not allowed on `{}'", kw)));
            }
            let op = ArithOp::from_char(rest.as_bytes()[0])
                .ok_or_else(|| unknown(&format!("unknown type `{}'", s)))?;
            match parse_int(&rest[1..]) {
                Some((v, "")) => type_op = Some((op, v as u64)),
                _ => {
                    return Err((
                        LoadErrorKind::BadValue,
                        format!("bad operand in type `{}'", s),
                    ))
                }
            }
        }
    } else if !rest.is_empty() {
        let modifiers = rest
            .strip_prefix('/')
            .ok_or_else(|| unknown(&format!("unknown type `{}'", s)))?;
        parse_modifiers(&mut kind, modifiers, &mut str_flags)
            .map_err(|c| unknown(&format!("invalid modifier `{}' in `{}'", c, s)))?;
    }

    Ok(ParsedType {
        kind,
        name: s.to_string(),
        type_op,
        str_flags,
    })
}

fn parse_modifiers(kind: &mut TypeKind, text: &str, flags: &mut StrFlags) -> Result<(), char> {
    let mut range: Option<u32> = None;
    for c in text.chars() {
        if c == '/' {
            continue;
        }
        if let Some(d) = c.to_digit(10) {
            match kind {
                TypeKind::Search { .. } | TypeKind::Regex { .. } => {
                    range = Some(range.unwrap_or(0).saturating_mul(10).saturating_add(d));
                    continue;
                }
                _ => return Err(c),
            }
        }
        match (&mut *kind, c) {
            (TypeKind::Indirect { relative }, 'r') => *relative = true,
            (TypeKind::PString { len_size, endian }, 'B' | 'H' | 'h' | 'L' | 'l') => {
                let (sz, en) = match c {
                    'B' => (1, Endian::Big),
                    'H' => (2, Endian::Big),
                    'h' => (2, Endian::Little),
                    'L' => (4, Endian::Big),
                    _ => (4, Endian::Little),
                };
                *len_size = sz;
                *endian = en;
            }
            (TypeKind::PString { .. }, 'J') => *flags |= StrFlags::LENGTH_INCLUDES_SELF,
            (TypeKind::Regex { .. }, 'l') => *flags |= StrFlags::LINES,
            (
                TypeKind::String
                | TypeKind::PString { .. }
                | TypeKind::Search { .. }
                | TypeKind::Regex { .. },
                _,
            ) => {
                *flags |= match c {
                    'W' => StrFlags::COMPACT_WHITESPACE,
                    'w' => StrFlags::OPTIONAL_WHITESPACE,
                    'c' => StrFlags::IGNORE_LOWERCASE,
                    'C' => StrFlags::IGNORE_UPPERCASE,
                    'b' => StrFlags::BINTEST,
                    't' => StrFlags::TEXTTEST,
                    'T' => StrFlags::TRIM,
                    's' => StrFlags::OFFSET_START,
                    _ => return Err(c),
                }
            }
            _ => return Err(c),
        }
    }
    if let Some(r) = range {
        match kind {
            TypeKind::Search { range } | TypeKind::Regex { range } => *range = r.max(1),
            _ => {}
        }
    }
    Ok(())
}

fn parse_test(kind: &TypeKind, tok: &[u8], flags: StrFlags) -> Result<Test, LineError> {
    let bad = |reason: String| (LoadErrorKind::BadValue, reason);
    match kind {
        TypeKind::Default | TypeKind::Clear | TypeKind::Indirect { .. } => Ok(Test::any()),
        _ if tok == b"x" => Ok(Test::any()),
        TypeKind::Int { .. } | TypeKind::Date { .. } | TypeKind::Offset => {
            if tok.is_empty() {
                return Err(bad("missing test value".to_string()));
            }
            let (relation, body, negate) = match tok[0] {
                b'=' => (Relation::Eq, &tok[1..], false),
                b'!' => (Relation::Ne, &tok[1..], false),
                b'<' => (Relation::Lt, &tok[1..], false),
                b'>' => (Relation::Gt, &tok[1..], false),
                b'&' => (Relation::AllSet, &tok[1..], false),
                b'^' => (Relation::AnyClear, &tok[1..], false),
                b'~' => (Relation::Eq, &tok[1..], true),
                _ => (Relation::Eq, tok, false),
            };
            let text = std::str::from_utf8(body).map_err(|_| bad("bad number".to_string()))?;
            let value = match parse_int(text) {
                Some((v, rest)) if rest.trim_end_matches(['L', 'l', 'U', 'u']).is_empty() => {
                    v as u64
                }
                _ => return Err(bad(format!("bad number `{}'", text))),
            };
            Ok(Test {
                relation,
                value: TestValue::Int(if negate { !value } else { value }),
            })
        }
        TypeKind::Float { .. } => {
            if tok.is_empty() {
                return Err(bad("missing test value".to_string()));
            }
            let (relation, body) = match tok[0] {
                b'=' => (Relation::Eq, &tok[1..]),
                b'!' => (Relation::Ne, &tok[1..]),
                b'<' => (Relation::Lt, &tok[1..]),
                b'>' => (Relation::Gt, &tok[1..]),
                _ => (Relation::Eq, tok),
            };
            let text = std::str::from_utf8(body).map_err(|_| bad("bad float".to_string()))?;
            let value: f64 = text
                .parse()
                .map_err(|_| bad(format!("bad float `{}'", text)))?;
            Ok(Test {
                relation,
                value: TestValue::Float(value),
            })
        }
        TypeKind::Regex { .. } => {
            let (relation, body) = string_relation(tok, false);
            let pattern = unescape_regex(body)?;
            build_regex(&pattern, flags)
                .map_err(|e| (LoadErrorKind::BadRegex, e.to_string()))?;
            Ok(Test {
                relation,
                value: TestValue::Bytes(pattern),
            })
        }
        _ => {
            let (relation, body) = string_relation(tok, true);
            Ok(Test {
                relation,
                value: TestValue::Bytes(unescape(body)?),
            })
        }
    }
}

fn string_relation(tok: &[u8], ordered: bool) -> (Relation, &[u8]) {
    match tok.first() {
        Some(b'=') => (Relation::Eq, &tok[1..]),
        Some(b'!') => (Relation::Ne, &tok[1..]),
        Some(b'<') if ordered => (Relation::Lt, &tok[1..]),
        Some(b'>') if ordered => (Relation::Gt, &tok[1..]),
        _ => (Relation::Eq, tok),
    }
}

/// Decode C escapes in a string test.
pub fn unescape(raw: &[u8]) -> Result<Vec<u8>, LineError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        i += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let c = *raw.get(i).ok_or((
            LoadErrorKind::UnterminatedString,
            "trailing backslash".to_string(),
        ))?;
        i += 1;
        match c {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'a' => out.push(0x07),
            b'0'..=b'7' => {
                let mut v = (c - b'0') as u32;
                let mut n = 1;
                while n < 3 {
                    match raw.get(i) {
                        Some(d @ b'0'..=b'7') => {
                            v = v * 8 + (d - b'0') as u32;
                            i += 1;
                            n += 1;
                        }
                        _ => break,
                    }
                }
                out.push(v as u8);
            }
            b'x' => {
                let mut v = 0u32;
                let mut n = 0;
                while n < 2 {
                    match raw.get(i).and_then(|d| (*d as char).to_digit(16)) {
                        Some(d) => {
                            v = v * 16 + d;
                            i += 1;
                            n += 1;
                        }
                        None => break,
                    }
                }
                if n == 0 {
                    out.push(b'x');
                } else {
                    out.push(v as u8);
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn unescape_regex(raw: &[u8]) -> Result<Vec<u8>, LineError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' {
            match raw.get(i + 1) {
                Some(b' ') => {
                    out.push(b' ');
                    i += 2;
                    continue;
                }
                Some(&c) => {
                    out.push(b'\\');
                    out.push(c);
                    i += 2;
                    continue;
                }
                None => {
                    return Err((
                        LoadErrorKind::UnterminatedString,
                        "trailing backslash".to_string(),
                    ))
                }
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    Ok(out)
}

fn apply_annotation(rule: &mut MagicRule, text: &[u8]) -> Result<(), String> {
    let s = std::str::from_utf8(text).map_err(|_| "annotation is not valid UTF-8".to_string())?;
    let kw_len = s.bytes().take_while(u8::is_ascii_alphabetic).count();
    let (kw, value) = s.split_at(kw_len);
    let value = value.trim();
    match kw {
        "mime" => {
            if rule.mime.is_some() {
                return Err("duplicate !:mime".to_string());
            }
            if !is_mime_type(value) {
                return Err(format!("invalid MIME type `{}'", value));
            }
            rule.mime = Some(value.to_string());
        }
        "ext" => {
            let exts: Vec<String> = value
                .split('/')
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            if exts.is_empty() {
                return Err("empty !:ext".to_string());
            }
            rule.extensions = exts;
        }
        "apple" => {
            if value.is_empty() || value.len() > 8 {
                return Err(format!("invalid Apple type `{}'", value));
            }
            rule.apple = Some(value.to_string());
        }
        "strength" => {
            let op = value
                .bytes()
                .next()
                .and_then(|c| ArithOp::from_char(c).filter(|op| {
                    matches!(op, ArithOp::Add | ArithOp::Sub | ArithOp::Mul | ArithOp::Div)
                }))
                .ok_or_else(|| format!("bad strength `{}'", value))?;
            let amount = value[1..]
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("bad strength `{}'", value))?;
            rule.strength = Some(Strength { op, value: amount });
        }
        "continue" => {
            if !value.is_empty() {
                return Err(format!("`!:continue' takes no value, found `{}'", value));
            }
            rule.continues = true;
        }
        other => return Err(format!("unknown annotation `!:{}'", other)),
    }
    Ok(())
}

/// `type/subtype` with RFC 6838 restricted-name characters.
pub fn is_mime_type(s: &str) -> bool {
    let valid = |part: &str| {
        !part.is_empty()
            && part
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b))
    };
    match s.split_once('/') {
        Some((ty, sub)) => valid(ty) && valid(sub),
        None => false,
    }
}

fn trim_start(s: &[u8]) -> &[u8] {
    let n = s.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &s[n..]
}

fn trim_end(s: &[u8]) -> &[u8] {
    let n = s.iter().rev().take_while(|b| b.is_ascii_whitespace()).count();
    &s[..s.len() - n]
}

fn split_field(s: &[u8]) -> (&[u8], &[u8]) {
    let s = trim_start(s);
    let n = s.iter().take_while(|b| !b.is_ascii_whitespace()).count();
    s.split_at(n)
}

/// Like [`split_field`], but a backslash protects the following byte.
fn split_test(s: &[u8]) -> Result<(&[u8], &[u8]), LineError> {
    let s = trim_start(s);
    let mut i = 0;
    while i < s.len() && !s[i].is_ascii_whitespace() {
        if s[i] == b'\\' {
            if i + 1 >= s.len() {
                return Err((
                    LoadErrorKind::UnterminatedString,
                    "trailing backslash".to_string(),
                ));
            }
            i += 1;
        }
        i += 1;
    }
    Ok(s.split_at(i))
}
