//! Single-rule evaluation: offset resolution and the typed comparison.
//!
//! Nothing here fails on short input. A read past the end of the source is
//! a no-match; only the indirection cap produces an error, which the
//! evaluator decides how to surface.

use crate::config::EvalLimits;
use crate::error::{Result, SigilError};
use crate::io::{Endian, InputWindow};
use crate::magic::format::{sign_extend, MatchValue};
use crate::magic::types::{
    IndirectOffset, MagicRule, Offset, Operand, Relation, StrFlags, TestValue, TypeKind,
};
use memchr::memmem;

/// Anchors for offsets in the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Added to absolute offsets; non-zero inside `use` and `indirect`.
    pub base: usize,
    /// End of the parent's match, the anchor for `&N` offsets.
    pub parent_end: usize,
    /// Byte order flipped by `use ^name`.
    pub flip: bool,
    /// Indirect offsets already followed on this path.
    pub indirections: u32,
}

impl Position {
    fn endian(&self, endian: Endian) -> Endian {
        if self.flip {
            endian.flipped()
        } else {
            endian
        }
    }
}

/// What one rule did against the input.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub matched: bool,
    /// Value substituted into the description.
    pub value: Option<MatchValue>,
    /// Resolved offset of the test.
    pub offset: usize,
    /// Where relative offsets of the children start.
    pub end_offset: usize,
}

impl RuleOutcome {
    pub fn no_match(offset: usize) -> Self {
        Self {
            matched: false,
            value: None,
            offset,
            end_offset: offset,
        }
    }

    fn hit(value: Option<MatchValue>, offset: usize, end_offset: usize) -> Self {
        Self {
            matched: true,
            value,
            offset,
            end_offset,
        }
    }
}

/// Resolve a rule offset. `Ok(None)` means the offset lies outside the
/// source (a no-match).
pub fn resolve_offset(
    offset: &Offset,
    window: &mut InputWindow<'_>,
    pos: &Position,
    limits: &EvalLimits,
) -> Result<Option<usize>> {
    match offset {
        Offset::Absolute(n) if *n >= 0 => Ok(pos.base.checked_add(*n as usize)),
        Offset::Absolute(n) => Ok(from_end(window, *n)),
        Offset::Relative(n) => Ok(add_signed(pos.parent_end, *n)),
        Offset::Indirect(ind) => {
            if pos.indirections >= limits.max_indirection {
                return Err(SigilError::IndirectionLimit {
                    limit: limits.max_indirection,
                });
            }
            Ok(resolve_indirect(ind, window, pos))
        }
    }
}

fn from_end(window: &mut InputWindow<'_>, n: i64) -> Option<usize> {
    if window.total_len().is_none() {
        window.fill();
    }
    let total = window.total_len()?;
    total
        .checked_sub(n.unsigned_abs())
        .and_then(|v| usize::try_from(v).ok())
}

pub(crate) fn add_signed(anchor: usize, delta: i64) -> Option<usize> {
    if delta >= 0 {
        anchor.checked_add(usize::try_from(delta).ok()?)
    } else {
        anchor.checked_sub(usize::try_from(delta.unsigned_abs()).ok()?)
    }
}

fn resolve_indirect(
    ind: &IndirectOffset,
    window: &mut InputWindow<'_>,
    pos: &Position,
) -> Option<usize> {
    let anchor = if ind.base_relative {
        pos.parent_end
    } else {
        pos.base
    };
    let endian = pos.endian(ind.endian);
    let raw = read_pointer(window, add_signed(anchor, ind.base)?, ind, endian)?;

    let value = match ind.adjust {
        None => raw,
        Some((op, operand)) => {
            let rhs = match operand {
                Operand::Const(c) => c,
                Operand::Indirect(at) => {
                    read_pointer(window, add_signed(pos.base, at)?, ind, endian)?
                }
            };
            if ind.signed {
                op.apply_signed(raw, rhs)?
            } else {
                op.apply(raw as u64, rhs as u64)? as i64
            }
        }
    };

    let anchor = if ind.result_relative {
        pos.parent_end
    } else {
        pos.base
    };
    add_signed(anchor, value)
}

fn read_pointer(
    window: &mut InputWindow<'_>,
    at: usize,
    ind: &IndirectOffset,
    endian: Endian,
) -> Option<i64> {
    let raw = window.read_int(at, ind.size as usize, endian).ok()?;
    let raw = if ind.id3 { id3_decode(raw) } else { raw };
    Some(if ind.signed {
        sign_extend(raw, ind.size)
    } else {
        raw as i64
    })
}

/// Decode a 32-bit ID3 sync-safe integer (7 significant bits per byte).
pub fn id3_decode(v: u64) -> u64 {
    (v & 0x7f) | ((v >> 8) & 0x7f) << 7 | ((v >> 16) & 0x7f) << 14 | ((v >> 24) & 0x7f) << 21
}

pub fn mask(v: u64, size: u8) -> u64 {
    if size >= 8 {
        v
    } else {
        v & ((1u64 << (size as u32 * 8)) - 1)
    }
}

fn compare_int(relation: Relation, value: u64, test: u64, size: u8, unsigned: bool) -> bool {
    let test = mask(test, size);
    match relation {
        Relation::Any => true,
        Relation::Eq => value == test,
        Relation::Ne => value != test,
        Relation::Lt | Relation::Gt => {
            let ord = if unsigned {
                value.cmp(&test)
            } else {
                sign_extend(value, size).cmp(&sign_extend(test, size))
            };
            if relation == Relation::Lt {
                ord.is_lt()
            } else {
                ord.is_gt()
            }
        }
        Relation::AllSet => value & test == test,
        Relation::AnyClear => value & test != test,
    }
}

/// Compare `pattern` against the start of `data` under the string flags.
///
/// Returns the memcmp-style difference (data minus pattern at the first
/// mismatch) and the number of data bytes consumed, or `None` when the data
/// ends before the pattern does.
pub fn compare_string(pattern: &[u8], data: &[u8], flags: StrFlags) -> Option<(i32, usize)> {
    let is_space = |b: &u8| b.is_ascii_whitespace();
    let mut d = 0usize;
    for (i, &a) in pattern.iter().enumerate() {
        if a.is_ascii_whitespace() && flags.contains(StrFlags::COMPACT_WHITESPACE) {
            match data.get(d) {
                Some(b) if is_space(b) => {
                    d += 1;
                    let next_is_space = pattern.get(i + 1).is_some_and(is_space);
                    if !next_is_space {
                        while data.get(d).is_some_and(is_space) {
                            d += 1;
                        }
                    }
                }
                Some(_) => return Some((1, d)),
                None => return None,
            }
            continue;
        }
        if a.is_ascii_whitespace() && flags.contains(StrFlags::OPTIONAL_WHITESPACE) {
            while data.get(d).is_some_and(is_space) {
                d += 1;
            }
            continue;
        }
        let b = *data.get(d)?;
        d += 1;
        let b = if flags.contains(StrFlags::IGNORE_LOWERCASE) && a.is_ascii_lowercase() {
            b.to_ascii_lowercase()
        } else if flags.contains(StrFlags::IGNORE_UPPERCASE) && a.is_ascii_uppercase() {
            b.to_ascii_uppercase()
        } else {
            b
        };
        let diff = b as i32 - a as i32;
        if diff != 0 {
            return Some((diff, d));
        }
    }
    Some((0, d))
}

fn string_relation_holds(relation: Relation, diff: i32) -> bool {
    match relation {
        Relation::Eq => diff == 0,
        Relation::Ne => diff != 0,
        Relation::Lt => diff < 0,
        Relation::Gt => diff > 0,
        Relation::Any => true,
        Relation::AllSet | Relation::AnyClear => false,
    }
}

/// Bytes up to the first NUL or line terminator, capped at `max`.
fn c_string(data: &[u8], max: usize) -> &[u8] {
    let end = data
        .iter()
        .take(max)
        .position(|&b| b == 0 || b == b'\n' || b == b'\r')
        .unwrap_or_else(|| data.len().min(max));
    &data[..end]
}

fn printed(bytes: &[u8], flags: StrFlags, max: usize) -> MatchValue {
    let bytes = &bytes[..bytes.len().min(max)];
    let bytes = if flags.contains(StrFlags::TRIM) {
        bytes.trim_ascii()
    } else {
        bytes
    };
    MatchValue::Bytes(bytes.to_vec())
}

fn pattern_of(rule: &MagicRule) -> &[u8] {
    match &rule.test.value {
        TestValue::Bytes(b) => b,
        _ => &[],
    }
}

/// Read the typed value at `offset` and apply the rule's test.
///
/// Control types (`default`, `clear`, `name`, `use`, `indirect`) are
/// handled by the evaluator and never reach this function.
pub fn match_rule(
    rule: &MagicRule,
    window: &mut InputWindow<'_>,
    offset: usize,
    pos: &Position,
    limits: &EvalLimits,
) -> RuleOutcome {
    let miss = RuleOutcome::no_match(offset);
    let relation = rule.test.relation;
    let max_str = limits.max_string_len;

    match &rule.kind {
        TypeKind::Int {
            size,
            endian,
            unsigned,
            id3,
        } => {
            let Some(value) = read_numeric(rule, window, offset, *size, pos.endian(*endian), *id3)
            else {
                return miss;
            };
            let test = match rule.test.value {
                TestValue::Int(t) => t,
                _ => 0,
            };
            if !compare_int(relation, value, test, *size, *unsigned) {
                return miss;
            }
            let v = MatchValue::Int {
                bits: value,
                size: *size,
                signed: !*unsigned,
            };
            RuleOutcome::hit(Some(v), offset, offset + *size as usize)
        }
        TypeKind::Date {
            size,
            endian,
            local,
        } => {
            let Some(value) = read_numeric(rule, window, offset, *size, pos.endian(*endian), false)
            else {
                return miss;
            };
            let test = match rule.test.value {
                TestValue::Int(t) => t,
                _ => 0,
            };
            if !compare_int(relation, value, test, *size, false) {
                return miss;
            }
            let v = MatchValue::Date {
                secs: sign_extend(value, *size),
                local: *local,
            };
            RuleOutcome::hit(Some(v), offset, offset + *size as usize)
        }
        TypeKind::Float { size, endian } => {
            let Ok(bits) = window.read_int(offset, *size as usize, pos.endian(*endian)) else {
                return miss;
            };
            let value = if *size == 4 {
                f32::from_bits(bits as u32) as f64
            } else {
                f64::from_bits(bits)
            };
            let test = match rule.test.value {
                TestValue::Float(f) => f,
                TestValue::Int(i) => i as f64,
                _ => 0.0,
            };
            let holds = match relation {
                Relation::Any => true,
                Relation::Eq => value == test,
                Relation::Ne => value != test,
                Relation::Lt => value < test,
                Relation::Gt => value > test,
                Relation::AllSet | Relation::AnyClear => false,
            };
            if !holds {
                return miss;
            }
            RuleOutcome::hit(Some(MatchValue::Float(value)), offset, offset + *size as usize)
        }
        TypeKind::Offset => {
            let test = match rule.test.value {
                TestValue::Int(t) => t,
                _ => 0,
            };
            if !compare_int(relation, offset as u64, test, 8, true) {
                return miss;
            }
            let v = MatchValue::Int {
                bits: offset as u64,
                size: 8,
                signed: false,
            };
            RuleOutcome::hit(Some(v), offset, offset)
        }
        TypeKind::String => {
            let pattern = pattern_of(rule);
            let data = window.read_available(offset, pattern.len() + max_str);
            if data.is_empty() {
                return miss;
            }
            if relation == Relation::Any {
                let s = c_string(data, max_str);
                let end = offset + s.len();
                return RuleOutcome::hit(Some(printed(s, rule.str_flags, max_str)), offset, end);
            }
            let Some((diff, consumed)) = compare_string(pattern, data, rule.str_flags) else {
                return miss;
            };
            if !string_relation_holds(relation, diff) {
                return miss;
            }
            if matches!(relation, Relation::Eq | Relation::Ne) {
                let end = offset + if relation == Relation::Eq { consumed } else { pattern.len() };
                RuleOutcome::hit(Some(printed(pattern, rule.str_flags, max_str)), offset, end)
            } else {
                let s = c_string(data, max_str);
                let end = offset + s.len();
                RuleOutcome::hit(Some(printed(s, rule.str_flags, max_str)), offset, end)
            }
        }
        TypeKind::PString { len_size, endian } => {
            let Ok(raw_len) = window.read_int(offset, *len_size as usize, pos.endian(*endian))
            else {
                return miss;
            };
            let mut len = usize::try_from(raw_len).unwrap_or(usize::MAX);
            if rule.str_flags.contains(StrFlags::LENGTH_INCLUDES_SELF) {
                len = len.saturating_sub(*len_size as usize);
            }
            let start = offset + *len_size as usize;
            let pattern = pattern_of(rule);
            let want = len.min(max_str.max(pattern.len()));
            let data = window.read_available(start, want);
            if data.len() < want {
                return miss;
            }
            let end = start.saturating_add(len);
            if relation == Relation::Any {
                return RuleOutcome::hit(Some(printed(data, rule.str_flags, max_str)), offset, end);
            }
            let Some((diff, _)) = compare_string(pattern, data, rule.str_flags) else {
                return miss;
            };
            if !string_relation_holds(relation, diff) {
                return miss;
            }
            let shown = if matches!(relation, Relation::Eq | Relation::Ne) {
                pattern
            } else {
                data
            };
            RuleOutcome::hit(Some(printed(shown, rule.str_flags, max_str)), offset, end)
        }
        TypeKind::String16 { endian } => {
            let pattern = pattern_of(rule);
            let units = if relation == Relation::Any {
                max_str
            } else {
                pattern.len()
            };
            let low_first = pos.endian(*endian) == Endian::Little;
            let raw = window.read_available(offset, units * 2);
            let mut low: Vec<u8> = raw
                .chunks_exact(2)
                .map(|c| if low_first { c[0] } else { c[1] })
                .collect();
            if low.is_empty() {
                return miss;
            }
            if relation == Relation::Any {
                if let Some(nul) = low.iter().position(|&b| b == 0) {
                    low.truncate(nul);
                }
                let end = offset + low.len() * 2;
                return RuleOutcome::hit(Some(printed(&low, rule.str_flags, max_str)), offset, end);
            }
            let Some((diff, consumed)) = compare_string(pattern, &low, rule.str_flags) else {
                return miss;
            };
            if !string_relation_holds(relation, diff) {
                return miss;
            }
            RuleOutcome::hit(
                Some(printed(pattern, rule.str_flags, max_str)),
                offset,
                offset + consumed * 2,
            )
        }
        TypeKind::Search { range } => {
            let pattern = pattern_of(rule);
            let range = *range as usize;
            let data = window.read_available(offset, range.saturating_add(pattern.len()));
            if data.is_empty() {
                return miss;
            }
            let found = search(pattern, data, range, rule.str_flags);
            match (relation, found) {
                (Relation::Ne, None) => RuleOutcome::hit(None, offset, offset),
                (Relation::Eq | Relation::Any, Some((start, consumed))) => {
                    let end = if rule.str_flags.contains(StrFlags::OFFSET_START) {
                        offset + start
                    } else {
                        offset + start + consumed
                    };
                    RuleOutcome::hit(Some(printed(pattern, rule.str_flags, max_str)), offset, end)
                }
                _ => miss,
            }
        }
        TypeKind::Regex { range } => {
            let region_len = if rule.str_flags.contains(StrFlags::LINES) {
                limits.regex_max_bytes
            } else {
                (*range as usize).min(limits.regex_max_bytes)
            };
            let data = window.read_available(offset, region_len);
            let region = if rule.str_flags.contains(StrFlags::LINES) {
                first_lines(data, *range as usize)
            } else {
                data
            };
            let found = match rule.compiled_regex() {
                Some(re) => re.find(region).map(|m| (m.start(), m.end(), m.as_bytes().to_vec())),
                None => None,
            };
            match (relation, found) {
                (Relation::Ne, None) => RuleOutcome::hit(None, offset, offset),
                (Relation::Eq | Relation::Any, Some((start, end, text))) => {
                    let end = if rule.str_flags.contains(StrFlags::OFFSET_START) {
                        offset + start
                    } else {
                        offset + end
                    };
                    RuleOutcome::hit(Some(printed(&text, rule.str_flags, max_str)), offset, end)
                }
                _ => miss,
            }
        }
        TypeKind::Default
        | TypeKind::Clear
        | TypeKind::Name(_)
        | TypeKind::Use { .. }
        | TypeKind::Indirect { .. } => miss,
    }
}

fn read_numeric(
    rule: &MagicRule,
    window: &mut InputWindow<'_>,
    offset: usize,
    size: u8,
    endian: Endian,
    id3: bool,
) -> Option<u64> {
    let raw = window.read_int(offset, size as usize, endian).ok()?;
    let raw = if id3 { id3_decode(raw) } else { raw };
    let value = match rule.type_op {
        Some((op, operand)) => op.apply(raw, operand)?,
        None => raw,
    };
    Some(mask(value, size))
}

/// First match of `pattern` starting within `range` bytes of `data`.
/// Returns (start, data bytes consumed).
fn search(pattern: &[u8], data: &[u8], range: usize, flags: StrFlags) -> Option<(usize, usize)> {
    if pattern.is_empty() {
        return Some((0, 0));
    }
    let fuzzy = StrFlags::IGNORE_LOWERCASE
        | StrFlags::IGNORE_UPPERCASE
        | StrFlags::COMPACT_WHITESPACE
        | StrFlags::OPTIONAL_WHITESPACE;
    if !flags.intersects(fuzzy) {
        let limit = data.len().min(range.saturating_sub(1).saturating_add(pattern.len()));
        return memmem::find(&data[..limit], pattern).map(|start| (start, pattern.len()));
    }
    (0..data.len().min(range)).find_map(|start| match compare_string(pattern, &data[start..], flags) {
        Some((0, consumed)) => Some((start, consumed)),
        _ => None,
    })
}

/// Prefix of `data` holding at most `lines` lines.
fn first_lines(data: &[u8], lines: usize) -> &[u8] {
    let cut = memchr::memchr_iter(b'\n', data)
        .nth(lines.saturating_sub(1))
        .map(|i| i + 1)
        .unwrap_or(data.len());
    &data[..cut]
}
