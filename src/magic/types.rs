//! Parsed representation of magic rules.

use crate::io::Endian;
use crate::magic::format::Description;
use bitflags::bitflags;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arithmetic or bitwise adjustment applied to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    And,
    Or,
    Xor,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn from_char(c: u8) -> Option<Self> {
        Some(match c {
            b'&' => ArithOp::And,
            b'|' => ArithOp::Or,
            b'^' => ArithOp::Xor,
            b'+' => ArithOp::Add,
            b'-' => ArithOp::Sub,
            b'*' => ArithOp::Mul,
            b'/' => ArithOp::Div,
            b'%' => ArithOp::Mod,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> char {
        match self {
            ArithOp::And => '&',
            ArithOp::Or => '|',
            ArithOp::Xor => '^',
            ArithOp::Add => '+',
            ArithOp::Sub => '-',
            ArithOp::Mul => '*',
            ArithOp::Div => '/',
            ArithOp::Mod => '%',
        }
    }

    /// Apply to `lhs`. Division by zero yields `None`.
    pub fn apply(&self, lhs: u64, rhs: u64) -> Option<u64> {
        Some(match self {
            ArithOp::And => lhs & rhs,
            ArithOp::Or => lhs | rhs,
            ArithOp::Xor => lhs ^ rhs,
            ArithOp::Add => lhs.wrapping_add(rhs),
            ArithOp::Sub => lhs.wrapping_sub(rhs),
            ArithOp::Mul => lhs.wrapping_mul(rhs),
            ArithOp::Div => lhs.checked_div(rhs)?,
            ArithOp::Mod => lhs.checked_rem(rhs)?,
        })
    }

    /// Signed variant used for indirect offsets read with `,`.
    pub fn apply_signed(&self, lhs: i64, rhs: i64) -> Option<i64> {
        Some(match self {
            ArithOp::And => lhs & rhs,
            ArithOp::Or => lhs | rhs,
            ArithOp::Xor => lhs ^ rhs,
            ArithOp::Add => lhs.wrapping_add(rhs),
            ArithOp::Sub => lhs.wrapping_sub(rhs),
            ArithOp::Mul => lhs.wrapping_mul(rhs),
            ArithOp::Div => lhs.checked_div(rhs)?,
            ArithOp::Mod => lhs.checked_rem(rhs)?,
        })
    }
}

/// Operand of an indirect-offset adjustment: a constant, or `(N)` meaning
/// "the value read at N with the same size".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Const(i64),
    Indirect(i64),
}

/// `(base.type op operand)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectOffset {
    pub base: i64,
    /// `(&N...)`: base is relative to the parent match end.
    pub base_relative: bool,
    pub size: u8,
    pub endian: Endian,
    pub signed: bool,
    /// ID3 sync-safe integer (7 bits per byte).
    pub id3: bool,
    pub adjust: Option<(ArithOp, Operand)>,
    /// `&(...)`: the resulting offset is relative to the parent match end.
    pub result_relative: bool,
}

/// Where a rule looks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Offset {
    /// Fixed position; negative counts from the end of the source.
    Absolute(i64),
    /// `&N`: relative to the end of the parent's match.
    Relative(i64),
    Indirect(Box<IndirectOffset>),
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Absolute(n) => write!(f, "{}", n),
            Offset::Relative(n) => write!(f, "&{}", n),
            Offset::Indirect(ind) => {
                if ind.result_relative {
                    write!(f, "&")?;
                }
                write!(f, "(")?;
                if ind.base_relative {
                    write!(f, "&")?;
                }
                write!(f, "{:#x}{}", ind.base, if ind.signed { ',' } else { '.' })?;
                let c = match (ind.size, ind.endian, ind.id3) {
                    (1, _, _) => 'b',
                    (4, Endian::Big, true) => 'I',
                    (4, _, true) => 'i',
                    (2, Endian::Big, _) => 'S',
                    (2, _, _) => 's',
                    (4, Endian::Middle, _) => 'm',
                    (4, Endian::Big, _) => 'L',
                    (4, _, _) => 'l',
                    (_, Endian::Big, _) => 'Q',
                    _ => 'q',
                };
                write!(f, "{}", c)?;
                if let Some((op, operand)) = &ind.adjust {
                    match operand {
                        Operand::Const(v) => write!(f, "{}{}", op.symbol(), v)?,
                        Operand::Indirect(v) => write!(f, "{}({})", op.symbol(), v)?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}

bitflags! {
    /// Modifiers of string-like tests (`string/cW` and friends).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StrFlags: u16 {
        /// `W`: whitespace in the pattern requires at least one in the data.
        const COMPACT_WHITESPACE = 0x001;
        /// `w`: whitespace in the pattern is optional in the data.
        const OPTIONAL_WHITESPACE = 0x002;
        /// `c`: lowercase pattern characters match either case.
        const IGNORE_LOWERCASE = 0x004;
        /// `C`: uppercase pattern characters match either case.
        const IGNORE_UPPERCASE = 0x008;
        /// `b`: binary test.
        const BINTEST = 0x010;
        /// `t`: text test.
        const TEXTTEST = 0x020;
        /// `T`: trim whitespace from the printed value.
        const TRIM = 0x040;
        /// `s`: a regex/search match leaves the offset at the match start.
        const OFFSET_START = 0x080;
        /// `l`: regex range counts lines, not bytes.
        const LINES = 0x100;
        /// `J`: a pstring length includes the length field itself.
        const LENGTH_INCLUDES_SELF = 0x200;
    }
}

/// The type field of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Int {
        size: u8,
        endian: Endian,
        unsigned: bool,
        id3: bool,
    },
    Float {
        size: u8,
        endian: Endian,
    },
    Date {
        size: u8,
        endian: Endian,
        local: bool,
    },
    String,
    PString {
        len_size: u8,
        endian: Endian,
    },
    String16 {
        endian: Endian,
    },
    Search {
        range: u32,
    },
    Regex {
        range: u32,
    },
    Default,
    Clear,
    Name(String),
    Use {
        name: String,
        flip: bool,
    },
    Indirect {
        relative: bool,
    },
    Offset,
}

impl TypeKind {
    /// Width in bytes of numeric types.
    pub fn numeric_size(&self) -> Option<usize> {
        match self {
            TypeKind::Int { size, .. } | TypeKind::Float { size, .. } | TypeKind::Date { size, .. } => {
                Some(*size as usize)
            }
            TypeKind::Offset => Some(8),
            _ => None,
        }
    }

    pub fn is_stringish(&self) -> bool {
        matches!(
            self,
            TypeKind::String
                | TypeKind::PString { .. }
                | TypeKind::String16 { .. }
                | TypeKind::Search { .. }
                | TypeKind::Regex { .. }
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            TypeKind::Int { unsigned: true, .. } | TypeKind::Offset | TypeKind::Date { .. }
        )
    }
}

/// Comparison applied between the read value and the test value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Gt,
    /// `&`: every bit of the test value is set.
    AllSet,
    /// `^`: at least one bit of the test value is clear.
    AnyClear,
    /// `x`: always matches.
    Any,
}

impl Relation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Ne => "!",
            Relation::Lt => "<",
            Relation::Gt => ">",
            Relation::AllSet => "&",
            Relation::AnyClear => "^",
            Relation::Any => "x",
        }
    }
}

/// Parsed test value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TestValue {
    None,
    Int(u64),
    Float(f64),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub relation: Relation,
    pub value: TestValue,
}

impl Test {
    /// The `x` test.
    pub fn any() -> Self {
        Test {
            relation: Relation::Any,
            value: TestValue::None,
        }
    }
}

/// `!:strength` adjustment. Listed, never used for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strength {
    pub op: ArithOp,
    pub value: u32,
}

/// One line of a magic source plus its `!:` annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicRule {
    pub line: usize,
    pub level: u8,
    pub offset: Offset,
    pub kind: TypeKind,
    /// Keyword as written, for listings.
    pub type_name: String,
    pub type_op: Option<(ArithOp, u64)>,
    pub str_flags: StrFlags,
    pub test: Test,
    pub description: Description,
    pub mime: Option<String>,
    pub extensions: Vec<String>,
    pub apple: Option<String>,
    pub strength: Option<Strength>,
    /// Siblings are still tried after this rule matched.
    pub continues: bool,
    #[serde(skip)]
    pub(crate) regex: OnceCell<regex::bytes::Regex>,
}

impl MagicRule {
    /// Compiled pattern of a `regex` rule.
    pub fn compiled_regex(&self) -> Option<&regex::bytes::Regex> {
        if !matches!(self.kind, TypeKind::Regex { .. }) {
            return None;
        }
        self.regex
            .get_or_try_init(|| match &self.test.value {
                TestValue::Bytes(pattern) => build_regex(pattern, self.str_flags),
                _ => Err(regex::Error::Syntax("missing pattern".into())),
            })
            .ok()
    }

    /// Parent-less rules of type `name` define subroutines.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Name(n) => Some(n),
            _ => None,
        }
    }
}

/// Compile a magic regex pattern as a byte-oriented regex.
pub fn build_regex(pattern: &[u8], flags: StrFlags) -> Result<regex::bytes::Regex, regex::Error> {
    let text = std::str::from_utf8(pattern)
        .map_err(|_| regex::Error::Syntax("pattern is not valid UTF-8".into()))?;
    regex::bytes::RegexBuilder::new(text)
        .unicode(false)
        .multi_line(true)
        .case_insensitive(flags.intersects(StrFlags::IGNORE_LOWERCASE | StrFlags::IGNORE_UPPERCASE))
        .size_limit(1 << 20)
        .build()
}
