//! Classification engine.
//!
//! [`eval::Evaluator`] runs the full pipeline over an
//! [`InputWindow`](crate::io::InputWindow): short-input checks, encoding
//! detection, decompression sniffing, the built-in format checks, the
//! signature database, the text heuristics and finally the generic
//! fallback. The result is a [`Classification`] from which the output mode
//! selected by the handle flags picks one field.

pub mod builtins;
pub mod compress;
pub mod eval;
pub mod matcher;
pub mod text;

pub use eval::Evaluator;
pub use matcher::{Position, RuleOutcome};

use crate::flags::OutputMode;
use crate::magic::MagicRule;
use serde::{Deserialize, Serialize};

#[cfg(feature = "python-ext")]
use pyo3::prelude::*;

pub const FALLBACK_DESCRIPTION: &str = "data";
pub const FALLBACK_MIME: &str = "application/octet-stream";
pub const BINARY_ENCODING: &str = "binary";

/// Everything known about one input after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "python-ext", pyclass(get_all))]
pub struct Classification {
    /// Human-readable description.
    pub description: String,
    /// MIME type without parameters.
    pub mime_type: String,
    /// Character set, `binary` for non-text.
    pub encoding: String,
    /// Usual file extensions, most common first.
    pub extensions: Vec<String>,
    /// Four-character creator code followed by four-character type code.
    pub apple: Option<String>,
}

impl Classification {
    pub fn new(description: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            mime_type: mime_type.into(),
            encoding: BINARY_ENCODING.to_string(),
            extensions: Vec::new(),
            apple: None,
        }
    }

    /// The generic "nothing recognised" result.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_DESCRIPTION, FALLBACK_MIME)
    }

    pub fn is_fallback(&self) -> bool {
        self.description == FALLBACK_DESCRIPTION && self.mime_type == FALLBACK_MIME
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// The string surfaced to the caller for `mode`.
    pub fn render(&self, mode: OutputMode) -> String {
        match mode {
            OutputMode::Description => self.description.clone(),
            OutputMode::MimeType => self.mime_type.clone(),
            OutputMode::MimeEncoding => self.encoding.clone(),
            OutputMode::Mime => format!("{}; charset={}", self.mime_type, self.encoding),
            OutputMode::Extension => {
                if self.extensions.is_empty() {
                    "???".to_string()
                } else {
                    self.extensions.join("/")
                }
            }
            OutputMode::Apple => self
                .apple
                .clone()
                .unwrap_or_else(|| "UNKNUNKN".to_string()),
        }
    }
}

#[cfg(feature = "python-ext")]
#[pymethods]
impl Classification {
    fn __repr__(&self) -> String {
        format!(
            "Classification(description={:?}, mime_type={:?}, encoding={:?})",
            self.description, self.mime_type, self.encoding
        )
    }
}

/// Output accumulated while descending through matching rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub description: String,
    mime: Option<(String, usize)>,
    extensions: Option<(Vec<String>, usize)>,
    apple: Option<(String, usize)>,
    /// At least one rule matched, even if it printed nothing.
    pub matched: bool,
}

impl MatchResult {
    /// Append a rendered description fragment.
    pub fn append(&mut self, fragment: &str, no_space: bool) {
        if fragment.is_empty() {
            return;
        }
        if !self.description.is_empty() && !no_space {
            self.description.push(' ');
        }
        self.description.push_str(fragment);
    }

    /// Record the annotations of a matched rule at `depth`. Deeper rules
    /// override shallower ones.
    pub fn annotate(&mut self, rule: &MagicRule, depth: usize) {
        fn set<T: Clone>(slot: &mut Option<(T, usize)>, value: Option<&T>, depth: usize) {
            if let Some(v) = value {
                if slot.as_ref().map_or(true, |(_, d)| depth >= *d) {
                    *slot = Some((v.clone(), depth));
                }
            }
        }
        set(&mut self.mime, rule.mime.as_ref(), depth);
        set(&mut self.apple, rule.apple.as_ref(), depth);
        let ext = (!rule.extensions.is_empty()).then_some(&rule.extensions);
        set(&mut self.extensions, ext, depth);
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_ref().map(|(m, _)| m.as_str())
    }

    pub fn extensions(&self) -> &[String] {
        self.extensions.as_ref().map_or(&[], |(e, _)| e.as_slice())
    }

    pub fn apple(&self) -> Option<&str> {
        self.apple.as_ref().map(|(a, _)| a.as_str())
    }

    /// Whether this result says anything in `mode`.
    pub fn has_output(&self, mode: OutputMode) -> bool {
        match mode {
            OutputMode::Description => !self.description.is_empty(),
            OutputMode::MimeType | OutputMode::Mime => self.mime.is_some(),
            OutputMode::MimeEncoding => self.matched,
            OutputMode::Extension => self.extensions.is_some(),
            OutputMode::Apple => self.apple.is_some(),
        }
    }

    /// Fold a further top-level result in, as `CONTINUE` reports them.
    pub fn join(&mut self, other: MatchResult) {
        if !other.description.is_empty() {
            if !self.description.is_empty() {
                self.description.push_str("\n- ");
            }
            self.description.push_str(&other.description);
        }
        self.mime = self.mime.take().or(other.mime);
        self.extensions = self.extensions.take().or(other.extensions);
        self.apple = self.apple.take().or(other.apple);
        self.matched |= other.matched;
    }
}
