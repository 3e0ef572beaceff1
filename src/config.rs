//! Engine configuration.
//!
//! Every bound the evaluator enforces lives here, grouped by concern, with
//! defaults matching the classic tool where one exists.

use crate::error::{Result, SigilError};
use crate::io::{DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "python-ext")]
use pyo3::prelude::*;

/// Master configuration for a handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "python-ext", pyclass)]
pub struct EngineConfig {
    /// Input window sizing.
    pub io: IOConfig,
    /// Evaluation bounds.
    pub limits: EvalLimits,
    /// Decompression sniffing.
    pub compress: CompressConfig,
    /// Text and encoding heuristics.
    pub text: TextConfig,
    /// Rule-walk semantics.
    #[serde(default)]
    pub matching: MatchConfig,
}

/// Input window sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "python-ext", pyclass(get_all, set_all))]
pub struct IOConfig {
    /// Bytes buffered before any rule asks for more (default: 65536).
    pub initial_window: usize,
    /// Hard cap on window growth (default: 4194304).
    pub max_window: usize,
    /// Files larger than this are refused outright (default: unlimited).
    pub max_file_size: u64,
}

impl Default for IOConfig {
    fn default() -> Self {
        Self {
            initial_window: DEFAULT_WINDOW_SIZE,
            max_window: MAX_WINDOW_SIZE,
            max_file_size: u64::MAX,
        }
    }
}

/// Bounds on one classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "python-ext", pyclass(get_all, set_all))]
pub struct EvalLimits {
    /// Nested indirect offsets and `indirect` re-entries (default: 12).
    pub max_indirection: u32,
    /// Nested `use` calls (default: 50).
    pub max_name_recursion: u32,
    /// Rules evaluated per classification before giving up (default: 200000).
    pub max_rule_evaluations: usize,
    /// Wall-clock budget per classification in milliseconds, 0 for none
    /// (default: 0).
    pub max_eval_millis: u64,
    /// Bytes a `regex` rule may scan (default: 8192).
    pub regex_max_bytes: usize,
    /// Longest string value printed into a description (default: 128).
    pub max_string_len: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_indirection: 12,
            max_name_recursion: 50,
            max_rule_evaluations: 200_000,
            max_eval_millis: 0,
            regex_max_bytes: 8192,
            max_string_len: 128,
        }
    }
}

/// Decompression sniffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "python-ext", pyclass(get_all, set_all))]
pub struct CompressConfig {
    /// Nested decompressions followed (default: 1).
    pub max_hops: u32,
    /// Inner bytes produced per hop (default: 4194304).
    pub max_decompressed_bytes: usize,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            max_hops: 1,
            max_decompressed_bytes: MAX_WINDOW_SIZE,
        }
    }
}

/// Text and encoding heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "python-ext", pyclass(get_all, set_all))]
pub struct TextConfig {
    /// Bytes examined for encoding detection (default: 65536).
    pub encoding_max_bytes: usize,
    /// Lines longer than this are reported as "very long" (default: 300).
    pub long_line: usize,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            encoding_max_bytes: 64 * 1024,
            long_line: 300,
        }
    }
}

/// How sibling rules are walked.
///
/// By default the first matching rule at a level stops its later siblings
/// unless it carries `!:continue`. Rule files written for `file(1)` rely on
/// every matching sub-rule contributing; `sub_rules_continue` restores that
/// for all rules below the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "python-ext", pyclass(get_all, set_all))]
pub struct MatchConfig {
    /// Treat every sub-rule as if it carried `!:continue` (default: false).
    pub sub_rules_continue: bool,
}

/// Tunables addressable through `set_param`/`get_param`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Param {
    IndirMax,
    NameMax,
    RegexMax,
    BytesMax,
    EncodingMax,
    RuleEvaluationsMax,
    EvalMillisMax,
    DecompressedMax,
}

impl Param {
    pub const ALL: [Param; 8] = [
        Param::IndirMax,
        Param::NameMax,
        Param::RegexMax,
        Param::BytesMax,
        Param::EncodingMax,
        Param::RuleEvaluationsMax,
        Param::EvalMillisMax,
        Param::DecompressedMax,
    ];
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Param::IndirMax => "indir_max",
            Param::NameMax => "name_max",
            Param::RegexMax => "regex_max",
            Param::BytesMax => "bytes_max",
            Param::EncodingMax => "encoding_max",
            Param::RuleEvaluationsMax => "rule_evaluations_max",
            Param::EvalMillisMax => "eval_millis_max",
            Param::DecompressedMax => "decompressed_max",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Param {
    type Err = SigilError;

    fn from_str(s: &str) -> Result<Self> {
        Param::ALL
            .iter()
            .copied()
            .find(|p| p.to_string() == s)
            .ok_or_else(|| SigilError::Config(format!("unknown parameter `{}'", s)))
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_param(&self, param: Param) -> usize {
        match param {
            Param::IndirMax => self.limits.max_indirection as usize,
            Param::NameMax => self.limits.max_name_recursion as usize,
            Param::RegexMax => self.limits.regex_max_bytes,
            Param::BytesMax => self.io.max_window,
            Param::EncodingMax => self.text.encoding_max_bytes,
            Param::RuleEvaluationsMax => self.limits.max_rule_evaluations,
            Param::EvalMillisMax => self.limits.max_eval_millis as usize,
            Param::DecompressedMax => self.compress.max_decompressed_bytes,
        }
    }

    /// Update one tunable. The handle keeps its previous value when the
    /// result would not validate.
    pub fn set_param(&mut self, param: Param, value: usize) -> Result<()> {
        let narrow = |v: usize| {
            u32::try_from(v).map_err(|_| SigilError::Config(format!("{} out of range: {}", param, v)))
        };
        let mut next = self.clone();
        match param {
            Param::IndirMax => next.limits.max_indirection = narrow(value)?,
            Param::NameMax => next.limits.max_name_recursion = narrow(value)?,
            Param::RegexMax => next.limits.regex_max_bytes = value,
            Param::BytesMax => {
                next.io.max_window = value;
                next.io.initial_window = next.io.initial_window.min(value);
            }
            Param::EncodingMax => next.text.encoding_max_bytes = value,
            Param::RuleEvaluationsMax => next.limits.max_rule_evaluations = value,
            Param::EvalMillisMax => next.limits.max_eval_millis = value as u64,
            Param::DecompressedMax => next.compress.max_decompressed_bytes = value,
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Reject combinations the evaluator cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.io.max_window == 0 {
            return Err(SigilError::Config("bytes_max must be positive".to_string()));
        }
        if self.io.initial_window > self.io.max_window {
            return Err(SigilError::Config(format!(
                "initial window {} exceeds maximum {}",
                self.io.initial_window, self.io.max_window
            )));
        }
        if self.limits.max_rule_evaluations == 0 {
            return Err(SigilError::Config(
                "rule_evaluations_max must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SigilError::Serialization(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| SigilError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "python-ext")]
#[pymethods]
impl EngineConfig {
    #[new]
    pub fn py_new() -> Self {
        Self::default()
    }

    #[getter]
    pub fn get_io(&self) -> IOConfig {
        self.io.clone()
    }

    #[setter]
    pub fn set_io(&mut self, config: IOConfig) {
        self.io = config;
    }

    #[getter]
    pub fn get_limits(&self) -> EvalLimits {
        self.limits.clone()
    }

    #[setter]
    pub fn set_limits(&mut self, config: EvalLimits) {
        self.limits = config;
    }

    #[getter]
    pub fn get_compress(&self) -> CompressConfig {
        self.compress.clone()
    }

    #[setter]
    pub fn set_compress(&mut self, config: CompressConfig) {
        self.compress = config;
    }

    #[getter]
    pub fn get_text(&self) -> TextConfig {
        self.text.clone()
    }

    #[setter]
    pub fn set_text(&mut self, config: TextConfig) {
        self.text = config;
    }

    #[getter]
    pub fn get_matching(&self) -> MatchConfig {
        self.matching.clone()
    }

    #[setter]
    pub fn set_matching(&mut self, config: MatchConfig) {
        self.matching = config;
    }

    #[pyo3(name = "to_json")]
    pub fn py_to_json(&self) -> PyResult<String> {
        Ok(self.to_json_string()?)
    }
}
