//! sigil identifies the type of a file from its content.
//!
//! Classification walks a database of magic rules (the classic `magic(5)`
//! grammar, or a compiled cache of it) over a bounded window of the input,
//! with built-in checks for compressed containers, tar, JSON, CSV and text
//! encodings around it.
//!
//! ```no_run
//! use sigil::{Magic, MagicFlags};
//!
//! let mut magic = Magic::open(MagicFlags::MIME_TYPE);
//! magic.load_default()?;
//! assert_eq!(magic.classify_buffer(b"\x89PNG\r\n\x1a\n")?, "image/png");
//! # Ok::<(), sigil::SigilError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod flags;
pub mod handle;
pub mod io;
pub mod logging;
pub mod magic;
pub mod timeout;

#[cfg(feature = "python-ext")]
pub mod python_bindings;

pub use config::{EngineConfig, MatchConfig, Param};
pub use engine::Classification;
pub use error::{LoadError, LoadErrorKind, Result, SigilError};
pub use flags::{MagicFlags, OutputMode};
pub use handle::{Classifier, Magic};
pub use magic::{MagicSource, SignatureDatabase};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "python-ext")]
use pyo3::prelude::*;

/// A Python module implemented in Rust.
#[cfg(feature = "python-ext")]
#[pymodule]
fn sigil(m: &Bound<'_, PyModule>) -> PyResult<()> {
    python_bindings::register_python_bindings(m.py(), m)
}
