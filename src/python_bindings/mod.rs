//! Python bindings for sigil.
//!
//! The extension exposes a `Magic` class mirroring the Rust handle, the
//! `Classification` record, the configuration sections, the flag constants
//! and the logging helpers.

pub mod handle;

use crate::flags::MagicFlags;
use pyo3::prelude::*;

/// Register all Python bindings with the module.
pub fn register_python_bindings(py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    handle::register_handle_bindings(py, m)?;

    m.add_class::<crate::engine::Classification>()?;
    m.add_class::<crate::config::EngineConfig>()?;
    m.add_class::<crate::config::IOConfig>()?;
    m.add_class::<crate::config::EvalLimits>()?;
    m.add_class::<crate::config::CompressConfig>()?;
    m.add_class::<crate::config::TextConfig>()?;
    m.add_class::<crate::config::MatchConfig>()?;

    m.add_class::<crate::logging::LogLevel>()?;
    m.add_function(wrap_pyfunction!(crate::logging::init_logging, m)?)?;
    m.add_function(wrap_pyfunction!(crate::logging::log_message, m)?)?;

    for (name, flag) in MagicFlags::TABLE {
        m.add(*name, flag.bits())?;
    }
    m.add("VERSION", crate::VERSION)?;

    Ok(())
}
