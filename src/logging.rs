//! Logging setup for hosts embedding sigil.
//!
//! The library itself only emits `tracing` events. Loading reports per
//! source at `debug`, the evaluator reports every rule at `trace` under the
//! `sigil::engine` target (or at `info` when the handle has `DEBUG` set), and
//! failed handle calls are reported at `warn` through [`log_error!`].
//!
//! Filtering follows `RUST_LOG`; without it only sigil's own `info` events
//! and everyone's warnings are shown.

use std::sync::Once;
use tracing::debug;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn,sigil=info";

static INIT: Once = Once::new();

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines with targets and source locations.
    #[default]
    Pretty,
    /// One JSON object per event, including the current span.
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber in `format`.
///
/// Only the first call in a process has an effect, and a subscriber the
/// host installed earlier is left in place.
pub fn init(format: LogFormat) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter());
        let installed = match format {
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .with_span_events(FmtSpan::CLOSE)
                        .with_target(true)
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_span_events(FmtSpan::CLOSE)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_current_span(true),
                )
                .try_init(),
        };
        match installed {
            Ok(()) => debug!(?format, "sigil logging initialized"),
            Err(e) => debug!(error = %e, "a global subscriber is already installed"),
        }
    });
}

/// Human-readable logging.
pub fn init_tracing() {
    init(LogFormat::Pretty);
}

/// Structured JSON logging.
pub fn init_tracing_json() {
    init(LogFormat::Json);
}

/// Log levels for Python integration
#[cfg(feature = "python-ext")]
#[pyo3::prelude::pyclass(eq, eq_int)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[cfg(feature = "python-ext")]
#[pyo3::prelude::pymethods]
impl LogLevel {
    fn __str__(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Initialize logging from Python
#[cfg(feature = "python-ext")]
#[pyo3::prelude::pyfunction]
#[pyo3(signature = (json = false))]
pub fn init_logging(json: bool) -> pyo3::PyResult<()> {
    init(if json { LogFormat::Json } else { LogFormat::Pretty });
    Ok(())
}

/// Emit a message from Python under the `sigil::python` target.
#[cfg(feature = "python-ext")]
#[pyo3::prelude::pyfunction]
pub fn log_message(level: LogLevel, message: &str) -> pyo3::PyResult<()> {
    match level {
        LogLevel::Trace => tracing::trace!(target: "sigil::python", "{}", message),
        LogLevel::Debug => tracing::debug!(target: "sigil::python", "{}", message),
        LogLevel::Info => tracing::info!(target: "sigil::python", "{}", message),
        LogLevel::Warn => tracing::warn!(target: "sigil::python", "{}", message),
        LogLevel::Error => tracing::error!(target: "sigil::python", "{}", message),
    }
    Ok(())
}

/// Debug-level span for one handle operation.
#[macro_export]
macro_rules! span_trace {
    ($name:expr) => {
        tracing::debug_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::debug_span!($name, $($field)*)
    };
}

/// Log a failed operation and hand the error back.
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let e = $err;
        tracing::warn!(error = %e, "operation failed");
        e
    }};
    ($err:expr, $op:expr) => {{
        let e = $err;
        tracing::warn!(error = %e, op = $op, "operation failed");
        e
    }};
}
