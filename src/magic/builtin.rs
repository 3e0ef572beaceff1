//! The signature set compiled into the crate.

use crate::magic::database::{MagicSource, SignatureDatabase};
use crate::magic::error::LoadError;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Name under which the embedded rules report errors and listings.
pub const BUILTIN_NAME: &str = "<builtin>";

/// Environment variable holding a colon-separated list of rule sources.
pub const MAGIC_ENV: &str = "MAGIC";

pub const DEFAULT_RULES: &str = include_str!("../../magic/default.magic");

static BUILTIN: Lazy<Result<Arc<SignatureDatabase>, LoadError>> =
    Lazy::new(|| SignatureDatabase::from_text(BUILTIN_NAME, DEFAULT_RULES).map(Arc::new));

/// The embedded database, parsed once per process and shared.
pub fn builtin_database() -> Result<Arc<SignatureDatabase>, LoadError> {
    BUILTIN.as_ref().map(Arc::clone).map_err(Clone::clone)
}

/// Sources named by `MAGIC`, if it is set and non-empty.
pub fn default_path() -> Option<String> {
    std::env::var(MAGIC_ENV).ok().filter(|v| !v.is_empty())
}

/// What `load_default` reads: the `MAGIC` sources when set, otherwise the
/// embedded rules.
pub fn default_sources() -> Vec<MagicSource> {
    match default_path() {
        Some(list) => MagicSource::from_path_list(&list),
        None => vec![MagicSource::bytes(BUILTIN_NAME, DEFAULT_RULES.as_bytes())],
    }
}
