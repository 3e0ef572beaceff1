//! Signature database: rule model, text grammar, binary cache and the
//! embedded default rules.

pub mod builtin;
pub mod cache;
pub mod database;
pub mod error;
pub mod format;
pub mod parse;
pub mod types;

pub use database::{MagicSource, RuleNode, SignatureDatabase};
pub use error::{LoadError, LoadErrorKind};
pub use format::{Description, MatchValue};
pub use types::{MagicRule, Offset, Relation, TypeKind};
