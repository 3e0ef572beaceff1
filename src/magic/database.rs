//! The loaded signature database.
//!
//! Rules live in a flat arena; each node keeps the indices of its children in
//! source order. Top-level rules form the ordered root list and `name` rules
//! are indexed separately as subroutines for `use`.

use crate::magic::cache;
use crate::magic::error::{LoadError, LoadErrorKind};
use crate::magic::format::printable;
use crate::magic::parse::parse_rules;
use crate::magic::types::{MagicRule, Relation, TestValue, TypeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where rules come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MagicSource {
    /// A rule file, a compiled cache, or a directory of rule files.
    Path(PathBuf),
    /// In-memory text rules or cache bytes.
    Bytes { name: String, data: Vec<u8> },
}

impl MagicSource {
    pub fn path<P: Into<PathBuf>>(path: P) -> Self {
        MagicSource::Path(path.into())
    }

    pub fn bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        MagicSource::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Split a colon-separated path list, as accepted by the `MAGIC`
    /// environment variable.
    pub fn from_path_list(list: &str) -> Vec<Self> {
        list.split(':')
            .filter(|p| !p.is_empty())
            .map(MagicSource::path)
            .collect()
    }

    pub fn name(&self) -> String {
        match self {
            MagicSource::Path(p) => p.display().to_string(),
            MagicSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// One rule plus its position in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleNode {
    pub rule: MagicRule,
    pub children: Vec<u32>,
    /// Index into [`SignatureDatabase::sources`].
    pub source: u32,
}

/// Immutable, ordered collection of rule trees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureDatabase {
    nodes: Vec<RuleNode>,
    roots: Vec<u32>,
    named: BTreeMap<String, u32>,
    sources: Vec<String>,
}

impl SignatureDatabase {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load and concatenate `sources` in order.
    ///
    /// Text sources are parsed; sources starting with the cache header are
    /// deserialized. Later sources add alternative branches and never replace
    /// earlier rules.
    pub fn load(sources: &[MagicSource]) -> Result<Self, LoadError> {
        let mut db = Self::empty();
        for (name, data) in expand_sources(sources)? {
            if cache::is_cache(&data) {
                let loaded = cache::decode(&name, &data)?;
                debug!(source = %name, rules = loaded.len(), "loaded compiled database");
                db.merge(loaded);
            } else {
                let rules = parse_rules(&name, &data)?;
                debug!(source = %name, rules = rules.len(), "parsed rule source");
                db.append(&name, rules);
            }
        }
        db.resolve_names()?;
        info!(
            rules = db.len(),
            roots = db.roots.len(),
            named = db.named.len(),
            sources = db.sources.len(),
            "signature database ready"
        );
        Ok(db)
    }

    /// Parse a single in-memory text source.
    pub fn from_text(name: &str, text: &str) -> Result<Self, LoadError> {
        Self::load(&[MagicSource::bytes(name, text.as_bytes())])
    }

    /// Attach a parsed rule list, rebuilding the tree from rule levels.
    fn append(&mut self, source_name: &str, rules: Vec<MagicRule>) {
        let source = self.sources.len() as u32;
        self.sources.push(source_name.to_string());
        let mut parents: Vec<u32> = Vec::new();

        for rule in rules {
            let idx = self.nodes.len() as u32;
            let level = rule.level as usize;
            parents.truncate(level);
            match parents.last() {
                Some(&parent) if level > 0 => self.nodes[parent as usize].children.push(idx),
                _ => match rule.name() {
                    Some(name) => {
                        if self.named.contains_key(name) {
                            warn!(source = source_name, line = rule.line, name, "duplicate name ignored");
                        } else {
                            self.named.insert(name.to_string(), idx);
                        }
                    }
                    None => self.roots.push(idx),
                },
            }
            parents.push(idx);
            self.nodes.push(RuleNode {
                rule,
                children: Vec::new(),
                source,
            });
        }
    }

    /// Append another database, shifting its indices.
    fn merge(&mut self, other: SignatureDatabase) {
        let node_base = self.nodes.len() as u32;
        let source_base = self.sources.len() as u32;
        self.sources.extend(other.sources);
        self.roots.extend(other.roots.iter().map(|r| r + node_base));
        for (name, idx) in other.named {
            self.named.entry(name).or_insert(idx + node_base);
        }
        self.nodes.extend(other.nodes.into_iter().map(|mut node| {
            node.source += source_base;
            for child in &mut node.children {
                *child += node_base;
            }
            node
        }));
    }

    fn resolve_names(&self) -> Result<(), LoadError> {
        for node in &self.nodes {
            if let TypeKind::Use { name, .. } = &node.rule.kind {
                if !self.named.contains_key(name) {
                    return Err(LoadError::new(
                        LoadErrorKind::UnknownName,
                        self.source_name(node.source),
                        node.rule.line,
                        format!("`use' of undefined name `{}'", name),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Structural check of a deserialized database.
    pub(crate) fn validate(&self) -> Result<(), String> {
        let n = self.nodes.len() as u32;
        let in_range = |i: &u32| *i < n;
        if !self.roots.iter().all(in_range) || !self.named.values().all(in_range) {
            return Err("root index out of range".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.source as usize >= self.sources.len() {
                return Err(format!("rule {} has no source", i));
            }
            // Children always follow their parent in the arena.
            if node.children.iter().any(|c| *c as usize <= i || *c >= n) {
                return Err(format!("rule {} has an invalid child", i));
            }
            if let TypeKind::Regex { .. } = node.rule.kind {
                if node.rule.test.relation != Relation::Any && node.rule.compiled_regex().is_none() {
                    return Err(format!("rule {} has an invalid regex", i));
                }
            }
        }
        self.resolve_names().map_err(|e| e.reason)
    }

    /// Validate the database and report rules that can never contribute to
    /// a result. Structural damage is an error; the rest are warnings of the
    /// form `source:line: message`.
    pub fn check(&self) -> Result<Vec<String>, LoadError> {
        self.validate().map_err(|reason| {
            LoadError::new(LoadErrorKind::CacheCorrupt, "<database>", 0, reason)
        })?;
        let mut warnings = Vec::new();
        let mut warn_at = |node: &RuleNode, message: &str| {
            warnings.push(format!(
                "{}:{}: {}",
                self.source_name(node.source),
                node.rule.line,
                message
            ));
        };
        for &root in &self.roots {
            let node = self.node(root);
            let rule = &node.rule;
            if matches!(rule.kind, TypeKind::Default) {
                warn_at(node, "top-level `default' always matches");
            }
            if node.children.is_empty()
                && rule.description.is_empty()
                && rule.mime.is_none()
                && rule.extensions.is_empty()
                && rule.apple.is_none()
            {
                warn_at(node, "rule produces no output");
            }
        }
        for node in &self.nodes {
            if node.rule.continues && node.rule.level == 0 {
                warn_at(node, "`!:continue' on a top-level rule has no effect");
            }
        }
        Ok(warnings)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[u32] {
        &self.roots
    }

    pub fn node(&self, idx: u32) -> &RuleNode {
        &self.nodes[idx as usize]
    }

    pub fn nodes(&self) -> &[RuleNode] {
        &self.nodes
    }

    /// Node of the `name` rule defining `name`.
    pub fn named(&self, name: &str) -> Option<u32> {
        self.named.get(name).copied()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn source_name(&self, idx: u32) -> &str {
        self.sources
            .get(idx as usize)
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }

    /// Human-readable dump of every rule, one per line, in source order.
    pub fn list(&self) -> String {
        let mut out = String::new();
        let mut current_source = None;
        for node in &self.nodes {
            if current_source != Some(node.source) {
                current_source = Some(node.source);
                let _ = writeln!(out, "# {}", self.source_name(node.source));
            }
            let rule = &node.rule;
            let _ = write!(
                out,
                "{:>5}: {}{}\t{}\t{}\t{}{}",
                rule.line,
                ">".repeat(rule.level as usize),
                rule.offset,
                rule.type_name,
                test_display(rule),
                if rule.description.no_space { "\\b" } else { "" },
                rule.description.raw
            );
            if let Some(mime) = &rule.mime {
                let _ = write!(out, "\t[{}]", mime);
            }
            if !rule.extensions.is_empty() {
                let _ = write!(out, "\t[ext {}]", rule.extensions.join("/"));
            }
            if let Some(s) = &rule.strength {
                let _ = write!(out, "\t[strength {}{}]", s.op.symbol(), s.value);
            }
            if rule.continues {
                out.push_str("\t[continue]");
            }
            out.push('\n');
        }
        out
    }
}

fn test_display(rule: &MagicRule) -> String {
    let test = &rule.test;
    match (&rule.kind, test.relation) {
        (TypeKind::Name(name), _) => name.clone(),
        (TypeKind::Use { name, flip }, _) => format!("{}{}", if *flip { "^" } else { "" }, name),
        (_, Relation::Any) => "x".to_string(),
        _ => {
            let value = match &test.value {
                TestValue::None => String::new(),
                TestValue::Int(v) => format!("{:#x}", v),
                TestValue::Float(f) => f.to_string(),
                TestValue::Bytes(b) => printable(b),
            };
            format!("{}{}", test.relation.symbol(), value)
        }
    }
}

/// Read every source, expanding directories into their regular files sorted
/// by name.
fn expand_sources(sources: &[MagicSource]) -> Result<Vec<(String, Vec<u8>)>, LoadError> {
    let mut out = Vec::new();
    for source in sources {
        match source {
            MagicSource::Bytes { name, data } => out.push((name.clone(), data.clone())),
            MagicSource::Path(path) if path.is_dir() => {
                let name = path.display().to_string();
                let entries = std::fs::read_dir(path).map_err(|e| LoadError::io(&name, &e))?;
                let mut files: Vec<PathBuf> = entries
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file())
                    .collect();
                files.sort();
                for file in files {
                    out.push(read_source(&file)?);
                }
            }
            MagicSource::Path(path) => out.push(read_source(path)?),
        }
    }
    Ok(out)
}

fn read_source(path: &Path) -> Result<(String, Vec<u8>), LoadError> {
    let name = path.display().to_string();
    let data = std::fs::read(path).map_err(|e| LoadError::io(&name, &e))?;
    Ok((name, data))
}
