//! The classification pipeline and the soft-magic walk.
//!
//! Soft magic descends the rule tree with an explicit frame stack, so a
//! hostile database cannot exhaust the native stack: `use` and `indirect`
//! push frames instead of recursing, and every rule evaluation is charged
//! to an [`EvalBudget`].

use crate::check_timeout;
use crate::config::EngineConfig;
use crate::engine::matcher::{match_rule, resolve_offset, Position, RuleOutcome};
use crate::engine::text::{self, TextInfo};
use crate::engine::{builtins, compress, Classification, MatchResult, BINARY_ENCODING};
use crate::error::{Result, SigilError};
use crate::flags::MagicFlags;
use crate::io::InputWindow;
use crate::magic::types::{MagicRule, Offset, TypeKind};
use crate::magic::SignatureDatabase;
use crate::timeout::EvalBudget;
use tracing::{debug, info, trace, warn};

/// One level of the descent: a run of sibling rules sharing anchors.
struct Frame<'d> {
    siblings: &'d [u32],
    next: usize,
    pos: Position,
    /// Some sibling matched since the frame started or the last `clear`.
    any_matched: bool,
    depth: usize,
    /// `use` calls on the path to this frame.
    names: u32,
}

impl<'d> Frame<'d> {
    fn new(siblings: &'d [u32], pos: Position, depth: usize, names: u32) -> Self {
        Self {
            siblings,
            next: 0,
            pos,
            any_matched: false,
            depth,
            names,
        }
    }
}

/// Runs classifications against one database with one flag set.
pub struct Evaluator<'a> {
    db: &'a SignatureDatabase,
    flags: MagicFlags,
    config: &'a EngineConfig,
}

impl<'a> Evaluator<'a> {
    pub fn new(db: &'a SignatureDatabase, flags: MagicFlags, config: &'a EngineConfig) -> Self {
        Self { db, flags, config }
    }

    /// Classify the contents of `window`.
    pub fn classify(&self, window: &mut InputWindow<'_>) -> Result<Classification> {
        let mut budget = EvalBudget::new(
            self.config.limits.max_rule_evaluations,
            self.config.limits.max_eval_millis,
        );
        let result = self.classify_window(window, 0, &mut budget)?;
        debug!(
            description = %result.description,
            mime = %result.mime_type,
            steps = budget.steps(),
            elapsed_us = budget.elapsed().as_micros() as u64,
            "classified"
        );
        Ok(result)
    }

    fn classify_window(
        &self,
        window: &mut InputWindow<'_>,
        hops: u32,
        budget: &mut EvalBudget,
    ) -> Result<Classification> {
        window.ensure(2);
        match window.len() {
            0 => {
                return Ok(Classification::new("empty", "application/x-empty"));
            }
            1 if window.is_complete() => {
                return Ok(Classification::new(
                    "very short file (no magic)",
                    "application/octet-stream",
                ));
            }
            _ => {}
        }

        let text = if self.flags.contains(MagicFlags::NO_CHECK_ENCODING) {
            None
        } else {
            window.ensure(self.config.text.encoding_max_bytes);
            text::detect(window.data(), window.is_complete(), &self.config.text)
        };

        if !self.flags.contains(MagicFlags::NO_CHECK_COMPRESS)
            && hops < self.config.compress.max_hops
        {
            if let Some(inner) = self.try_decompress(window, hops, budget)? {
                return Ok(inner);
            }
        }

        self.classify_content(window, text.as_ref(), budget)
    }

    /// Classify the decompressed contents of a compressed container.
    ///
    /// `None` when the input is not compressed, decompresses to nothing, or
    /// the contents are unrecognised.
    fn try_decompress(
        &self,
        window: &mut InputWindow<'_>,
        hops: u32,
        budget: &mut EvalBudget,
    ) -> Result<Option<Classification>> {
        let Some(format) = compress::sniff(window.data()) else {
            return Ok(None);
        };
        let max = self.config.compress.max_decompressed_bytes;
        let inner = match compress::decompress(format, window.fill(), max) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Ok(None),
            Err(e) => {
                debug!(format = format.name(), error = %e, "decompression failed");
                return Ok(None);
            }
        };
        trace!(format = format.name(), inner_len = inner.len(), "decompressed");

        let io = &self.config.io;
        let mut inner_window = InputWindow::from_bytes(&inner, io.initial_window, io.max_window);
        let mut result = self.classify_window(&mut inner_window, hops + 1, budget)?;
        if result.is_fallback() {
            return Ok(None);
        }

        if self.flags.contains(MagicFlags::COMPRESS)
            && !self.flags.contains(MagicFlags::COMPRESS_TRANSP)
        {
            let outer = self.classify_content(window, None, budget)?;
            result.description = format!("{} ({})", result.description, outer.description);
        }
        Ok(Some(result))
    }

    /// Built-in checks, soft magic, text heuristics and the fallback.
    fn classify_content(
        &self,
        window: &mut InputWindow<'_>,
        text: Option<&TextInfo>,
        budget: &mut EvalBudget,
    ) -> Result<Classification> {
        let encoding = text.map_or(BINARY_ENCODING, |t| t.encoding.charset());

        if !self.flags.contains(MagicFlags::NO_CHECK_TAR) {
            window.ensure(builtins::TAR_BLOCK);
            if let Some(c) = builtins::check_tar(window.data()) {
                return Ok(c);
            }
        }

        if !self.flags.contains(MagicFlags::NO_CHECK_JSON) && window.is_complete() {
            if let Some(c) = builtins::check_json(window.data()) {
                return Ok(c.with_encoding(encoding));
            }
        }

        if !self.flags.contains(MagicFlags::NO_CHECK_CSV) {
            if let Some(t) = text {
                if let Some(c) = builtins::check_csv(window.data(), t, window.is_complete()) {
                    return Ok(c.with_encoding(encoding));
                }
            }
        }

        if !self.flags.contains(MagicFlags::NO_CHECK_SOFT) {
            if let Some(found) = self.soft_magic(window, budget)? {
                let default_mime = if text.is_some() {
                    "text/plain"
                } else {
                    crate::engine::FALLBACK_MIME
                };
                let mime = found.mime().unwrap_or(default_mime).to_string();
                let mut c = Classification::new(found.description.clone(), mime)
                    .with_encoding(encoding)
                    .with_extensions(found.extensions().iter().cloned());
                c.apple = found.apple().map(str::to_string);
                return Ok(c);
            }
        }

        if !self.flags.contains(MagicFlags::NO_CHECK_TEXT) {
            if let Some(t) = text {
                return Ok(Classification::new(t.description(), t.mime_type())
                    .with_encoding(encoding)
                    .with_extensions(["txt"]));
            }
        }

        Ok(Classification::fallback())
    }

    /// Evaluate the database. `None` when no top-level rule produced output
    /// for the active mode.
    pub fn soft_magic(
        &self,
        window: &mut InputWindow<'_>,
        budget: &mut EvalBudget,
    ) -> Result<Option<MatchResult>> {
        if self.db.is_empty() {
            return Ok(None);
        }
        let db: &'a SignatureDatabase = self.db;
        let mode = self.flags.output_mode();
        let mut combined: Option<MatchResult> = None;

        for root in db.roots() {
            if db.node(*root).rule.name().is_some() {
                continue;
            }
            let mut scratch = MatchResult::default();
            let walk = self.descend(std::slice::from_ref(root), window, &mut scratch, budget);
            let exhausted = match walk {
                Ok(()) => false,
                Err(e @ (SigilError::Budget { .. } | SigilError::Timeout { .. })) => {
                    if self.flags.contains(MagicFlags::ERROR) {
                        return Err(e);
                    }
                    warn!(error = %e, "soft magic stopped early, keeping partial result");
                    true
                }
                Err(e) => return Err(e),
            };

            if scratch.matched && scratch.has_output(mode) {
                match combined.as_mut() {
                    Some(c) => c.join(scratch),
                    None => combined = Some(scratch),
                }
                if !self.flags.contains(MagicFlags::CONTINUE) {
                    break;
                }
            }
            if exhausted {
                break;
            }
        }
        Ok(combined)
    }

    fn log_outcome(&self, rule: &MagicRule, depth: usize, outcome: &RuleOutcome) {
        if self.flags.contains(MagicFlags::DEBUG) {
            info!(
                line = rule.line,
                depth,
                offset = outcome.offset,
                r#type = %rule.type_name,
                matched = outcome.matched,
                "rule"
            );
        } else {
            trace!(
                line = rule.line,
                depth,
                offset = outcome.offset,
                matched = outcome.matched,
                "rule"
            );
        }
    }

    /// Degrade an evaluation limit to a no-match unless `ERROR` is set.
    fn limit_hit(&self, err: SigilError) -> Result<()> {
        if self.flags.contains(MagicFlags::ERROR) {
            Err(err)
        } else {
            debug!(error = %err, "rule skipped");
            Ok(())
        }
    }

    fn descend(
        &self,
        start: &'a [u32],
        window: &mut InputWindow<'_>,
        result: &mut MatchResult,
        budget: &mut EvalBudget,
    ) -> Result<()> {
        let db: &'a SignatureDatabase = self.db;
        let limits = &self.config.limits;
        let raw = self.flags.contains(MagicFlags::RAW);
        let mut stack = vec![Frame::new(start, Position::default(), 0, 0)];

        while let Some(frame) = stack.last_mut() {
            let Some(&idx) = frame.siblings.get(frame.next) else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let pos = frame.pos;
            let depth = frame.depth;
            let names = frame.names;
            let any_matched = frame.any_matched;

            check_timeout!(budget, "soft magic");

            let node = db.node(idx);
            let rule = &node.rule;
            if rule.name().is_some() {
                continue;
            }

            let offset = match resolve_offset(&rule.offset, window, &pos, limits) {
                Ok(Some(o)) => o,
                Ok(None) => continue,
                Err(e) => {
                    self.limit_hit(e)?;
                    continue;
                }
            };
            let indirections =
                pos.indirections + u32::from(matches!(rule.offset, Offset::Indirect(_)));

            // (frame to push after this rule, in evaluation order)
            let mut body: Option<Frame<'a>> = None;
            let outcome = match &rule.kind {
                TypeKind::Default if any_matched => RuleOutcome::no_match(offset),
                TypeKind::Default => RuleOutcome {
                    matched: true,
                    value: None,
                    offset,
                    end_offset: offset,
                },
                TypeKind::Clear => {
                    if let Some(f) = stack.last_mut() {
                        f.any_matched = false;
                    }
                    RuleOutcome {
                        matched: true,
                        value: None,
                        offset,
                        end_offset: offset,
                    }
                }
                TypeKind::Use { name, flip } => {
                    let Some(target) = db.named(name) else {
                        debug!(name = %name, "use of undefined name");
                        continue;
                    };
                    if names >= limits.max_name_recursion {
                        self.limit_hit(SigilError::NameRecursion {
                            name: name.clone(),
                            limit: limits.max_name_recursion,
                        })?;
                        continue;
                    }
                    let body_pos = Position {
                        base: offset,
                        parent_end: offset,
                        flip: pos.flip ^ *flip,
                        indirections,
                    };
                    body = Some(Frame::new(
                        &db.node(target).children,
                        body_pos,
                        depth + 1,
                        names + 1,
                    ));
                    RuleOutcome {
                        matched: true,
                        value: None,
                        offset,
                        end_offset: offset,
                    }
                }
                TypeKind::Indirect { relative } => {
                    if indirections >= limits.max_indirection {
                        self.limit_hit(SigilError::IndirectionLimit {
                            limit: limits.max_indirection,
                        })?;
                        continue;
                    }
                    let base = if *relative {
                        // The frame base must not count twice: resolve the
                        // rule offset on its own, then anchor it at the parent.
                        let unanchored = Position { base: 0, ..pos };
                        match resolve_offset(&rule.offset, window, &unanchored, limits) {
                            Ok(Some(o)) => match pos.parent_end.checked_add(o) {
                                Some(b) => b,
                                None => continue,
                            },
                            _ => continue,
                        }
                    } else {
                        offset
                    };
                    let body_pos = Position {
                        base,
                        parent_end: base,
                        flip: false,
                        indirections: indirections + 1,
                    };
                    body = Some(Frame::new(db.roots(), body_pos, depth + 1, names));
                    RuleOutcome {
                        matched: true,
                        value: None,
                        offset: base,
                        end_offset: base,
                    }
                }
                _ => match_rule(rule, window, offset, &pos, limits),
            };

            self.log_outcome(rule, depth, &outcome);
            if !outcome.matched {
                continue;
            }

            if let Some(f) = stack.last_mut() {
                if !matches!(rule.kind, TypeKind::Clear) {
                    f.any_matched = true;
                }
                let continues = rule.continues
                    || (rule.level > 0 && self.config.matching.sub_rules_continue);
                if !continues {
                    f.next = f.siblings.len();
                }
            }

            if !rule.description.is_empty() {
                let text = rule.description.render(outcome.value.as_ref(), raw);
                result.append(&text, rule.description.no_space);
            }
            result.annotate(rule, depth);
            result.matched = true;

            if !node.children.is_empty() {
                let child_pos = Position {
                    base: pos.base,
                    parent_end: outcome.end_offset,
                    flip: pos.flip,
                    indirections,
                };
                stack.push(Frame::new(&node.children, child_pos, depth + 1, names));
            }
            if let Some(b) = body {
                stack.push(b);
            }
        }
        Ok(())
    }
}
