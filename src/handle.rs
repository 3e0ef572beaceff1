//! The classification handle.
//!
//! A [`Magic`] owns a flag set, engine configuration, an optional shared
//! database and the error state of its last call. Every fallible call
//! records its failure in that state before returning it, so hosts that
//! only look at `last_error`/`errno` see the same information as callers
//! matching on the `Result`.
//!
//! For concurrent use take a [`Classifier`] from the handle: it shares the
//! database and carries a copy of the flags and configuration.

use crate::config::{EngineConfig, Param};
use crate::engine::Evaluator;
use crate::error::{Result, SigilError};
use crate::flags::MagicFlags;
use crate::io::error::IoError;
use crate::io::InputWindow;
use crate::{log_error, span_trace};
use crate::magic::builtin::{self, builtin_database};
use crate::magic::{cache, MagicSource, SignatureDatabase};
use rayon::prelude::*;
use std::fs::{File, Metadata};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use crate::engine::Classification;

/// A classification handle.
#[derive(Debug)]
pub struct Magic {
    db: Option<Arc<SignatureDatabase>>,
    flags: MagicFlags,
    config: EngineConfig,
    last_error: Option<String>,
    errno: i32,
}

impl Default for Magic {
    fn default() -> Self {
        Self::open(MagicFlags::NONE)
    }
}

impl Magic {
    /// A handle with no database loaded.
    pub fn open(flags: MagicFlags) -> Self {
        Self {
            db: None,
            flags,
            config: EngineConfig::default(),
            last_error: None,
            errno: 0,
        }
    }

    /// Open from raw flag bits; unknown bits are rejected.
    pub fn open_raw(bits: u32) -> Result<Self> {
        let flags = MagicFlags::from_bits(bits).ok_or(SigilError::InvalidFlags { bits })?;
        Ok(Self::open(flags))
    }

    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    fn record<T>(&mut self, op: &'static str, result: Result<T>) -> Result<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                self.errno = 0;
                Ok(v)
            }
            Err(e) => {
                let e = log_error!(e, op);
                self.last_error = Some(e.to_string());
                self.errno = e.errno();
                Err(e)
            }
        }
    }

    /// Replace the database with `sources`, in order. An empty list loads
    /// the defaults. On failure the previous database stays in place.
    pub fn load(&mut self, sources: &[MagicSource]) -> Result<()> {
        if sources.is_empty() {
            return self.load_default();
        }
        let loaded = self.load_sources(sources);
        let db = self.record("load", loaded)?;
        self.db = Some(Arc::new(db));
        Ok(())
    }

    /// Load the sources named by `MAGIC`, or the embedded rules.
    pub fn load_default(&mut self) -> Result<()> {
        let loaded = match builtin::default_path() {
            Some(list) => self
                .load_sources(&MagicSource::from_path_list(&list))
                .map(Arc::new),
            None => builtin_database().map_err(SigilError::from),
        };
        let db = self.record("load_default", loaded)?;
        self.db = Some(db);
        Ok(())
    }

    /// Load in-memory sources, each either rule text or a compiled cache.
    pub fn load_buffers(&mut self, buffers: &[&[u8]]) -> Result<()> {
        let sources: Vec<MagicSource> = buffers
            .iter()
            .enumerate()
            .map(|(i, b)| MagicSource::bytes(format!("<buffer {}>", i), *b))
            .collect();
        let loaded = self.load_sources(&sources);
        let db = self.record("load_buffers", loaded)?;
        self.db = Some(Arc::new(db));
        Ok(())
    }

    fn load_sources(&self, sources: &[MagicSource]) -> Result<SignatureDatabase> {
        let _span = span_trace!("load", sources = sources.len()).entered();
        let db = SignatureDatabase::load(sources)?;
        if self.flags.contains(MagicFlags::CHECK) {
            let warnings = db.check()?;
            for warning in &warnings {
                warn!(%warning, "rule check");
            }
            info!(sources = db.sources().len(), warnings = warnings.len(), "checked rule sources");
        }
        Ok(db)
    }

    /// Under `LIST` or `CHECK` the classification calls report on the
    /// database (the loaded one, else the embedded rules) instead of
    /// classifying. `LIST` wins when both are set.
    fn database_report(&self) -> Option<Result<String>> {
        if !self.flags.intersects(MagicFlags::LIST | MagicFlags::CHECK) {
            return None;
        }
        let db = match &self.db {
            Some(db) => Arc::clone(db),
            None => match builtin_database() {
                Ok(db) => db,
                Err(e) => return Some(Err(e.into())),
            },
        };
        if self.flags.contains(MagicFlags::LIST) {
            return Some(Ok(db.list()));
        }
        let report = db.check().map_err(SigilError::from).map(|warnings| {
            for warning in &warnings {
                warn!(%warning, "rule check");
            }
            format!(
                "{} rules from {} sources checked, {} warnings",
                db.len(),
                db.sources().len(),
                warnings.len()
            )
        });
        Some(report)
    }

    fn sources_or_default(sources: &[MagicSource]) -> Vec<MagicSource> {
        if sources.is_empty() {
            builtin::default_sources()
        } else {
            sources.to_vec()
        }
    }

    /// Parse `sources` and return the compiled cache bytes.
    pub fn compile(&mut self, sources: &[MagicSource]) -> Result<Vec<u8>> {
        let sources = Self::sources_or_default(sources);
        let compiled = self
            .load_sources(&sources)
            .and_then(|db| cache::encode(&db));
        self.record("compile", compiled)
    }

    /// Compile `sources` and write the cache to `path`.
    pub fn compile_to_path<P: AsRef<Path>>(&mut self, sources: &[MagicSource], path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.compile(sources)?;
        let written = std::fs::write(path, &bytes)
            .map_err(|e| SigilError::io(Some(path.to_path_buf()), e));
        self.record("compile_to_path", written)?;
        info!(path = %path.display(), bytes = bytes.len(), "wrote compiled database");
        Ok(())
    }

    /// Validate `sources` without installing them, logging a warning per
    /// dead rule.
    pub fn check(&mut self, sources: &[MagicSource]) -> Result<()> {
        let sources = Self::sources_or_default(sources);
        let checked = self.load_sources(&sources).and_then(|db| {
            // Under CHECK the load has already logged them.
            if !self.flags.contains(MagicFlags::CHECK) {
                for warning in db.check()? {
                    warn!(%warning, "rule check");
                }
            }
            Ok(())
        });
        self.record("check", checked)
    }

    /// Render `sources` (or the loaded database when empty) as a listing.
    pub fn list(&mut self, sources: &[MagicSource]) -> Result<String> {
        let listing = if sources.is_empty() {
            match &self.db {
                Some(db) => Ok(db.list()),
                None => self
                    .load_sources(&builtin::default_sources())
                    .map(|db| db.list()),
            }
        } else {
            self.load_sources(sources).map(|db| db.list())
        };
        self.record("list", listing)
    }

    pub fn flags(&self) -> MagicFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: MagicFlags) {
        self.flags = flags;
    }

    /// Set flags from raw bits. Unknown bits are rejected and the current
    /// flags kept.
    pub fn set_flags_raw(&mut self, bits: u32) -> Result<()> {
        let flags = MagicFlags::from_bits(bits).ok_or(SigilError::InvalidFlags { bits });
        let flags = self.record("set_flags", flags)?;
        self.flags = flags;
        Ok(())
    }

    pub fn get_param(&self, param: Param) -> usize {
        self.config.get_param(param)
    }

    pub fn set_param(&mut self, param: Param, value: usize) -> Result<()> {
        let result = self.config.set_param(param, value);
        self.record("set_param", result)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Message of the last failed call, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// OS error number of the last failed call, 0 when there was none.
    pub fn errno(&self) -> i32 {
        self.errno
    }

    pub fn database(&self) -> Option<&Arc<SignatureDatabase>> {
        self.db.as_ref()
    }

    /// A thread-safe snapshot of this handle for concurrent classification.
    pub fn classifier(&self) -> Classifier {
        let db = self.db.clone().unwrap_or_else(|| {
            warn!("no signature database loaded, classifying without rules");
            Arc::new(SignatureDatabase::empty())
        });
        Classifier {
            db,
            flags: self.flags,
            config: self.config.clone(),
        }
    }

    /// Classify an in-memory buffer.
    pub fn classify_buffer(&mut self, data: &[u8]) -> Result<String> {
        if let Some(report) = self.database_report() {
            return self.record("classify_buffer", report);
        }
        let mode = self.flags.output_mode();
        let result = self.classifier().classify_bytes(data).map(|c| c.render(mode));
        self.record("classify_buffer", result)
    }

    /// Classify everything `reader` yields, up to the window cap.
    pub fn classify_reader<R: Read>(&mut self, reader: R) -> Result<String> {
        if let Some(report) = self.database_report() {
            return self.record("classify_reader", report);
        }
        let mode = self.flags.output_mode();
        let result = self.classifier().classify_stream(reader).map(|c| c.render(mode));
        self.record("classify_reader", result)
    }

    /// Classify the file open on `fd`. The descriptor stays open and owned
    /// by the caller.
    #[cfg(unix)]
    pub fn classify_descriptor<F: std::os::fd::AsFd>(&mut self, fd: F) -> Result<String> {
        if let Some(report) = self.database_report() {
            return self.record("classify_descriptor", report);
        }
        let mode = self.flags.output_mode();
        let result = fd
            .as_fd()
            .try_clone_to_owned()
            .map_err(|e| SigilError::io(None, e))
            .and_then(|owned| self.classifier().classify_stream(File::from(owned)))
            .map(|c| c.render(mode));
        self.record("classify_descriptor", result)
    }

    /// Classify the file at `path`, reporting special files by kind.
    pub fn classify_file<P: AsRef<Path>>(&mut self, path: P) -> Result<String> {
        if let Some(report) = self.database_report() {
            return self.record("classify_file", report);
        }
        let mode = self.flags.output_mode();
        let result = self
            .classifier()
            .classify_path(path.as_ref())
            .map(|c| c.render(mode));
        self.record("classify_file", result)
    }
}

/// Shared, immutable view of a handle used for concurrent classification.
/// Always classifies; `CHECK` and `LIST` only affect the handle's calls.
#[derive(Debug, Clone)]
pub struct Classifier {
    db: Arc<SignatureDatabase>,
    flags: MagicFlags,
    config: EngineConfig,
}

impl Classifier {
    pub fn new(db: Arc<SignatureDatabase>, flags: MagicFlags, config: EngineConfig) -> Self {
        Self { db, flags, config }
    }

    pub fn flags(&self) -> MagicFlags {
        self.flags
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.db, self.flags, &self.config)
    }

    pub fn classify_bytes(&self, data: &[u8]) -> Result<Classification> {
        let io = &self.config.io;
        let mut window = InputWindow::from_bytes(data, io.initial_window, io.max_window);
        self.evaluator().classify(&mut window)
    }

    pub fn classify_stream<R: Read>(&self, reader: R) -> Result<Classification> {
        let io = &self.config.io;
        let mut window = InputWindow::from_reader(reader, io.initial_window, io.max_window)?;
        self.evaluator().classify(&mut window)
    }

    /// Classify many buffers in parallel. Results are in input order.
    pub fn classify_batch<B>(&self, inputs: &[B]) -> Vec<Result<Classification>>
    where
        B: AsRef<[u8]> + Sync,
    {
        inputs
            .par_iter()
            .map(|data| self.classify_bytes(data.as_ref()))
            .collect()
    }

    pub fn classify_path(&self, path: &Path) -> Result<Classification> {
        let _span = span_trace!("classify_path", path = %path.display()).entered();
        let io_err = |e: std::io::Error| SigilError::io(Some(path.to_path_buf()), e);
        let link_meta = std::fs::symlink_metadata(path).map_err(io_err)?;

        if link_meta.file_type().is_symlink() {
            let target = std::fs::read_link(path).map_err(io_err)?;
            if !self.flags.contains(MagicFlags::SYMLINK) {
                return Ok(Classification::new(
                    format!("symbolic link to {}", target.display()),
                    "inode/symlink",
                ));
            }
            if std::fs::metadata(path).is_err() {
                return Ok(Classification::new(
                    format!("broken symbolic link to {}", target.display()),
                    "inode/symlink",
                ));
            }
        }

        let meta = std::fs::metadata(path).map_err(io_err)?;
        if let Some(special) = self.special_file(&meta) {
            return Ok(special);
        }
        if meta.is_file() && meta.len() == 0 {
            return Ok(Classification::new("empty", "inode/x-empty"));
        }

        let result = if meta.is_file() {
            let io = &self.config.io;
            let mut window =
                InputWindow::from_path(path, io.initial_window, io.max_window, io.max_file_size)
                    .map_err(|e| match e {
                        IoError::StdIo(source) => io_err(source),
                        other => SigilError::Window(other),
                    })?;
            self.evaluator().classify(&mut window)
        } else {
            let file = File::open(path).map_err(io_err)?;
            self.classify_stream(file)
        };

        if self.flags.contains(MagicFlags::PRESERVE_ATIME) {
            restore_times(path, &meta);
        }
        result
    }

    fn special_file(&self, meta: &Metadata) -> Option<Classification> {
        if meta.is_dir() {
            return Some(Classification::new("directory", "inode/directory"));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::{FileTypeExt, MetadataExt};
            let ft = meta.file_type();
            if ft.is_fifo() {
                return Some(Classification::new("fifo (named pipe)", "inode/fifo"));
            }
            if ft.is_socket() {
                return Some(Classification::new("socket", "inode/socket"));
            }
            let devices = self.flags.contains(MagicFlags::DEVICES);
            let (major, minor) = split_rdev(meta.rdev());
            if ft.is_char_device() && !devices {
                return Some(Classification::new(
                    format!("character special ({}/{})", major, minor),
                    "inode/chardevice",
                ));
            }
            if ft.is_block_device() && !devices {
                return Some(Classification::new(
                    format!("block special ({}/{})", major, minor),
                    "inode/blockdevice",
                ));
            }
        }
        None
    }
}

/// Device major and minor numbers from a Linux `st_rdev`.
#[cfg(unix)]
fn split_rdev(rdev: u64) -> (u64, u64) {
    let major = ((rdev >> 8) & 0xfff) | ((rdev >> 32) & !0xfff);
    let minor = (rdev & 0xff) | ((rdev >> 12) & !0xff);
    (major, minor)
}

fn restore_times(path: &Path, meta: &Metadata) {
    let (Ok(accessed), Ok(modified)) = (meta.accessed(), meta.modified()) else {
        return;
    };
    let times = std::fs::FileTimes::new()
        .set_accessed(accessed)
        .set_modified(modified);
    let restored = File::options()
        .write(true)
        .open(path)
        .or_else(|_| File::open(path))
        .and_then(|f| f.set_times(times));
    if let Err(e) = restored {
        debug!(path = %path.display(), error = %e, "could not restore access time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::OutputMode;

    fn loaded(flags: MagicFlags) -> Magic {
        let mut m = Magic::open(flags);
        m.load_default().unwrap();
        m
    }

    #[test]
    fn handle_is_send_and_classifier_is_sync() {
        fn send<T: Send>() {}
        fn sync<T: Send + Sync>() {}
        send::<Magic>();
        sync::<Classifier>();
    }

    const LINT_RULES: &[u8] = b"0 string AB ab-file\n>2 byte 1 one\n0 string ZZ\n";

    #[test]
    fn check_flag_reports_instead_of_classifying() {
        let mut m = Magic::open(MagicFlags::CHECK);
        m.load_buffers(&[LINT_RULES]).unwrap();
        assert_eq!(
            m.classify_buffer(b"AB\x01").unwrap(),
            "3 rules from 1 sources checked, 1 warnings"
        );
        assert!(m.last_error().is_none());

        m.set_flags(MagicFlags::NONE);
        assert_eq!(m.classify_buffer(b"AB\x01").unwrap(), "ab-file one");
    }

    #[test]
    fn list_flag_returns_the_listing() {
        let mut m = Magic::open(MagicFlags::LIST);
        m.load_buffers(&[LINT_RULES]).unwrap();
        let listing = m.classify_buffer(b"AB\x01").unwrap();
        assert_eq!(listing, m.database().unwrap().list());
        assert!(listing.starts_with("# <buffer 0>\n"));

        m.set_flags(MagicFlags::LIST | MagicFlags::CHECK);
        assert_eq!(m.classify_buffer(b"").unwrap(), listing);
    }

    #[test]
    fn list_flag_without_a_database_lists_builtin_rules() {
        let mut m = Magic::open(MagicFlags::LIST);
        let listing = m.classify_buffer(b"%PDF-1.4").unwrap();
        assert!(listing.contains("PDF document"));
    }

    #[test]
    fn classifier_ignores_report_flags() {
        let mut m = Magic::open(MagicFlags::LIST | MagicFlags::CHECK);
        m.load_buffers(&[LINT_RULES]).unwrap();
        let c = m.classifier().classify_bytes(b"AB\x01").unwrap();
        assert_eq!(c.render(OutputMode::Description), "ab-file one");
    }

    #[test]
    fn pdf_in_every_mode() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Length 3 >>\nstream\n\x00\x01\x02\nendstream\n";
        let mut m = loaded(MagicFlags::NONE);
        assert!(m.classify_buffer(data).unwrap().starts_with("PDF document, version 1.4"));
        m.set_flags(MagicFlags::MIME_TYPE);
        assert_eq!(m.classify_buffer(data).unwrap(), "application/pdf");
        m.set_flags(MagicFlags::MIME);
        assert_eq!(m.classify_buffer(data).unwrap(), "application/pdf; charset=binary");
        m.set_flags(MagicFlags::EXTENSION);
        assert_eq!(m.classify_buffer(data).unwrap(), "pdf");
    }

    #[test]
    fn raw_flags_are_validated() {
        let mut m = Magic::open(MagicFlags::NONE);
        assert!(m.set_flags_raw(MagicFlags::MIME_TYPE.bits()).is_ok());
        assert_eq!(m.flags(), MagicFlags::MIME_TYPE);
        let err = m.set_flags_raw(0x8000_0000).unwrap_err();
        assert!(matches!(err, SigilError::InvalidFlags { .. }));
        assert_eq!(m.flags(), MagicFlags::MIME_TYPE);
        assert!(m.last_error().unwrap().contains("invalid flags"));
        assert!(Magic::open_raw(0x4000_0000).is_err());
    }

    #[test]
    fn failed_load_keeps_previous_rules() {
        let mut m = loaded(MagicFlags::NONE);
        let before = m.database().unwrap().len();
        let bad = MagicSource::bytes("bad", "0 string A top\n>>2 byte 1 skipped\n");
        assert!(m.load(&[bad]).is_err());
        assert_eq!(m.database().unwrap().len(), before);
        assert!(m.last_error().unwrap().contains("bad:2"));
        assert_eq!(m.errno(), 0);
        assert!(m.classify_buffer(b"\x89PNG\r\n\x1a\n").is_ok());
        assert!(m.last_error().is_none());
    }

    #[test]
    fn missing_file_sets_errno() {
        let mut m = loaded(MagicFlags::NONE);
        assert!(m.classify_file("/nonexistent/sigil/input").is_err());
        assert_eq!(m.errno(), 2);
    }

    #[test]
    fn unloaded_handle_still_classifies() {
        let mut m = Magic::open(MagicFlags::NONE);
        assert_eq!(m.classify_buffer(b"hello world\n").unwrap(), "ASCII text");
        assert_eq!(m.classify_buffer(b"\x00\x01\x02").unwrap(), "data");
    }

    #[test]
    fn params_through_the_handle() {
        let mut m = Magic::open(MagicFlags::NONE);
        m.set_param(Param::IndirMax, 3).unwrap();
        assert_eq!(m.get_param(Param::IndirMax), 3);
        assert!(m.set_param(Param::BytesMax, 0).is_err());
        assert_eq!(m.classifier().flags(), MagicFlags::NONE);
    }

    #[test]
    fn classification_render_matches_handle() {
        let m = loaded(MagicFlags::NONE);
        let c = m.classifier().classify_bytes(b"GIF89a\x01\x00\x01\x00").unwrap();
        assert_eq!(c.render(OutputMode::MimeType), "image/gif");
    }
}
