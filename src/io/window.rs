//! Lazily growing read-only view over a classification input.

use crate::io::error::{IoError, Result};
use crate::io::{Endian, MappedFile, WINDOW_CHUNK};
use std::io::Read;
use std::path::Path;
use tracing::{debug, trace};

enum Backing<'a> {
    Borrowed(&'a [u8]),
    Mapped(MappedFile),
    Stream {
        reader: std::io::Take<Box<dyn Read + 'a>>,
        buf: Vec<u8>,
        eof: bool,
    },
}

/// A bounded view of the first bytes of a source.
///
/// The view starts at `initial` bytes and grows on demand through
/// [`ensure`](InputWindow::ensure) until either the source is exhausted or
/// `cap` bytes are visible. Borrowed and mapped sources are never copied;
/// streams are buffered as they are read.
pub struct InputWindow<'a> {
    backing: Backing<'a>,
    visible: usize,
    cap: usize,
}

impl<'a> InputWindow<'a> {
    /// A zero-copy window over an in-memory buffer.
    pub fn from_bytes(data: &'a [u8], initial: usize, cap: usize) -> Self {
        Self {
            visible: initial.min(cap).min(data.len()),
            backing: Backing::Borrowed(data),
            cap,
        }
    }

    /// A window over a memory-mapped file no larger than `max_file_size`.
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        initial: usize,
        cap: usize,
        max_file_size: u64,
    ) -> Result<Self> {
        let file = MappedFile::open(path, max_file_size)?;
        Ok(Self::from_mapped(file, initial, cap))
    }

    pub fn from_mapped(file: MappedFile, initial: usize, cap: usize) -> Self {
        Self {
            visible: initial.min(cap).min(file.len()),
            backing: Backing::Mapped(file),
            cap,
        }
    }

    /// A window over any byte stream; at most `cap` bytes are ever pulled.
    pub fn from_reader<R: Read + 'a>(reader: R, initial: usize, cap: usize) -> Result<Self> {
        let boxed: Box<dyn Read + 'a> = Box::new(reader);
        let mut window = Self {
            backing: Backing::Stream {
                reader: boxed.take(cap as u64),
                buf: Vec::new(),
                eof: false,
            },
            visible: 0,
            cap,
        };
        window.grow_to(initial.min(cap))?;
        Ok(window)
    }

    /// Bytes visible so far.
    pub fn data(&self) -> &[u8] {
        match &self.backing {
            Backing::Borrowed(data) => &data[..self.visible],
            Backing::Mapped(file) => &file.bytes()[..self.visible],
            Backing::Stream { buf, .. } => buf,
        }
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Total size of the source when it is known.
    pub fn total_len(&self) -> Option<u64> {
        match &self.backing {
            Backing::Borrowed(data) => Some(data.len() as u64),
            Backing::Mapped(file) => Some(file.len() as u64),
            Backing::Stream { buf, eof: true, .. } => Some(buf.len() as u64),
            Backing::Stream { .. } => None,
        }
    }

    /// True once every byte of the source is visible.
    pub fn is_complete(&self) -> bool {
        self.total_len() == Some(self.len() as u64)
    }

    /// Grow the visible region so that it covers `upto` bytes.
    ///
    /// Returns false when the source ends (or the cap is reached) first.
    /// Stream failures are logged and reported as false: a truncated input
    /// is a normal input.
    pub fn ensure(&mut self, upto: usize) -> bool {
        if upto <= self.len() {
            return true;
        }
        let target = upto.max(self.len() + WINDOW_CHUNK).min(self.cap);
        if let Err(e) = self.grow_to(target) {
            debug!(error = %e, upto, "window extension failed");
        }
        self.len() >= upto
    }

    /// Make everything up to the cap visible.
    pub fn fill(&mut self) -> &[u8] {
        self.ensure(self.cap);
        self.data()
    }

    fn grow_to(&mut self, target: usize) -> Result<()> {
        let have = self.len();
        if target <= have {
            return Ok(());
        }
        match &mut self.backing {
            Backing::Borrowed(data) => {
                self.visible = target.min(data.len());
            }
            Backing::Mapped(file) => {
                self.visible = target.min(file.len());
            }
            Backing::Stream { reader, buf, eof } => {
                if *eof {
                    return Ok(());
                }
                buf.resize(target, 0);
                let mut filled = have;
                let outcome = loop {
                    if filled == target {
                        break Ok(());
                    }
                    match reader.read(&mut buf[filled..]) {
                        Ok(0) => {
                            // A spent `take` limit means the cap, not the end of the source.
                            *eof = reader.limit() > 0;
                            break Ok(());
                        }
                        Ok(n) => filled += n,
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                        Err(e) => break Err(IoError::StdIo(e)),
                    }
                };
                buf.truncate(filled);
                outcome?;
            }
        }
        trace!(from = have, to = self.len(), "window grown");
        Ok(())
    }

    /// Borrow `len` bytes at `offset`, extending the window if needed.
    pub fn read_bytes(&mut self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len).ok_or(IoError::OutOfBounds {
            offset,
            len,
            available: self.len(),
        })?;
        if !self.ensure(end) {
            return Err(IoError::OutOfBounds {
                offset,
                len,
                available: self.len(),
            });
        }
        Ok(&self.data()[offset..end])
    }

    /// Up to `len` bytes at `offset`; shorter when the source ends first.
    pub fn read_available(&mut self, offset: usize, len: usize) -> &[u8] {
        self.ensure(offset.saturating_add(len));
        let data = self.data();
        if offset >= data.len() {
            return &[];
        }
        let end = offset.saturating_add(len).min(data.len());
        &data[offset..end]
    }

    pub fn read_byte(&mut self, offset: usize) -> Result<u8> {
        Ok(self.read_bytes(offset, 1)?[0])
    }

    /// Read an unsigned integer of `size` bytes (1, 2, 4 or 8).
    pub fn read_int(&mut self, offset: usize, size: usize, endian: Endian) -> Result<u64> {
        let bytes = self.read_bytes(offset, size)?;
        Ok(endian.decode(bytes))
    }
}
