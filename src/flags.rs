//! Behavior flags accepted by a [`Magic`](crate::handle::Magic) handle.
//!
//! Bit values match the classic `magic.h` table so that hosts passing raw
//! integers keep their meaning.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Flag set controlling classification and output selection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MagicFlags: u32 {
        /// Log every rule evaluation.
        const DEBUG = 0x000_0001;
        /// Follow symbolic links instead of reporting them.
        const SYMLINK = 0x000_0002;
        /// Annotate results of decompressed inputs with the container description.
        const COMPRESS = 0x000_0004;
        /// Read the contents of block and character devices.
        const DEVICES = 0x000_0008;
        /// Output the MIME type.
        const MIME_TYPE = 0x000_0010;
        /// Report every matching top-level rule, not only the first.
        const CONTINUE = 0x000_0020;
        /// Validate the database: loads log its warnings and classification
        /// calls return a check summary instead of a description.
        const CHECK = 0x000_0040;
        /// Restore the access time of classified files.
        const PRESERVE_ATIME = 0x000_0080;
        /// Do not escape unprintable characters in descriptions.
        const RAW = 0x000_0100;
        /// Surface evaluation problems as errors instead of degrading to no-match.
        const ERROR = 0x000_0200;
        /// Output the MIME encoding.
        const MIME_ENCODING = 0x000_0400;
        /// Output both MIME type and encoding.
        const MIME = Self::MIME_TYPE.bits() | Self::MIME_ENCODING.bits();
        /// Output the Apple creator/type code.
        const APPLE = 0x000_0800;
        /// Skip decompression sniffing.
        const NO_CHECK_COMPRESS = 0x000_1000;
        /// Skip the built-in tar check.
        const NO_CHECK_TAR = 0x000_2000;
        /// Skip the signature database.
        const NO_CHECK_SOFT = 0x000_4000;
        /// Accepted for compatibility; there is no application-type pass.
        const NO_CHECK_APPTYPE = 0x000_8000;
        /// Accepted for compatibility; ELF details come from rules only.
        const NO_CHECK_ELF = 0x001_0000;
        /// Skip the text heuristics.
        const NO_CHECK_TEXT = 0x002_0000;
        /// Accepted for compatibility; there is no compound-document pass.
        const NO_CHECK_CDF = 0x004_0000;
        /// Skip the built-in CSV check.
        const NO_CHECK_CSV = 0x008_0000;
        /// Accepted for compatibility; there is no token pass.
        const NO_CHECK_TOKENS = 0x010_0000;
        /// Skip character encoding detection.
        const NO_CHECK_ENCODING = 0x020_0000;
        /// Skip the built-in JSON check.
        const NO_CHECK_JSON = 0x040_0000;
        /// Output the `/`-separated list of file extensions.
        const EXTENSION = 0x100_0000;
        /// Report only the decompressed content, even under `COMPRESS`.
        const COMPRESS_TRANSP = 0x200_0000;
        /// Classification calls return the rule listing instead of a
        /// description.
        const LIST = 0x1000_0000;
        /// Output no description at all.
        const NODESC = Self::EXTENSION.bits() | Self::MIME.bits() | Self::APPLE.bits();
    }
}

impl MagicFlags {
    pub const NONE: MagicFlags = MagicFlags::empty();
    /// Older name of `NO_CHECK_TEXT`.
    pub const NO_CHECK_ASCII: MagicFlags = MagicFlags::NO_CHECK_TEXT;
    /// Accepted and ignored.
    pub const NO_CHECK_FORTRAN: MagicFlags = MagicFlags::empty();
    /// Accepted and ignored.
    pub const NO_CHECK_TROFF: MagicFlags = MagicFlags::empty();

    /// Name/value table exported to scripting hosts.
    pub const TABLE: &'static [(&'static str, MagicFlags)] = &[
        ("NONE", MagicFlags::NONE),
        ("DEBUG", MagicFlags::DEBUG),
        ("SYMLINK", MagicFlags::SYMLINK),
        ("COMPRESS", MagicFlags::COMPRESS),
        ("DEVICES", MagicFlags::DEVICES),
        ("MIME_TYPE", MagicFlags::MIME_TYPE),
        ("CONTINUE", MagicFlags::CONTINUE),
        ("CHECK", MagicFlags::CHECK),
        ("LIST", MagicFlags::LIST),
        ("PRESERVE_ATIME", MagicFlags::PRESERVE_ATIME),
        ("RAW", MagicFlags::RAW),
        ("ERROR", MagicFlags::ERROR),
        ("MIME_ENCODING", MagicFlags::MIME_ENCODING),
        ("MIME", MagicFlags::MIME),
        ("APPLE", MagicFlags::APPLE),
        ("EXTENSION", MagicFlags::EXTENSION),
        ("COMPRESS_TRANSP", MagicFlags::COMPRESS_TRANSP),
        ("NODESC", MagicFlags::NODESC),
        ("NO_CHECK_COMPRESS", MagicFlags::NO_CHECK_COMPRESS),
        ("NO_CHECK_TAR", MagicFlags::NO_CHECK_TAR),
        ("NO_CHECK_SOFT", MagicFlags::NO_CHECK_SOFT),
        ("NO_CHECK_APPTYPE", MagicFlags::NO_CHECK_APPTYPE),
        ("NO_CHECK_ELF", MagicFlags::NO_CHECK_ELF),
        ("NO_CHECK_TEXT", MagicFlags::NO_CHECK_TEXT),
        ("NO_CHECK_CDF", MagicFlags::NO_CHECK_CDF),
        ("NO_CHECK_CSV", MagicFlags::NO_CHECK_CSV),
        ("NO_CHECK_TOKENS", MagicFlags::NO_CHECK_TOKENS),
        ("NO_CHECK_ENCODING", MagicFlags::NO_CHECK_ENCODING),
        ("NO_CHECK_JSON", MagicFlags::NO_CHECK_JSON),
        ("NO_CHECK_ASCII", MagicFlags::NO_CHECK_ASCII),
        ("NO_CHECK_FORTRAN", MagicFlags::NO_CHECK_FORTRAN),
        ("NO_CHECK_TROFF", MagicFlags::NO_CHECK_TROFF),
    ];

    /// Which field of a classification is surfaced to the caller.
    pub fn output_mode(&self) -> OutputMode {
        if self.contains(MagicFlags::EXTENSION) {
            OutputMode::Extension
        } else if self.contains(MagicFlags::APPLE) {
            OutputMode::Apple
        } else if self.contains(MagicFlags::MIME) {
            OutputMode::Mime
        } else if self.contains(MagicFlags::MIME_TYPE) {
            OutputMode::MimeType
        } else if self.contains(MagicFlags::MIME_ENCODING) {
            OutputMode::MimeEncoding
        } else {
            OutputMode::Description
        }
    }
}

/// Output field selected by the flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Description,
    MimeType,
    MimeEncoding,
    Mime,
    Extension,
    Apple,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Description => write!(f, "description"),
            OutputMode::MimeType => write!(f, "mime-type"),
            OutputMode::MimeEncoding => write!(f, "mime-encoding"),
            OutputMode::Mime => write!(f, "mime"),
            OutputMode::Extension => write!(f, "extension"),
            OutputMode::Apple => write!(f, "apple"),
        }
    }
}
