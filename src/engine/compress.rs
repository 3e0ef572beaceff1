//! Decompression sniffing for compressed containers.

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::{Decompress, FlushDecompress, Status};
use std::io::Read;
use tracing::debug;

/// Container formats whose contents are classified transparently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Zlib,
    Zstd,
    Lz4,
}

impl CompressionFormat {
    pub fn name(&self) -> &'static str {
        match self {
            CompressionFormat::Gzip => "gzip",
            CompressionFormat::Zlib => "zlib",
            CompressionFormat::Zstd => "zstd",
            CompressionFormat::Lz4 => "lz4",
        }
    }
}

/// Identify a compressed stream from its first bytes.
pub fn sniff(data: &[u8]) -> Option<CompressionFormat> {
    match data {
        [0x1f, 0x8b, 0x08, ..] => Some(CompressionFormat::Gzip),
        [0x28, 0xb5, 0x2f, 0xfd, ..] => Some(CompressionFormat::Zstd),
        [0x04, 0x22, 0x4d, 0x18, ..] => Some(CompressionFormat::Lz4),
        [cmf, flg, ..] if is_zlib_header(*cmf, *flg) && inflates(data) => {
            Some(CompressionFormat::Zlib)
        }
        _ => None,
    }
}

/// RFC 1950 header: deflate with a 32K window, valid check bits and no
/// preset dictionary.
fn is_zlib_header(cmf: u8, flg: u8) -> bool {
    cmf == 0x78 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0 && flg & 0x20 == 0
}

/// Two bytes of zlib header are easy to hit in text (`x^`, `x\x01`), so a
/// zlib candidate must also inflate cleanly for its first few bytes.
fn inflates(data: &[u8]) -> bool {
    const PREFIX: usize = 256;
    let input = &data[..data.len().min(PREFIX)];
    let mut out = [0u8; 64];
    let mut inflater = Decompress::new(true);
    match inflater.decompress(input, &mut out, FlushDecompress::None) {
        Ok(Status::StreamEnd) => true,
        Ok(_) => inflater.total_out() > 0,
        Err(_) => false,
    }
}

/// Decompress at most `max` bytes of `data`.
///
/// A stream that is corrupt or truncated after producing some output
/// yields that output. The result may be empty.
pub fn decompress(format: CompressionFormat, data: &[u8], max: usize) -> std::io::Result<Vec<u8>> {
    let reader: Box<dyn Read + '_> = match format {
        CompressionFormat::Gzip => Box::new(GzDecoder::new(data)),
        CompressionFormat::Zlib => Box::new(ZlibDecoder::new(data)),
        CompressionFormat::Zstd => Box::new(zstd::stream::read::Decoder::new(data)?),
        CompressionFormat::Lz4 => Box::new(lz4_flex::frame::FrameDecoder::new(data)),
    };

    let mut out = Vec::new();
    match reader.take(max as u64).read_to_end(&mut out) {
        Ok(_) => {}
        Err(e) if !out.is_empty() => {
            debug!(format = format.name(), error = %e, produced = out.len(), "partial decompression");
        }
        Err(e) => return Err(e),
    }
    Ok(out)
}
