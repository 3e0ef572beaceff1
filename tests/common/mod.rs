//! Common test utilities and helpers.
//!
//! This module provides shared fixtures for the integration tests: small,
//! well-formed inputs for the formats the embedded rules recognise.

pub mod test_utils;

/// In-memory inputs for the formats the default rules know.
pub mod fixtures {
    use std::io::Write;

    /// A 1x1 RGBA PNG: signature, IHDR and IEND.
    pub fn png() -> Vec<u8> {
        let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
        out.extend_from_slice(&13u32.to_be_bytes());
        out.extend_from_slice(b"IHDR");
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&[8, 6, 0, 0, 0]);
        out.extend_from_slice(&[0x1f, 0x15, 0xc4, 0x89]);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(b"IEND");
        out.extend_from_slice(&[0xae, 0x42, 0x60, 0x82]);
        out
    }

    /// A 1x1 GIF89a header followed by a trailer.
    pub fn gif() -> Vec<u8> {
        let mut out = b"GIF89a".to_vec();
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x3b]);
        out
    }

    /// A PDF with a binary stream so the text pass does not claim it.
    pub fn pdf() -> Vec<u8> {
        b"%PDF-1.4\n1 0 obj\n<< /Length 3 >>\nstream\n\x00\x01\x02\nendstream\nendobj\n%%EOF\n"
            .to_vec()
    }

    pub fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    pub fn zstd(data: &[u8]) -> Vec<u8> {
        zstd::encode_all(data, 3).unwrap()
    }

    /// A single ustar header block for an empty member, plus the two
    /// zero blocks that end an archive.
    pub fn tar() -> Vec<u8> {
        let mut h = vec![0u8; 512];
        h[..9].copy_from_slice(b"hello.txt");
        h[100..108].copy_from_slice(b"0000644\0");
        h[108..116].copy_from_slice(b"0001750\0");
        h[116..124].copy_from_slice(b"0001750\0");
        h[124..136].copy_from_slice(b"00000000000\0");
        h[136..148].copy_from_slice(b"14643132000\0");
        h[156] = b'0';
        h[257..265].copy_from_slice(b"ustar\x0000");
        h[148..156].copy_from_slice(b"        ");
        let sum: u32 = h.iter().map(|&b| b as u32).sum();
        h[148..156].copy_from_slice(format!("{:06o}\0 ", sum).as_bytes());
        h.resize(512 * 3, 0);
        h
    }

    /// A minimal 64-bit little-endian ELF executable header for x86-64.
    pub fn elf64_exec() -> Vec<u8> {
        let mut h = vec![0u8; 64];
        h[..4].copy_from_slice(b"\x7fELF");
        h[4] = 2;
        h[5] = 1;
        h[6] = 1;
        h[16..18].copy_from_slice(&2u16.to_le_bytes());
        h[18..20].copy_from_slice(&0x3eu16.to_le_bytes());
        h[20..24].copy_from_slice(&1u32.to_le_bytes());
        h
    }

    /// The same header in big-endian byte order for 64-bit PowerPC.
    pub fn elf64_be_exec() -> Vec<u8> {
        let mut h = vec![0u8; 64];
        h[..4].copy_from_slice(b"\x7fELF");
        h[4] = 2;
        h[5] = 2;
        h[6] = 1;
        h[16..18].copy_from_slice(&2u16.to_be_bytes());
        h[18..20].copy_from_slice(&0x15u16.to_be_bytes());
        h[20..24].copy_from_slice(&1u32.to_be_bytes());
        h
    }
}
