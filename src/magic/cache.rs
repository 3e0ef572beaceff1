//! Binary form of a parsed database.
//!
//! Layout: `SGLM` magic, `u32` LE format version, `u32` LE rule count, the
//! SHA-256 of the payload, then the bincode payload.

use crate::error::{Result, SigilError};
use crate::magic::database::SignatureDatabase;
use crate::magic::error::{LoadError, LoadErrorKind};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

pub const CACHE_MAGIC: &[u8; 4] = b"SGLM";
/// Bumped whenever the serialized rule model changes.
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 4 + 4 + 4 + 32;

pub fn is_cache(data: &[u8]) -> bool {
    data.starts_with(CACHE_MAGIC)
}

/// Serialize `db` into the cache format.
pub fn encode(db: &SignatureDatabase) -> Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(db, bincode::config::standard())
        .map_err(|e| SigilError::Serialization(e.to_string()))?;
    let count = u32::try_from(db.len())
        .map_err(|_| SigilError::Serialization("too many rules".to_string()))?;
    let digest = Sha256::digest(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(CACHE_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&digest);
    out.extend_from_slice(&payload);
    debug!(
        rules = db.len(),
        bytes = out.len(),
        sha256 = %hex::encode(digest),
        "encoded compiled database"
    );
    Ok(out)
}

/// Deserialize a cache produced by [`encode`]. `source_name` is used in
/// errors.
pub fn decode(source_name: &str, data: &[u8]) -> std::result::Result<SignatureDatabase, LoadError> {
    let fail = |kind, reason: String| LoadError::new(kind, source_name, 0, reason);

    if !is_cache(data) {
        return Err(fail(LoadErrorKind::CacheMagic, "bad header magic".to_string()));
    }
    if data.len() < HEADER_LEN {
        return Err(fail(
            LoadErrorKind::CacheCorrupt,
            format!("truncated header ({} bytes)", data.len()),
        ));
    }
    let version = read_u32(&data[4..8]);
    if version != FORMAT_VERSION {
        warn!(source = source_name, version, expected = FORMAT_VERSION, "cache version mismatch");
        return Err(fail(
            LoadErrorKind::CacheVersion,
            format!("found version {}, expected {}", version, FORMAT_VERSION),
        ));
    }
    let count = read_u32(&data[8..12]) as usize;
    let stored = &data[12..HEADER_LEN];
    let payload = &data[HEADER_LEN..];
    let digest = Sha256::digest(payload);
    if digest.as_slice() != stored {
        return Err(fail(
            LoadErrorKind::CacheChecksum,
            format!(
                "payload hashes to {}, header says {}",
                hex::encode(digest),
                hex::encode(stored)
            ),
        ));
    }

    let (db, consumed): (SignatureDatabase, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| fail(LoadErrorKind::CacheCorrupt, e.to_string()))?;
    if consumed != payload.len() {
        return Err(fail(
            LoadErrorKind::CacheCorrupt,
            format!("{} trailing bytes", payload.len() - consumed),
        ));
    }
    if db.len() != count {
        return Err(fail(
            LoadErrorKind::CacheCorrupt,
            format!("header counts {} rules, payload has {}", count, db.len()),
        ));
    }
    db.validate()
        .map_err(|reason| fail(LoadErrorKind::CacheCorrupt, reason))?;
    Ok(db)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}
