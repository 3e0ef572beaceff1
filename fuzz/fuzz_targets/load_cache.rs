#![no_main]
use libfuzzer_sys::fuzz_target;
use sha2::{Digest, Sha256};
use sigil::magic::cache::{self, CACHE_MAGIC, FORMAT_VERSION};

fuzz_target!(|data: &[u8]| {
    let _ = cache::decode("<fuzz>", data);

    // Frame the input with a valid header so the payload decoder is reached.
    if data.len() < 4 {
        return;
    }
    let (count, payload) = data.split_at(4);
    let mut framed = CACHE_MAGIC.to_vec();
    framed.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    framed.extend_from_slice(count);
    framed.extend_from_slice(&Sha256::digest(payload));
    framed.extend_from_slice(payload);
    if let Ok(db) = cache::decode("<fuzz>", &framed) {
        let _ = db.list();
    }
});
