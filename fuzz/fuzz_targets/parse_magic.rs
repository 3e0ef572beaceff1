#![no_main]
use libfuzzer_sys::fuzz_target;
use sigil::{MagicSource, SignatureDatabase};

fuzz_target!(|data: &[u8]| {
    if let Ok(db) = SignatureDatabase::load(&[MagicSource::bytes("<fuzz>", data)]) {
        let _ = db.list();
    }
});
