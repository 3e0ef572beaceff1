#![no_main]
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use sigil::{Classifier, Magic, MagicFlags};

static CLASSIFIER: Lazy<Classifier> = Lazy::new(|| {
    let mut magic = Magic::open(MagicFlags::CONTINUE | MagicFlags::COMPRESS);
    let _ = magic.load_default();
    magic.classifier()
});

fuzz_target!(|data: &[u8]| {
    let _ = CLASSIFIER.classify_bytes(data);
});
