use crate::common::fixtures;
use crate::common::test_utils::loaded_magic;
use sigil::timeout::{classify_with_timeout, TimeoutConfig};
use sigil::{MagicFlags, OutputMode};
use std::sync::Arc;
use std::thread;

fn corpus() -> Vec<Vec<u8>> {
    vec![
        fixtures::pdf(),
        fixtures::png(),
        fixtures::gif(),
        fixtures::tar(),
        fixtures::elf64_exec(),
        fixtures::gzip(&fixtures::pdf()),
        fixtures::zstd(&fixtures::gif()),
        b"a,b\n1,2\n".to_vec(),
        b"{\"k\": true}".to_vec(),
        b"just words\n".to_vec(),
        vec![0xde, 0xad, 0xbe, 0xef, 0x00],
        Vec::new(),
    ]
}

#[test]
fn batch_matches_sequential() {
    let classifier = loaded_magic(MagicFlags::NONE).classifier();
    let inputs = corpus();
    let sequential: Vec<_> = inputs
        .iter()
        .map(|d| classifier.classify_bytes(d).unwrap())
        .collect();
    let batched: Vec<_> = classifier
        .classify_batch(&inputs)
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(sequential, batched);
}

#[test]
fn threads_share_one_database() {
    let magic = loaded_magic(MagicFlags::NONE);
    let classifier = magic.classifier();
    let inputs = Arc::new(corpus());
    let expected: Vec<_> = inputs
        .iter()
        .map(|d| classifier.classify_bytes(d).unwrap())
        .collect();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let classifier = classifier.clone();
            let inputs = Arc::clone(&inputs);
            thread::spawn(move || {
                (0..20)
                    .flat_map(|_| inputs.iter().map(|d| classifier.classify_bytes(d).unwrap()))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for h in handles {
        let results = h.join().unwrap();
        for chunk in results.chunks(expected.len()) {
            assert_eq!(chunk, expected.as_slice());
        }
    }
    assert!(Arc::ptr_eq(
        magic.database().unwrap(),
        loaded_magic(MagicFlags::NONE).database().unwrap()
    ));
}

#[tokio::test]
async fn classify_with_timeout_returns_the_result() {
    let classifier = loaded_magic(MagicFlags::MIME_TYPE).classifier();
    let config = TimeoutConfig::new(5_000, "classify_png");
    let c = classify_with_timeout(classifier, fixtures::png(), config)
        .await
        .unwrap();
    assert_eq!(c.render(OutputMode::MimeType), "image/png");
    assert_eq!(c.extensions, vec!["png".to_string()]);
    assert_eq!(c.apple.as_deref(), Some("8BIMPNGf"));
}
