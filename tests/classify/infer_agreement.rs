//! Cross-check MIME types against the `infer` crate on inputs both know.

use crate::common::fixtures;
use crate::common::test_utils::loaded_magic;
use sigil::MagicFlags;

#[test]
fn mime_types_agree_with_infer() {
    let cases: Vec<(&str, Vec<u8>)> = vec![
        ("png", fixtures::png()),
        ("gif", fixtures::gif()),
        ("pdf", fixtures::pdf()),
        ("tar", fixtures::tar()),
        ("elf", fixtures::elf64_exec()),
        ("gzip", fixtures::gzip(b"hello, compressed world\n")),
        ("zstd", fixtures::zstd(b"hello, compressed world\n")),
    ];

    let mut magic = loaded_magic(MagicFlags::MIME_TYPE | MagicFlags::NO_CHECK_COMPRESS);
    for (name, data) in cases {
        let theirs = infer::get(&data)
            .unwrap_or_else(|| panic!("infer does not recognise {name}"))
            .mime_type();
        let ours = magic.classify_buffer(&data).unwrap();
        assert_eq!(ours, theirs, "{name}");
    }
}

#[test]
fn extensions_agree_with_infer() {
    let mut magic = loaded_magic(MagicFlags::EXTENSION);
    for data in [fixtures::png(), fixtures::gif(), fixtures::pdf()] {
        let theirs = infer::get(&data).unwrap().extension();
        let ours = magic.classify_buffer(&data).unwrap();
        assert!(ours.split('/').any(|e| e == theirs), "{ours} vs {theirs}");
    }
}
