use crate::common::fixtures;
use crate::common::test_utils::loaded_magic;
use sigil::magic::cache::{CACHE_MAGIC, FORMAT_VERSION};
use sigil::{LoadErrorKind, Magic, MagicFlags, MagicSource, SigilError};

fn inputs() -> Vec<Vec<u8>> {
    vec![
        fixtures::pdf(),
        fixtures::png(),
        fixtures::gif(),
        fixtures::tar(),
        fixtures::elf64_exec(),
        fixtures::elf64_be_exec(),
        fixtures::gzip(&fixtures::png()),
        b"#!/bin/sh\necho hi\n".to_vec(),
        b"plain text\n".to_vec(),
        vec![0u8; 32],
    ]
}

fn load_error_kind(err: SigilError) -> LoadErrorKind {
    match err {
        SigilError::Load(e) => e.kind,
        other => panic!("expected a load error, got {other}"),
    }
}

#[test]
fn compiled_cache_classifies_like_the_text_rules() {
    let mut from_text = loaded_magic(MagicFlags::NONE);
    let compiled = from_text.compile(&[]).unwrap();
    assert!(compiled.starts_with(CACHE_MAGIC));

    let mut from_cache = Magic::open(MagicFlags::NONE);
    from_cache.load_buffers(&[&compiled]).unwrap();
    assert_eq!(
        from_cache.database().unwrap().len(),
        from_text.database().unwrap().len()
    );

    for flags in [MagicFlags::NONE, MagicFlags::MIME, MagicFlags::EXTENSION] {
        from_text.set_flags(flags);
        from_cache.set_flags(flags);
        for input in inputs() {
            assert_eq!(
                from_text.classify_buffer(&input).unwrap(),
                from_cache.classify_buffer(&input).unwrap(),
                "mode {}",
                flags.output_mode()
            );
        }
    }
}

#[test]
fn compile_to_path_and_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("default.sgl");

    let mut magic = Magic::open(MagicFlags::MIME_TYPE);
    magic.compile_to_path(&[], &out).unwrap();
    magic.load(&[MagicSource::path(&out)]).unwrap();
    assert_eq!(magic.classify_buffer(&fixtures::png()).unwrap(), "image/png");
}

#[test]
fn cache_and_text_sources_mix() {
    let mut magic = Magic::open(MagicFlags::NONE);
    let compiled = magic
        .compile(&[MagicSource::bytes("one", "0 string AB from cache\n")])
        .unwrap();
    magic
        .load_buffers(&[&compiled, b"0 string CD from text\n"])
        .unwrap();
    assert_eq!(magic.classify_buffer(b"AB\x00\x00").unwrap(), "from cache");
    assert_eq!(magic.classify_buffer(b"CD\x00\x00").unwrap(), "from text");
}

#[test]
fn version_mismatch_is_rejected() {
    let mut magic = Magic::open(MagicFlags::NONE);
    let mut compiled = magic.compile(&[]).unwrap();
    compiled[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());

    let err = magic.load_buffers(&[&compiled]).unwrap_err();
    assert_eq!(load_error_kind(err), LoadErrorKind::CacheVersion);
    assert!(magic.last_error().unwrap().contains("version"));
}

#[test]
fn corrupted_payload_is_rejected() {
    let mut magic = Magic::open(MagicFlags::NONE);
    let mut compiled = magic.compile(&[]).unwrap();
    let last = compiled.len() - 1;
    compiled[last] ^= 0xff;
    let err = magic.load_buffers(&[&compiled]).unwrap_err();
    assert_eq!(load_error_kind(err), LoadErrorKind::CacheChecksum);

    let truncated = &compiled[..10];
    let err = magic.load_buffers(&[truncated]).unwrap_err();
    assert_eq!(load_error_kind(err), LoadErrorKind::CacheCorrupt);
}

#[test]
fn list_and_check() {
    let mut magic = Magic::open(MagicFlags::CHECK);
    magic.check(&[]).unwrap();

    let listing = magic
        .list(&[MagicSource::bytes("t", "0 string %PDF- PDF document\n!:mime application/pdf\n")])
        .unwrap();
    assert!(listing.starts_with("# t\n"));
    assert!(listing.contains("[application/pdf]"));

    let err = magic
        .check(&[MagicSource::bytes("bad", "0 blong 1 nope\n")])
        .unwrap_err();
    assert_eq!(load_error_kind(err), LoadErrorKind::UnknownType);
}
