use crate::common::fixtures;
use crate::common::test_utils::{loaded_magic, magic_with_rules};
use sigil::{EngineConfig, LoadErrorKind, Magic, MagicFlags, MagicSource, MatchConfig, SigilError};

#[test]
fn pdf_mime_type() {
    let mut magic = loaded_magic(MagicFlags::MIME_TYPE);
    assert_eq!(magic.classify_buffer(&fixtures::pdf()).unwrap(), "application/pdf");
}

#[test]
fn png_description_walks_sub_rules() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(
        magic.classify_buffer(&fixtures::png()).unwrap(),
        "PNG image data, 1 x 1, 8-bit/color RGBA, non-interlaced"
    );
}

#[test]
fn gif_description_prints_matched_string() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(
        magic.classify_buffer(&fixtures::gif()).unwrap(),
        "GIF image data, version 89a, 1 x 1"
    );
}

#[test]
fn empty_buffer() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(magic.classify_buffer(b"").unwrap(), "empty");
    magic.set_flags(MagicFlags::MIME);
    assert_eq!(magic.classify_buffer(b"").unwrap(), "application/x-empty; charset=binary");
}

#[test]
fn single_byte_is_too_short() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(magic.classify_buffer(b"\x7f").unwrap(), "very short file (no magic)");
}

#[test]
fn unrecognised_binary_falls_back_to_data() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(magic.classify_buffer(&[0u8, 1, 2, 3, 0xfe, 0xff]).unwrap(), "data");
    magic.set_flags(MagicFlags::MIME);
    assert_eq!(
        magic.classify_buffer(&[0u8, 1, 2, 3, 0xfe, 0xff]).unwrap(),
        "application/octet-stream; charset=binary"
    );
}

const VERSIONED: &str = "\
0 string VER versioned
>3 byte 1 \\b, v1
>3 byte <9 \\b, early
>3 byte x \\b (raw %d)
!:continue
>3 byte x \\b [tail]
";

#[test]
fn first_matching_sibling_wins_unless_marked() {
    let mut magic = magic_with_rules(MagicFlags::NONE, VERSIONED);
    assert_eq!(magic.classify_buffer(b"VER\x01").unwrap(), "versioned, v1");
    assert_eq!(magic.classify_buffer(b"VER\x03").unwrap(), "versioned, early");
    assert_eq!(magic.classify_buffer(b"VER\x20").unwrap(), "versioned (raw 32) [tail]");
}

#[test]
fn classic_sibling_matching_is_a_config_switch() {
    let config = EngineConfig {
        matching: MatchConfig { sub_rules_continue: true },
        ..EngineConfig::default()
    };
    let mut magic = Magic::open(MagicFlags::NONE).with_config(config).unwrap();
    magic.load_buffers(&[VERSIONED.as_bytes()]).unwrap();
    assert_eq!(
        magic.classify_buffer(b"VER\x01").unwrap(),
        "versioned, v1, early (raw 1) [tail]"
    );
}

#[test]
fn level_skip_is_reported_with_its_line() {
    let mut magic = Magic::open(MagicFlags::NONE);
    let err = magic
        .load_buffers(&[b"0 string AB first\n>>2 byte 0 skipped\n"])
        .unwrap_err();
    match err {
        SigilError::Load(e) => {
            assert_eq!(e.kind, LoadErrorKind::LevelSkip);
            assert_eq!(e.line, 2);
            assert_eq!(e.source_name, "<buffer 0>");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(magic.last_error().unwrap().contains("<buffer 0>:2"));
    assert!(magic.database().is_none());
}

#[test]
fn gzip_is_classified_by_its_contents() {
    let data = fixtures::gzip(&fixtures::png());

    let mut magic = loaded_magic(MagicFlags::MIME_TYPE);
    assert_eq!(magic.classify_buffer(&data).unwrap(), "image/png");

    magic.set_flags(MagicFlags::MIME_TYPE | MagicFlags::NO_CHECK_COMPRESS);
    assert_eq!(magic.classify_buffer(&data).unwrap(), "application/gzip");

    magic.set_flags(MagicFlags::NO_CHECK_COMPRESS);
    assert!(magic
        .classify_buffer(&data)
        .unwrap()
        .starts_with("gzip compressed data"));
}

#[test]
fn compress_flag_names_the_container() {
    let data = fixtures::gzip(&fixtures::png());

    let mut magic = loaded_magic(MagicFlags::COMPRESS);
    let desc = magic.classify_buffer(&data).unwrap();
    assert!(desc.starts_with("PNG image data, 1 x 1"), "{desc}");
    assert!(desc.ends_with("(gzip compressed data)"), "{desc}");

    magic.set_flags(MagicFlags::COMPRESS | MagicFlags::COMPRESS_TRANSP);
    let desc = magic.classify_buffer(&data).unwrap();
    assert_eq!(desc, "PNG image data, 1 x 1, 8-bit/color RGBA, non-interlaced");
}

#[test]
fn zstd_and_gzipped_tar() {
    let mut magic = loaded_magic(MagicFlags::MIME_TYPE);
    assert_eq!(
        magic.classify_buffer(&fixtures::zstd(&fixtures::pdf())).unwrap(),
        "application/pdf"
    );
    assert_eq!(
        magic.classify_buffer(&fixtures::gzip(&fixtures::tar())).unwrap(),
        "application/x-tar"
    );
}

#[test]
fn compressed_noise_reports_the_container() {
    let noise: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
    let mut magic = loaded_magic(MagicFlags::MIME_TYPE);
    assert_eq!(magic.classify_buffer(&fixtures::gzip(&noise)).unwrap(), "application/gzip");
}

#[test]
fn tar_checksum_is_validated() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(magic.classify_buffer(&fixtures::tar()).unwrap(), "POSIX tar archive");

    let mut broken = fixtures::tar();
    broken[0] = b'j';
    magic.set_flags(MagicFlags::NO_CHECK_SOFT);
    assert_eq!(magic.classify_buffer(&broken).unwrap(), "data");
}

#[test]
fn elf_uses_named_rules_in_both_byte_orders() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(
        magic.classify_buffer(&fixtures::elf64_exec()).unwrap(),
        "ELF 64-bit LSB executable, x86-64, version 1"
    );
    assert_eq!(
        magic.classify_buffer(&fixtures::elf64_be_exec()).unwrap(),
        "ELF 64-bit MSB executable, 64-bit PowerPC or cisco 7500, version 1"
    );

    magic.set_flags(MagicFlags::MIME_TYPE);
    assert_eq!(
        magic.classify_buffer(&fixtures::elf64_exec()).unwrap(),
        "application/x-executable"
    );
}

#[test]
fn text_formats() {
    let mut magic = loaded_magic(MagicFlags::MIME);
    assert_eq!(
        magic.classify_buffer(b"{\"name\": \"sigil\", \"tags\": [1, 2]}\n").unwrap(),
        "application/json; charset=us-ascii"
    );
    assert_eq!(
        magic.classify_buffer(b"a,b,c\n1,2,3\n4,5,6\n").unwrap(),
        "text/csv; charset=us-ascii"
    );
    assert_eq!(
        magic.classify_buffer(b"#!/bin/sh\necho hello\n").unwrap(),
        "text/x-shellscript; charset=us-ascii"
    );
    assert_eq!(
        magic.classify_buffer("caf\u{e9} cr\u{e8}me\n".as_bytes()).unwrap(),
        "text/plain; charset=utf-8"
    );

    magic.set_flags(MagicFlags::NONE);
    assert_eq!(
        magic.classify_buffer(b"line one\r\nline two\r\n").unwrap(),
        "ASCII text, with CRLF line terminators"
    );
    assert_eq!(magic.classify_buffer(b"a,b,c\n1,2,3\n").unwrap(), "CSV ASCII text");
}

#[test]
fn builtin_checks_can_be_disabled() {
    let json = b"[1, 2, 3]\n";
    let mut magic = loaded_magic(MagicFlags::MIME_TYPE);
    assert_eq!(magic.classify_buffer(json).unwrap(), "application/json");
    magic.set_flags(MagicFlags::MIME_TYPE | MagicFlags::NO_CHECK_JSON);
    assert_eq!(magic.classify_buffer(json).unwrap(), "text/plain");
    magic.set_flags(MagicFlags::MIME_TYPE | MagicFlags::NO_CHECK_JSON | MagicFlags::NO_CHECK_TEXT);
    assert_eq!(magic.classify_buffer(json).unwrap(), "application/octet-stream");
}

#[test]
fn mime_output_follows_the_grammar() {
    let inputs: Vec<Vec<u8>> = vec![
        fixtures::pdf(),
        fixtures::png(),
        fixtures::gif(),
        fixtures::tar(),
        b"hello\n".to_vec(),
        b"".to_vec(),
        vec![0u8; 64],
    ];
    let mut magic = loaded_magic(MagicFlags::MIME);
    for input in inputs {
        let out = magic.classify_buffer(&input).unwrap();
        let (mime, charset) = out.split_once("; charset=").unwrap_or_else(|| panic!("{out}"));
        let (top, sub) = mime.split_once('/').unwrap_or_else(|| panic!("{out}"));
        assert!(!top.is_empty() && !sub.is_empty(), "{out}");
        assert!(!charset.is_empty() && !charset.contains(char::is_whitespace), "{out}");
    }
}

#[test]
fn output_modes() {
    let png = fixtures::png();
    let mut magic = loaded_magic(MagicFlags::EXTENSION);
    assert_eq!(magic.classify_buffer(&png).unwrap(), "png");
    assert_eq!(magic.classify_buffer(&[0u8; 16]).unwrap(), "???");

    magic.set_flags(MagicFlags::APPLE);
    assert_eq!(magic.classify_buffer(&png).unwrap(), "8BIMPNGf");
    assert_eq!(magic.classify_buffer(&fixtures::pdf()).unwrap(), "UNKNUNKN");

    magic.set_flags(MagicFlags::MIME_ENCODING);
    assert_eq!(magic.classify_buffer(&png).unwrap(), "binary");
    assert_eq!(magic.classify_buffer(b"plain\n").unwrap(), "us-ascii");
}

#[test]
fn continue_reports_every_top_level_match() {
    let rules = "0 string AB starts with AB\n0 byte 0x41 first byte A\n0 string XY never\n";
    let mut magic = magic_with_rules(MagicFlags::NONE, rules);
    assert_eq!(magic.classify_buffer(b"AB\x00\x01").unwrap(), "starts with AB");
    magic.set_flags(MagicFlags::CONTINUE);
    assert_eq!(
        magic.classify_buffer(b"AB\x00\x01").unwrap(),
        "starts with AB\n- first byte A"
    );
}

#[test]
fn later_sources_add_branches() {
    let mut magic = Magic::open(MagicFlags::NONE);
    magic
        .load(&[
            MagicSource::bytes("first", "0 string AB from first\n"),
            MagicSource::bytes("second", "0 string AB from second\n0 string CD only second\n"),
        ])
        .unwrap();
    assert_eq!(magic.classify_buffer(b"AB\x00\x00").unwrap(), "from first");
    assert_eq!(magic.classify_buffer(b"CD\x00\x00").unwrap(), "only second");
}
