use crate::common::fixtures;
use crate::common::test_utils::{create_temp_file, create_temp_file_with_size, loaded_magic};
use sigil::{Magic, MagicFlags, MagicSource, SigilError};
use std::io::Cursor;

#[test]
fn regular_files() {
    let png = create_temp_file(&fixtures::png());
    let mut magic = loaded_magic(MagicFlags::MIME_TYPE);
    assert_eq!(magic.classify_file(png.path()).unwrap(), "image/png");

    let empty = create_temp_file(b"");
    assert_eq!(magic.classify_file(empty.path()).unwrap(), "inode/x-empty");
    magic.set_flags(MagicFlags::NONE);
    assert_eq!(magic.classify_file(empty.path()).unwrap(), "empty");
}

#[test]
fn large_files_are_read_through_the_window() {
    let zeros = create_temp_file_with_size(8 * 1024 * 1024, 0);
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(magic.classify_file(zeros.path()).unwrap(), "data");
}

#[test]
fn missing_file_sets_errno() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    let err = magic.classify_file("/nonexistent/sigil/input").unwrap_err();
    assert!(matches!(err, SigilError::Io { .. }));
    assert_eq!(magic.errno(), 2);
    assert!(magic.last_error().unwrap().contains("/nonexistent/sigil/input"));

    magic.classify_buffer(b"ok\n").unwrap();
    assert_eq!(magic.errno(), 0);
    assert!(magic.last_error().is_none());
}

#[test]
fn directories() {
    let dir = tempfile::tempdir().unwrap();
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(magic.classify_file(dir.path()).unwrap(), "directory");
    magic.set_flags(MagicFlags::MIME);
    assert_eq!(
        magic.classify_file(dir.path()).unwrap(),
        "inode/directory; charset=binary"
    );
}

#[cfg(unix)]
#[test]
fn symlinks_are_reported_unless_followed() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("image.png");
    std::fs::write(&target, fixtures::png()).unwrap();
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(
        magic.classify_file(&link).unwrap(),
        format!("symbolic link to {}", target.display())
    );

    magic.set_flags(MagicFlags::SYMLINK | MagicFlags::MIME_TYPE);
    assert_eq!(magic.classify_file(&link).unwrap(), "image/png");

    let dangling = dir.path().join("dangling");
    std::os::unix::fs::symlink(dir.path().join("missing"), &dangling).unwrap();
    magic.set_flags(MagicFlags::SYMLINK);
    assert!(magic
        .classify_file(&dangling)
        .unwrap()
        .starts_with("broken symbolic link to "));
}

#[cfg(unix)]
#[test]
fn sockets_are_special_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sock");
    let _listener = std::os::unix::net::UnixListener::bind(&path).unwrap();
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(magic.classify_file(&path).unwrap(), "socket");
}

#[cfg(target_os = "linux")]
#[test]
fn character_devices() {
    let null = std::path::Path::new("/dev/null");
    if !null.exists() {
        return;
    }
    let mut magic = loaded_magic(MagicFlags::NONE);
    assert_eq!(magic.classify_file(null).unwrap(), "character special (1/3)");
    magic.set_flags(MagicFlags::DEVICES);
    assert_eq!(magic.classify_file(null).unwrap(), "empty");
}

#[test]
fn readers_and_buffers_agree() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    for input in [fixtures::pdf(), fixtures::gif(), b"hello world\n".to_vec()] {
        let from_buffer = magic.classify_buffer(&input).unwrap();
        let from_reader = magic.classify_reader(Cursor::new(input.clone())).unwrap();
        assert_eq!(from_buffer, from_reader);
    }
}

#[cfg(unix)]
#[test]
fn descriptors_stay_open() {
    use std::io::{Seek, SeekFrom, Write};

    let mut file = tempfile::tempfile().unwrap();
    file.write_all(&fixtures::gif()).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    let mut magic = loaded_magic(MagicFlags::MIME_TYPE);
    assert_eq!(magic.classify_descriptor(&file).unwrap(), "image/gif");

    file.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(magic.classify_descriptor(&file).unwrap(), "image/gif");
}

#[test]
fn preserve_atime_does_not_change_results() {
    let gif = create_temp_file(&fixtures::gif());
    let mut magic = loaded_magic(MagicFlags::PRESERVE_ATIME | MagicFlags::MIME_TYPE);
    assert_eq!(magic.classify_file(gif.path()).unwrap(), "image/gif");
}

#[test]
fn magic_files_load_from_disk() {
    let rules = create_temp_file(b"0 string SGL sigil test data\n!:mime application/x-sigil-test\n");
    let mut magic = Magic::open(MagicFlags::MIME_TYPE);
    magic.load(&[MagicSource::path(rules.path())]).unwrap();
    assert_eq!(magic.classify_buffer(b"SGL\x00").unwrap(), "application/x-sigil-test");

    let err = magic
        .load(&[MagicSource::path("/nonexistent/rules.magic")])
        .unwrap_err();
    assert_eq!(err.errno(), 2);
    assert_eq!(magic.errno(), 2);
    assert_eq!(magic.classify_buffer(b"SGL\x00").unwrap(), "application/x-sigil-test");
}

#[test]
fn raw_flag_bits_are_validated() {
    assert!(Magic::open_raw(MagicFlags::MIME.bits()).is_ok());
    assert!(matches!(
        Magic::open_raw(0x8000_0000),
        Err(SigilError::InvalidFlags { bits: 0x8000_0000 })
    ));
    let mut magic = Magic::open(MagicFlags::MIME_TYPE);
    assert!(magic.set_flags_raw(0x4000_0000).is_err());
    assert_eq!(magic.flags(), MagicFlags::MIME_TYPE);
}
