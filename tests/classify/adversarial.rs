use crate::common::fixtures;
use crate::common::test_utils::{loaded_magic, magic_with_rules};
use sigil::{MagicFlags, Param, SigilError};

const USE_LOOP: &str = "\
0 name loop
>0 byte x step
!:continue
>0 use loop
0 string L start
>0 use loop
";

const INDIRECT_LOOP: &str = "0 string IND loop\n>3 indirect x\n";

#[test]
fn self_referencing_use_terminates() {
    let mut magic = magic_with_rules(MagicFlags::NONE, USE_LOOP);
    let out = magic.classify_buffer(b"L\x00\x00\x00").unwrap();
    assert!(out.starts_with("start step step"));

    magic.set_param(Param::NameMax, 5).unwrap();
    magic.set_flags(MagicFlags::ERROR);
    let err = magic.classify_buffer(b"L\x00\x00\x00").unwrap_err();
    assert!(matches!(err, SigilError::NameRecursion { limit: 5, .. }), "{err}");
    assert!(magic.last_error().unwrap().contains("name recursion"));
    assert_eq!(magic.errno(), 0);
}

#[test]
fn self_referencing_indirect_terminates() {
    let data = b"IND".repeat(40);
    let mut magic = magic_with_rules(MagicFlags::NONE, INDIRECT_LOOP);
    let out = magic.classify_buffer(&data).unwrap();
    assert!(out.starts_with("loop loop"));

    magic.set_param(Param::IndirMax, 3).unwrap();
    assert_eq!(magic.get_param(Param::IndirMax), 3);
    magic.set_flags(MagicFlags::ERROR);
    let err = magic.classify_buffer(&data).unwrap_err();
    assert!(matches!(err, SigilError::IndirectionLimit { limit: 3 }), "{err}");
}

#[test]
fn wild_offsets_do_not_panic() {
    let rules = "\
0 lelong x
>(0.l*65536) byte x scaled
>(0.l+0x7fffffff) byte x shifted
>&-100 byte x behind
>-1 byte x from end %d
>0xffffffff string X far
>(4.L) byte x indirect past end
";
    let mut magic = magic_with_rules(MagicFlags::NONE, rules);
    for data in [
        b"\xff\xff\xff\xff\x01\x02".as_slice(),
        b"\x00\x00\x00\x80".as_slice(),
        b"\x10\x00".as_slice(),
    ] {
        magic.classify_buffer(data).unwrap();
    }
    assert_eq!(
        magic.classify_buffer(b"\xff\xff\xff\xff\x01\x07").unwrap(),
        "from end 7"
    );
}

#[test]
fn deep_nesting_is_evaluated_without_recursion() {
    let mut rules = String::from("0 byte x root\n");
    for level in 1..=200 {
        rules.push_str(&">".repeat(level));
        rules.push_str("0 byte x\n");
    }
    rules.push_str(&">".repeat(201));
    rules.push_str("0 byte x leaf\n");
    let mut magic = magic_with_rules(MagicFlags::NONE, &rules);
    assert_eq!(magic.classify_buffer(b"\x00\x01").unwrap(), "root leaf");
}

#[test]
fn rule_budget_bounds_evaluation() {
    let mut rules = String::new();
    for i in 0..100 {
        rules.push_str(&format!("0 byte x r{}\n", i));
    }
    let mut magic = magic_with_rules(MagicFlags::CONTINUE, &rules);
    magic.set_param(Param::RuleEvaluationsMax, 10).unwrap();
    let out = magic.classify_buffer(b"\x00\x01").unwrap();
    assert!(out.starts_with("r0\n- r1"));
    assert!(!out.contains("r10"));

    magic.set_flags(MagicFlags::CONTINUE | MagicFlags::ERROR);
    let err = magic.classify_buffer(b"\x00\x01").unwrap_err();
    assert!(matches!(err, SigilError::Budget { steps: 10 }), "{err}");
}

#[test]
fn window_cap_hides_far_data() {
    let rules = "100 string ZZ far marker\n";
    let mut data = vec![0u8; 128];
    data[100..102].copy_from_slice(b"ZZ");

    let mut magic = magic_with_rules(MagicFlags::NONE, rules);
    assert_eq!(magic.classify_buffer(&data).unwrap(), "far marker");
    magic.set_param(Param::BytesMax, 64).unwrap();
    assert_eq!(magic.classify_buffer(&data).unwrap(), "data");
}

#[test]
fn invalid_params_keep_previous_values() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    let before = magic.get_param(Param::BytesMax);
    assert!(magic.set_param(Param::BytesMax, 0).is_err());
    assert_eq!(magic.get_param(Param::BytesMax), before);
    assert!(magic.last_error().unwrap().contains("bytes_max"));
    assert!(magic.set_param(Param::NameMax, usize::MAX).is_err());
}

#[test]
fn truncated_inputs_never_fail() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    let samples = [
        fixtures::pdf(),
        fixtures::png(),
        fixtures::gif(),
        fixtures::tar(),
        fixtures::elf64_exec(),
        fixtures::gzip(&fixtures::tar()),
        fixtures::zstd(&fixtures::png()),
    ];
    for sample in &samples {
        for end in 0..sample.len().min(600) {
            let prefix = &sample[..end];
            if let Err(e) = magic.classify_buffer(prefix) {
                panic!("prefix of {} bytes failed: {e}", end);
            }
        }
    }
}

#[test]
fn pseudo_random_inputs_never_fail() {
    let mut magic = loaded_magic(MagicFlags::NONE);
    let mut state = 0x2545_f491_4f6c_dd1du64;
    for len in [2usize, 7, 64, 513, 4096] {
        for _ in 0..16 {
            let data: Vec<u8> = (0..len)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    state as u8
                })
                .collect();
            magic.classify_buffer(&data).unwrap();
        }
    }
}

#[test]
fn zip_bomb_output_is_capped() {
    let inner = vec![b'A'; 8 * 1024 * 1024];
    let bomb = fixtures::gzip(&inner);
    let mut magic = loaded_magic(MagicFlags::NONE);
    magic.set_param(Param::DecompressedMax, 4096).unwrap();
    let out = magic.classify_buffer(&bomb).unwrap();
    assert!(out.starts_with("ASCII text"), "{out}");
}
