//! End-to-end tests for the patch engine against synthetic images.
//!
//! Each test builds a fake libsmashhit.so in a temp directory: a
//! deterministic byte pattern big enough to cover every certified offset,
//! with the version tag planted where the real binary keeps it. That lets
//! the assertions check byte-for-byte which offsets a session touched.

use shpatch::catalog::{self, DEFAULT_KEY, KEY_BUFFER_LEN};
use shpatch::encode::{decode_cmp_imm, decode_mov_imm, CMP_IMM_MASK, MOV_IMM_MASK};
use shpatch::{apply_patches, AdvisoryKind, Error, PatchError, PatchOutcome, PatchSelection, Version};

/// Big enough to cover the highest certified offset (0x2119f8).
const IMAGE_SIZE: usize = 0x212000;

/// Where the dotted version string lives in both certified builds.
const TAG_OFFSET: usize = 0x1f38a0;

// 1.4.2 offsets the assertions below look at directly.
const BALLS_IMM_OFFSET: usize = 0x57cf4;
const BALLS_WORD_OFFSET: usize = 0x57ff8;
const FOV_OFFSET: usize = 0x1c945c;
const KEY_OFFSET: usize = 0x1f3ca8;
const VERTICAL_OFFSETS: [usize; 2] = [0x46828, 0x46a48];

// 1.4.3-only offsets.
const DECREMENT_IMM_OFFSET: usize = 0x57e0c;
const ROOMLENGTH_OFFSET: usize = 0x1c94c8;

/// Build an image filled with a deterministic non-zero pattern and the
/// given version tag, and write it to a temp file.
fn synthetic_image(tag: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let mut data: Vec<u8> = (0..IMAGE_SIZE).map(|i| (i * 31 + 7) as u8).collect();
    let mut tag_bytes = [0u8; 8];
    tag_bytes[..tag.len()].copy_from_slice(tag.as_bytes());
    data[TAG_OFFSET..TAG_OFFSET + 8].copy_from_slice(&tag_bytes);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libsmashhit.so");
    std::fs::write(&path, &data).unwrap();
    (dir, path)
}

fn read_image(path: &std::path::Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

/// Offsets whose bytes differ between two snapshots.
fn changed_offsets(before: &[u8], after: &[u8]) -> Vec<usize> {
    assert_eq!(before.len(), after.len());
    (0..before.len()).filter(|&i| before[i] != after[i]).collect()
}

#[test]
fn test_unsupported_version_writes_nothing() {
    let (_dir, path) = synthetic_image("9.9.9");
    let before = read_image(&path);

    let err = apply_patches(path.to_str().unwrap(), &[PatchSelection::enabled("antitamper")])
        .unwrap_err();
    match err {
        Error::VersionMismatch { found, supported } => {
            assert_eq!(found, "9.9.9");
            assert_eq!(supported, vec!["1.4.2", "1.4.3"]);
        }
        other => panic!("expected VersionMismatch, got {other:?}"),
    }

    assert_eq!(read_image(&path), before, "file must be byte-for-byte unchanged");
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.so");
    let err = apply_patches(path.to_str().unwrap(), &[PatchSelection::enabled("antitamper")])
        .unwrap_err();
    assert!(matches!(err, Error::Open { .. }));
}

#[test]
fn test_single_literal_patch_touches_only_its_offsets() {
    let (_dir, path) = synthetic_image("1.4.2");
    let before = read_image(&path);

    let report = apply_patches(path.to_str().unwrap(), &[PatchSelection::enabled("vertical")])
        .unwrap();
    assert_eq!(report.version, Version::V1_4_2);
    assert!(report.fully_applied());

    let after = read_image(&path);
    let expected: Vec<usize> = VERTICAL_OFFSETS
        .iter()
        .flat_map(|&o| o..o + 4)
        .filter(|&i| before[i] != after[i])
        .collect();
    let changed = changed_offsets(&before, &after);
    assert_eq!(changed, expected, "only the documented offsets may change");
    assert_eq!(&after[VERTICAL_OFFSETS[0]..VERTICAL_OFFSETS[0] + 4], b"\x47\x00\x00\x14");
    assert_eq!(&after[VERTICAL_OFFSETS[1]..VERTICAL_OFFSETS[1] + 4], b"\x1f\x20\x03\xd5");
}

#[test]
fn test_literal_patches_are_order_independent() {
    let (_dir_a, path_a) = synthetic_image("1.4.2");
    let (_dir_b, path_b) = synthetic_image("1.4.2");

    apply_patches(
        path_a.to_str().unwrap(),
        &[PatchSelection::enabled("encryption"), PatchSelection::enabled("vertical")],
    )
    .unwrap();
    apply_patches(
        path_b.to_str().unwrap(),
        &[PatchSelection::enabled("vertical"), PatchSelection::enabled("encryption")],
    )
    .unwrap();

    assert_eq!(read_image(&path_a), read_image(&path_b));
}

#[test]
fn test_key_patch_truncates_and_pads() {
    let (_dir, path) = synthetic_image("1.4.2");
    let long_key = "A".repeat(30);

    let report = apply_patches(
        path.to_str().unwrap(),
        &[PatchSelection::with_value("key", &long_key)],
    )
    .unwrap();

    match &report.entries[0].outcome {
        PatchOutcome::Warned(advisories) => {
            assert_eq!(advisories.len(), 1);
            assert_eq!(advisories[0].kind, AdvisoryKind::Truncated);
        }
        other => panic!("expected truncation advisory, got {other:?}"),
    }

    let after = read_image(&path);
    let stored = &after[KEY_OFFSET..KEY_OFFSET + KEY_BUFFER_LEN];
    assert_eq!(&stored[..KEY_BUFFER_LEN - 1], "A".repeat(23).as_bytes());
    assert_eq!(stored[KEY_BUFFER_LEN - 1], 0, "buffer always ends in NUL");
}

#[test]
fn test_key_patch_substitutes_default() {
    let (_dir, path) = synthetic_image("1.4.2");

    let report = apply_patches(path.to_str().unwrap(), &[PatchSelection::enabled("key")])
        .unwrap();

    match &report.entries[0].outcome {
        PatchOutcome::Warned(advisories) => {
            assert_eq!(advisories[0].kind, AdvisoryKind::DefaultSubstituted);
        }
        other => panic!("expected default-substitution advisory, got {other:?}"),
    }

    let after = read_image(&path);
    let stored = &after[KEY_OFFSET..KEY_OFFSET + KEY_BUFFER_LEN];
    assert_eq!(&stored[..DEFAULT_KEY.len()], DEFAULT_KEY.as_bytes());
    assert!(stored[DEFAULT_KEY.len()..].iter().all(|&b| b == 0));
}

#[test]
fn test_balls_patch_splices_immediate_and_word() {
    let (_dir, path) = synthetic_image("1.4.2");
    let before = read_image(&path);
    let old_word = u32::from_be_bytes(before[BALLS_IMM_OFFSET..BALLS_IMM_OFFSET + 4].try_into().unwrap());

    let report = apply_patches(
        path.to_str().unwrap(),
        &[PatchSelection::with_value("balls", "42")],
    )
    .unwrap();
    assert!(report.fully_applied());

    let after = read_image(&path);
    let new_word = u32::from_be_bytes(after[BALLS_IMM_OFFSET..BALLS_IMM_OFFSET + 4].try_into().unwrap());
    assert_eq!(decode_mov_imm(new_word), 42);
    assert_eq!(new_word & !MOV_IMM_MASK, old_word & !MOV_IMM_MASK,
        "opcode and register bits must survive the splice");

    assert_eq!(&after[BALLS_WORD_OFFSET..BALLS_WORD_OFFSET + 4], &42u32.to_le_bytes());
}

#[test]
fn test_missing_value_is_isolated() {
    let (_dir, path) = synthetic_image("1.4.2");
    let before = read_image(&path);

    let report = apply_patches(
        path.to_str().unwrap(),
        &[
            PatchSelection::enabled("balls"), // no value
            PatchSelection::enabled("vertical"),
        ],
    )
    .unwrap();

    match &report.entries[0].outcome {
        PatchOutcome::Failed(PatchError::MissingValue(name)) => assert_eq!(*name, "balls"),
        other => panic!("expected MissingValue, got {other:?}"),
    }
    assert!(report.entries[1].outcome.applied(), "siblings still run");

    let after = read_image(&path);
    assert_eq!(&after[BALLS_IMM_OFFSET..BALLS_IMM_OFFSET + 4],
        &before[BALLS_IMM_OFFSET..BALLS_IMM_OFFSET + 4],
        "failed patch must not write");
    assert_eq!(&after[BALLS_WORD_OFFSET..BALLS_WORD_OFFSET + 4],
        &before[BALLS_WORD_OFFSET..BALLS_WORD_OFFSET + 4]);
}

#[test]
fn test_unknown_patch_does_not_block_siblings() {
    let (_dir, path) = synthetic_image("1.4.2");

    let report = apply_patches(
        path.to_str().unwrap(),
        &[
            PatchSelection::enabled("warp"),
            PatchSelection::enabled("encryption"),
        ],
    )
    .unwrap();

    match &report.entries[0].outcome {
        PatchOutcome::Failed(PatchError::UnknownPatch(name)) => assert_eq!(name, "warp"),
        other => panic!("expected UnknownPatch, got {other:?}"),
    }
    assert!(report.entries[1].outcome.applied());
    assert!(!report.fully_applied());
}

#[test]
fn test_disabled_entry_is_skipped_without_writes() {
    let (_dir, path) = synthetic_image("1.4.2");
    let before = read_image(&path);

    let report = apply_patches(path.to_str().unwrap(), &[PatchSelection::disabled("premium")])
        .unwrap();
    assert!(matches!(report.entries[0].outcome, PatchOutcome::Skipped));
    assert_eq!(read_image(&path), before);
}

#[test]
fn test_fov_written_as_le_float() {
    let (_dir, path) = synthetic_image("1.4.2");

    apply_patches(path.to_str().unwrap(), &[PatchSelection::with_value("fov", "90.0")])
        .unwrap();

    let after = read_image(&path);
    assert_eq!(&after[FOV_OFFSET..FOV_OFFSET + 4], &90.0f32.to_le_bytes());
}

#[test]
fn test_premium_reports_licensing_notice() {
    let (_dir, path) = synthetic_image("1.4.2");

    let report = apply_patches(path.to_str().unwrap(), &[PatchSelection::enabled("premium")])
        .unwrap();
    let advisories: Vec<_> = report.advisories().collect();
    assert_eq!(advisories.len(), 1);
    assert_eq!(advisories[0].0, "premium");
    assert_eq!(advisories[0].1.kind, AdvisoryKind::Notice);
}

#[test]
fn test_143_superset_patches() {
    let (_dir, path) = synthetic_image("1.4.3");
    let before = read_image(&path);
    let old_word = u32::from_be_bytes(before[DECREMENT_IMM_OFFSET..DECREMENT_IMM_OFFSET + 4].try_into().unwrap());

    let report = apply_patches(
        path.to_str().unwrap(),
        &[
            PatchSelection::with_value("decrement", "2"),
            PatchSelection::with_value("roomlength", "8"),
        ],
    )
    .unwrap();
    assert_eq!(report.version, Version::V1_4_3);
    assert!(report.fully_applied());

    let after = read_image(&path);
    let new_word = u32::from_be_bytes(after[DECREMENT_IMM_OFFSET..DECREMENT_IMM_OFFSET + 4].try_into().unwrap());
    assert_eq!(decode_cmp_imm(new_word), 2);
    assert_eq!(new_word & !CMP_IMM_MASK, old_word & !CMP_IMM_MASK);

    // 8 seconds stored as the normalized 1/8 rate.
    assert_eq!(&after[ROOMLENGTH_OFFSET..ROOMLENGTH_OFFSET + 4], &0.125f32.to_le_bytes());
}

#[test]
fn test_143_only_patches_unknown_on_142() {
    let (_dir, path) = synthetic_image("1.4.2");

    let report = apply_patches(
        path.to_str().unwrap(),
        &[PatchSelection::with_value("roomlength", "8")],
    )
    .unwrap();
    assert!(matches!(
        report.entries[0].outcome,
        PatchOutcome::Failed(PatchError::UnknownPatch(_))
    ));
}

#[test]
fn test_invalid_values_are_soft_failures() {
    let (_dir, path) = synthetic_image("1.4.3");
    let before = read_image(&path);

    let report = apply_patches(
        path.to_str().unwrap(),
        &[
            PatchSelection::with_value("balls", "lots"),
            PatchSelection::with_value("roomlength", "0"),
        ],
    )
    .unwrap();

    for entry in &report.entries {
        assert!(
            matches!(entry.outcome, PatchOutcome::Failed(PatchError::InvalidValue { .. })),
            "expected InvalidValue for '{}'", entry.name
        );
    }
    assert_eq!(read_image(&path), before);
}

#[test]
fn test_every_catalog_patch_applies_cleanly() {
    for version in [Version::V1_4_2, Version::V1_4_3] {
        let (_dir, path) = synthetic_image(version.tag());
        let selections: Vec<PatchSelection> = catalog::catalog(version)
            .iter()
            .map(|d| match d.name {
                "key" => PatchSelection::with_value("key", "testkey"),
                "balls" => PatchSelection::with_value("balls", "5"),
                "decrement" => PatchSelection::with_value("decrement", "1"),
                "fov" => PatchSelection::with_value("fov", "75"),
                "roomlength" => PatchSelection::with_value("roomlength", "10"),
                name => PatchSelection::enabled(name),
            })
            .collect();

        let report = apply_patches(path.to_str().unwrap(), &selections).unwrap();
        assert!(report.fully_applied(), "all {version} patches should apply");
        assert_eq!(report.entries.len(), catalog::catalog(version).len());
    }
}
