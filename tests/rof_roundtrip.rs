mod common;

use std::fs;
use std::io::Cursor;
use crimson_convert::Error;
use crimson_convert::bm;
use crimson_convert::rof::{RofEntry, RofFile};
use common::{build_rof, compressed, corrupt, dir, file};

fn sample_archive() -> Vec<u8> {
    build_rof(&[
        file("readme.txt", b"hello rof"),
        dir("models", vec![
            compressed("fury.msh", &[7; 300]),
            dir("empty", vec![]),
            dir("deep", vec![file("leaf.bin", &[0, 1, 2, 3, 255])]),
        ]),
        compressed("sounds.lst", b"engine.wav\ngun.wav\n"),
    ])
}

fn read(bytes: Vec<u8>, name: &str) -> (RofFile<Cursor<Vec<u8>>>, RofEntry) {
    let mut rof = RofFile::new(Cursor::new(bytes));
    let root = rof.read_tree(RofEntry::root(name, 0)).unwrap();
    (rof, root)
}

#[test]
fn extracts_nested_tree_byte_exact() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("rof_output");
    let (mut rof, root) = read(sample_archive(), "rof_output");

    let report = rof.write_tree(&root, &out).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.files_written, 4);
    assert_eq!(report.dirs_created, 4);

    assert_eq!(fs::read(out.join("readme.txt")).unwrap(), b"hello rof");
    assert_eq!(fs::read(out.join("models/fury.msh")).unwrap(), vec![7_u8; 300]);
    assert_eq!(fs::read(out.join("models/deep/leaf.bin")).unwrap(), [0_u8, 1, 2, 3, 255]);
    assert_eq!(fs::read(out.join("sounds.lst")).unwrap(), b"engine.wav\ngun.wav\n");
    assert!(out.join("models/empty").is_dir());
    assert_eq!(fs::read_dir(out.join("models/empty")).unwrap().count(), 0);
}

#[test]
fn tree_mirrors_directory_structure() {
    let (_, root) = read(sample_archive(), "out");
    let paths = root.walk().into_iter().map(|(p, _)| p).collect::<Vec<_>>();
    assert_eq!(paths, [
        "readme.txt",
        "models",
        "models/fury.msh",
        "models/empty",
        "models/deep",
        "models/deep/leaf.bin",
        "sounds.lst",
    ]);

    let fury = root.find("MODELS/Fury.msh").unwrap();
    assert!(fury.is_compressed);
    assert_eq!(fury.length_on_disk, 300);
    assert_eq!(root.file_count(), 4);
}

#[test]
fn existing_output_is_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("rof_output");
    fs::create_dir_all(out.join("stale")).unwrap();
    fs::write(out.join("stale/old.txt"), b"old").unwrap();

    let (mut rof, root) = read(sample_archive(), "rof_output");
    rof.write_tree(&root, &out).unwrap();
    assert!(!out.join("stale").exists());
    assert!(out.join("readme.txt").is_file());
}

#[test]
fn bad_entries_do_not_stop_siblings() {
    let bytes = build_rof(&[
        file("first.txt", b"1"),
        corrupt("broken.dat", b"this is not zlib"),
        dir("../escape", vec![file("x", b"x")]),
        file("last.txt", b"2"),
    ]);
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let (mut rof, root) = read(bytes, "out");

    let report = rof.write_tree(&root, &out).unwrap();
    assert_eq!(report.files_written, 2);
    assert_eq!(report.failures.len(), 2);
    assert!(matches!(report.failures[0].error, Error::Decompress { .. }));
    assert_eq!(report.failures[0].path, out.join("broken.dat"));
    assert!(matches!(report.failures[1].error, Error::Archive(_)));

    assert_eq!(fs::read(out.join("first.txt")).unwrap(), b"1");
    assert_eq!(fs::read(out.join("last.txt")).unwrap(), b"2");
    assert!(!out.join("broken.dat").exists());
    assert!(!tmp.path().join("escape").exists());
}

#[test]
fn entries_past_the_end_fail_alone() {
    let mut bytes = build_rof(&[file("short.bin", &[1; 16]), file("ok.bin", b"ok")]);
    // Stretch the first record's length beyond the archive.
    let len_field = 8 + 4;
    bytes[len_field .. len_field + 4].copy_from_slice(&10_000_u32.to_le_bytes());

    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let (mut rof, root) = read(bytes, "out");
    let report = rof.write_tree(&root, &out).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, out.join("short.bin"));
    assert_eq!(fs::read(out.join("ok.bin")).unwrap(), b"ok");
}

#[test]
fn truncated_directory_is_rejected() {
    let mut bytes = sample_archive();
    bytes.truncate(20);
    let mut rof = RofFile::new(Cursor::new(bytes));
    let err = rof.read_tree(RofEntry::root("out", 0)).unwrap_err();
    assert!(matches!(err, Error::Archive(_)), "{}", err);
}

#[test]
fn archive_file_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("crimson.rof");
    fs::write(&archive, sample_archive()).unwrap();

    let mut rof = RofFile::new(fs::File::open(&archive).unwrap());
    let root = rof.read_tree(RofEntry::root("x", 0)).unwrap();
    let leaf = root.find("models/deep/leaf.bin").unwrap().clone();
    assert_eq!(rof.read_entry(&leaf).unwrap(), [0_u8, 1, 2, 3, 255]);
}

#[test]
fn extracted_bitmaps_convert_to_pngs() {
    // 1x1 bitmap: header, RGB base, three masks, RGBA specular.
    let mut paint = Vec::new();
    paint.extend_from_slice(&1_u16.to_le_bytes());
    paint.extend_from_slice(&1_u16.to_le_bytes());
    paint.extend_from_slice(&[10, 20, 30, 1, 2, 3, 40, 50, 60, 70]);
    let bytes = build_rof(&[
        dir("planes", vec![compressed("fury.bm", &paint), file("bad.bm", b"x")]),
    ]);

    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("rof_output");
    let (mut rof, root) = read(bytes, "rof_output");
    assert!(rof.write_tree(&root, &out).unwrap().is_clean());

    let report = bm::convert_tree(&out).unwrap();
    assert_eq!(report.converted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, out.join("planes/bad.bm"));
    for suffix in &["base", "color1", "color2", "color3", "specular"] {
        let png = out.join(format!("planes/fury-{}.png", suffix));
        assert_eq!(&fs::read(&png).unwrap()[1 .. 4], b"PNG");
    }
}
