//! A flipped byte inside a compressed payload must quarantine exactly the
//! affected file and leave its siblings intact.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;

use tempfile::tempdir;

use zwz::compress::{self, CompressOptions};
use zwz::extract;
use zwz::format::{read_record, write_record};

fn write_patterned(dir: &Path, name: &str, len: usize) -> Vec<u8> {
    let data: Vec<u8> = (0..len).map(|i| (i * 13 % 256) as u8).collect();
    File::create(dir.join(name)).unwrap().write_all(&data).unwrap();
    data
}

/// Rewrite `archive`, XOR-flipping one payload byte of the first record
/// whose path is `victim`.
fn flip_payload_byte(archive: &Path, victim: &str) {
    let mut source = BufReader::new(File::open(archive).unwrap());
    let mut records = Vec::new();
    while let Some(r) = read_record(&mut source).unwrap() {
        records.push(r);
    }
    drop(source);

    let mut flipped = false;
    let mut out = File::create(archive).unwrap();
    for mut r in records {
        if !flipped && r.relative_path == victim {
            let mid = r.payload.len() / 2;
            r.payload[mid] ^= 0xFF;
            flipped = true;
        }
        write_record(
            &mut out,
            &r.relative_path,
            r.sequence_id,
            r.is_last_chunk,
            &r.payload,
            r.digest.as_deref(),
        )
        .unwrap();
    }
    assert!(flipped, "victim record not found in archive");
}

#[test]
fn flipped_payload_byte_quarantines_only_the_victim() {
    let src = tempdir().unwrap();
    let good_a = write_patterned(src.path(), "good_a.bin", 120_000);
    write_patterned(src.path(), "victim.bin", 50_000);
    let good_b = write_patterned(src.path(), "good_b.bin", 3_000);

    let arch = tempdir().unwrap();
    compress::run(src.path(), arch.path(), &CompressOptions::default()).unwrap();
    flip_payload_byte(&arch.path().join("compressed_0.zwz"), "victim.bin");

    let out = tempdir().unwrap();
    let report = extract::run(arch.path(), out.path(), 0).unwrap();
    assert_eq!(report.digest_mismatches, 1);
    assert_eq!(report.files_restored, 2);

    // The victim sits in bad/ beside its intended location, not deleted.
    assert!(!out.path().join("victim.bin").exists());
    assert!(out.path().join("bad").join("victim.bin").exists());

    assert_eq!(fs::read(out.path().join("good_a.bin")).unwrap(), good_a);
    assert_eq!(fs::read(out.path().join("good_b.bin")).unwrap(), good_b);
}

#[test]
fn corrupt_file_in_subdirectory_quarantines_beside_itself() {
    let src = tempdir().unwrap();
    fs::create_dir_all(src.path().join("nested")).unwrap();
    write_patterned(&src.path().join("nested"), "victim.bin", 10_000);
    write_patterned(src.path(), "plain.bin", 10_000);

    let arch = tempdir().unwrap();
    compress::run(src.path(), arch.path(), &CompressOptions::default()).unwrap();
    flip_payload_byte(&arch.path().join("compressed_0.zwz"), "nested/victim.bin");

    let out = tempdir().unwrap();
    let report = extract::run(arch.path(), out.path(), 0).unwrap();
    assert_eq!(report.digest_mismatches, 1);
    assert!(out
        .path()
        .join("nested")
        .join("bad")
        .join("victim.bin")
        .exists());
    assert!(out.path().join("plain.bin").exists());
}
