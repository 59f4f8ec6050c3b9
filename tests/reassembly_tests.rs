//! Reassembler behaviour on hand-built archives: out-of-order records,
//! protocol violations and incomplete streams.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tempfile::tempdir;

use zwz::codec::deflate_chunk;
use zwz::extract::unpack_archive;
use zwz::format::write_record;
use zwz::verify::md5_hex_bytes as digest_hex;

struct Rec<'a> {
    path: &'a str,
    seq: u32,
    last: bool,
    raw: &'a [u8],
    digest: Option<String>,
}

fn build_archive(dir: &Path, name: &str, records: &[Rec]) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut out = File::create(&path).unwrap();
    for r in records {
        let payload = deflate_chunk(r.raw).unwrap();
        write_record(&mut out, r.path, r.seq, r.last, &payload, r.digest.as_deref()).unwrap();
    }
    out.flush().unwrap();
    path
}

#[test]
fn out_of_order_records_are_reordered_per_file() {
    let arch_dir = tempdir().unwrap();
    let content: Vec<u8> = (0..3000u32).map(|i| (i % 256) as u8).collect();
    let (c0, rest) = content.split_at(1000);
    let (c1, c2) = rest.split_at(1000);

    // The last chunk arrives before the middle one.
    let archive = build_archive(
        arch_dir.path(),
        "compressed_0.zwz",
        &[
            Rec { path: "f.bin", seq: 0, last: false, raw: c0, digest: None },
            Rec { path: "f.bin", seq: 2, last: true, raw: c2, digest: Some(digest_hex(&content)) },
            Rec { path: "f.bin", seq: 1, last: false, raw: c1, digest: None },
        ],
    );

    let out = tempdir().unwrap();
    let report = unpack_archive(&archive, out.path()).unwrap();
    assert_eq!(report.files_restored, 1);
    assert_eq!(report.digest_mismatches, 0);
    assert_eq!(report.corrupt_files, 0);
    assert_eq!(fs::read(out.path().join("f.bin")).unwrap(), content);
}

#[test]
fn interleaved_files_reassemble_independently() {
    let arch_dir = tempdir().unwrap();
    let a: Vec<u8> = vec![0xAA; 2000];
    let b: Vec<u8> = vec![0xBB; 2000];

    let archive = build_archive(
        arch_dir.path(),
        "compressed_0.zwz",
        &[
            Rec { path: "a.bin", seq: 0, last: false, raw: &a[..1000], digest: None },
            Rec { path: "b.bin", seq: 0, last: false, raw: &b[..1000], digest: None },
            Rec { path: "a.bin", seq: 1, last: true, raw: &a[1000..], digest: Some(digest_hex(&a)) },
            Rec { path: "b.bin", seq: 1, last: true, raw: &b[1000..], digest: Some(digest_hex(&b)) },
        ],
    );

    let out = tempdir().unwrap();
    let report = unpack_archive(&archive, out.path()).unwrap();
    assert_eq!(report.files_restored, 2);
    assert_eq!(fs::read(out.path().join("a.bin")).unwrap(), a);
    assert_eq!(fs::read(out.path().join("b.bin")).unwrap(), b);
}

#[test]
fn sequence_id_below_cursor_abandons_the_file() {
    let arch_dir = tempdir().unwrap();
    let data = vec![1u8; 500];

    let archive = build_archive(
        arch_dir.path(),
        "compressed_0.zwz",
        &[
            Rec { path: "dup.bin", seq: 0, last: false, raw: &data, digest: None },
            // Replays chunk 0 after it was written.
            Rec { path: "dup.bin", seq: 0, last: false, raw: &data, digest: None },
            Rec { path: "ok.bin", seq: 0, last: true, raw: &data, digest: Some(digest_hex(&data)) },
        ],
    );

    let out = tempdir().unwrap();
    let report = unpack_archive(&archive, out.path()).unwrap();
    assert_eq!(report.corrupt_files, 1);
    // The healthy sibling still comes through.
    assert_eq!(report.files_restored, 1);
    assert_eq!(fs::read(out.path().join("ok.bin")).unwrap(), data);
}

#[test]
fn duplicate_pending_chunk_abandons_the_file() {
    let arch_dir = tempdir().unwrap();
    let data = vec![2u8; 500];

    let archive = build_archive(
        arch_dir.path(),
        "compressed_0.zwz",
        &[
            Rec { path: "f.bin", seq: 0, last: false, raw: &data, digest: None },
            Rec { path: "f.bin", seq: 2, last: false, raw: &data, digest: None },
            Rec { path: "f.bin", seq: 2, last: false, raw: &data, digest: None },
        ],
    );

    let out = tempdir().unwrap();
    let report = unpack_archive(&archive, out.path()).unwrap();
    assert_eq!(report.corrupt_files, 1);
    assert_eq!(report.files_restored, 0);
}

#[test]
fn missing_last_chunk_is_reported_incomplete() {
    let arch_dir = tempdir().unwrap();
    let data = vec![3u8; 500];

    let archive = build_archive(
        arch_dir.path(),
        "compressed_0.zwz",
        &[Rec { path: "gap.bin", seq: 0, last: false, raw: &data, digest: None }],
    );

    let out = tempdir().unwrap();
    let report = unpack_archive(&archive, out.path()).unwrap();
    assert_eq!(report.files_restored, 0);
    assert_eq!(report.corrupt_files, 1);
}

#[test]
fn truncated_archive_is_a_format_error() {
    let arch_dir = tempdir().unwrap();
    let data = vec![4u8; 500];
    let archive = build_archive(
        arch_dir.path(),
        "compressed_0.zwz",
        &[Rec { path: "t.bin", seq: 0, last: true, raw: &data, digest: Some(digest_hex(&data)) }],
    );
    let bytes = fs::read(&archive).unwrap();
    fs::write(&archive, &bytes[..bytes.len() - 10]).unwrap();

    let out = tempdir().unwrap();
    assert!(unpack_archive(&archive, out.path()).is_err());
}
