//! The size-sorted file manifest and the round-robin work partition.
//!
//! A manifest is a plain text file, one `relpath (size bytes)` line per
//! regular file under the input root, sorted by size descending. Sorting is
//! a load-balancing hint for the partition, not a correctness requirement.
//! Every cooperating process reads the same manifest and takes the entries
//! whose index it owns under `index % process_count == rank`.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::warn;
use walkdir::WalkDir;

use crate::error::ArchiverError;

/// Default manifest file name inside the output directory.
pub const MANIFEST_FILE_NAME: &str = "sorted_files_by_size.txt";

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the input root, '/'-separated.
    pub relpath: String,
    pub size: u64,
}

/// True iff the entry at `index` belongs to `rank` under the round-robin
/// partition. Ranks `0..process_count` together cover every index exactly
/// once.
pub fn is_assigned(index: usize, process_count: usize, rank: usize) -> bool {
    process_count != 0 && index % process_count == rank
}

/// The highest index in a listing of `len` entries that `is_assigned` gives
/// to `rank`, or `None` when the rank's slice is empty. Scans at most
/// `process_count` candidates from the tail.
pub fn last_assigned_index(len: usize, process_count: usize, rank: usize) -> Option<usize> {
    (0..len).rev().find(|&index| is_assigned(index, process_count, rank))
}

/// Walk `input_dir` and collect every regular file as a relative entry,
/// sorted by size descending (ties broken by path so the listing is
/// deterministic). Unreadable directory entries and non-UTF-8 names are
/// skipped with a warning.
pub fn collect_entries(input_dir: &Path) -> Result<Vec<FileEntry>, ArchiverError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(input_dir) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry under {}: {}", input_dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let rel = entry
            .path()
            .strip_prefix(input_dir)
            .unwrap_or(entry.path());
        let Some(relpath) = rel.to_str() else {
            warn!("skipping non-UTF-8 path {}", entry.path().display());
            continue;
        };
        entries.push(FileEntry {
            relpath: relpath.replace('\\', "/"),
            size: meta.len(),
        });
    }
    entries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.relpath.cmp(&b.relpath)));
    Ok(entries)
}

/// Write a manifest to `path`, creating parent directories as needed.
pub fn write_manifest(entries: &[FileEntry], path: &Path) -> Result<(), ArchiverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ArchiverError::io(e, parent))?;
    }
    let file = File::create(path).map_err(|e| ArchiverError::io(e, path))?;
    let mut out = BufWriter::new(file);
    for entry in entries {
        writeln!(out, "{} ({} bytes)", entry.relpath, entry.size)
            .map_err(|e| ArchiverError::io(e, path))?;
    }
    out.flush().map_err(|e| ArchiverError::io(e, path))
}

/// Read a manifest back. The ` (N bytes)` suffix is stripped the same way
/// the producer strips it; a line without one is taken as a bare path of
/// unknown size. Empty lines are ignored.
pub fn read_manifest(path: &Path) -> Result<Vec<FileEntry>, ArchiverError> {
    let file = File::open(path).map_err(|e| ArchiverError::io(e, path))?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ArchiverError::io(e, path))?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        entries.push(parse_line(line, line_no + 1)?);
    }
    Ok(entries)
}

fn parse_line(line: &str, line_no: usize) -> Result<FileEntry, ArchiverError> {
    let Some(open) = line.rfind(" (") else {
        return Ok(FileEntry {
            relpath: line.to_string(),
            size: 0,
        });
    };
    let (relpath, suffix) = line.split_at(open);
    if relpath.is_empty() {
        return Err(ArchiverError::Manifest {
            line: line_no,
            detail: "empty path".to_string(),
        });
    }
    let size = suffix
        .strip_prefix(" (")
        .and_then(|s| s.strip_suffix(" bytes)"))
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| ArchiverError::Manifest {
            line: line_no,
            detail: format!("bad size suffix '{}'", suffix),
        })?;
    Ok(FileEntry {
        relpath: relpath.to_string(),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_with_size_suffix() {
        let entry = parse_line("dir/file.bin (12345 bytes)", 1).unwrap();
        assert_eq!(entry.relpath, "dir/file.bin");
        assert_eq!(entry.size, 12345);
    }

    #[test]
    fn parse_line_with_parenthesised_name() {
        // Only the final " (N bytes)" suffix is the size.
        let entry = parse_line("notes (final).txt (99 bytes)", 1).unwrap();
        assert_eq!(entry.relpath, "notes (final).txt");
        assert_eq!(entry.size, 99);
    }

    #[test]
    fn parse_bare_path() {
        let entry = parse_line("plain.txt", 1).unwrap();
        assert_eq!(entry.relpath, "plain.txt");
        assert_eq!(entry.size, 0);
    }

    #[test]
    fn last_assigned_index_matches_the_partition() {
        assert_eq!(last_assigned_index(7, 2, 0), Some(6));
        assert_eq!(last_assigned_index(7, 2, 1), Some(5));
        assert_eq!(last_assigned_index(1, 2, 1), None);
        assert_eq!(last_assigned_index(0, 1, 0), None);
        assert_eq!(last_assigned_index(100, 5, 3), Some(98));
    }

    #[test]
    fn partition_covers_every_index_exactly_once() {
        for &process_count in &[1usize, 2, 5] {
            for &len in &[0usize, 1, 7, 100] {
                let mut owners = vec![0u32; len];
                for rank in 0..process_count {
                    for (index, owner) in owners.iter_mut().enumerate() {
                        if is_assigned(index, process_count, rank) {
                            *owner += 1;
                        }
                    }
                }
                assert!(owners.iter().all(|&n| n == 1), "P={process_count} len={len}");
            }
        }
    }
}
