//! # Decompression and Reassembly
//!
//! Reads every `.zwz` archive in a directory and rebuilds the original
//! tree. Archives are independent (each was written by one process over a
//! disjoint file set), so they are processed in parallel; within one
//! archive a single sequential pass reassembles files record by record.
//!
//! Per path the reassembler is a small state machine: the first record
//! opens the output file, in-order records are inflated and appended
//! immediately, records that arrive ahead of their turn wait in a reorder
//! buffer keyed by sequence id. The ordered writer already fixes a single
//! archive's records to be monotonic per file, so the buffer is a defensive
//! layer; it is what keeps a malformed or interleaved stream from writing
//! bytes at the wrong offset. Once a file's last chunk is down and nothing
//! is pending, the integrity gate compares digests and quarantines
//! mismatches.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use rayon::prelude::*;

use crate::codec;
use crate::error::ArchiverError;
use crate::format::{self, ArchiveRecord};
use crate::verify::{self, Verification};

/// Aggregated counters for one decompression run.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub archives: usize,
    pub files_restored: u64,
    pub digest_mismatches: u64,
    pub corrupt_files: u64,
}

impl ExtractReport {
    fn absorb(&mut self, other: &ExtractReport) {
        self.archives += other.archives;
        self.files_restored += other.files_restored;
        self.digest_mismatches += other.digest_mismatches;
        self.corrupt_files += other.corrupt_files;
    }
}

/// Decompress every `.zwz` archive found directly under `archive_dir` into
/// `output_dir`. `threads` bounds the archive-level parallelism
/// (0 = one thread per archive, capped by the global rayon pool).
pub fn run(
    archive_dir: &Path,
    output_dir: &Path,
    threads: usize,
) -> Result<ExtractReport, ArchiverError> {
    let mut archives = Vec::new();
    let listing =
        fs::read_dir(archive_dir).map_err(|e| ArchiverError::io(e, archive_dir))?;
    for entry in listing {
        let entry = entry.map_err(|e| ArchiverError::io(e, archive_dir))?;
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "zwz") {
            archives.push(path);
        }
    }
    archives.sort();
    if archives.is_empty() {
        warn!("no .zwz archives under {}", archive_dir.display());
        return Ok(ExtractReport::default());
    }

    fs::create_dir_all(output_dir).map_err(|e| ArchiverError::io(e, output_dir))?;
    println!(
        "[zwz] decompressing {} archives → {}",
        archives.len(),
        output_dir.display()
    );

    let run_all = || {
        archives
            .par_iter()
            .map(|archive| unpack_archive(archive, output_dir))
            .collect::<Vec<_>>()
    };
    let results = if threads == 0 {
        run_all()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ArchiverError::Config(e.to_string()))?;
        pool.install(run_all)
    };

    let mut report = ExtractReport::default();
    for result in results {
        report.absorb(&result?);
    }
    info!(
        "restored {} files ({} quarantined, {} corrupt)",
        report.files_restored, report.digest_mismatches, report.corrupt_files
    );
    Ok(report)
}

/// Reassembly state for one output file, created on the first record seen
/// for its path and dropped as soon as the file is closed and verified.
struct ReassemblyState {
    expected_sequence_id: u32,
    /// Records that arrived ahead of their turn, still compressed.
    pending: BTreeMap<u32, Vec<u8>>,
    out: BufWriter<File>,
    out_path: PathBuf,
    stored_digest: Option<String>,
    last_sequence_id: Option<u32>,
    /// Set when a chunk failed to inflate; the file is completed anyway and
    /// left to the integrity gate, which will quarantine it.
    inflate_failed: bool,
}

/// One sequential pass over a single archive.
pub fn unpack_archive(archive: &Path, output_dir: &Path) -> Result<ExtractReport, ArchiverError> {
    let file = File::open(archive).map_err(|e| ArchiverError::io(e, archive))?;
    let mut source = BufReader::new(file);

    let mut report = ExtractReport {
        archives: 1,
        ..ExtractReport::default()
    };
    let mut open_files: HashMap<String, ReassemblyState> = HashMap::new();
    // Paths whose reconstruction was abandoned; later records are ignored.
    let mut abandoned: HashSet<String> = HashSet::new();

    loop {
        let record = match format::read_record(&mut source) {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => {
                return Err(ArchiverError::Format {
                    archive: archive.to_path_buf(),
                    detail: e.to_string(),
                })
            }
        };
        if abandoned.contains(&record.relative_path) {
            continue;
        }
        handle_record(
            record,
            archive,
            output_dir,
            &mut open_files,
            &mut abandoned,
            &mut report,
        )?;
    }

    // Anything still open is missing chunks — incomplete archive.
    for (path, state) in open_files {
        warn!(
            "{}: file {} incomplete (next chunk {}, {} pending)",
            archive.display(),
            path,
            state.expected_sequence_id,
            state.pending.len()
        );
        report.corrupt_files += 1;
    }
    Ok(report)
}

fn handle_record(
    record: ArchiveRecord,
    archive: &Path,
    output_dir: &Path,
    open_files: &mut HashMap<String, ReassemblyState>,
    abandoned: &mut HashSet<String>,
    report: &mut ExtractReport,
) -> Result<(), ArchiverError> {
    let path = record.relative_path.clone();

    let state = match open_files.entry(path.clone()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(slot) => match open_output(output_dir, &path) {
            Ok(state) => slot.insert(state),
            Err(e) => {
                error!("cannot create output for {}: {}", path, e);
                abandoned.insert(path);
                report.corrupt_files += 1;
                return Ok(());
            }
        },
    };

    if record.is_last_chunk {
        state.stored_digest = record.digest.clone();
        state.last_sequence_id = Some(record.sequence_id);
    }

    if record.sequence_id == state.expected_sequence_id {
        append_chunk(state, &record.payload, record.sequence_id);
        state.expected_sequence_id += 1;
        // Drain everything that became contiguous.
        while let Some(payload) = state.pending.remove(&state.expected_sequence_id) {
            let sequence_id = state.expected_sequence_id;
            append_chunk(state, &payload, sequence_id);
            state.expected_sequence_id += 1;
        }
    } else if record.sequence_id > state.expected_sequence_id {
        if state.pending.contains_key(&record.sequence_id) {
            error!(
                "{}: duplicate chunk {} for {}; abandoning file",
                archive.display(),
                record.sequence_id,
                path
            );
            open_files.remove(&path);
            abandoned.insert(path);
            report.corrupt_files += 1;
            return Ok(());
        }
        state.pending.insert(record.sequence_id, record.payload);
    } else {
        // Sequence id below the write cursor: the stream violates the
        // per-file ordering contract.
        error!(
            "{}: chunk {} for {} arrived after chunk {} was written; abandoning file",
            archive.display(),
            record.sequence_id,
            path,
            state.expected_sequence_id,
        );
        open_files.remove(&path);
        abandoned.insert(path);
        report.corrupt_files += 1;
        return Ok(());
    }

    // Close once the last chunk is down and no gap remains.
    let done = state
        .last_sequence_id
        .map_or(false, |last| state.expected_sequence_id > last && state.pending.is_empty());
    if done {
        let state = open_files.remove(&path).expect("state is open");
        finish_file(state, report)?;
    }
    Ok(())
}

fn open_output(output_dir: &Path, relative_path: &str) -> Result<ReassemblyState, ArchiverError> {
    let out_path = output_dir.join(relative_path);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ArchiverError::io(e, parent))?;
    }
    let file = File::create(&out_path).map_err(|e| ArchiverError::io(e, &out_path))?;
    Ok(ReassemblyState {
        expected_sequence_id: 0,
        pending: BTreeMap::new(),
        out: BufWriter::new(file),
        out_path,
        stored_digest: None,
        last_sequence_id: None,
        inflate_failed: false,
    })
}

/// Inflate one payload and append it. An inflate failure (flipped bytes in
/// the archive) or a short write poisons the file rather than aborting the
/// run; the digest comparison at close time sends it to quarantine.
fn append_chunk(state: &mut ReassemblyState, payload: &[u8], sequence_id: u32) {
    let bytes = match codec::inflate_chunk(payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                "chunk {} of {} does not inflate: {}",
                sequence_id,
                state.out_path.display(),
                e
            );
            state.inflate_failed = true;
            return;
        }
    };
    if let Err(e) = state.out.write_all(&bytes) {
        warn!("write failure on {}: {}", state.out_path.display(), e);
        state.inflate_failed = true;
    }
}

fn finish_file(state: ReassemblyState, report: &mut ExtractReport) -> Result<(), ArchiverError> {
    let ReassemblyState {
        out,
        out_path,
        stored_digest,
        inflate_failed,
        ..
    } = state;
    let file = out
        .into_inner()
        .map_err(|e| ArchiverError::io(e.into_error(), &out_path))?;
    drop(file);

    let Some(stored_digest) = stored_digest else {
        // Last chunk without a digest never passes read_record; this guards
        // the state machine itself.
        error!("{}: closed without a stored digest", out_path.display());
        report.corrupt_files += 1;
        return Ok(());
    };
    if inflate_failed {
        info!(
            "{}: completed with undecodable chunks, deferring to digest check",
            out_path.display()
        );
    }
    match verify::verify_file(&out_path, &stored_digest)? {
        Verification::Match => {
            report.files_restored += 1;
        }
        Verification::Mismatch { .. } => {
            report.digest_mismatches += 1;
        }
    }
    Ok(())
}
