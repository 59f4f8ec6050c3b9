//! # Compression Pipeline
//!
//! Orchestrates one process's share of an archive run: build or load the
//! size-sorted manifest, then wire the producer, the bounded chunk queue,
//! the worker pool and the ordered writer together under one thread scope.
//! Each cooperating process owns a disjoint round-robin slice of the
//! manifest and its own output archive; there is no shared state between
//! processes beyond the manifest file itself.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use log::info;

use crate::chunk::QUEUE_CAPACITY;
use crate::codec;
use crate::error::ArchiverError;
use crate::manifest::{self, MANIFEST_FILE_NAME};
use crate::producer;
use crate::queue::bounded_chunk_queue;
use crate::verify;
use crate::workers;
use crate::writer::OrderedWriter;

/// Holds all configuration options for a compression operation.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Number of worker threads. [0 = auto-detect based on CPU cores]
    pub threads: usize,
    /// Rank of this process in a cooperating multi-process run.
    pub rank: usize,
    /// Total number of cooperating processes.
    pub process_count: usize,
    /// Use a pre-built manifest instead of scanning the input directory.
    /// Required for ranks other than 0 so every process sees one listing.
    pub manifest: Option<PathBuf>,
    /// Embed the manifest as the first record of rank 0's archive.
    pub embed_manifest: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        CompressOptions {
            threads: 0,
            rank: 0,
            process_count: 1,
            manifest: None,
            embed_manifest: false,
        }
    }
}

/// Counters from one finished compression run.
#[derive(Debug)]
pub struct CompressReport {
    pub archive_path: PathBuf,
    pub records_written: u64,
    pub files_assigned: u64,
    pub files_skipped: u64,
    pub chunks_produced: u64,
}

/// Compress this rank's slice of `input_dir` into
/// `<output_dir>/compressed_<rank>.zwz`.
pub fn run(
    input_dir: &Path,
    output_dir: &Path,
    opts: &CompressOptions,
) -> Result<CompressReport, ArchiverError> {
    if opts.process_count == 0 {
        return Err(ArchiverError::Config("process count must be at least 1".into()));
    }
    if opts.rank >= opts.process_count {
        return Err(ArchiverError::Config(format!(
            "rank {} out of range for {} processes",
            opts.rank, opts.process_count
        )));
    }
    fs::create_dir_all(output_dir).map_err(|e| ArchiverError::io(e, output_dir))?;

    let manifest_path = match &opts.manifest {
        Some(path) => path.clone(),
        None => {
            let entries = manifest::collect_entries(input_dir)?;
            let path = output_dir.join(MANIFEST_FILE_NAME);
            manifest::write_manifest(&entries, &path)?;
            path
        }
    };
    let entries = manifest::read_manifest(&manifest_path)?;

    let num_workers = if opts.threads == 0 {
        num_cpus::get().max(1)
    } else {
        opts.threads
    };
    let archive_path = output_dir.join(format!("compressed_{}.zwz", opts.rank));
    let writer = OrderedWriter::create(&archive_path)?;

    if opts.embed_manifest && opts.rank == 0 {
        embed_manifest_record(&writer, &manifest_path)?;
    }

    println!(
        "[zwz] rank {}/{}: {} listed files, {} workers → {}",
        opts.rank,
        opts.process_count,
        entries.len(),
        num_workers,
        archive_path.display()
    );

    let (tx, rx) = bounded_chunk_queue(QUEUE_CAPACITY.max(num_workers));
    let chunks_compressed = AtomicU64::new(0);

    let (producer_report, worker_results) = thread::scope(|s| {
        let mut worker_handles = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let worker_rx = rx.clone();
            let marker_tx = tx.clone();
            let writer = &writer;
            let chunks_compressed = &chunks_compressed;
            worker_handles.push(s.spawn(move || {
                workers::run_worker(input_dir, worker_rx, marker_tx, writer, chunks_compressed)
            }));
        }
        // The producer owns the original sender; dropping the local receiver
        // leaves the workers as the only consumers, so a dead pool unblocks
        // the producer instead of stalling it.
        let entries = &entries;
        let producer_handle =
            s.spawn(move || producer::run(input_dir, entries, opts.rank, opts.process_count, tx));
        drop(rx);

        let report = producer_handle.join().unwrap();
        let results: Vec<_> = worker_handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        (report, results)
    });

    for result in worker_results {
        result?;
    }
    let records_written = writer.finalize()?;
    info!(
        "rank {}: {} chunks compressed, {} records in {}",
        opts.rank,
        chunks_compressed.load(Ordering::Relaxed),
        records_written,
        archive_path.display()
    );

    Ok(CompressReport {
        archive_path,
        records_written,
        files_assigned: producer_report.files_assigned,
        files_skipped: producer_report.files_skipped,
        chunks_produced: producer_report.chunks_produced,
    })
}

/// Compress the manifest file itself into a single leading record so the
/// listing travels inside the archive. Decompression rebuilds it like any
/// other file.
fn embed_manifest_record(
    writer: &OrderedWriter,
    manifest_path: &Path,
) -> Result<(), ArchiverError> {
    let bytes = fs::read(manifest_path).map_err(|e| ArchiverError::io(e, manifest_path))?;
    let name = manifest_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(MANIFEST_FILE_NAME)
        .to_string();
    let payload = codec::deflate_chunk(&bytes).map_err(|e| ArchiverError::Codec {
        path: name.clone(),
        sequence_id: 0,
        source: e,
    })?;
    let digest = verify::md5_hex(manifest_path)?;
    writer.write_preamble(&name, &payload, &digest)
}
