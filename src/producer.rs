//! The single producer thread.
//!
//! Walks this rank's slice of the manifest in recorded order, slices each
//! file into `CHUNK_SIZE` windows and pushes them onto the bounded queue.
//! An unreadable source file is skipped, never fatal. Termination is data
//! driven: the final chunk of the rank's last assigned file carries
//! `is_last_file`, which is how the workers learn no more input is coming.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{error, info, warn};

use crate::chunk::{Chunk, CHUNK_SIZE};
use crate::manifest::{self, FileEntry};
use crate::queue::ChunkSender;

/// Counters reported when the producer finishes.
#[derive(Debug, Default)]
pub struct ProducerReport {
    pub files_assigned: u64,
    pub files_skipped: u64,
    pub chunks_produced: u64,
}

/// Read every assigned file and feed the queue. Runs on its own thread;
/// blocks on the queue when the compression stage falls behind and stops
/// early if the worker pool has torn down.
pub fn run(
    input_dir: &Path,
    entries: &[FileEntry],
    rank: usize,
    process_count: usize,
    queue: ChunkSender,
) -> ProducerReport {
    let mut report = ProducerReport::default();
    let mut ordinal = 0u64;
    let last_assigned = manifest::last_assigned_index(entries.len(), process_count, rank);
    let mut terminal_sent = false;

    for (index, entry) in entries.iter().enumerate() {
        if !manifest::is_assigned(index, process_count, rank) {
            continue;
        }
        report.files_assigned += 1;
        let is_last_assignment = Some(index) == last_assigned;

        let full_path = input_dir.join(&entry.relpath);
        let source = match File::open(&full_path) {
            Ok(f) => f,
            Err(e) => {
                error!("skipping unreadable source {}: {}", full_path.display(), e);
                report.files_skipped += 1;
                continue;
            }
        };
        let mut source = BufReader::new(source);

        let mut sequence_id = 0u32;
        loop {
            let mut payload = vec![0u8; CHUNK_SIZE];
            let n = match read_window(&mut source, &mut payload) {
                Ok(n) => n,
                Err(e) => {
                    error!(
                        "read failure on {} at chunk {}: {}; abandoning file",
                        full_path.display(),
                        sequence_id,
                        e
                    );
                    report.files_skipped += 1;
                    break;
                }
            };
            payload.truncate(n);
            let is_last_chunk = n < CHUNK_SIZE;
            let is_last_file = is_last_chunk && is_last_assignment;

            let accepted = queue.push(Chunk {
                ordinal,
                sequence_id,
                relative_path: entry.relpath.clone(),
                payload,
                is_last_chunk,
                is_last_file,
            });
            if !accepted {
                warn!("rank {}: worker pool gone, producer stopping early", rank);
                return report;
            }
            ordinal += 1;
            sequence_id += 1;
            report.chunks_produced += 1;

            if is_last_chunk {
                if is_last_file {
                    terminal_sent = true;
                }
                break;
            }
        }

        if terminal_sent {
            break;
        }
    }

    // The natural terminal chunk never went out (last file unreadable, or
    // nothing assigned to this rank) — post a bare wake marker so the
    // workers still observe termination.
    if !terminal_sent {
        queue.push(Chunk::wake_marker());
    }

    info!(
        "rank {}: produced {} chunks from {} files ({} skipped)",
        rank, report.chunks_produced, report.files_assigned, report.files_skipped
    );
    report
}

/// Fill `buf` from `source`; a short count means end of file. A file whose
/// size is an exact multiple of `CHUNK_SIZE` therefore yields one trailing
/// empty chunk, and an empty file yields exactly one.
fn read_window<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
