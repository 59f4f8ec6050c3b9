//! The compression worker pool.
//!
//! N threads pull raw chunks from the bounded queue, deflate them and hand
//! the results to the ordered writer. Shutdown is data driven: the worker
//! that processes the terminal chunk posts a wake marker back onto the
//! queue, and every worker that pops the marker re-posts it before exiting,
//! so nobody stays blocked on an empty queue. A codec failure is fatal to
//! the whole process; the failing worker trips the writer's abort latch
//! (releasing siblings parked on their write turn) and leaves a wake marker
//! behind for siblings parked on the queue.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::chunk::Chunk;
use crate::codec;
use crate::error::ArchiverError;
use crate::queue::{ChunkReceiver, ChunkSender};
use crate::verify;
use crate::writer::OrderedWriter;

/// Body of one worker thread. Returns once the termination signal has been
/// observed, or with the error that brought the pipeline down.
pub fn run_worker(
    input_dir: &Path,
    queue: ChunkReceiver,
    marker_out: ChunkSender,
    writer: &OrderedWriter,
    chunks_compressed: &AtomicU64,
) -> Result<(), ArchiverError> {
    let result = worker_loop(input_dir, &queue, writer, chunks_compressed);
    // Wake marker for any sibling still blocked on an empty queue. The pop
    // preceding this exit freed a slot, and a full queue means nobody is
    // pop-blocked, so a non-blocking push is always enough.
    marker_out.try_push(Chunk::wake_marker());
    result
}

fn worker_loop(
    input_dir: &Path,
    queue: &ChunkReceiver,
    writer: &OrderedWriter,
    chunks_compressed: &AtomicU64,
) -> Result<(), ArchiverError> {
    loop {
        let Some(chunk) = queue.pop() else {
            // Producer gone and queue drained.
            return Ok(());
        };
        if chunk.is_wake_marker() {
            return Ok(());
        }
        let terminal = chunk.is_terminal();

        let compressed = match codec::deflate_chunk(&chunk.payload) {
            Ok(c) => c,
            Err(e) => {
                writer.abort();
                return Err(ArchiverError::Codec {
                    path: chunk.relative_path,
                    sequence_id: chunk.sequence_id,
                    source: e,
                });
            }
        };

        // The whole-file digest rides on the last chunk's record. The file
        // has been read to EOF by the producer at this point, so hashing it
        // from disk sees the same bytes the archive carries.
        let digest = if chunk.is_last_chunk {
            match verify::md5_hex(&input_dir.join(&chunk.relative_path)) {
                Ok(d) => Some(d),
                Err(e) => {
                    writer.abort();
                    return Err(e);
                }
            }
        } else {
            None
        };

        writer.submit(
            chunk.ordinal,
            &chunk.relative_path,
            chunk.sequence_id,
            chunk.is_last_chunk,
            &compressed,
            digest.as_deref(),
        )?;
        chunks_compressed.fetch_add(1, Ordering::Relaxed);
        debug!(
            "wrote record {} ({} chunk {})",
            chunk.ordinal, chunk.relative_path, chunk.sequence_id
        );

        if terminal {
            return Ok(());
        }
    }
}
