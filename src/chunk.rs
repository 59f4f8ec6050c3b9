//! In-memory chunk types shared by the producer, the worker pool and the
//! ordered writer.

/// Size of one raw chunk read from a source file. The same constant bounds
/// the decode-side buffers, so both halves of the pipeline agree on framing.
pub const CHUNK_SIZE: usize = 65535;

/// Capacity of the producer → worker queue. Must stay at or above the worker
/// count so every worker can hold a chunk while the producer keeps reading.
pub const QUEUE_CAPACITY: usize = 16;

/// One raw chunk travelling from the producer to a worker. Payloads are
/// owned heap buffers and are moved, never copied, across the queue.
#[derive(Debug)]
pub struct Chunk {
    /// Process-global production index; the ordered writer's turn token.
    /// Never serialized.
    pub ordinal: u64,
    /// 0-based index of this chunk within its source file.
    pub sequence_id: u32,
    /// Path of the source file relative to the input root. Empty only on a
    /// wake marker.
    pub relative_path: String,
    /// Raw bytes read from the source file, at most `CHUNK_SIZE` of them.
    pub payload: Vec<u8>,
    /// True iff this is the final chunk of `relative_path`.
    pub is_last_chunk: bool,
    /// True iff `relative_path` is the last file this process will produce.
    pub is_last_file: bool,
}

impl Chunk {
    /// The chunk that tells the worker pool no more input is coming.
    pub fn is_terminal(&self) -> bool {
        self.is_last_file && self.is_last_chunk
    }

    /// A payload-less termination signal. The worker that handles the real
    /// terminal chunk posts one of these so workers still blocked on an
    /// empty queue wake up; each receiver re-posts it before exiting. Wake
    /// markers are never written to the archive.
    pub fn wake_marker() -> Self {
        Chunk {
            ordinal: 0,
            sequence_id: 0,
            relative_path: String::new(),
            payload: Vec::new(),
            is_last_chunk: true,
            is_last_file: true,
        }
    }

    pub fn is_wake_marker(&self) -> bool {
        self.relative_path.is_empty()
    }
}
