//! Bounded producer → worker chunk queue.
//!
//! A thin wrapper over a `crossbeam_channel::bounded` pair: `push` blocks the
//! producer while the queue is full, `pop` blocks a worker while it is
//! empty. The fixed capacity is the pipeline's backpressure mechanism — a
//! slow compression stage throttles the reader automatically.
//!
//! The two halves are separate handles so that channel disconnection doubles
//! as a teardown signal: when every worker has exited (normally or after a
//! fatal error) the producer's next `push` reports failure instead of
//! blocking forever, and a worker's `pop` returns `None` once the producer
//! is gone and the queue has drained.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::chunk::Chunk;

/// Create the queue, returning the producer and worker halves.
pub fn bounded_chunk_queue(capacity: usize) -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (ChunkSender { tx }, ChunkReceiver { rx })
}

#[derive(Clone)]
pub struct ChunkSender {
    tx: Sender<Chunk>,
}

impl ChunkSender {
    /// Blocks while the queue holds `capacity` chunks. Chunks are never
    /// dropped and FIFO order of the single producer is preserved. Returns
    /// `false` only when every consumer has exited.
    pub fn push(&self, chunk: Chunk) -> bool {
        self.tx.send(chunk).is_ok()
    }

    /// Non-blocking push for wake markers on worker exit paths. A full
    /// queue means no worker can be blocked on an empty one, so dropping
    /// the marker is safe then.
    pub fn try_push(&self, chunk: Chunk) {
        let _ = self.tx.try_send(chunk);
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }
}

#[derive(Clone)]
pub struct ChunkReceiver {
    rx: Receiver<Chunk>,
}

impl ChunkReceiver {
    /// Blocks while the queue is empty. `None` once the queue has drained
    /// and no producer handle remains.
    pub fn pop(&self) -> Option<Chunk> {
        self.rx.recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().expect("bounded queue has a capacity")
    }
}
