//! Ordered archive writer.
//!
//! Workers finish compressing out of order, but the archive must be a flat
//! append sequence decodable without an index, and the trailing digest
//! record relies on every earlier chunk of its file already being flushed.
//! So each chunk carries a process-global ordinal and the writer is a
//! condvar turnstile: a worker whose ordinal is not yet due blocks until the
//! preceding record has been appended, then writes and releases the next
//! waiter. No spinning anywhere.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

use crate::error::ArchiverError;
use crate::format;

pub struct OrderedWriter {
    state: Mutex<WriterState>,
    turn: Condvar,
    archive_path: PathBuf,
}

struct WriterState {
    dest: BufWriter<File>,
    next_ordinal: u64,
    records_written: u64,
    aborted: bool,
}

impl OrderedWriter {
    pub fn create(archive_path: &Path) -> Result<Self, ArchiverError> {
        let file = File::create(archive_path).map_err(|e| ArchiverError::io(e, archive_path))?;
        Ok(OrderedWriter {
            state: Mutex::new(WriterState {
                dest: BufWriter::new(file),
                next_ordinal: 0,
                records_written: 0,
                aborted: false,
            }),
            turn: Condvar::new(),
            archive_path: archive_path.to_path_buf(),
        })
    }

    /// Append an out-of-band record before the pipeline starts (the embedded
    /// manifest). Must not be called once workers are submitting.
    pub fn write_preamble(
        &self,
        relative_path: &str,
        payload: &[u8],
        digest: &str,
    ) -> Result<(), ArchiverError> {
        let mut state = self.state.lock().unwrap();
        format::write_record(&mut state.dest, relative_path, 0, true, payload, Some(digest))
            .map_err(|e| ArchiverError::io(e, &self.archive_path))?;
        state.records_written += 1;
        Ok(())
    }

    /// Write one record in its turn. Blocks until every earlier ordinal has
    /// been appended; on return the next waiter has been released. If the
    /// pipeline has been aborted (or aborts here because the write itself
    /// fails), waiting submitters bail out with `Aborted` instead of
    /// deadlocking on a turn that will never come.
    pub fn submit(
        &self,
        ordinal: u64,
        relative_path: &str,
        sequence_id: u32,
        is_last_chunk: bool,
        payload: &[u8],
        digest: Option<&str>,
    ) -> Result<(), ArchiverError> {
        let mut state = self.state.lock().unwrap();
        while !state.aborted && state.next_ordinal != ordinal {
            state = self.turn.wait(state).unwrap();
        }
        if state.aborted {
            return Err(ArchiverError::Aborted);
        }

        let written = format::write_record(
            &mut state.dest,
            relative_path,
            sequence_id,
            is_last_chunk,
            payload,
            digest,
        );
        if let Err(e) = written {
            state.aborted = true;
            self.turn.notify_all();
            return Err(ArchiverError::io(e, &self.archive_path));
        }

        state.next_ordinal += 1;
        state.records_written += 1;
        self.turn.notify_all();
        Ok(())
    }

    /// Tear the turnstile down after a fatal worker error, waking every
    /// blocked submitter.
    pub fn abort(&self) {
        let mut state = self.state.lock().unwrap();
        state.aborted = true;
        self.turn.notify_all();
    }

    /// Flush and durably close the archive; returns the record count. Called
    /// exactly once, after the worker scope has joined.
    pub fn finalize(self) -> Result<u64, ArchiverError> {
        let state = self.state.into_inner().unwrap();
        let records = state.records_written;
        let file = state
            .dest
            .into_inner()
            .map_err(|e| ArchiverError::io(e.into_error(), &self.archive_path))?;
        file.sync_all()
            .map_err(|e| ArchiverError::io(e, &self.archive_path))?;
        Ok(records)
    }
}
