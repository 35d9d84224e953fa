// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared queue state and lifecycle management.
//!
//! ## Architecture
//!
//! One [`Appender`](crate::Appender) and one [`Tailer`](crate::Tailer) hold
//! an `Arc` to the same [`Shared`] state. Bytes move through three stores:
//!
//! ```text
//! ┌──────────────┐                             ┌──────────────┐
//! │   Appender   │                             │    Tailer    │
//! │  (producer)  │                             │  (consumer)  │
//! └──────┬───────┘                             └──────▲───────┘
//!        │ append                                     │ read_next
//!        ▼                                            │
//! ┌──────────────┐     speculative tail read   ┌──────┴───────┐
//! │  write tail  │ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ► │  read-ahead  │
//! │  (in-memory) │      validate and retry     │  (in-memory) │
//! └──────┬───────┘                             └──────▲───────┘
//!        │ flush when full                            │ chunked refill
//!        ▼                                            │
//! ┌───────────────────────────────────────────────────┴───────┐
//! │              backing file (append-only log)               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Coordination
//!
//! The producer owns the write tail and appends without locking until the
//! buffer fills; a flush runs inside `write_lock`. The consumer reads
//! flushed bytes from the file, and unflushed bytes directly out of the
//! tail with a snapshot/validate protocol keyed on
//! `(write_pos, write_len)`. File handle lifecycle (free, lazy reopen,
//! close) is guarded by a separate lock so idle-resource reclamation never
//! contends with the data path. Lock order is `write_lock` then `file`,
//! never the reverse.

use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering},
};

use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    config::QueueConfig,
    error::{RemoveFileSnafu, Result},
    file::{FileAccessor, FileState},
};

/// Lock a mutex, ignoring poisoning; the guarded state is plain data that
/// stays valid across a panicking peer.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by the producer and consumer handles of one queue.
pub(crate) struct Shared {
    /// Immutable configuration: path, buffer capacity, item size bound.
    pub(crate) config:     QueueConfig,
    /// The write-tail buffer. Atomic bytes because the consumer loads them
    /// speculatively while the producer stores; each slot is only ever
    /// written by the producer.
    pub(crate) write_buf:  Box<[AtomicU8]>,
    /// Absolute file offset up to which the tail has been flushed. Advances
    /// only in capacity-sized steps, inside `write_lock`.
    pub(crate) write_pos:  AtomicU64,
    /// Bytes currently pending in `write_buf`.
    pub(crate) write_len:  AtomicUsize,
    /// Items appended minus items read.
    pub(crate) size:       AtomicU64,
    /// The producer's exclusive region. Held for the flush; taken briefly
    /// by the consumer so `(write_pos, write_len)` is always observed as a
    /// consistent pair.
    pub(crate) write_lock: Mutex<()>,
    /// Guards file handle lifecycle, independent of `write_lock`.
    pub(crate) file:       Mutex<FileState>,
    /// Terminal flag set by `close`.
    pub(crate) closed:     AtomicBool,
}

impl Shared {
    pub(crate) fn new(config: QueueConfig, accessor: FileAccessor) -> Self {
        let write_buf = (0..config.buffer_size).map(|_| AtomicU8::new(0)).collect();
        Self {
            config,
            write_buf,
            write_pos:  AtomicU64::new(0),
            write_len:  AtomicUsize::new(0),
            size:       AtomicU64::new(0),
            write_lock: Mutex::new(()),
            file:       Mutex::new(FileState::Open(accessor)),
            closed:     AtomicBool::new(false),
        }
    }

    /// Capacity in bytes of the write-tail and read-ahead buffers.
    pub(crate) fn capacity(&self) -> usize { self.write_buf.len() }

    /// Take a consistent `(write_pos, write_len)` pair.
    ///
    /// Both the snapshot and the validation step of the optimistic read go
    /// through here. The lock excludes a concurrent flush, the only writer
    /// step that mutates the pair together.
    pub(crate) fn write_snapshot(&self) -> (u64, usize) {
        let _guard = lock(&self.write_lock);
        (
            self.write_pos.load(Ordering::Acquire),
            self.write_len.load(Ordering::Acquire),
        )
    }

    /// Run `op` against open file handles, lazily reopening freed ones.
    pub(crate) fn with_file<R>(
        &self,
        op: impl FnOnce(&mut FileAccessor) -> Result<R>,
    ) -> Result<R> {
        let mut state = lock(&self.file);
        let accessor = state.ensure_open(&self.config.path)?;
        op(accessor)
    }

    /// Items currently in the queue.
    pub(crate) fn len(&self) -> u64 { self.size.load(Ordering::Acquire) }

    /// Bytes flushed to disk so far. Diagnostic; excludes the unflushed
    /// tail.
    pub(crate) fn flushed_bytes(&self) -> u64 { self.write_pos.load(Ordering::Acquire) }

    pub(crate) fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }

    /// Release both file handles if open. Idempotent; the file and its
    /// content stay intact and handles reopen lazily on the next use.
    pub(crate) fn free_resources(&self) {
        let mut state = lock(&self.file);
        if matches!(*state, FileState::Open(_)) {
            *state = FileState::Freed;
            debug!(path = ?self.config.path, "released backing file handles");
        }
    }

    /// Terminal teardown: release the handles and delete the backing file.
    ///
    /// The first call wins; later calls are no-ops. After this every
    /// `append` and `read_next` returns [`QueueError::Closed`].
    ///
    /// [`QueueError::Closed`]: crate::QueueError::Closed
    pub(crate) fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut state = lock(&self.file);
        *state = FileState::Closed;
        std::fs::remove_file(&self.config.path).context(RemoveFileSnafu {
            path: &self.config.path,
        })?;

        info!(path = ?self.config.path, "closed queue and removed backing file");
        Ok(())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        // Both handles dropped without close: best-effort teardown.
        let state = self.file.get_mut().unwrap_or_else(PoisonError::into_inner);
        *state = FileState::Closed;
        if let Err(error) = std::fs::remove_file(&self.config.path) {
            warn!(path = ?self.config.path, ?error, "failed to remove backing file on drop");
        }
    }
}
