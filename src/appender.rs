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

//! Item writer (appender) for producing into the queue.
//!
//! The [`Appender`] serializes items through the configured codec into the
//! in-memory write tail and writes the tail to the backing file only when
//! it fills. It:
//! - Performs no I/O while the tail has room
//! - Amortizes file writes to one per `buffer_size` bytes
//! - Publishes the item count only after an item's bytes are fully appended
//!
//! ## Concurrency
//!
//! There is exactly one appender per queue and it is not cloneable; moving
//! it into the producer thread is how single-producer use is enforced. The
//! flush runs inside the queue's write lock, the same region the consumer
//! uses to snapshot `(write_pos, write_len)`; every other step of the
//! append path takes no lock.

use std::{
    marker::PhantomData,
    sync::{Arc, atomic::Ordering},
};

use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::{
    codec::Codec,
    error::{ClosedSnafu, EncodeSnafu, FlushFileSnafu, Result},
    queue::{Shared, lock},
};

/// The producer handle of a queue.
///
/// Created once per queue by [`QueueBuilder::build`](crate::QueueBuilder::build),
/// paired with a [`Tailer`](crate::Tailer).
pub struct Appender<T, C> {
    /// State shared with the consumer handle.
    shared:     Arc<Shared>,
    /// The pluggable item codec.
    codec:      C,
    /// Reused scratch the codec encodes into before any byte enters the
    /// tail.
    encode_buf: Vec<u8>,
    /// Reused capacity-sized scratch for the flush write.
    flush_buf:  Vec<u8>,
    _marker:    PhantomData<fn(&T)>,
}

impl<T, C: Codec<T>> Appender<T, C> {
    pub(crate) fn new(shared: Arc<Shared>, codec: C) -> Self {
        let capacity = shared.capacity();
        Self {
            shared,
            codec,
            encode_buf: Vec::new(),
            flush_buf:  vec![0u8; capacity],
            _marker:    PhantomData,
        }
    }

    /// Append one item to the queue.
    ///
    /// The item is encoded into a scratch buffer first, so a codec failure
    /// leaves the queue exactly as it was. A flush I/O failure partway
    /// through an item does leave partial bytes behind; that is
    /// unrecoverable framing corruption and the queue must not be used
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after the queue has been closed, `Encode` when the
    /// codec rejects the item, and `FlushFile` when spilling a full tail
    /// to disk fails.
    pub fn append(&mut self, item: &T) -> Result<()> {
        ensure!(!self.shared.is_closed(), ClosedSnafu);

        self.encode_buf.clear();
        self.codec
            .encode(item, &mut self.encode_buf)
            .context(EncodeSnafu)?;

        let bytes = std::mem::take(&mut self.encode_buf);
        let pushed = self.push_bytes(&bytes);
        self.encode_buf = bytes;
        pushed?;

        self.shared.size.fetch_add(1, Ordering::Release);
        Ok(())
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for &b in bytes {
            self.push_byte(b)?;
        }
        Ok(())
    }

    /// Store one byte in the tail, flushing first when the tail is full.
    fn push_byte(&mut self, b: u8) -> Result<()> {
        let shared = &self.shared;
        let pending = shared.write_len.load(Ordering::Relaxed);
        if pending < shared.capacity() {
            shared.write_buf[pending].store(b, Ordering::Relaxed);
            shared.write_len.store(pending + 1, Ordering::Release);
            return Ok(());
        }
        self.flush_and_restart(b)
    }

    /// Write the full tail to the file at `write_pos`, then restart the
    /// tail with `b` in slot 0.
    ///
    /// The store order inside the lock is load-bearing for the consumer's
    /// snapshot validation: file write, then `write_pos`, then slot 0,
    /// then `write_len`. A failed file write mutates nothing.
    fn flush_and_restart(&mut self, b: u8) -> Result<()> {
        let shared = &self.shared;
        let _guard = lock(&shared.write_lock);

        for (dst, src) in self.flush_buf.iter_mut().zip(shared.write_buf.iter()) {
            *dst = src.load(Ordering::Relaxed);
        }

        let offset = shared.write_pos.load(Ordering::Relaxed);
        shared.with_file(|file| {
            file.write_at(offset, &self.flush_buf)
                .context(FlushFileSnafu { offset })
        })?;

        shared
            .write_pos
            .store(offset + shared.capacity() as u64, Ordering::Release);
        shared.write_buf[0].store(b, Ordering::Relaxed);
        shared.write_len.store(1, Ordering::Release);

        debug!(offset, len = shared.capacity(), "flushed write tail");
        Ok(())
    }

    /// Items currently in the queue.
    #[must_use]
    pub fn len(&self) -> u64 { self.shared.len() }

    /// True when no item is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.shared.len() == 0 }

    /// Bytes flushed to the backing file so far. Diagnostic; excludes the
    /// unflushed tail.
    #[must_use]
    pub fn flushed_bytes(&self) -> u64 { self.shared.flushed_bytes() }

    /// Release the OS file handles while idle; they reopen lazily on the
    /// next operation that needs them.
    pub fn free_resources(&self) { self.shared.free_resources(); }

    /// Close the queue and delete the backing file. Idempotent; may be
    /// called from either handle.
    pub fn close(&self) -> Result<()> { self.shared.close() }

    /// True once the queue has been closed from either handle.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.shared.is_closed() }
}
