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

//! Byte-level consumer cursor over the flushed file and the live tail.
//!
//! The cursor hands out queue bytes in order, from wherever they
//! currently live:
//!
//! ```text
//!   absolute position:  0 ........ write_pos ........ write_pos + write_len
//!                       |  backing file  |  in-memory tail (write_buf)  |
//!                                   ^
//!                                   read_pos walks left to right
//! ```
//!
//! Bytes below `write_pos` are read from the file in chunks of up to
//! `buffer_size` and served from a local read-ahead buffer. Bytes at or
//! above `write_pos` still sit in the producer's tail and are read
//! optimistically:
//!
//! 1. Snapshot `(write_pos, write_len)` under the write lock.
//! 2. If the cursor is below `write_pos`, refill from the file instead.
//! 3. If the cursor's tail index is outside the buffer, report no data.
//! 4. Load the tail byte without holding the lock.
//! 5. Re-snapshot; if nothing changed the byte is consistent, otherwise a
//!    flush raced the read and the whole sequence retries.
//!
//! The validation in step 5 is sound because `write_pos` never repeats:
//! every flush advances it by the full buffer capacity, so an unchanged
//! snapshot pair means no flush happened between steps 1 and 4 and the
//! loaded byte belongs to the generation the snapshot described.

use std::sync::atomic::Ordering;

use crossbeam::utils::Backoff;
use snafu::ResultExt;

use crate::{
    error::{ReadFileSnafu, Result},
    queue::Shared,
};

/// Sequential byte reader owned by the consumer handle.
pub(crate) struct ByteCursor {
    /// Read-ahead storage for bytes pulled from the backing file.
    read_buf: Box<[u8]>,
    /// Next unserved slot in `read_buf`.
    buf_pos:  usize,
    /// Number of valid bytes in `read_buf`.
    buf_len:  usize,
    /// Absolute queue position of the next byte to fetch.
    read_pos: u64,
}

impl ByteCursor {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            read_buf: vec![0u8; capacity].into_boxed_slice(),
            buf_pos:  0,
            buf_len:  0,
            read_pos: 0,
        }
    }

    /// Serve one byte from the read-ahead buffer, if any is left.
    pub(crate) fn buffered_byte(&mut self) -> Option<u8> {
        if self.buf_pos < self.buf_len {
            let b = self.read_buf[self.buf_pos];
            self.buf_pos += 1;
            return Some(b);
        }
        None
    }

    /// Fetch the next queue byte, or `None` when no byte is available.
    ///
    /// `None` is transient: the producer may publish more data at any
    /// time. Callers decide whether to retry, park, or give up.
    pub(crate) fn next_byte(&mut self, shared: &Shared) -> Result<Option<u8>> {
        if shared.len() == 0 {
            return Ok(None);
        }
        if let Some(b) = self.buffered_byte() {
            return Ok(Some(b));
        }

        let backoff = Backoff::new();
        loop {
            let (write_pos, write_len) = shared.write_snapshot();

            if self.read_pos < write_pos {
                // Flushed bytes sit ahead of the cursor; refill from the
                // file instead of touching the tail
                let flushed_ahead = write_pos - self.read_pos;
                return self.fill_from_file(shared, flushed_ahead).map(Some);
            }

            let index = (self.read_pos - write_pos) as usize;
            if index >= self.read_buf.len() {
                return Ok(None);
            }

            let speculative = shared.write_buf[index].load(Ordering::Relaxed);
            if shared.write_snapshot() == (write_pos, write_len) {
                self.read_pos += 1;
                return Ok(Some(speculative));
            }
            backoff.snooze();
        }
    }

    /// Refill the read-ahead buffer from the backing file and serve the
    /// first byte. `available` is the flushed byte count ahead of the
    /// cursor and is always nonzero here.
    fn fill_from_file(&mut self, shared: &Shared, available: u64) -> Result<u8> {
        let count = available.min(self.read_buf.len() as u64) as usize;
        let offset = self.read_pos;
        shared.with_file(|file| {
            file.read_at(offset, &mut self.read_buf[..count])
                .context(ReadFileSnafu { offset })
        })?;

        self.buf_len = count;
        self.buf_pos = 1;
        self.read_pos += count as u64;
        Ok(self.read_buf[0])
    }
}
