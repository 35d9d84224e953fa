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

//! Item reader (tailer) for consuming from the queue.
//!
//! The [`Tailer`] drives a [`ByteCursor`] through the queue's bytes and
//! feeds them to the configured codec as an [`std::io::Read`] stream. An
//! item read is non-blocking: when the queue holds no complete item the
//! read returns `Ok(None)` and the caller chooses how to wait.
//!
//! ## Concurrency
//!
//! There is exactly one tailer per queue and it is not cloneable; moving
//! it into the consumer thread is how single-consumer use is enforced.
//! Reads never block appends: the only shared mutual exclusion is the
//! short snapshot region inside the cursor.

use std::{
    io,
    marker::PhantomData,
    sync::{Arc, atomic::Ordering},
};

use snafu::{ResultExt, ensure};

use crate::{
    codec::Codec,
    cursor::ByteCursor,
    error::{ClosedSnafu, DecodeSnafu, QueueError, Result},
    queue::Shared,
};

/// The consumer handle of a queue.
///
/// Created once per queue by [`QueueBuilder::build`](crate::QueueBuilder::build),
/// paired with an [`Appender`](crate::Appender).
pub struct Tailer<T, C> {
    /// State shared with the producer handle.
    shared:  Arc<Shared>,
    /// Byte-level position over the file and the live tail.
    cursor:  ByteCursor,
    /// The pluggable item codec.
    codec:   C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C: Codec<T>> Tailer<T, C> {
    pub(crate) fn new(shared: Arc<Shared>, codec: C) -> Self {
        let capacity = shared.capacity();
        Self {
            shared,
            cursor: ByteCursor::new(capacity),
            codec,
            _marker: PhantomData,
        }
    }

    /// Read the oldest unread item, or `Ok(None)` when no complete item
    /// is available right now.
    ///
    /// Items come back in append order. The read consumes the item; there
    /// is no peeking and no rewind.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after the queue has been closed, `Decode` for
    /// corrupt or truncated frames, and `ReadFile`/`ReopenFile` when the
    /// backing file cannot be read.
    pub fn read_next(&mut self) -> Result<Option<T>> {
        ensure!(!self.shared.is_closed(), ClosedSnafu);
        if self.shared.len() == 0 {
            return Ok(None);
        }

        let mut reader = CursorReader {
            shared:   &self.shared,
            cursor:   &mut self.cursor,
            consumed: 0,
        };
        match self.codec.decode(&mut reader, self.shared.config.max_item_size) {
            Ok(item) => {
                self.shared.size.fetch_sub(1, Ordering::Release);
                Ok(Some(item))
            }
            Err(err) => {
                let consumed = reader.consumed;
                match err.downcast::<QueueError>() {
                    Ok(queue_err) => Err(queue_err),
                    Err(io_err) => {
                        if consumed == 0 && io_err.kind() == io::ErrorKind::UnexpectedEof {
                            // The codec saw end of data before the first
                            // byte; the next item is not ready yet
                            Ok(None)
                        } else {
                            Err(io_err).context(DecodeSnafu)
                        }
                    }
                }
            }
        }
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

/// Adapts the byte cursor to [`io::Read`] for the codec.
///
/// A transient lack of data surfaces as `Ok(0)`, which `read_exact`
/// style callers turn into `UnexpectedEof`; [`Tailer::read_next`] maps
/// that back to "no item yet" when nothing was consumed. Queue errors
/// tunnel through as custom [`io::Error`] payloads and are recovered by
/// downcast on the way out.
struct CursorReader<'a> {
    shared:   &'a Shared,
    cursor:   &'a mut ByteCursor,
    /// Total bytes handed to the codec so far.
    consumed: usize,
}

impl io::Read for CursorReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let first = match self.cursor.next_byte(self.shared) {
            Ok(Some(b)) => b,
            Ok(None) => return Ok(0),
            Err(err) => return Err(io::Error::other(err)),
        };
        buf[0] = first;
        let mut filled = 1;

        // Drain whatever the read-ahead already holds; crossing back into
        // the tail is left to the next call
        while filled < buf.len() {
            match self.cursor.buffered_byte() {
                Some(b) => {
                    buf[filled] = b;
                    filled += 1;
                }
                None => break,
            }
        }

        self.consumed += filled;
        Ok(filled)
    }
}
