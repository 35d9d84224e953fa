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

use std::{io, path::PathBuf};

use snafu::Snafu;

/// Queue operation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueueError {
    /// Rejected configuration at construction time.
    #[snafu(display("buffer capacity must be greater than zero, got {capacity}"))]
    InvalidCapacity { capacity: usize },

    /// The backing file could not be created.
    #[snafu(display("failed to create backing file {}: {source}", path.display()))]
    CreateFile { path: PathBuf, source: io::Error },

    /// Lazy reacquisition of freed file handles failed.
    #[snafu(display("failed to reopen backing file {}: {source}", path.display()))]
    ReopenFile { path: PathBuf, source: io::Error },

    /// Flushing the write buffer to disk failed. The queue may hold a
    /// partially appended item after this and must not be reused.
    #[snafu(display("failed to flush write buffer at offset {offset}: {source}"))]
    FlushFile { offset: u64, source: io::Error },

    /// Refilling the read buffer from disk failed.
    #[snafu(display("failed to read backing file at offset {offset}: {source}"))]
    ReadFile { offset: u64, source: io::Error },

    /// The codec rejected an item during append. No bytes were enqueued.
    #[snafu(display("failed to encode item: {source}"))]
    Encode { source: io::Error },

    /// The codec could not reconstruct an item from the byte stream.
    /// Distinct from the empty signal, which is `Ok(None)`.
    #[snafu(display("failed to decode item: {source}"))]
    Decode { source: io::Error },

    /// The backing file could not be deleted during teardown.
    #[snafu(display("failed to remove backing file {}: {source}", path.display()))]
    RemoveFile { path: PathBuf, source: io::Error },

    /// The queue has been closed; no further operations are accepted.
    #[snafu(display("queue is closed"))]
    Closed,
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
