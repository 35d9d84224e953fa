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

//! Backing file access and handle lifecycle.
//!
//! The queue keeps two handles onto the same file: a read-only one for the
//! consumer's chunked refills and a read-write one for the producer's
//! flushes, so neither side disturbs the other's file position. Handles can
//! be released while the queue is idle and are lazily reacquired on the
//! next operation that needs them.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use snafu::ResultExt;
use tracing::debug;

use crate::error::{ClosedSnafu, CreateFileSnafu, ReopenFileSnafu, Result};

/// Two positioned handles onto the backing file.
pub(crate) struct FileAccessor {
    /// Read-only handle used by the consumer's refills.
    reader: File,
    /// Read-write handle used by the producer's flushes.
    writer: File,
}

impl FileAccessor {
    /// Create the backing file, truncating any existing content, and open
    /// both handles. Parent directories are created as needed.
    pub(crate) fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateFileSnafu { path })?;
        }

        let writer = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .context(CreateFileSnafu { path })?;
        let reader = File::open(path).context(CreateFileSnafu { path })?;

        Ok(Self { reader, writer })
    }

    /// Reopen both handles onto an existing backing file.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let writer = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .context(ReopenFileSnafu { path })?;
        let reader = File::open(path).context(ReopenFileSnafu { path })?;

        Ok(Self { reader, writer })
    }

    /// Read exactly `buf.len()` bytes at `offset`.
    pub(crate) fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(buf)
    }

    /// Write all of `data` at `offset`.
    pub(crate) fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.writer.seek(SeekFrom::Start(offset))?;
        self.writer.write_all(data)
    }
}

/// Lifecycle of the backing file handles.
///
/// `Freed` is reversible: the next operation that touches the file reopens
/// the handles. `Closed` is terminal.
pub(crate) enum FileState {
    /// Both handles live.
    Open(FileAccessor),
    /// Handles released to bound fd usage while idle; file content intact.
    Freed,
    /// Queue torn down; the backing file is deleted.
    Closed,
}

impl FileState {
    /// Ensure the handles are open, lazily reopening after a
    /// `free_resources` call.
    pub(crate) fn ensure_open(&mut self, path: &Path) -> Result<&mut FileAccessor> {
        match self {
            FileState::Open(_) => {}
            FileState::Freed => {
                *self = FileState::Open(FileAccessor::open(path)?);
                debug!(path = ?path, "reopened backing file handles");
            }
            FileState::Closed => return ClosedSnafu.fail(),
        }

        match self {
            FileState::Open(accessor) => Ok(accessor),
            _ => ClosedSnafu.fail(),
        }
    }
}
