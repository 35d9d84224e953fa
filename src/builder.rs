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

//! Builder for spillover queues.
//!
//! [`QueueBuilder`] creates the backing file, truncating whatever a
//! previous run left at the same path, and splits the queue into its two
//! single-owner handles:
//!
//! ```no_run
//! use spillq::{QueueBuilder, Utf8Codec};
//!
//! let (mut appender, mut tailer) = QueueBuilder::new("/tmp/events.data")
//!     .buffer_size(64 * 1024)
//!     .build(Utf8Codec)?;
//!
//! appender.append(&"hello".to_string())?;
//! assert_eq!(tailer.read_next()?, Some("hello".to_string()));
//! # Ok::<(), spillq::QueueError>(())
//! ```

use std::{path::PathBuf, sync::Arc};

use snafu::ensure;
use tracing::info;

use crate::{
    appender::Appender,
    codec::Codec,
    config::QueueConfig,
    error::{InvalidCapacitySnafu, Result},
    file::FileAccessor,
    queue::Shared,
    tailer::Tailer,
};

/// Configures and opens a queue.
#[derive(Debug, Clone)]
pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    /// Start building a queue backed by the file at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config: QueueConfig {
                path: path.into(),
                ..QueueConfig::default()
            },
        }
    }

    /// Size in bytes of the in-memory write tail, which is also the
    /// read-ahead chunk size. Must be nonzero.
    #[must_use]
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.config.buffer_size = bytes;
        self
    }

    /// Upper bound on a single decoded item, enforced by the stock codecs
    /// before they allocate for a frame.
    #[must_use]
    pub fn max_item_size(mut self, bytes: u32) -> Self {
        self.config.max_item_size = bytes;
        self
    }

    /// Create the backing file and return the producer and consumer
    /// handles.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCapacity` for a zero `buffer_size` and `CreateFile`
    /// when the backing file or its parent directories cannot be created.
    pub fn build<T, C>(self, codec: C) -> Result<(Appender<T, C>, Tailer<T, C>)>
    where
        C: Codec<T> + Clone,
    {
        ensure!(
            self.config.buffer_size > 0,
            InvalidCapacitySnafu {
                capacity: self.config.buffer_size,
            }
        );

        let accessor = FileAccessor::create(&self.config.path)?;
        info!(
            path = %self.config.path.display(),
            buffer_size = self.config.buffer_size,
            "created spillover queue"
        );

        let shared = Arc::new(Shared::new(self.config, accessor));
        let appender = Appender::new(Arc::clone(&shared), codec.clone());
        let tailer = Tailer::new(shared, codec);
        Ok((appender, tailer))
    }
}
