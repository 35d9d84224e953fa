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

use std::path::PathBuf;

/// Queue configuration.
///
/// `buffer_size` is the capacity in bytes of both the write-tail buffer and
/// the read-ahead buffer; it is also the flush granularity, since the tail
/// is written to disk only when full.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Path of the backing file. Created (truncated if present) on build,
    /// deleted on close.
    pub path:          PathBuf,
    /// Capacity in bytes of the write-tail and read-ahead buffers.
    pub buffer_size:   usize,
    /// Upper bound on a single decoded item's byte length, handed to the
    /// codec to stop runaway reads on corrupt framing.
    pub max_item_size: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path:          PathBuf::from("./spillq.data"),
            buffer_size:   64 * 1024,
            max_item_size: u32::MAX,
        }
    }
}
