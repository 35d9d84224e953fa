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

//! Disk-spillover SPSC queue.
//!
//! An unbounded single-producer single-consumer item queue that keeps
//! recent bytes in a fixed in-memory write tail and spills to a backing
//! file once the tail fills. Items come back in append order, and reads
//! never block appends; the consumer reads the live tail optimistically
//! and falls back to chunked file reads for everything already flushed.
//!
//! The two halves of a queue are split at build time: the [`Appender`]
//! moves to the producer thread, the [`Tailer`] to the consumer thread.
//! See [`QueueBuilder`] for a usage example.

pub mod appender;
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod tailer;

mod crc;
mod cursor;
mod file;
mod queue;

pub use appender::Appender;
pub use builder::QueueBuilder;
pub use codec::{BincodeCodec, BytesCodec, Codec, Utf8Codec};
pub use config::QueueConfig;
pub use error::{QueueError, Result};
pub use tailer::Tailer;
