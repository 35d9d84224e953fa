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

//! CRC32 checksum utilities for item frame integrity.
//!
//! Uses CRC-32 (IEEE polynomial) via crc32fast for hardware-accelerated
//! checksums. The CRC covers both the length field and the payload so that
//! truncation is detected as well as payload corruption.

use crc32fast::Hasher;

/// Calculates the CRC32 checksum for a framed item.
///
/// The checksum covers the length prefix and the payload bytes, so a
/// corrupted length field fails verification even when the payload bytes
/// themselves survived.
#[inline]
pub(crate) fn calculate_frame_crc(length: u32, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&length.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// Verifies a framed item's CRC32 checksum.
#[inline]
pub(crate) fn verify_frame_crc(length: u32, payload: &[u8], expected: u32) -> bool {
    calculate_frame_crc(length, payload) == expected
}
