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

use std::io::{Read, Seek, SeekFrom, Write};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use spillq::{BincodeCodec, BytesCodec, Codec, QueueBuilder, QueueError, Utf8Codec};
use tempfile::TempDir;
use test_case::test_case;

/// One byte per item, no framing; makes byte positions easy to reason
/// about in spill scenarios.
#[derive(Clone, Copy)]
struct RawByteCodec;

impl Codec<u8> for RawByteCodec {
    fn encode<W: Write>(&self, item: &u8, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&[*item])
    }

    fn decode<R: Read>(&self, reader: &mut R, _max_item_size: u32) -> std::io::Result<u8> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Event {
    id:      u64,
    payload: String,
}

#[test]
fn test_fifo_through_heavy_spill() {
    let temp_dir = TempDir::new().unwrap();
    let (mut appender, mut tailer) = QueueBuilder::new(temp_dir.path().join("queue.data"))
        .buffer_size(64)
        .build(Utf8Codec)
        .unwrap();

    for i in 0..10_000 {
        appender.append(&format!("item-{i:05}")).unwrap();
    }
    assert_eq!(appender.len(), 10_000);
    assert!(appender.flushed_bytes() > 0);

    for i in 0..10_000 {
        assert_eq!(tailer.read_next().unwrap(), Some(format!("item-{i:05}")));
    }
    assert_eq!(tailer.read_next().unwrap(), None);
    assert!(tailer.is_empty());
}

#[test]
fn test_concurrent_producer_consumer() {
    let temp_dir = TempDir::new().unwrap();
    let (mut appender, mut tailer) = QueueBuilder::new(temp_dir.path().join("queue.data"))
        .buffer_size(4 * 1024)
        .build::<Event, _>(BincodeCodec)
        .unwrap();

    const TOTAL: u64 = 5_000;

    std::thread::scope(|s| {
        s.spawn(move || {
            for id in 0..TOTAL {
                appender
                    .append(&Event {
                        id,
                        payload: format!("message-{id:04}"),
                    })
                    .unwrap();
            }
        });

        for expected in 0..TOTAL {
            let event = loop {
                match tailer.read_next().unwrap() {
                    Some(event) => break event,
                    None => std::thread::yield_now(),
                }
            };
            assert_eq!(event.id, expected);
            assert_eq!(event.payload, format!("message-{expected:04}"));
        }
        assert_eq!(tailer.read_next().unwrap(), None);
    });
}

#[test]
fn test_spill_boundary_positions() {
    let temp_dir = TempDir::new().unwrap();
    let (mut appender, mut tailer) = QueueBuilder::new(temp_dir.path().join("queue.data"))
        .buffer_size(4)
        .build(RawByteCodec)
        .unwrap();

    // Six one-byte items through a four-byte tail: the first four fill it,
    // the fifth forces the only flush, the sixth lands in the new tail
    for b in 0u8..6 {
        appender.append(&b).unwrap();
    }
    assert_eq!(appender.flushed_bytes(), 4);
    assert_eq!(appender.len(), 6);

    for b in 0u8..6 {
        assert_eq!(tailer.read_next().unwrap(), Some(b));
    }
    assert_eq!(tailer.read_next().unwrap(), None);
}

#[test_case(4 ; "tail smaller than any frame")]
#[test_case(8 ; "tail equal to the empty frame")]
#[test_case(64 ; "tail holding a few frames")]
#[test_case(1024 ; "tail holding everything")]
fn test_fifo_across_buffer_sizes(buffer_size: usize) {
    let temp_dir = TempDir::new().unwrap();
    let (mut appender, mut tailer) = QueueBuilder::new(temp_dir.path().join("queue.data"))
        .buffer_size(buffer_size)
        .build(BytesCodec)
        .unwrap();

    // Lengths 0..=32 straddle every flush boundary, including empty items
    for i in 0..200usize {
        appender
            .append(&Bytes::from(vec![i as u8; i % 33]))
            .unwrap();
    }
    for i in 0..200usize {
        assert_eq!(
            tailer.read_next().unwrap(),
            Some(Bytes::from(vec![i as u8; i % 33]))
        );
    }
    assert_eq!(tailer.read_next().unwrap(), None);
}

#[test]
fn test_items_larger_than_the_tail() {
    let temp_dir = TempDir::new().unwrap();
    let (mut appender, mut tailer) = QueueBuilder::new(temp_dir.path().join("queue.data"))
        .buffer_size(16)
        .build(BytesCodec)
        .unwrap();

    // Each 108-byte frame spans several flushes and several refills
    for i in 0..50usize {
        appender
            .append(&Bytes::from(vec![(i % 251) as u8; 100]))
            .unwrap();
    }
    for i in 0..50usize {
        assert_eq!(
            tailer.read_next().unwrap(),
            Some(Bytes::from(vec![(i % 251) as u8; 100]))
        );
    }
    assert_eq!(tailer.read_next().unwrap(), None);
}

#[test]
fn test_free_resources_reopens_lazily() {
    let temp_dir = TempDir::new().unwrap();
    let (mut appender, mut tailer) = QueueBuilder::new(temp_dir.path().join("queue.data"))
        .buffer_size(8)
        .build(Utf8Codec)
        .unwrap();

    for i in 0..4 {
        appender.append(&format!("item-{i:03}")).unwrap();
    }
    assert!(appender.flushed_bytes() > 0);

    // Dropping the handles while idle must not lose flushed data
    appender.free_resources();
    for i in 0..4 {
        assert_eq!(tailer.read_next().unwrap(), Some(format!("item-{i:03}")));
    }

    tailer.free_resources();
    for i in 4..8 {
        appender.append(&format!("item-{i:03}")).unwrap();
    }
    for i in 4..8 {
        assert_eq!(tailer.read_next().unwrap(), Some(format!("item-{i:03}")));
    }
    assert_eq!(tailer.read_next().unwrap(), None);
}

#[test]
fn test_close_removes_file_and_rejects_use() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.data");
    let (mut appender, mut tailer) = QueueBuilder::new(&path).build(Utf8Codec).unwrap();

    appender.append(&"pending".to_string()).unwrap();
    tailer.close().unwrap();

    assert!(!path.exists());
    assert!(appender.is_closed());
    assert!(matches!(
        appender.append(&"late".to_string()),
        Err(QueueError::Closed)
    ));
    assert!(matches!(tailer.read_next(), Err(QueueError::Closed)));

    // Closing again from the other handle is a no-op
    appender.close().unwrap();
}

#[test]
fn test_backing_file_removed_on_last_drop() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.data");
    let (appender, tailer) = QueueBuilder::new(&path)
        .build::<String, _>(Utf8Codec)
        .unwrap();

    drop(appender);
    assert!(path.exists());
    drop(tailer);
    assert!(!path.exists());
}

#[test]
fn test_corrupted_flushed_frame_is_detected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.data");
    let (mut appender, mut tailer) = QueueBuilder::new(&path)
        .buffer_size(8)
        .build(Utf8Codec)
        .unwrap();

    for i in 0..4 {
        appender.append(&format!("message-{i:02}")).unwrap();
    }
    assert!(appender.flushed_bytes() >= 8);

    // Flip one payload byte of the first flushed frame behind the
    // queue's back
    let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(6)).unwrap();
    file.write_all(&[0xFF]).unwrap();
    drop(file);

    assert!(matches!(tailer.read_next(), Err(QueueError::Decode { .. })));
}

#[test]
fn test_max_item_size_rejects_oversized_frame() {
    let temp_dir = TempDir::new().unwrap();
    let (mut appender, mut tailer) = QueueBuilder::new(temp_dir.path().join("queue.data"))
        .max_item_size(8)
        .build(BytesCodec)
        .unwrap();

    appender.append(&Bytes::from(vec![7u8; 100])).unwrap();
    assert!(matches!(tailer.read_next(), Err(QueueError::Decode { .. })));
}
