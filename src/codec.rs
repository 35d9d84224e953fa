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

//! Item codecs and the stock frame format.
//!
//! A [`Codec`] turns items into bytes and back through standard I/O
//! streams. The queue core moves whatever bytes the codec produces; it
//! imposes no header, footer, or index of its own, so all framing belongs
//! to the codec.
//!
//! ## Stock Frame Format
//!
//! The codecs shipped here ([`BytesCodec`], [`Utf8Codec`],
//! [`BincodeCodec`]) share one self-delimiting frame:
//!
//! ```text
//! ┌─────────────────┬──────────────────────┬─────────────────┐
//! │  Length (4B)    │   Payload (variable) │   CRC32 (4B)    │
//! │  little-endian  │   codec bytes        │   little-endian │
//! └─────────────────┴──────────────────────┴─────────────────┘
//! ```
//!
//! The CRC covers the length field and the payload, so truncated or
//! corrupted frames are detected on read. A custom [`Codec`] is free to
//! use any other self-delimiting encoding.

use std::io::{self, Read, Write};

use bytes::Bytes;

use crate::crc::{calculate_frame_crc, verify_frame_crc};

/// Size of the frame length prefix in bytes.
const FRAME_LENGTH_SIZE: usize = 4;

/// Size of the frame CRC32 trailer in bytes.
const FRAME_CRC_SIZE: usize = 4;

/// Transcodes items of type `T` to and from a byte stream.
///
/// Implementations must be self-delimiting: `decode` has to consume
/// exactly the bytes that `encode` produced for one item, since items are
/// laid out back to back with no separator.
pub trait Codec<T> {
    /// Serialize `item` into `writer` as one self-delimiting unit.
    fn encode<W: Write>(&self, item: &T, writer: &mut W) -> io::Result<()>;

    /// Reconstruct one item from `reader`.
    ///
    /// `max_item_size` bounds any length field read from the stream; a
    /// larger claimed length must be rejected before allocation so corrupt
    /// framing cannot trigger runaway reads.
    fn decode<R: Read>(&self, reader: &mut R, max_item_size: u32) -> io::Result<T>;
}

fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "payload exceeds the u32 frame length",
        )
    })?;
    let crc = calculate_frame_crc(length, payload);

    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.write_all(&crc.to_le_bytes())
}

fn read_frame<R: Read>(reader: &mut R, max_item_size: u32) -> io::Result<Vec<u8>> {
    let mut length_buf = [0u8; FRAME_LENGTH_SIZE];
    reader.read_exact(&mut length_buf)?;
    let length = u32::from_le_bytes(length_buf);

    if length > max_item_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {length} exceeds item size limit {max_item_size}"),
        ));
    }

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload)?;

    let mut crc_buf = [0u8; FRAME_CRC_SIZE];
    reader.read_exact(&mut crc_buf)?;
    let stored_crc = u32::from_le_bytes(crc_buf);

    if !verify_frame_crc(length, &payload, stored_crc) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame crc mismatch",
        ));
    }

    Ok(payload)
}

/// Codec for raw byte payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec<Bytes> for BytesCodec {
    fn encode<W: Write>(&self, item: &Bytes, writer: &mut W) -> io::Result<()> {
        write_frame(writer, item)
    }

    fn decode<R: Read>(&self, reader: &mut R, max_item_size: u32) -> io::Result<Bytes> {
        read_frame(reader, max_item_size).map(Bytes::from)
    }
}

/// Codec for UTF-8 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl Codec<String> for Utf8Codec {
    fn encode<W: Write>(&self, item: &String, writer: &mut W) -> io::Result<()> {
        write_frame(writer, item.as_bytes())
    }

    fn decode<R: Read>(&self, reader: &mut R, max_item_size: u32) -> io::Result<String> {
        let payload = read_frame(reader, max_item_size)?;
        String::from_utf8(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Codec for any serde type, serialized with bincode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl<T> Codec<T> for BincodeCodec
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    fn encode<W: Write>(&self, item: &T, writer: &mut W) -> io::Result<()> {
        let payload = bincode::serde::encode_to_vec(item, bincode::config::standard())
            .map_err(io::Error::other)?;
        write_frame(writer, &payload)
    }

    fn decode<R: Read>(&self, reader: &mut R, max_item_size: u32) -> io::Result<T> {
        let payload = read_frame(reader, max_item_size)?;
        bincode::serde::decode_from_slice(&payload, bincode::config::standard())
            .map(|(item, _)| item)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let mut encoded = Vec::new();
        write_frame(&mut encoded, b"framed payload").unwrap();
        assert_eq!(encoded.len(), FRAME_LENGTH_SIZE + 14 + FRAME_CRC_SIZE);

        let payload = read_frame(&mut Cursor::new(encoded), u32::MAX).unwrap();
        assert_eq!(payload, b"framed payload");
    }

    #[test]
    fn test_frame_rejects_corrupted_payload() {
        let mut encoded = Vec::new();
        write_frame(&mut encoded, b"framed payload").unwrap();
        encoded[FRAME_LENGTH_SIZE + 3] ^= 0x01;

        let err = read_frame(&mut Cursor::new(encoded), u32::MAX).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_frame_rejects_length_over_limit() {
        let mut encoded = Vec::new();
        write_frame(&mut encoded, &[0xAB; 100]).unwrap();

        let err = read_frame(&mut Cursor::new(encoded), 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_bytes_codec() {
        let codec = BytesCodec;
        let item = Bytes::from_static(b"opaque bytes");

        let mut encoded = Vec::new();
        codec.encode(&item, &mut encoded).unwrap();
        let decoded = codec.decode(&mut Cursor::new(encoded), u32::MAX).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn test_utf8_codec_rejects_invalid_utf8() {
        let mut encoded = Vec::new();
        write_frame(&mut encoded, &[0xFF, 0xFE, 0xFD]).unwrap();

        let err = Utf8Codec
            .decode(&mut Cursor::new(encoded), u32::MAX)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_bincode_codec_struct() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Event {
            sequence: u64,
            label:    String,
        }

        let codec = BincodeCodec;
        let item = Event {
            sequence: 42,
            label:    "spill".to_string(),
        };

        let mut encoded = Vec::new();
        codec.encode(&item, &mut encoded).unwrap();
        let decoded: Event = codec.decode(&mut Cursor::new(encoded), u32::MAX).unwrap();
        assert_eq!(decoded, item);
    }
}
