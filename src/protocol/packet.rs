//! Packet framing: 3-byte little-endian length + 1-byte sequence id,
//! with splitting and reassembly at the 16MB-1 boundary.
//!
//! Both directions run on a shared sequence counter owned by the caller.
//! The counter resets to 0 at the start of every command; every frame read
//! must carry the expected id, and a jump is fatal (no resync).

use std::io::{Read, Write};

use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};

/// Largest payload that fits in a single frame
pub const MAX_PAYLOAD_PER_PACKET: usize = 0xFFFFFF;

/// MySQL packet header (zero-copy)
///
/// Layout matches MySQL wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Get payload length as usize
    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }

    /// Read packet header from byte slice (zero-copy)
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        if data.len() < 4 {
            return Err(Error::Decode("truncated packet header"));
        }
        Self::ref_from_bytes(&data[..4]).map_err(|_| Error::Decode("packet header cast"))
    }
}

/// Build a packet header in a stack buffer
pub fn write_packet_header_array(sequence_id: u8, payload_length: usize) -> [u8; 4] {
    let mut header = [0u8; 4];
    let bytes = (payload_length as u32).to_le_bytes();
    header[0] = bytes[0];
    header[1] = bytes[1];
    header[2] = bytes[2];
    header[3] = sequence_id;
    header
}

/// Read a complete logical payload, concatenating frames while they are
/// exactly `MAX_PAYLOAD_PER_PACKET` long.
///
/// Each frame's sequence id is checked against `*sequence_id` and the
/// counter is advanced past every consumed frame. The payload is stored in
/// `buffer` (cleared first).
pub fn read_payload<R: Read>(
    reader: &mut R,
    sequence_id: &mut u8,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    buffer.clear();

    let mut header = [0u8; 4];
    loop {
        reader.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;

        if header[3] != *sequence_id {
            return Err(Error::UnexpectedSequenceId {
                expected: *sequence_id,
                actual: header[3],
            });
        }
        *sequence_id = sequence_id.wrapping_add(1);

        let start = buffer.len();
        buffer.resize(start + length, 0);
        reader.read_exact(&mut buffer[start..])?;

        if length < MAX_PAYLOAD_PER_PACKET {
            return Ok(());
        }
    }
}

/// Write a logical payload, splitting it into frames at the 16MB-1
/// boundary. A payload whose last full frame is exactly
/// `MAX_PAYLOAD_PER_PACKET` long is terminated by an empty frame.
///
/// Advances `*sequence_id` past every emitted frame. Does not flush.
pub fn write_payload<W: Write>(
    writer: &mut W,
    sequence_id: &mut u8,
    payload: &[u8],
) -> Result<()> {
    let mut remaining = payload;
    let mut chunk_size = payload.len().min(MAX_PAYLOAD_PER_PACKET);

    loop {
        let chunk;
        (chunk, remaining) = remaining.split_at(chunk_size);

        let header = write_packet_header_array(*sequence_id, chunk_size);
        *sequence_id = sequence_id.wrapping_add(1);

        writer.write_all(&header)?;
        writer.write_all(chunk)?;

        // An empty terminating frame is emitted when the previous chunk
        // was full-sized, including the zero-length tail case.
        if chunk_size < MAX_PAYLOAD_PER_PACKET {
            return Ok(());
        }
        chunk_size = remaining.len().min(MAX_PAYLOAD_PER_PACKET);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(payload: &[u8], start_seq: u8) -> (Vec<u8>, u8, u8) {
        let mut wire = Vec::new();
        let mut write_seq = start_seq;
        write_payload(&mut wire, &mut write_seq, payload).unwrap();

        let mut read_seq = start_seq;
        let mut out = Vec::new();
        read_payload(&mut Cursor::new(&wire), &mut read_seq, &mut out).unwrap();
        assert_eq!(read_seq, write_seq);
        (out, write_seq, read_seq)
    }

    #[test]
    fn small_payload_round_trip() {
        let (out, seq, _) = round_trip(b"\x03SELECT 1", 0);
        assert_eq!(out, b"\x03SELECT 1");
        assert_eq!(seq, 1);
    }

    #[test]
    fn empty_payload_round_trip() {
        let (out, seq, _) = round_trip(b"", 5);
        assert!(out.is_empty());
        assert_eq!(seq, 6);
    }

    #[test]
    fn boundary_payload_splits_into_full_and_empty_frame() {
        let payload = vec![0xaa; MAX_PAYLOAD_PER_PACKET];
        let mut wire = Vec::new();
        let mut seq = 3;
        write_payload(&mut wire, &mut seq, &payload).unwrap();

        // Two frames: a full one with id 3 and an empty terminator with id 4.
        assert_eq!(wire.len(), 4 + MAX_PAYLOAD_PER_PACKET + 4);
        let first = PacketHeader::from_bytes(&wire).unwrap();
        assert_eq!(first.length(), MAX_PAYLOAD_PER_PACKET);
        assert_eq!(first.sequence_id, 3);
        let second = PacketHeader::from_bytes(&wire[4 + MAX_PAYLOAD_PER_PACKET..]).unwrap();
        assert_eq!(second.length(), 0);
        assert_eq!(second.sequence_id, 4);
        assert_eq!(seq, 5);

        let mut read_seq = 3;
        let mut out = Vec::new();
        read_payload(&mut Cursor::new(&wire), &mut read_seq, &mut out).unwrap();
        assert_eq!(out, payload);
        assert_eq!(read_seq, 5);
    }

    #[test]
    fn oversized_payload_round_trip() {
        let payload = vec![0x55; MAX_PAYLOAD_PER_PACKET + 17];
        let (out, seq, _) = round_trip(&payload, 0);
        assert_eq!(out, payload);
        assert_eq!(seq, 2);
    }

    #[test]
    fn sequence_id_jump_is_fatal() {
        let mut wire = Vec::new();
        let mut seq = 0;
        write_payload(&mut wire, &mut seq, b"ok").unwrap();
        wire[3] = 7; // corrupt the frame id

        let mut read_seq = 0;
        let mut out = Vec::new();
        let err = read_payload(&mut Cursor::new(&wire), &mut read_seq, &mut out).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedSequenceId {
                expected: 0,
                actual: 7
            }
        ));
    }

    #[test]
    fn sequence_id_wraps_at_255() {
        let (out, seq, _) = round_trip(b"x", 255);
        assert_eq!(out, b"x");
        assert_eq!(seq, 0);
    }
}
