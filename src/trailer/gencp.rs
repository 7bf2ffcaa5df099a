use super::{ChunkId, ChunkRecord};
use crate::buffer::RawBuffer;
use crate::error::{DecodeError, Result};

/// Serial-link packet preamble.
pub const GENCP_PREAMBLE: u16 = 0x0100;

/// Command id of an event packet carrying chunk data.
pub const GENCP_EVENT_CMD: u16 = 0x0C00;

/// Preamble + channel id + flags + command id + length + request id.
const HEADER_SIZE: usize = 12;

/// Event id + reserved + timestamp.
const EVENT_FIXED_SIZE: usize = 12;

/// A decoded GenCP event packet, little-endian on the wire.
///
/// The `length` field counts everything after the request id: the event id,
/// a reserved word, the 64-bit device timestamp and the chunk data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GencpEvent {
    pub channel_id: u16,
    pub flags: u16,
    pub request_id: u16,
    pub event_id: u16,
    pub timestamp: u64,
    pub data_offset: usize,
    pub data_length: usize,
}

#[inline]
fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Parses the event packet occupying the buffer's trailer region.
pub fn parse_event(buffer: &RawBuffer) -> Result<GencpEvent> {
    let base = buffer.image_extent();
    let trailer = buffer.trailer_bytes();

    if trailer.len() < HEADER_SIZE + EVENT_FIXED_SIZE {
        return Err(DecodeError::MalformedTrailer(format!(
            "trailer of {} bytes is too short for an event packet",
            trailer.len()
        )));
    }

    let preamble = read_u16(trailer, 0);
    if preamble != GENCP_PREAMBLE {
        return Err(DecodeError::MalformedTrailer(format!(
            "preamble 0x{preamble:04x} does not match 0x{GENCP_PREAMBLE:04x}"
        )));
    }

    let channel_id = read_u16(trailer, 2);
    let flags = read_u16(trailer, 4);
    let command_id = read_u16(trailer, 6);
    let length = read_u16(trailer, 8) as usize;
    let request_id = read_u16(trailer, 10);

    if command_id != GENCP_EVENT_CMD {
        return Err(DecodeError::MalformedTrailer(format!(
            "command 0x{command_id:04x} is not an event packet"
        )));
    }
    if length < EVENT_FIXED_SIZE || HEADER_SIZE + length != trailer.len() {
        return Err(DecodeError::MalformedTrailer(format!(
            "payload length {length} is inconsistent with trailer size {}",
            trailer.len()
        )));
    }

    let event_id = read_u16(trailer, 12);
    let timestamp = u64::from_le_bytes([
        trailer[16],
        trailer[17],
        trailer[18],
        trailer[19],
        trailer[20],
        trailer[21],
        trailer[22],
        trailer[23],
    ]);

    Ok(GencpEvent {
        channel_id,
        flags,
        request_id,
        event_id,
        timestamp,
        data_offset: base + HEADER_SIZE + EVENT_FIXED_SIZE,
        data_length: length - EVENT_FIXED_SIZE,
    })
}

/// Decodes the event packet into a single chunk record keyed by event id.
pub(super) fn decode(buffer: &RawBuffer) -> Result<Vec<ChunkRecord>> {
    let event = parse_event(buffer)?;
    Ok(vec![ChunkRecord {
        id: ChunkId::Numeric(u64::from(event.event_id)),
        offset: event.data_offset,
        length: event.data_length,
    }])
}
