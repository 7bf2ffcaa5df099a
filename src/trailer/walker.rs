use tracing::debug;

use super::{ChunkId, ChunkRecord, TrailerConfig};
use crate::buffer::RawBuffer;
use crate::error::{DecodeError, Result};

/// Bytes of one trailer entry: a 32-bit length followed by a 32-bit id.
const ENTRY_SIZE: usize = 8;

/// Per-family wire parameters of the backward-walking trailer layout.
#[derive(Debug, Clone, Copy)]
pub(super) struct EntryLayout {
    pub terminator: u32,
    pub big_endian: bool,
}

pub(super) const GIGE_VISION: EntryLayout = EntryLayout {
    terminator: 0xFFFF_FFFF,
    big_endian: true,
};

pub(super) const USB3_VISION: EntryLayout = EntryLayout {
    terminator: 0xFFFF_FFFF,
    big_endian: false,
};

pub(super) const GENDC: EntryLayout = EntryLayout {
    terminator: 0x0000_0000,
    big_endian: false,
};

#[inline]
fn read_u32(data: &[u8], offset: usize, big_endian: bool) -> u32 {
    let bytes = [
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ];
    if big_endian {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_le_bytes(bytes)
    }
}

/// Walks the trailer backward from the end of filled data.
///
/// Each entry sits immediately below the cursor and names the chunk payload
/// below itself. The walk ends at the family's terminator entry, which must
/// sit exactly on the declared image-data boundary. Every embedded length is
/// checked against the remaining trailer space before any read.
pub(super) fn walk(
    buffer: &RawBuffer,
    layout: EntryLayout,
    config: &TrailerConfig,
) -> Result<Vec<ChunkRecord>> {
    let data = buffer.filled_bytes();
    let boundary = buffer.image_extent();
    let mut cursor = data.len();
    let mut records = Vec::new();

    loop {
        if cursor < boundary + ENTRY_SIZE {
            return Err(DecodeError::MalformedTrailer(format!(
                "ran into the image boundary at {boundary} without a terminator"
            )));
        }

        let entry_start = cursor - ENTRY_SIZE;
        let length = read_u32(data, entry_start, layout.big_endian) as usize;
        let id = read_u32(data, entry_start + 4, layout.big_endian);
        cursor = entry_start;

        if id == layout.terminator {
            if cursor != boundary {
                return Err(DecodeError::MalformedTrailer(format!(
                    "terminator at {cursor} does not sit on the image boundary {boundary}"
                )));
            }
            debug!("trailer walk found {} chunk records", records.len());
            return Ok(records);
        }

        if length == 0 {
            return Err(DecodeError::MalformedTrailer(format!(
                "zero-length chunk entry for id 0x{id:08x} at {entry_start}"
            )));
        }
        if length > cursor - boundary {
            return Err(DecodeError::MalformedTrailer(format!(
                "chunk 0x{id:08x} claims {length} bytes with only {} left above the boundary",
                cursor - boundary
            )));
        }
        if records.len() >= config.max_entries {
            return Err(DecodeError::MalformedTrailer(format!(
                "more than {} trailer entries",
                config.max_entries
            )));
        }

        cursor -= length;
        records.push(ChunkRecord {
            id: ChunkId::Numeric(u64::from(id)),
            offset: cursor,
            length,
        });
    }
}
