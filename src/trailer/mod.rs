mod crc;
mod gencp;
mod walker;

pub use crc::{Crc16, CrcConfig};
pub use gencp::{GencpEvent, GENCP_EVENT_CMD, GENCP_PREAMBLE};

use std::fmt;

use crate::buffer::RawBuffer;
use crate::error::{DecodeError, Result};

/// Identifier of one device-appended metadata chunk.
///
/// Numeric when the wire id fits 64 bits, raw bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChunkId {
    Numeric(u64),
    Bytes(Vec<u8>),
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "0x{id:08x}"),
            Self::Bytes(bytes) => write!(f, "{}", hex::encode(bytes)),
        }
    }
}

/// One decoded chunk: where its payload lives inside the buffer.
///
/// `offset + length` never exceeds the buffer's filled size; the decoders
/// validate every embedded length against the slice bounds before emitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub offset: usize,
    pub length: usize,
}

/// Wire encoding of a buffer's chunk trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingFamily {
    GigeVision,
    Usb3Vision,
    GenDc,
    GenCp,
}

impl EncodingFamily {
    /// Resolves the family named in deployment configuration.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "gev" | "gige-vision" => Ok(Self::GigeVision),
            "u3v" | "usb3-vision" => Ok(Self::Usb3Vision),
            "gendc" => Ok(Self::GenDc),
            "gencp" | "camera-link" => Ok(Self::GenCp),
            other => Err(DecodeError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for EncodingFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GigeVision => "GigE Vision",
            Self::Usb3Vision => "USB3 Vision",
            Self::GenDc => "GenDC",
            Self::GenCp => "GenCP",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TrailerConfig {
    /// Upper bound on emitted entries before the walk is declared runaway.
    pub max_entries: usize,
}

impl Default for TrailerConfig {
    fn default() -> Self {
        Self { max_entries: 4096 }
    }
}

/// Scans the buffer's trailer into chunk records for the given family.
///
/// Records come out in trailer-encounter order, which for the backward
/// walking families is the reverse of append order. A structural violation
/// aborts the whole pass; no partial record list is returned.
pub fn decode_trailer(
    family: EncodingFamily,
    buffer: &RawBuffer,
    config: &TrailerConfig,
) -> Result<Vec<ChunkRecord>> {
    match family {
        EncodingFamily::GigeVision => walker::walk(buffer, walker::GIGE_VISION, config),
        EncodingFamily::Usb3Vision => walker::walk(buffer, walker::USB3_VISION, config),
        EncodingFamily::GenDc => walker::walk(buffer, walker::GENDC, config),
        EncodingFamily::GenCp => gencp::decode(buffer),
    }
}

/// Passes caller-supplied `(id, offset, length)` triples through as records,
/// validating each against the buffer's filled extent.
///
/// Used when the transport layer already exposes structured chunk metadata
/// and no byte scanning is needed.
pub fn explicit_records(
    buffer: &RawBuffer,
    triples: &[(u64, usize, usize)],
) -> Result<Vec<ChunkRecord>> {
    let filled = buffer.filled();
    let mut records = Vec::with_capacity(triples.len());

    for &(id, offset, length) in triples {
        let end = offset.checked_add(length).filter(|&end| end <= filled);
        if end.is_none() {
            return Err(DecodeError::MalformedTrailer(format!(
                "explicit chunk 0x{id:08x} spans {offset}+{length}, beyond filled size {filled}"
            )));
        }
        records.push(ChunkRecord {
            id: ChunkId::Numeric(id),
            offset,
            length,
        });
    }

    Ok(records)
}
