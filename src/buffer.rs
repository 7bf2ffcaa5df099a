use bytes::Bytes;

use crate::error::{DecodeError, Result};

/// Byte order of multi-byte values embedded in a buffer or chunk window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Image,
    ChunkData,
    MultiPart,
    Other(u32),
}

impl PayloadType {
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Image,
            4 => Self::ChunkData,
            10 => Self::MultiPart,
            c => Self::Other(c),
        }
    }

    pub const fn code(&self) -> u32 {
        match self {
            Self::Image => 1,
            Self::ChunkData => 4,
            Self::MultiPart => 10,
            Self::Other(c) => *c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartDataType {
    Image2d,
    Plane2d,
    ConfidenceMap,
    Other(u32),
}

impl PartDataType {
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Image2d,
            2 => Self::Plane2d,
            6 => Self::ConfidenceMap,
            c => Self::Other(c),
        }
    }

    /// Whether a part carrying this tag holds pixel data.
    pub const fn carries_image(&self) -> bool {
        matches!(self, Self::Image2d | Self::Plane2d | Self::ConfidenceMap)
    }
}

/// One logical sub-region of a multi-part buffer.
#[derive(Debug, Clone, Copy)]
pub struct PartRegion {
    pub offset: usize,
    pub length: usize,
    pub data_type: PartDataType,
}

/// A read-only view of one in-flight acquisition buffer.
///
/// The transport layer owns the backing allocation; this handle is held
/// strictly between attach and detach. `filled` is the number of valid
/// bytes, `image_extent` the declared end of image payload. Any trailer
/// occupies `[image_extent, filled)`.
#[derive(Debug, Clone)]
pub struct RawBuffer {
    data: Bytes,
    filled: usize,
    image_extent: usize,
    payload_type: PayloadType,
    parts: Vec<PartRegion>,
}

impl RawBuffer {
    pub fn new(
        data: Bytes,
        filled: usize,
        image_extent: usize,
        payload_type: PayloadType,
    ) -> Result<Self> {
        if filled > data.len() {
            return Err(DecodeError::InvalidArgument(format!(
                "filled size {filled} exceeds buffer size {}",
                data.len()
            )));
        }
        if image_extent > filled {
            return Err(DecodeError::InvalidArgument(format!(
                "image extent {image_extent} exceeds filled size {filled}"
            )));
        }
        Ok(Self {
            data,
            filled,
            image_extent,
            payload_type,
            parts: Vec::new(),
        })
    }

    pub fn with_parts(mut self, parts: Vec<PartRegion>) -> Result<Self> {
        for part in &parts {
            if part.offset + part.length > self.filled {
                return Err(DecodeError::InvalidArgument(format!(
                    "part region {}+{} exceeds filled size {}",
                    part.offset, part.length, self.filled
                )));
            }
        }
        self.parts = parts;
        Ok(self)
    }

    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn filled(&self) -> usize {
        self.filled
    }

    #[inline]
    pub fn image_extent(&self) -> usize {
        self.image_extent
    }

    #[inline]
    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    /// Valid bytes only, image payload and trailer together.
    #[inline]
    pub fn filled_bytes(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// The trailer region following the image payload.
    #[inline]
    pub fn trailer_bytes(&self) -> &[u8] {
        &self.data[self.image_extent..self.filled]
    }

    #[inline]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn part(&self, index: usize) -> Option<&PartRegion> {
        self.parts.get(index)
    }

    pub fn part_bytes(&self, index: usize) -> Option<&[u8]> {
        let part = self.parts.get(index)?;
        Some(&self.data[part.offset..part.offset + part.length])
    }

    pub fn slice(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let end = offset.checked_add(length)?;
        if end > self.filled {
            return None;
        }
        Some(&self.data[offset..end])
    }
}

/// Keys of the transport layer's per-buffer / per-part info query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoKey {
    Width,
    Height,
    XOffset,
    YOffset,
    XPadding,
    YPadding,
    PixelFormat,
    Timestamp,
    PayloadType,
    PartCount,
    PartDataType,
    Size,
    ImageOffset,
    HasImage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    U64(u64),
    Bool(bool),
    Str(String),
}

impl InfoValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            Self::Bool(v) => Some(u64::from(*v)),
            Self::Str(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::U64(v) => Some(*v != 0),
            Self::Str(_) => None,
        }
    }
}

/// Keyed scalar/string metadata query served by the transport layer.
///
/// `part` is `None` for whole-buffer queries. Implementations return `None`
/// for keys that are unsupported or inapplicable to the buffer at hand
/// rather than fabricating values; callers treat `None` as "fall through".
pub trait StreamInfo {
    fn info(&self, part: Option<u32>, key: InfoKey) -> Option<InfoValue>;
}
