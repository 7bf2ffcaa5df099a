use tracing::trace;

use crate::binding::ChunkPortBinding;
use crate::buffer::{Endianness, InfoKey, PartDataType, PayloadType, StreamInfo};
use crate::pixel::{ImagePartDescriptor, PixelFormat};

/// Per-part query facade over one delivered buffer.
///
/// Each attribute resolves through a fallback chain: the part's own
/// transport metadata when the buffer is multi-part, then the chunk-bound
/// feature when the payload is chunk data and a schema binding is attached,
/// then whole-buffer producer metadata. A chain that runs dry yields the
/// documented default (0 / empty / false) instead of an error.
pub struct BufferView<'a> {
    source: &'a dyn StreamInfo,
    binding: Option<&'a ChunkPortBinding>,
    chunk_endianness: Endianness,
}

impl<'a> BufferView<'a> {
    pub fn new(source: &'a dyn StreamInfo) -> Self {
        Self {
            source,
            binding: None,
            chunk_endianness: Endianness::default(),
        }
    }

    pub fn with_binding(mut self, binding: &'a ChunkPortBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_chunk_endianness(mut self, endianness: Endianness) -> Self {
        self.chunk_endianness = endianness;
        self
    }

    pub fn payload_type(&self) -> PayloadType {
        self.source
            .info(None, InfoKey::PayloadType)
            .and_then(|value| value.as_u64())
            .map(|code| PayloadType::from_code(code as u32))
            .unwrap_or(PayloadType::Other(0))
    }

    pub fn is_multi_part(&self) -> bool {
        self.payload_type() == PayloadType::MultiPart
    }

    /// Number of parts: the dedicated transport query when multi-part,
    /// 0 for chunk-only payloads, 1 otherwise.
    pub fn part_count(&self) -> u64 {
        match self.payload_type() {
            PayloadType::MultiPart => self
                .source
                .info(None, InfoKey::PartCount)
                .and_then(|value| value.as_u64())
                .unwrap_or(0),
            PayloadType::ChunkData => 0,
            _ => 1,
        }
    }

    /// Whether the given part carries pixel data.
    pub fn has_image(&self, part: u32) -> bool {
        match self.payload_type() {
            PayloadType::MultiPart => self
                .source
                .info(Some(part), InfoKey::PartDataType)
                .and_then(|value| value.as_u64())
                .map(|code| PartDataType::from_code(code as u32).carries_image())
                .unwrap_or(false),
            PayloadType::ChunkData => true,
            _ => self
                .source
                .info(None, InfoKey::HasImage)
                .and_then(|value| value.as_bool())
                .unwrap_or(false),
        }
    }

    fn chunk_backed(&self, node: &str) -> Option<u64> {
        if self.payload_type() != PayloadType::ChunkData {
            return None;
        }
        let binding = self.binding?;
        let value = binding.chunk_value_u64(node, self.chunk_endianness).ok()?;
        trace!("{node} resolved from chunk data: {value}");
        Some(value)
    }

    fn attribute(&self, part: u32, key: InfoKey, chunk_node: &str) -> u64 {
        if self.is_multi_part() {
            if let Some(value) = self
                .source
                .info(Some(part), key)
                .and_then(|value| value.as_u64())
            {
                return value;
            }
        }
        if let Some(value) = self.chunk_backed(chunk_node) {
            return value;
        }
        self.source
            .info(None, key)
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
    }

    pub fn width(&self, part: u32) -> u64 {
        self.attribute(part, InfoKey::Width, "ChunkWidth")
    }

    pub fn height(&self, part: u32) -> u64 {
        self.attribute(part, InfoKey::Height, "ChunkHeight")
    }

    pub fn x_offset(&self, part: u32) -> u64 {
        self.attribute(part, InfoKey::XOffset, "ChunkOffsetX")
    }

    pub fn y_offset(&self, part: u32) -> u64 {
        self.attribute(part, InfoKey::YOffset, "ChunkOffsetY")
    }

    pub fn x_padding(&self, part: u32) -> u64 {
        self.attribute(part, InfoKey::XPadding, "ChunkPaddingX")
    }

    pub fn y_padding(&self, part: u32) -> u64 {
        self.attribute(part, InfoKey::YPadding, "ChunkPaddingY")
    }

    pub fn timestamp(&self) -> u64 {
        if let Some(value) = self.chunk_backed("ChunkTimestamp") {
            return value;
        }
        self.source
            .info(None, InfoKey::Timestamp)
            .and_then(|value| value.as_u64())
            .unwrap_or(0)
    }

    pub fn pixel_format(&self, part: u32) -> PixelFormat {
        PixelFormat::from_code(self.attribute(part, InfoKey::PixelFormat, "ChunkPixelFormat") as u32)
    }

    /// Payload size in bytes. The whole-buffer fallback subtracts the image
    /// start offset from the delivered size, so leading transport headers
    /// are not counted as pixel data.
    pub fn payload_size(&self, part: u32) -> u64 {
        if self.is_multi_part() {
            if let Some(value) = self
                .source
                .info(Some(part), InfoKey::Size)
                .and_then(|value| value.as_u64())
            {
                return value;
            }
        }
        let size = self
            .source
            .info(None, InfoKey::Size)
            .and_then(|value| value.as_u64())
            .unwrap_or(0);
        let image_offset = self
            .source
            .info(None, InfoKey::ImageOffset)
            .and_then(|value| value.as_u64())
            .unwrap_or(0);
        size.saturating_sub(image_offset)
    }

    /// Assembles the full descriptor feeding the pixel decoder.
    pub fn part_descriptor(&self, part: u32) -> ImagePartDescriptor {
        ImagePartDescriptor {
            width: self.width(part) as u32,
            height: self.height(part) as u32,
            x_offset: self.x_offset(part) as u32,
            y_offset: self.y_offset(part) as u32,
            x_padding: self.x_padding(part) as u32,
            y_padding: self.y_padding(part) as u32,
            pixel_format: self.pixel_format(part),
            endianness: self.chunk_endianness,
        }
    }
}
