pub mod binding;
pub mod buffer;
pub mod capture;
mod error;
pub mod pixel;
pub mod trailer;
pub mod view;

pub use binding::{CachePolicy, ChunkNodeDesc, ChunkPortBinding, ChunkSchema};
pub use buffer::{
    Endianness, InfoKey, InfoValue, PartDataType, PartRegion, PayloadType, RawBuffer, StreamInfo,
};
pub use error::{DecodeError, Result};
pub use pixel::{ImagePartDescriptor, MonoImage, PixelFormat, RgbImage};
pub use trailer::{
    decode_trailer, explicit_records, ChunkId, ChunkRecord, Crc16, CrcConfig, EncodingFamily,
    GencpEvent, TrailerConfig,
};
pub use view::BufferView;
