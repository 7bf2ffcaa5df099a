mod bayer;
mod ycbcr;

use crate::buffer::Endianness;

/// Pixel format tag of an image part; drives decode dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Mono8,
    Confidence8,
    Error8,
    Rgb8,
    BayerGR8,
    BayerRG8,
    BayerGB8,
    BayerBG8,
    YCbCr411_8,
    YCbCr422_8,
    Yuv422_8,
    Other(u32),
}

impl PixelFormat {
    pub const fn from_code(code: u32) -> Self {
        match code {
            0x0108_0001 => Self::Mono8,
            0x0108_00C6 => Self::Confidence8,
            0x0108_00C7 => Self::Error8,
            0x0218_0014 => Self::Rgb8,
            0x0108_0008 => Self::BayerGR8,
            0x0108_0009 => Self::BayerRG8,
            0x0108_000A => Self::BayerGB8,
            0x0108_000B => Self::BayerBG8,
            0x020C_005A => Self::YCbCr411_8,
            0x0210_003B => Self::YCbCr422_8,
            0x0210_0032 => Self::Yuv422_8,
            c => Self::Other(c),
        }
    }

    pub const fn code(&self) -> u32 {
        match self {
            Self::Mono8 => 0x0108_0001,
            Self::Confidence8 => 0x0108_00C6,
            Self::Error8 => 0x0108_00C7,
            Self::Rgb8 => 0x0218_0014,
            Self::BayerGR8 => 0x0108_0008,
            Self::BayerRG8 => 0x0108_0009,
            Self::BayerGB8 => 0x0108_000A,
            Self::BayerBG8 => 0x0108_000B,
            Self::YCbCr411_8 => 0x020C_005A,
            Self::YCbCr422_8 => 0x0210_003B,
            Self::Yuv422_8 => 0x0210_0032,
            Self::Other(c) => *c,
        }
    }

    pub const fn bits_per_pixel(&self) -> Option<u32> {
        match self {
            Self::Mono8 | Self::Confidence8 | Self::Error8 => Some(8),
            Self::BayerGR8 | Self::BayerRG8 | Self::BayerGB8 | Self::BayerBG8 => Some(8),
            Self::YCbCr411_8 => Some(12),
            Self::YCbCr422_8 | Self::Yuv422_8 => Some(16),
            Self::Rgb8 => Some(24),
            Self::Other(_) => None,
        }
    }
}

/// Geometry and format of one image part, derived per query.
#[derive(Debug, Clone, Copy)]
pub struct ImagePartDescriptor {
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub x_padding: u32,
    pub y_padding: u32,
    pub pixel_format: PixelFormat,
    pub endianness: Endianness,
}

impl ImagePartDescriptor {
    /// Source bytes per row including the x-padding tail.
    pub fn row_stride(&self) -> Option<usize> {
        let bits = self.pixel_format.bits_per_pixel()?;
        Some((self.width as usize * bits as usize) / 8 + self.x_padding as usize)
    }

    /// Whether `src` holds at least `height` rows; the last row may omit
    /// the padding tail.
    fn covers(&self, src: &[u8]) -> bool {
        let Some(stride) = self.row_stride() else {
            return false;
        };
        if self.height == 0 {
            return true;
        }
        let body = stride * (self.height as usize - 1);
        let last = stride - self.x_padding as usize;
        src.len() >= body + last
    }
}

/// Packed row-major RGB, 3 bytes per pixel, padding removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbImage {
    pub(crate) fn with_capacity(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: Vec::with_capacity(width as usize * height as usize * 3),
        }
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let base = (y as usize * self.width as usize + x as usize) * 3;
        (self.pixels[base], self.pixels[base + 1], self.pixels[base + 2])
    }
}

/// Packed row-major 8-bit mono, padding removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Converts a row-padded source region to packed RGB.
///
/// Returns `None` for formats this decoder does not handle or when the
/// source is shorter than the geometry demands, so callers can fall back
/// to storing the raw bytes.
pub fn to_rgb(desc: &ImagePartDescriptor, src: &[u8]) -> Option<RgbImage> {
    if desc.width == 0 || desc.height == 0 || !desc.covers(src) {
        return None;
    }
    match desc.pixel_format {
        PixelFormat::Mono8 | PixelFormat::Confidence8 | PixelFormat::Error8 => {
            Some(gray_to_rgb(desc, src))
        }
        PixelFormat::Rgb8 => Some(copy_rgb(desc, src)),
        PixelFormat::BayerGR8
        | PixelFormat::BayerRG8
        | PixelFormat::BayerGB8
        | PixelFormat::BayerBG8 => bayer::demosaic(desc, src),
        PixelFormat::YCbCr411_8 => ycbcr::decode_411(desc, src),
        PixelFormat::YCbCr422_8 | PixelFormat::Yuv422_8 => ycbcr::decode_422(desc, src),
        PixelFormat::Other(_) => None,
    }
}

/// Converts a row-padded source region to packed mono.
///
/// 8-bit single-channel sources are copied row by row; everything else goes
/// through the RGB conversion and the fixed-point luma transform.
pub fn to_mono(desc: &ImagePartDescriptor, src: &[u8]) -> Option<MonoImage> {
    if desc.width == 0 || desc.height == 0 || !desc.covers(src) {
        return None;
    }
    match desc.pixel_format {
        PixelFormat::Mono8 | PixelFormat::Confidence8 | PixelFormat::Error8 => {
            Some(copy_gray(desc, src))
        }
        _ => {
            let rgb = to_rgb(desc, src)?;
            let mut pixels = Vec::with_capacity(rgb.pixels.len() / 3);
            for px in rgb.pixels.chunks_exact(3) {
                pixels.push(ycbcr::luma(px[0], px[1], px[2]));
            }
            Some(MonoImage {
                width: rgb.width,
                height: rgb.height,
                pixels,
            })
        }
    }
}

/// Downsampled preview: one output pixel per `factor`x`factor` block,
/// averaging full-conversion pixels, rounding half up.
///
/// Trailing rows and columns that do not fill a whole block are dropped.
pub fn preview_rgb(desc: &ImagePartDescriptor, src: &[u8], factor: u32) -> Option<RgbImage> {
    if factor == 0 {
        return None;
    }
    let full = to_rgb(desc, src)?;
    let out_w = full.width / factor;
    let out_h = full.height / factor;
    if out_w == 0 || out_h == 0 {
        return None;
    }

    let count = u64::from(factor) * u64::from(factor);
    let mut out = RgbImage::with_capacity(out_w, out_h);
    for by in 0..out_h {
        for bx in 0..out_w {
            let mut sums = [0u64; 3];
            for dy in 0..factor {
                for dx in 0..factor {
                    let (r, g, b) = full.pixel(bx * factor + dx, by * factor + dy);
                    sums[0] += u64::from(r);
                    sums[1] += u64::from(g);
                    sums[2] += u64::from(b);
                }
            }
            for sum in sums {
                out.pixels.push(((sum + count / 2) / count) as u8);
            }
        }
    }
    Some(out)
}

fn copy_gray(desc: &ImagePartDescriptor, src: &[u8]) -> MonoImage {
    let width = desc.width as usize;
    let stride = width + desc.x_padding as usize;
    let mut pixels = Vec::with_capacity(width * desc.height as usize);
    for y in 0..desc.height as usize {
        let row = &src[y * stride..y * stride + width];
        pixels.extend_from_slice(row);
    }
    MonoImage {
        width: desc.width,
        height: desc.height,
        pixels,
    }
}

fn gray_to_rgb(desc: &ImagePartDescriptor, src: &[u8]) -> RgbImage {
    let mono = copy_gray(desc, src);
    let mut out = RgbImage::with_capacity(desc.width, desc.height);
    for value in mono.pixels {
        out.pixels.extend_from_slice(&[value, value, value]);
    }
    out
}

fn copy_rgb(desc: &ImagePartDescriptor, src: &[u8]) -> RgbImage {
    let row_bytes = desc.width as usize * 3;
    let stride = row_bytes + desc.x_padding as usize;
    let mut out = RgbImage::with_capacity(desc.width, desc.height);
    for y in 0..desc.height as usize {
        out.pixels
            .extend_from_slice(&src[y * stride..y * stride + row_bytes]);
    }
    out
}
