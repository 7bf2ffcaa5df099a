use super::{ImagePartDescriptor, PixelFormat, RgbImage};

#[inline]
fn avg2(a: u8, b: u8) -> u8 {
    ((u16::from(a) + u16::from(b) + 1) >> 1) as u8
}

#[inline]
fn avg4(a: u8, b: u8, c: u8, d: u8) -> u8 {
    ((u16::from(a) + u16::from(b) + u16::from(c) + u16::from(d) + 2) >> 2) as u8
}

/// Row and column parity of the red sample; blue sits at the opposite
/// parities and green fills the rest.
fn red_position(format: PixelFormat) -> Option<(usize, usize)> {
    match format {
        PixelFormat::BayerRG8 => Some((0, 0)),
        PixelFormat::BayerGR8 => Some((0, 1)),
        PixelFormat::BayerGB8 => Some((1, 0)),
        PixelFormat::BayerBG8 => Some((1, 1)),
        _ => None,
    }
}

/// Copies a source row into `ext` with one duplicated pixel on each side,
/// so the per-pixel averages below never index out of range.
fn extend_row(ext: &mut [u8], src: &[u8], stride: usize, width: usize, y: usize) {
    let row = &src[y * stride..y * stride + width];
    ext[0] = row[0];
    ext[1..=width].copy_from_slice(row);
    ext[width + 1] = row[width - 1];
}

/// Bilinear-with-averaging demosaic over a 3-row sliding window.
///
/// The missing vertical neighbor at the top and bottom image rows is
/// replaced by the opposite neighbor, which has the parity the averages
/// expect.
pub(super) fn demosaic(desc: &ImagePartDescriptor, src: &[u8]) -> Option<RgbImage> {
    let (red_row, red_col) = red_position(desc.pixel_format)?;
    let width = desc.width as usize;
    let height = desc.height as usize;
    let stride = width + desc.x_padding as usize;

    let mut above = vec![0u8; width + 2];
    let mut current = vec![0u8; width + 2];
    let mut below = vec![0u8; width + 2];
    let mut out = RgbImage::with_capacity(desc.width, desc.height);

    for y in 0..height {
        let up = if y == 0 { usize::min(1, height - 1) } else { y - 1 };
        let down = if y + 1 == height {
            height.saturating_sub(2)
        } else {
            y + 1
        };
        extend_row(&mut above, src, stride, width, up);
        extend_row(&mut current, src, stride, width, y);
        extend_row(&mut below, src, stride, width, down);

        let row_parity = y & 1;
        for x in 0..width {
            let col_parity = x & 1;
            let i = x + 1;

            let (r, g, b) = if row_parity == red_row && col_parity == red_col {
                // Red sample: green from the cross, blue from the diagonals.
                (
                    current[i],
                    avg4(above[i], below[i], current[i - 1], current[i + 1]),
                    avg4(above[i - 1], above[i + 1], below[i - 1], below[i + 1]),
                )
            } else if row_parity != red_row && col_parity != red_col {
                // Blue sample, mirror image of the red case.
                (
                    avg4(above[i - 1], above[i + 1], below[i - 1], below[i + 1]),
                    avg4(above[i], below[i], current[i - 1], current[i + 1]),
                    current[i],
                )
            } else if row_parity == red_row {
                // Green on a red row: red lies left/right, blue above/below.
                (
                    avg2(current[i - 1], current[i + 1]),
                    current[i],
                    avg2(above[i], below[i]),
                )
            } else {
                // Green on a blue row.
                (
                    avg2(above[i], below[i]),
                    current[i],
                    avg2(current[i - 1], current[i + 1]),
                )
            };

            out.pixels.extend_from_slice(&[r, g, b]);
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Endianness;

    fn desc(width: u32, height: u32, format: PixelFormat) -> ImagePartDescriptor {
        ImagePartDescriptor {
            width,
            height,
            x_offset: 0,
            y_offset: 0,
            x_padding: 0,
            y_padding: 0,
            pixel_format: format,
            endianness: Endianness::Little,
        }
    }

    /// Encodes a uniform (r, g, b) color into the given Bayer mosaic.
    fn flat_field(
        width: usize,
        height: usize,
        format: PixelFormat,
        color: (u8, u8, u8),
    ) -> Vec<u8> {
        let (red_row, red_col) = red_position(format).unwrap();
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let value = if (y & 1) == red_row && (x & 1) == red_col {
                    color.0
                } else if (y & 1) != red_row && (x & 1) != red_col {
                    color.2
                } else {
                    color.1
                };
                data.push(value);
            }
        }
        data
    }

    #[test]
    fn test_flat_field_recovers_color() {
        let color = (200, 120, 40);
        for format in [
            PixelFormat::BayerRG8,
            PixelFormat::BayerGR8,
            PixelFormat::BayerGB8,
            PixelFormat::BayerBG8,
        ] {
            let src = flat_field(4, 4, format, color);
            let rgb = demosaic(&desc(4, 4, format), &src).unwrap();
            for y in 1..3 {
                for x in 1..3 {
                    let (r, g, b) = rgb.pixel(x, y);
                    assert!(r.abs_diff(color.0) <= 1, "{format:?} r at ({x},{y})");
                    assert!(g.abs_diff(color.1) <= 1, "{format:?} g at ({x},{y})");
                    assert!(b.abs_diff(color.2) <= 1, "{format:?} b at ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn test_borders_stay_in_range() {
        // Any panic here would be an out-of-range read at the borders.
        let src = flat_field(6, 5, PixelFormat::BayerGB8, (10, 250, 90));
        let rgb = demosaic(&desc(6, 5, PixelFormat::BayerGB8), &src).unwrap();
        assert_eq!(rgb.pixels.len(), 6 * 5 * 3);
    }

    #[test]
    fn test_sampled_positions_pass_through() {
        let mut src = flat_field(4, 4, PixelFormat::BayerRG8, (0, 0, 0));
        src[0] = 99; // red sample at (0, 0)
        let rgb = demosaic(&desc(4, 4, PixelFormat::BayerRG8), &src).unwrap();
        assert_eq!(rgb.pixel(0, 0).0, 99);
    }

    #[test]
    fn test_respects_row_padding() {
        let mut d = desc(2, 2, PixelFormat::BayerRG8);
        d.x_padding = 3;
        // Rows: [R G] pad pad pad / [G B] pad pad pad
        let src = [10, 20, 0xEE, 0xEE, 0xEE, 20, 30, 0xEE, 0xEE, 0xEE];
        let rgb = demosaic(&d, &src).unwrap();
        // Sampled positions pass through untouched; padding bytes never
        // leak into any channel.
        assert_eq!(rgb.pixel(0, 0).0, 10);
        assert_eq!(rgb.pixel(1, 1).2, 30);
        assert!(rgb.pixels.iter().all(|&v| v < 0xEE));
    }

    #[test]
    fn test_non_bayer_format_rejected() {
        assert!(demosaic(&desc(2, 2, PixelFormat::Mono8), &[0u8; 4]).is_none());
    }
}
