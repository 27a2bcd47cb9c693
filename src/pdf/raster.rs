//! Raw pixel rasterization
//!
//! Turns the decompressed sample data of a PDF image XObject into an
//! `image::DynamicImage`, honoring bit depth, color space, and an optional
//! soft mask used as alpha.

use std::io::Cursor;

use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage};

/// Upper bound on decoded pixels per image (roughly 16k x 6k)
const MAX_PIXELS: u64 = 100_000_000;

// ============================================================================
// Types
// ============================================================================

/// Color spaces we know how to turn into RGB or grayscale
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette lookup; `palette` holds `base.components()` bytes per entry
    Indexed { base: Box<ColorSpace>, palette: Vec<u8> },
}

impl ColorSpace {
    /// Number of samples per pixel in the image data
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::Gray => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Indexed { .. } => 1,
        }
    }
}

/// Geometry and sample layout of an image stream
#[derive(Debug, Clone)]
pub struct RasterSpec {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: ColorSpace,
}

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("Unsupported bits per component: {0}")]
    UnsupportedBitDepth(u8),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Truncated image data: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// Decoded pixels before an alpha channel is attached
enum Pixels {
    Gray(Vec<u8>),
    Rgb(Vec<u8>),
}

// ============================================================================
// Rasterization
// ============================================================================

/// Build an image from decompressed sample data.
///
/// `alpha`, when present, must already be unpacked to one byte per pixel
/// (see [`unpack_alpha`]); it is ignored if its length does not match.
pub fn rasterize(
    spec: &RasterSpec,
    data: &[u8],
    alpha: Option<&[u8]>,
) -> Result<DynamicImage, RasterError> {
    let (width, height) = (spec.width, spec.height);
    let indexed = matches!(spec.color_space, ColorSpace::Indexed { .. });

    let samples = unpack_samples(
        data,
        width,
        height,
        spec.color_space.components(),
        spec.bits_per_component,
        !indexed,
    )?;

    let pixels = match &spec.color_space {
        ColorSpace::Indexed { base, palette } => {
            let expanded = expand_palette(&samples, base.components(), palette);
            to_pixels(base, expanded)
        }
        other => to_pixels(other, samples),
    };

    let pixel_count = width as usize * height as usize;
    let alpha = alpha.filter(|mask| mask.len() == pixel_count);
    let invalid = || RasterError::InvalidDimensions { width, height };

    let image = match (pixels, alpha) {
        (Pixels::Gray(gray), None) => {
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, gray).ok_or_else(invalid)?)
        }
        (Pixels::Rgb(rgb), None) => {
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, rgb).ok_or_else(invalid)?)
        }
        (Pixels::Gray(gray), Some(mask)) => {
            let data = gray.iter().zip(mask).flat_map(|(&g, &a)| [g, a]).collect();
            DynamicImage::ImageLumaA8(
                GrayAlphaImage::from_raw(width, height, data).ok_or_else(invalid)?,
            )
        }
        (Pixels::Rgb(rgb), Some(mask)) => {
            let data = rgb
                .chunks_exact(3)
                .zip(mask)
                .flat_map(|(px, &a)| [px[0], px[1], px[2], a])
                .collect();
            DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, data).ok_or_else(invalid)?)
        }
    };

    Ok(image)
}

/// Unpack a soft mask (`/SMask`) stream to one alpha byte per pixel
pub fn unpack_alpha(
    data: &[u8],
    width: u32,
    height: u32,
    bits_per_component: u8,
) -> Result<Vec<u8>, RasterError> {
    unpack_samples(data, width, height, 1, bits_per_component, true)
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, RasterError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| RasterError::Encode(e.to_string()))?;
    Ok(buf)
}

// ============================================================================
// Helpers
// ============================================================================

/// Split packed rows into one byte per sample.
///
/// Rows are padded to a byte boundary. With `scale`, sub-byte samples are
/// stretched to 0..=255; without it (palette indices) they are kept as is.
/// 16-bit samples keep their high byte.
fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    components: usize,
    bits_per_component: u8,
    scale: bool,
) -> Result<Vec<u8>, RasterError> {
    if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(RasterError::InvalidDimensions { width, height });
    }

    let samples_per_row = width as usize * components;
    let row_bytes = match bits_per_component {
        1 | 2 | 4 | 8 => (samples_per_row * bits_per_component as usize).div_ceil(8),
        16 => samples_per_row * 2,
        other => return Err(RasterError::UnsupportedBitDepth(other)),
    };

    let expected = row_bytes * height as usize;
    if data.len() < expected {
        return Err(RasterError::Truncated {
            expected,
            actual: data.len(),
        });
    }

    let mut out = Vec::with_capacity(samples_per_row * height as usize);
    for row in data[..expected].chunks_exact(row_bytes) {
        match bits_per_component {
            8 => out.extend_from_slice(&row[..samples_per_row]),
            16 => out.extend(row.chunks_exact(2).map(|pair| pair[0])),
            bits => {
                let bits = bits as usize;
                let max = (1u16 << bits) - 1;
                for i in 0..samples_per_row {
                    let offset = i * bits;
                    let shift = 8 - bits - (offset % 8);
                    let value = u16::from(row[offset / 8] >> shift) & max;
                    out.push(if scale { (value * 255 / max) as u8 } else { value as u8 });
                }
            }
        }
    }

    Ok(out)
}

/// Replace palette indices with base color space samples.
/// Out-of-range indices map to zeroes.
fn expand_palette(indices: &[u8], base_components: usize, palette: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(indices.len() * base_components);
    for &index in indices {
        let start = index as usize * base_components;
        match palette.get(start..start + base_components) {
            Some(entry) => out.extend_from_slice(entry),
            None => out.extend(std::iter::repeat(0).take(base_components)),
        }
    }
    out
}

fn to_pixels(color_space: &ColorSpace, samples: Vec<u8>) -> Pixels {
    match color_space {
        ColorSpace::Gray => Pixels::Gray(samples),
        ColorSpace::Rgb => Pixels::Rgb(samples),
        ColorSpace::Cmyk => Pixels::Rgb(samples.chunks_exact(4).flat_map(cmyk_to_rgb).collect()),
        // Nested palettes are rejected when the color space is parsed
        ColorSpace::Indexed { .. } => Pixels::Gray(samples),
    }
}

fn cmyk_to_rgb(px: &[u8]) -> [u8; 3] {
    let k = 255 - u16::from(px[3]);
    let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
    [channel(px[0]), channel(px[1]), channel(px[2])]
}

// ============================================================================
// Tests
// ============================================================================
