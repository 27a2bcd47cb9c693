//! JPEG2000 to PNG conversion

use image::DynamicImage;

use super::error::TranscodeError;
use crate::pdf::encode_png;

/// Decoder for JPEG2000 payloads
pub trait Jpeg2000Decoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, TranscodeError>;
}

/// OpenJPEG-backed decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenJpegDecoder;

impl Jpeg2000Decoder for OpenJpegDecoder {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, TranscodeError> {
        let image = jpeg2k::Image::from_bytes(data)
            .map_err(|e| TranscodeError::Decode(e.to_string()))?;
        DynamicImage::try_from(&image).map_err(|e| TranscodeError::Decode(e.to_string()))
    }
}

/// Decode a JPEG2000 payload and re-encode it as PNG.
///
/// Images with an alpha channel are flattened to RGB first.
pub fn transcode_to_png(
    decoder: &dyn Jpeg2000Decoder,
    data: &[u8],
) -> Result<Vec<u8>, TranscodeError> {
    let image = decoder.decode(data)?;

    let image = if image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    };

    encode_png(&image).map_err(|e| TranscodeError::Encode(e.to_string()))
}
