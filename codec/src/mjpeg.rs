//! Motion JPEG encoding.

use crate::{convert, CodecError, Frame, VideoEncoder};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// Encodes each frame as an independent baseline JPEG.
#[derive(Debug)]
pub struct MjpegEncoder {
    width: u32,
    height: u32,
    quality: u8,
    monochrome: bool,
}

impl MjpegEncoder {
    /// Create an encoder for frames of a fixed size.
    ///
    /// `quality` is clamped to `1..=100`.
    #[must_use]
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            quality: quality.clamp(1, 100),
            monochrome: false,
        }
    }

    /// Encode single-channel luma instead of color.
    #[must_use]
    pub const fn monochrome(mut self, monochrome: bool) -> Self {
        self.monochrome = monochrome;
        self
    }

    /// Frame size this encoder accepts.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Encode one frame to JPEG bytes.
pub(crate) fn encode_jpeg(frame: &Frame, quality: u8, monochrome: bool) -> Result<Vec<u8>, CodecError> {
    let (pixels, color) = if monochrome {
        (convert::to_luma(frame)?, ExtendedColorType::L8)
    } else {
        (frame.packed_rgb()?, ExtendedColorType::Rgb8)
    };

    let mut out = Vec::with_capacity(pixels.len() / 8);
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .write_image(&pixels, frame.width, frame.height, color)
        .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;
    Ok(out)
}

impl VideoEncoder for MjpegEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<Vec<u8>, CodecError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(CodecError::EncodingFailed(format!(
                "Frame size {}x{} doesn't match encoder {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(CodecError::EncodingFailed("empty frame".into()));
        }
        encode_jpeg(frame, self.quality, self.monochrome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    fn gradient(width: u32, height: u32, format: PixelFormat) -> Frame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 8) as u8, (y * 8) as u8, 128]);
            }
        }
        Frame::new(data, width, height, format).unwrap()
    }

    #[test]
    fn produces_jpeg_markers() {
        let mut encoder = MjpegEncoder::new(16, 8, 80);
        let jpeg = encoder.encode(&gradient(16, 8, PixelFormat::Rgb24)).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn monochrome_decodes_as_luma() {
        let mut encoder = MjpegEncoder::new(8, 8, 90).monochrome(true);
        let jpeg = encoder.encode(&gradient(8, 8, PixelFormat::Bgr24)).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
    }

    #[test]
    fn rejects_size_change() {
        let mut encoder = MjpegEncoder::new(16, 8, 80);
        let err = encoder.encode(&gradient(8, 8, PixelFormat::Rgb24)).unwrap_err();
        assert!(matches!(err, CodecError::EncodingFailed(_)));
    }
}
