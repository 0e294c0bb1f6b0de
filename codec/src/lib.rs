//! Frame buffers and encoding primitives for camkit.
//!
//! This crate owns the pieces every other camkit crate agrees on:
//! - [`Frame`]: a shared, strided 24-bit pixel buffer
//! - [`PixelFormat`]: the channel order of that buffer
//! - [`Codec`] and [`FourCc`]: the two recording codecs and their identifiers
//! - [`convert`]: channel-order conversion between capture and encoder layouts
//! - [`MjpegEncoder`] and [`still`]: JPEG output via the `image` crate

#![warn(missing_docs)]

pub mod convert;
mod fourcc;
mod mjpeg;
pub mod still;

pub use fourcc::{Codec, CodecChoice, Container, FourCc};
pub use mjpeg::MjpegEncoder;

use std::sync::Arc;
use thiserror::Error;

/// Common error type for codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The codec or format is not supported.
    #[error("unsupported codec or format: {0}")]
    Unsupported(String),
    /// A pixel buffer does not match its declared geometry.
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),
    /// Encoding failed.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
    /// IO error while writing encoded output.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Generic video encoder trait.
pub trait VideoEncoder: Send {
    /// Encode a frame into a self-contained payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::EncodingFailed` if encoding fails.
    fn encode(&mut self, frame: &Frame) -> Result<Vec<u8>, CodecError>;
}

/// Pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 24-bit, red first.
    Rgb24,
    /// 24-bit, blue first.
    Bgr24,
    /// 32-bit RGBA.
    Rgba32,
}

impl PixelFormat {
    /// Bytes used by a single pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Rgba32 => 4,
        }
    }
}

/// A single frame of image data.
///
/// Rows are `stride` bytes apart; `stride` may be larger than
/// `width * bytes_per_pixel` when rows are padded.
#[derive(Clone)]
pub struct Frame {
    /// Raw pixel data, shared between holders.
    pub data: Arc<Vec<u8>>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row.
    pub stride: usize,
    /// Channel layout of `data`.
    pub format: PixelFormat,
    /// Timestamp in nanoseconds since capture start.
    pub timestamp_ns: u64,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("timestamp_ns", &self.timestamp_ns)
            .finish_non_exhaustive()
    }
}

impl Frame {
    /// Create a tightly packed frame.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidBuffer` if `data` is shorter than the geometry needs.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, CodecError> {
        let stride = width as usize * format.bytes_per_pixel();
        Self::with_stride(data, width, height, stride, format)
    }

    /// Create a frame whose rows are `stride` bytes apart.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidBuffer` if the stride is narrower than a row
    /// or `data` cannot hold `height` rows.
    pub fn with_stride(
        data: Vec<u8>,
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self, CodecError> {
        convert::check_geometry(data.len(), stride, width, height, format.bytes_per_pixel())?;
        Ok(Self {
            data: Arc::new(data),
            width,
            height,
            stride,
            format,
            timestamp_ns: 0,
        })
    }

    /// Attach a timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    /// Frame dimensions as `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes of pixel data in one row, excluding padding.
    #[must_use]
    pub const fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Convert to another channel layout.
    ///
    /// Returns a shared clone when the layout already matches. Otherwise the
    /// result is a freshly allocated, tightly packed buffer.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Unsupported` for conversions other than
    /// 24-bit channel swaps and `CodecError::InvalidBuffer` for malformed frames.
    pub fn to_format(&self, target: PixelFormat) -> Result<Self, CodecError> {
        if self.format == target {
            return Ok(self.clone());
        }
        match (self.format, target) {
            (PixelFormat::Rgb24, PixelFormat::Bgr24) | (PixelFormat::Bgr24, PixelFormat::Rgb24) => {
                let dst_stride = self.row_bytes();
                let mut dst = vec![0u8; dst_stride * self.height as usize];
                convert::swap_red_blue(
                    &self.data,
                    self.stride,
                    &mut dst,
                    dst_stride,
                    self.width,
                    self.height,
                )?;
                Ok(Self {
                    data: Arc::new(dst),
                    width: self.width,
                    height: self.height,
                    stride: dst_stride,
                    format: target,
                    timestamp_ns: self.timestamp_ns,
                })
            }
            (from, to) => Err(CodecError::Unsupported(format!(
                "conversion from {from:?} to {to:?}"
            ))),
        }
    }

    /// Tightly packed RGB bytes, whatever the source layout.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Unsupported` for non 24-bit frames.
    pub fn packed_rgb(&self) -> Result<Vec<u8>, CodecError> {
        let row = self.row_bytes();
        if row == 0 || self.height == 0 {
            return match self.format {
                PixelFormat::Rgba32 => Err(CodecError::Unsupported(
                    "packed RGB from RGBA frame".into(),
                )),
                PixelFormat::Rgb24 | PixelFormat::Bgr24 => Ok(Vec::new()),
            };
        }
        match self.format {
            PixelFormat::Rgb24 => {
                if self.stride == row {
                    return Ok(self.data[..row * self.height as usize].to_vec());
                }
                let mut out = Vec::with_capacity(row * self.height as usize);
                for line in self.data.chunks(self.stride).take(self.height as usize) {
                    out.extend_from_slice(&line[..row]);
                }
                Ok(out)
            }
            PixelFormat::Bgr24 => {
                let mut out = vec![0u8; row * self.height as usize];
                convert::swap_red_blue(
                    &self.data,
                    self.stride,
                    &mut out,
                    row,
                    self.width,
                    self.height,
                )?;
                Ok(out)
            }
            PixelFormat::Rgba32 => Err(CodecError::Unsupported(
                "packed RGB from RGBA frame".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_short_buffer() {
        let err = Frame::new(vec![0; 5], 2, 1, PixelFormat::Rgb24).unwrap_err();
        assert!(matches!(err, CodecError::InvalidBuffer(_)));
    }

    #[test]
    fn to_format_same_layout_shares_buffer() {
        let frame = Frame::new(vec![1, 2, 3], 1, 1, PixelFormat::Bgr24).unwrap();
        let same = frame.to_format(PixelFormat::Bgr24).unwrap();
        assert!(Arc::ptr_eq(&frame.data, &same.data));
    }

    #[test]
    fn to_format_drops_row_padding() {
        // 1x2 BGR with 4-byte stride.
        let frame =
            Frame::with_stride(vec![1, 2, 3, 0, 4, 5, 6, 0], 1, 2, 4, PixelFormat::Bgr24).unwrap();
        let rgb = frame.to_format(PixelFormat::Rgb24).unwrap();
        assert_eq!(rgb.stride, 3);
        assert_eq!(rgb.data.as_slice(), &[3, 2, 1, 6, 5, 4]);
        assert!(!Arc::ptr_eq(&frame.data, &rgb.data));
    }

    #[test]
    fn packed_rgb_strips_padding() {
        let frame =
            Frame::with_stride(vec![9, 8, 7, 0, 6, 5, 4, 0], 1, 2, 4, PixelFormat::Rgb24).unwrap();
        assert_eq!(frame.packed_rgb().unwrap(), vec![9, 8, 7, 6, 5, 4]);
    }

    #[test]
    fn zero_height_frame_packs_to_nothing() {
        for format in [PixelFormat::Rgb24, PixelFormat::Bgr24] {
            let frame = Frame::with_stride(Vec::new(), 4, 0, 0, format).unwrap();
            assert!(frame.packed_rgb().unwrap().is_empty());
            let swapped = frame.to_format(match format {
                PixelFormat::Rgb24 => PixelFormat::Bgr24,
                _ => PixelFormat::Rgb24,
            });
            assert!(swapped.unwrap().data.is_empty());
        }
    }

    #[test]
    fn rgba_to_rgb24_is_unsupported() {
        let frame = Frame::new(vec![0; 4], 1, 1, PixelFormat::Rgba32).unwrap();
        assert!(matches!(
            frame.to_format(PixelFormat::Rgb24),
            Err(CodecError::Unsupported(_))
        ));
    }
}
