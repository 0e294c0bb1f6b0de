//! Webcam enumeration and capture.
//!
//! Devices are listed with [`Camera::list`] and streamed with a
//! [`CaptureSession`], which owns the device on a dedicated delivery thread
//! and hands every captured frame to a [`FrameHandler`].
//!
//! Desktop platforms (Windows, macOS, Linux) capture through `nokhwa`. A
//! synthetic test-pattern device is available everywhere.

#![warn(missing_docs)]

mod pattern;
mod session;
mod sys;

pub use session::CaptureSession;

/// Errors that can occur with camera operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CameraError {
    /// Camera is not supported on this platform.
    #[error("camera not supported on this platform")]
    NotSupported,
    /// Failed to enumerate cameras.
    #[error("failed to enumerate cameras: {0}")]
    EnumerationFailed(String),
    /// Camera not found.
    #[error("camera not found: {0}")]
    NotFound(String),
    /// Failed to open camera.
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    /// Failed to start streaming.
    #[error("failed to start camera: {0}")]
    StartFailed(String),
    /// Failed to capture frame.
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    /// The device stopped delivering frames.
    #[error("camera disconnected: {0}")]
    Disconnected(String),
    /// A session is already streaming from this device.
    #[error("camera already running: {0}")]
    AlreadyRunning(String),
}

/// How a device is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// A physical device opened through the platform capture API.
    Native,
    /// Generated color bars.
    TestPattern {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Frames per second.
        fps: u32,
    },
}

/// A capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Human-readable name.
    pub name: String,
    /// Driver-level handle used to open this device.
    pub moniker: String,
    /// Extra detail reported by the driver.
    pub description: Option<String>,
    /// How the device is driven.
    pub backend: Backend,
}

impl CameraInfo {
    /// A synthetic device producing moving color bars.
    #[must_use]
    pub fn test_pattern(width: u32, height: u32, fps: u32) -> Self {
        Self {
            name: "Test Pattern".into(),
            moniker: format!("test-pattern:{width}x{height}@{fps}"),
            description: Some("Generated color bars".into()),
            backend: Backend::TestPattern { width, height, fps },
        }
    }
}

/// Channel order of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Red, green, blue.
    Rgb,
    /// Blue, green, red.
    Bgr,
}

/// A frame delivered by a capture session.
///
/// The buffer is owned: backends copy out of driver memory before delivery,
/// so a frame stays valid after the device reuses its internal buffers.
#[derive(Clone)]
pub struct CameraFrame {
    /// Pixel data, `stride` bytes per row.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row; at least `width * 3`.
    pub stride: usize,
    /// Channel order.
    pub format: FrameFormat,
    /// Nanoseconds since the session started.
    pub timestamp_ns: u64,
}

impl CameraFrame {
    /// Create a tightly packed frame.
    #[must_use]
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Self {
        Self {
            data,
            width,
            height,
            stride: width as usize * 3,
            format,
            timestamp_ns: 0,
        }
    }
}

impl std::fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("timestamp_ns", &self.timestamp_ns)
            .finish_non_exhaustive()
    }
}

/// Receives frames on the capture thread.
///
/// Implemented for any `FnMut(CameraFrame)` closure.
pub trait FrameHandler: Send + 'static {
    /// Called once per captured frame.
    fn on_frame(&mut self, frame: CameraFrame);

    /// Called when the device fails to produce a frame.
    fn on_error(&mut self, error: &CameraError) {
        let _ = error;
    }
}

impl<F> FrameHandler for F
where
    F: FnMut(CameraFrame) + Send + 'static,
{
    fn on_frame(&mut self, frame: CameraFrame) {
        self(frame);
    }
}

/// Device enumeration.
#[derive(Debug)]
pub struct Camera;

impl Camera {
    /// List available cameras on the system.
    ///
    /// # Errors
    /// Returns [`CameraError::EnumerationFailed`] if camera enumeration fails
    /// and [`CameraError::NotSupported`] on platforms without a capture backend.
    pub fn list() -> Result<Vec<CameraInfo>, CameraError> {
        sys::list()
    }
}

#[cfg(feature = "codec")]
impl TryFrom<CameraFrame> for camkit_codec::Frame {
    type Error = camkit_codec::CodecError;

    fn try_from(frame: CameraFrame) -> Result<Self, Self::Error> {
        use camkit_codec::PixelFormat;

        let format = match frame.format {
            FrameFormat::Rgb => PixelFormat::Rgb24,
            FrameFormat::Bgr => PixelFormat::Bgr24,
        };
        Ok(Self::with_stride(frame.data, frame.width, frame.height, frame.stride, format)?
            .with_timestamp(frame.timestamp_ns))
    }
}

#[cfg(all(test, feature = "codec"))]
mod tests {
    use super::*;

    #[test]
    fn converts_to_codec_frame_without_copy() {
        let frame = CameraFrame {
            data: vec![1, 2, 3, 0],
            width: 1,
            height: 1,
            stride: 4,
            format: FrameFormat::Bgr,
            timestamp_ns: 42,
        };
        let ptr = frame.data.as_ptr();
        let converted = camkit_codec::Frame::try_from(frame).unwrap();
        assert_eq!(converted.format, camkit_codec::PixelFormat::Bgr24);
        assert_eq!(converted.stride, 4);
        assert_eq!(converted.timestamp_ns, 42);
        assert_eq!(converted.data.as_ptr(), ptr);
    }

    #[test]
    fn malformed_frame_is_rejected() {
        let frame = CameraFrame::new(vec![0; 2], 1, 1, FrameFormat::Rgb);
        assert!(camkit_codec::Frame::try_from(frame).is_err());
    }
}
