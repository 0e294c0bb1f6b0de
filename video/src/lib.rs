//! Recording sessions.
//!
//! A [`VideoWriter`] is bound to one output file, one codec and one frame
//! size for its whole life:
//! - **MJPG**: frames are JPEG-compressed in process and muxed into RIFF AVI
//! - **H.264**: raw frames are piped to ffmpeg, which encodes into MP4
//!
//! Call [`VideoWriter::finish`] to finalize the container. Dropping an
//! unfinished writer finalizes it as well, logging any failure.

#![warn(missing_docs)]

mod avi;
mod ffmpeg;

use avi::AviMuxer;
use camkit_codec::{Codec, CodecError, Frame, MjpegEncoder, PixelFormat, VideoEncoder};
use ffmpeg::FfmpegPipe;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Frame rate used when none is configured.
pub const DEFAULT_FPS: u32 = 25;
/// JPEG quality used for MJPG recordings when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
/// ffmpeg encoder used for H.264 when none is configured.
pub const DEFAULT_H264_ENCODER: &str = "libx264";

/// Errors that can occur with video operations.
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    /// IO error during file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Codec error during encode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Container format error.
    #[error("Container error: {0}")]
    Container(String),

    /// External encoder process error.
    #[error("Encoder error: {0}")]
    Encoder(String),

    /// A frame's size differs from the size the recording was opened with.
    #[error("Frame size {}x{} doesn't match recording {}x{}", actual.0, actual.1, expected.0, expected.1)]
    FrameSizeMismatch {
        /// Size the recording was opened with.
        expected: (u32, u32),
        /// Size of the rejected frame.
        actual: (u32, u32),
    },

    /// Configuration not supported.
    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Parameters of a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Codec (and therefore container).
    pub codec: Codec,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: u32,
    /// Record color; `false` records luma only.
    pub is_color: bool,
    /// JPEG quality for MJPG.
    pub jpeg_quality: u8,
    /// ffmpeg binary; `None` uses the one found by `ffmpeg-sidecar`.
    pub ffmpeg_binary: Option<PathBuf>,
    /// ffmpeg encoder name for H.264.
    pub h264_encoder: String,
}

impl WriterConfig {
    /// A color recording at the default frame rate.
    #[must_use]
    pub fn new(codec: Codec, width: u32, height: u32) -> Self {
        Self {
            codec,
            width,
            height,
            fps: DEFAULT_FPS,
            is_color: true,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            ffmpeg_binary: None,
            h264_encoder: DEFAULT_H264_ENCODER.into(),
        }
    }

    /// Set the frame rate.
    #[must_use]
    pub const fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Record color or luma only.
    #[must_use]
    pub const fn with_color(mut self, is_color: bool) -> Self {
        self.is_color = is_color;
        self
    }

    /// Set the MJPG quality.
    #[must_use]
    pub const fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Use a specific ffmpeg binary.
    #[must_use]
    pub fn with_ffmpeg_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.ffmpeg_binary = Some(binary.into());
        self
    }

    /// Use a specific ffmpeg H.264 encoder.
    #[must_use]
    pub fn with_h264_encoder(mut self, encoder: impl Into<String>) -> Self {
        self.h264_encoder = encoder.into();
        self
    }
}

/// What a finished recording produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    /// Output file.
    pub path: PathBuf,
    /// Codec used.
    pub codec: Codec,
    /// Frames written.
    pub frames: u64,
    /// Media duration at the configured frame rate.
    pub duration: Duration,
}

enum Backend {
    Avi {
        encoder: MjpegEncoder,
        muxer: AviMuxer,
    },
    Ffmpeg(FfmpegPipe),
}

/// Writes frames of a fixed size to a video file.
pub struct VideoWriter {
    path: PathBuf,
    config: WriterConfig,
    frames: u64,
    backend: Option<Backend>,
}

impl std::fmt::Debug for VideoWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoWriter")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl VideoWriter {
    /// Open a recording at `path`.
    ///
    /// # Errors
    /// Returns `VideoError::NotSupported` for zero sizes or frame rates,
    /// `VideoError::Io` if the file cannot be created and
    /// `VideoError::Encoder` if ffmpeg cannot be started.
    pub fn open(path: impl AsRef<Path>, config: WriterConfig) -> Result<Self, VideoError> {
        let path = path.as_ref().to_path_buf();
        if config.width == 0 || config.height == 0 {
            return Err(VideoError::NotSupported(format!(
                "frame size {}x{}",
                config.width, config.height
            )));
        }
        if config.fps == 0 {
            return Err(VideoError::NotSupported("frame rate of 0".into()));
        }

        let backend = match config.codec {
            Codec::Mjpg => Backend::Avi {
                encoder: MjpegEncoder::new(config.width, config.height, config.jpeg_quality)
                    .monochrome(!config.is_color),
                muxer: AviMuxer::create(
                    &path,
                    config.width,
                    config.height,
                    config.fps,
                    config.codec.fourcc(),
                )?,
            },
            Codec::H264 => Backend::Ffmpeg(FfmpegPipe::spawn(&path, &config)?),
        };

        log::info!(
            "Recording {}x{} @ {} fps as {} to {}",
            config.width,
            config.height,
            config.fps,
            config.codec.fourcc(),
            path.display()
        );
        Ok(Self {
            path,
            config,
            frames: 0,
            backend: Some(backend),
        })
    }

    /// Output file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Codec in use.
    #[must_use]
    pub const fn codec(&self) -> Codec {
        self.config.codec
    }

    /// Frame size this recording accepts.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Frames written so far.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Channel layout [`write`](Self::write) expects.
    #[must_use]
    pub const fn native_format(&self) -> PixelFormat {
        match self.config.codec {
            Codec::Mjpg => PixelFormat::Rgb24,
            Codec::H264 => PixelFormat::Bgr24,
        }
    }

    /// Append one frame.
    ///
    /// # Errors
    /// Returns `VideoError::FrameSizeMismatch` if the frame size changed,
    /// `VideoError::Codec` if the frame is not in [`native_format`](Self::native_format),
    /// and encoder or IO errors otherwise.
    pub fn write(&mut self, frame: &Frame) -> Result<(), VideoError> {
        let expected = self.dimensions();
        if frame.dimensions() != expected {
            return Err(VideoError::FrameSizeMismatch {
                expected,
                actual: frame.dimensions(),
            });
        }
        if frame.format != self.native_format() {
            return Err(CodecError::Unsupported(format!(
                "{:?} frame for a {:?} recording",
                frame.format,
                self.native_format()
            ))
            .into());
        }

        match self.backend.as_mut() {
            Some(Backend::Avi { encoder, muxer }) => {
                let jpeg = encoder.encode(frame)?;
                muxer.write_chunk(&jpeg)?;
            }
            Some(Backend::Ffmpeg(pipe)) => pipe.write(frame)?,
            None => return Err(VideoError::Container("recording already finished".into())),
        }
        self.frames += 1;
        Ok(())
    }

    /// Flush and finalize the container.
    ///
    /// # Errors
    /// Returns an error if the container cannot be finalized.
    pub fn finish(mut self) -> Result<RecordingSummary, VideoError> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<RecordingSummary, VideoError> {
        match self.backend.take() {
            Some(Backend::Avi { muxer, .. }) => {
                muxer.finish()?;
            }
            Some(Backend::Ffmpeg(pipe)) => pipe.finish()?,
            None => return Err(VideoError::Container("recording already finished".into())),
        }

        let duration =
            Duration::from_nanos(self.frames.saturating_mul(1_000_000_000) / u64::from(self.config.fps));
        log::info!(
            "Finished {} ({} frames, {:.1}s)",
            self.path.display(),
            self.frames,
            duration.as_secs_f64()
        );
        Ok(RecordingSummary {
            path: self.path.clone(),
            codec: self.config.codec,
            frames: self.frames,
            duration,
        })
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if self.backend.is_some() {
            if let Err(e) = self.finalize() {
                log::error!("Failed to finalize {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, format: PixelFormat) -> Frame {
        let data = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        Frame::new(data, width, height, format).unwrap()
    }

    #[test]
    fn mjpg_recording_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        let mut writer = VideoWriter::open(&path, WriterConfig::new(Codec::Mjpg, 16, 12)).unwrap();
        assert_eq!(writer.native_format(), PixelFormat::Rgb24);

        for _ in 0..5 {
            writer.write(&frame(16, 12, PixelFormat::Rgb24)).unwrap();
        }
        let summary = writer.finish().unwrap();

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.codec, Codec::Mjpg);
        assert_eq!(summary.duration, Duration::from_millis(200));

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[..4], b"RIFF");
        assert_eq!(&data[8..12], b"AVI ");
        assert_eq!(u32::from_le_bytes(data[48..52].try_into().unwrap()), 5);
        // First chunk payload is a JPEG.
        assert_eq!(&data[224..228], b"00dc");
        assert_eq!(&data[232..234], &[0xFF, 0xD8]);
    }

    #[test]
    fn size_change_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            VideoWriter::open(dir.path().join("a.avi"), WriterConfig::new(Codec::Mjpg, 8, 8))
                .unwrap();
        let err = writer.write(&frame(16, 8, PixelFormat::Rgb24)).unwrap_err();
        assert!(matches!(
            err,
            VideoError::FrameSizeMismatch {
                expected: (8, 8),
                actual: (16, 8)
            }
        ));
        assert_eq!(writer.frame_count(), 0);
    }

    #[test]
    fn wrong_layout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            VideoWriter::open(dir.path().join("a.avi"), WriterConfig::new(Codec::Mjpg, 4, 4))
                .unwrap();
        let err = writer.write(&frame(4, 4, PixelFormat::Bgr24)).unwrap_err();
        assert!(matches!(err, VideoError::Codec(CodecError::Unsupported(_))));
    }

    #[test]
    fn zero_size_and_rate_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.avi");
        assert!(matches!(
            VideoWriter::open(&path, WriterConfig::new(Codec::Mjpg, 0, 8)),
            Err(VideoError::NotSupported(_))
        ));
        assert!(matches!(
            VideoWriter::open(&path, WriterConfig::new(Codec::Mjpg, 8, 8).with_fps(0)),
            Err(VideoError::NotSupported(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn drop_finalizes_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.avi");
        {
            let mut writer =
                VideoWriter::open(&path, WriterConfig::new(Codec::Mjpg, 8, 8)).unwrap();
            writer.write(&frame(8, 8, PixelFormat::Rgb24)).unwrap();
        }
        let data = std::fs::read(&path).unwrap();
        assert_eq!(u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize, data.len() - 8);
    }

    #[test]
    fn missing_ffmpeg_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let config = WriterConfig::new(Codec::H264, 8, 8)
            .with_ffmpeg_binary(dir.path().join("no-such-ffmpeg"));
        assert!(matches!(
            VideoWriter::open(dir.path().join("a.mp4"), config),
            Err(VideoError::Encoder(_))
        ));
    }
}
