//! Command-line configuration.

use camkit_video::{WriterConfig, DEFAULT_FPS, DEFAULT_H264_ENCODER, DEFAULT_JPEG_QUALITY};
use camkit_codec::Codec;
use clap::Parser;
use std::path::PathBuf;

/// Size of the synthetic device added by `--test-pattern`.
pub const TEST_PATTERN_SIZE: (u32, u32) = (640, 480);

#[derive(Debug, Parser)]
#[command(name = "camkit")]
#[command(version, about = "Webcam preview, snapshots and recording", long_about = None)]
pub struct Cli {
    /// Device index to select at startup
    #[arg(long)]
    pub device: Option<usize>,

    /// Add a synthetic color-bar device to the device list
    #[arg(long)]
    pub test_pattern: bool,

    /// Recording frame rate
    #[arg(long, default_value_t = DEFAULT_FPS, value_parser = clap::value_parser!(u32).range(1..=240))]
    pub fps: u32,

    /// JPEG quality for snapshots and MJPG recordings
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Record luma only
    #[arg(long)]
    pub monochrome: bool,

    /// Default directory for snapshots
    #[arg(long)]
    pub pictures_dir: Option<PathBuf>,

    /// Default directory for recordings
    #[arg(long)]
    pub videos_dir: Option<PathBuf>,

    /// ffmpeg binary used for MP4 recordings
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// ffmpeg encoder used for MP4 recordings
    #[arg(long, default_value = DEFAULT_H264_ENCODER)]
    pub h264_encoder: String,
}

/// Resolved settings the controller runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub fps: u32,
    pub jpeg_quality: u8,
    pub monochrome: bool,
    pub pictures_dir: PathBuf,
    pub videos_dir: PathBuf,
    pub ffmpeg: Option<PathBuf>,
    pub h264_encoder: String,
}

fn fallback_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            monochrome: false,
            pictures_dir: dirs::picture_dir().unwrap_or_else(fallback_dir),
            videos_dir: dirs::video_dir().unwrap_or_else(fallback_dir),
            ffmpeg: None,
            h264_encoder: DEFAULT_H264_ENCODER.into(),
        }
    }
}

impl From<&Cli> for Settings {
    fn from(cli: &Cli) -> Self {
        let defaults = Self::default();
        Self {
            fps: cli.fps,
            jpeg_quality: cli.jpeg_quality,
            monochrome: cli.monochrome,
            pictures_dir: cli.pictures_dir.clone().unwrap_or(defaults.pictures_dir),
            videos_dir: cli.videos_dir.clone().unwrap_or(defaults.videos_dir),
            ffmpeg: cli.ffmpeg.clone(),
            h264_encoder: cli.h264_encoder.clone(),
        }
    }
}

impl Settings {
    /// Writer parameters for a recording of `width` x `height` frames.
    pub fn writer_config(&self, codec: Codec, width: u32, height: u32) -> WriterConfig {
        let config = WriterConfig::new(codec, width, height)
            .with_fps(self.fps)
            .with_color(!self.monochrome)
            .with_jpeg_quality(self.jpeg_quality)
            .with_h264_encoder(self.h264_encoder.clone());
        match &self.ffmpeg {
            Some(binary) => config.with_ffmpeg_binary(binary),
            None => config,
        }
    }
}
