//! # camkit
//!
//! Webcam capture, snapshots and recording.
//!
//! camkit lists local capture devices, streams frames from them on a
//! dedicated thread, saves still images and records video to AVI (MJPG) or
//! MP4 (H.264). The `camkit` binary in `app/` puts a preview window on top.
//!
//! ## Features
//!
//! - `camera`: Device enumeration and capture sessions.
//! - `codec`: Frames, BGR/RGB conversion, FourCC codecs, JPEG encoding.
//! - `video`: Recording sessions (MJPG in AVI, H.264 in MP4 through ffmpeg).
//! - `dialog`: Native message boxes and save dialogs.
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! camkit = { version = "0.1", features = ["camera", "video"] }
//! ```
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "camera", feature = "video"))]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use camkit::camera::{CameraFrame, CameraInfo, CaptureSession};
//! use camkit::codec::{Codec, Frame};
//! use camkit::video::{VideoWriter, WriterConfig};
//! use std::sync::{Arc, Mutex};
//!
//! let device = CameraInfo::test_pattern(640, 480, 25);
//! let writer = VideoWriter::open("clip.avi", WriterConfig::new(Codec::Mjpg, 640, 480))?;
//! let writer = Arc::new(Mutex::new(writer));
//!
//! let sink = Arc::clone(&writer);
//! let session = CaptureSession::start(&device, move |frame: CameraFrame| {
//!     let Ok(frame) = Frame::try_from(frame) else { return };
//!     let mut writer = sink.lock().unwrap();
//!     if let Ok(frame) = frame.to_format(writer.native_format()) {
//!         let _ = writer.write(&frame);
//!     }
//! })?;
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! session.stop();
//! # Ok(())
//! # }
//! # #[cfg(not(all(feature = "camera", feature = "video")))]
//! # fn main() {}
//! ```

#[cfg(feature = "camera")]
pub use camkit_camera as camera;

#[cfg(feature = "codec")]
pub use camkit_codec as codec;

#[cfg(feature = "dialog")]
pub use camkit_dialog as dialog;

#[cfg(feature = "video")]
pub use camkit_video as video;
