//! Platform-specific camera implementations.

use crate::{CameraError, CameraFrame};

/// A device that has been opened and is streaming.
///
/// Sources are created and dropped on the capture thread, so they need not
/// be `Send`.
pub(crate) trait FrameSource {
    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<CameraFrame, CameraError>;

    /// Stop streaming and release the device.
    fn close(&mut self) -> Result<(), CameraError>;
}

// Desktop (Windows, macOS, Linux) - use nokhwa
#[cfg(any(target_os = "windows", target_os = "linux", target_os = "macos"))]
mod desktop;

#[cfg(any(target_os = "windows", target_os = "linux", target_os = "macos"))]
pub(crate) use desktop::{list, NativeSource};

// Fallback for unsupported platforms
#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
mod fallback {
    use super::FrameSource;
    use crate::{CameraError, CameraFrame, CameraInfo};

    pub fn list() -> Result<Vec<CameraInfo>, CameraError> {
        Err(CameraError::NotSupported)
    }

    pub struct NativeSource;

    impl NativeSource {
        pub fn open(_moniker: &str) -> Result<Self, CameraError> {
            Err(CameraError::NotSupported)
        }
    }

    impl FrameSource for NativeSource {
        fn next_frame(&mut self) -> Result<CameraFrame, CameraError> {
            Err(CameraError::NotSupported)
        }

        fn close(&mut self) -> Result<(), CameraError> {
            Ok(())
        }
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
pub(crate) use fallback::{list, NativeSource};
