//! Desktop camera implementation using nokhwa.

use super::FrameSource;
use crate::{Backend, CameraError, CameraFrame, CameraInfo, FrameFormat};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera as NokhwaCamera;

pub fn list() -> Result<Vec<CameraInfo>, CameraError> {
    #[cfg(target_os = "macos")]
    request_access();

    let devices = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| CameraError::EnumerationFailed(e.to_string()))?;

    Ok(devices
        .into_iter()
        .map(|d| CameraInfo {
            name: d.human_name(),
            moniker: d.index().to_string(),
            description: Some(d.description().to_string()),
            backend: Backend::Native,
        })
        .collect())
}

#[cfg(target_os = "macos")]
fn request_access() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        nokhwa::nokhwa_initialize(|granted| {
            if !granted {
                log::warn!("Camera access was not granted");
            }
        });
    });
}

pub struct NativeSource {
    camera: NokhwaCamera,
    moniker: String,
}

impl NativeSource {
    pub fn open(moniker: &str) -> Result<Self, CameraError> {
        let index = moniker
            .parse::<u32>()
            .map(CameraIndex::Index)
            .unwrap_or_else(|_| CameraIndex::String(moniker.to_string()));

        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        let mut camera = NokhwaCamera::new(index, requested)
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        camera
            .open_stream()
            .map_err(|e| CameraError::StartFailed(e.to_string()))?;

        let resolution = camera.resolution();
        log::info!(
            "Opened {} ({}x{} @ {} fps)",
            camera.info().human_name(),
            resolution.width(),
            resolution.height(),
            camera.frame_rate()
        );

        Ok(Self {
            camera,
            moniker: moniker.to_string(),
        })
    }
}

impl FrameSource for NativeSource {
    fn next_frame(&mut self) -> Result<CameraFrame, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        // Decoding copies out of the driver buffer.
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        let (width, height) = decoded.dimensions();
        Ok(CameraFrame::new(
            decoded.into_raw(),
            width,
            height,
            FrameFormat::Rgb,
        ))
    }

    fn close(&mut self) -> Result<(), CameraError> {
        log::debug!("Closing camera {}", self.moniker);
        self.camera
            .stop_stream()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))
    }
}
