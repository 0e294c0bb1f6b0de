//! Webcam controller: device selection, capture, snapshots and recording.
//!
//! The controller lives on the UI thread. Capture runs on the session's
//! delivery thread and only touches [`Shared`], which is behind locks.
//! Anything the UI thread must react to comes back as a [`UiEvent`].

use crate::config::Settings;
use crate::prompt::{Level, Prompter, SaveRequest};
use crate::recorder::{Recorder, RecorderSink};
use camkit_camera::{CameraError, CameraFrame, CameraInfo, CaptureSession, FrameHandler};
use camkit_codec::{still, Codec, CodecError, Frame};
use camkit_video::{RecordingSummary, VideoError, VideoWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Work the capture or writer thread hands back to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A new frame is available for preview.
    FrameReady,
    /// Something failed off the UI thread; show it to the user.
    Error(String),
}

/// Delivers [`UiEvent`]s to the UI thread without blocking.
pub type EventSink = Arc<dyn Fn(UiEvent) + Send + Sync>;

/// User actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectDevice(usize),
    StartCamera,
    StopCamera,
    CaptureImage,
    StartRecording,
    StopRecording,
    Exit,
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("No video devices found.")]
    NoDevices,
    #[error("Please select a video device first.")]
    NoDeviceSelected,
    #[error("No video device at index {0}.")]
    InvalidDevice(usize),
    #[error("Stop the camera before switching devices.")]
    CameraRunning,
    #[error("Please start the camera first.")]
    CameraNotRunning,
    #[error("No frame has been captured yet.")]
    NoFrameYet,
    #[error("A recording is already in progress.")]
    AlreadyRecording,
    #[error("No recording in progress.")]
    NotRecording,
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Recording error: {0}")]
    Video(#[from] VideoError),
    #[error("Image error: {0}")]
    Image(#[from] CodecError),
}

impl ControlError {
    /// How the error is presented.
    pub const fn level(&self) -> Level {
        match self {
            Self::Camera(CameraError::AlreadyRunning(_)) => Level::Warning,
            Self::Camera(_) | Self::Video(_) | Self::Image(_) => Level::Error,
            _ => Level::Warning,
        }
    }
}

/// A recording that was just opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingStarted {
    pub path: PathBuf,
    pub codec: Codec,
    /// False when the extension was not `.avi`/`.mp4` and MJPG/AVI was used.
    pub recognized: bool,
}

const IMAGE_FILTERS: &[(&str, &[&str])] = &[("JPEG Image", &["jpg", "jpeg"])];
const VIDEO_FILTERS: &[(&str, &[&str])] = &[
    ("AVI Video (MJPG)", &["avi"]),
    ("MP4 Video (H.264)", &["mp4"]),
];

/// State the capture thread writes and the UI thread reads.
#[derive(Debug, Default)]
struct Shared {
    current: Mutex<Option<Frame>>,
    recording: Mutex<Option<RecorderSink>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frame handler installed on the capture session.
struct Delivery {
    shared: Arc<Shared>,
    events: EventSink,
}

impl FrameHandler for Delivery {
    fn on_frame(&mut self, frame: CameraFrame) {
        let frame = match Frame::try_from(frame) {
            Ok(frame) => frame,
            Err(e) => {
                (self.events)(UiEvent::Error(format!("Invalid frame from camera: {e}")));
                return;
            }
        };

        if let Some(sink) = lock(&self.shared.recording).as_ref() {
            sink.push(frame.clone());
        }
        *lock(&self.shared.current) = Some(frame);
        (self.events)(UiEvent::FrameReady);
    }

    fn on_error(&mut self, error: &CameraError) {
        (self.events)(UiEvent::Error(format!("Camera error: {error}")));
    }
}

pub struct WebcamController {
    settings: Settings,
    prompter: Box<dyn Prompter>,
    events: EventSink,
    devices: Vec<CameraInfo>,
    selected: Option<usize>,
    session: Option<CaptureSession>,
    recorder: Option<Recorder>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for WebcamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebcamController")
            .field("devices", &self.devices)
            .field("selected", &self.selected)
            .field("session", &self.session)
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}

impl WebcamController {
    pub fn new(settings: Settings, prompter: Box<dyn Prompter>, events: EventSink) -> Self {
        Self {
            settings,
            prompter,
            events,
            devices: Vec::new(),
            selected: None,
            session: None,
            recorder: None,
            shared: Arc::default(),
        }
    }

    /// Replace the device list and select the first entry.
    pub fn load_devices(&mut self, devices: Vec<CameraInfo>) -> Result<(), ControlError> {
        for (i, device) in devices.iter().enumerate() {
            log::info!("[{i}] {} ({})", device.name, device.moniker);
        }
        self.devices = devices;
        self.selected = if self.devices.is_empty() { None } else { Some(0) };
        if self.devices.is_empty() {
            return Err(ControlError::NoDevices);
        }
        Ok(())
    }

    pub fn devices(&self) -> &[CameraInfo] {
        &self.devices
    }

    pub fn selected_device(&self) -> Option<&CameraInfo> {
        self.selected.and_then(|i| self.devices.get(i))
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(CaptureSession::is_running)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn recording_path(&self) -> Option<&Path> {
        self.recorder.as_ref().map(Recorder::path)
    }

    /// Latest frame delivered by the camera.
    pub fn current_frame(&self) -> Option<Frame> {
        lock(&self.shared.current).clone()
    }

    pub fn select(&mut self, index: usize) -> Result<(), ControlError> {
        if self.session.is_some() {
            return Err(ControlError::CameraRunning);
        }
        if index >= self.devices.len() {
            return Err(ControlError::InvalidDevice(index));
        }
        self.selected = Some(index);
        log::info!("Selected {}", self.devices[index].name);
        Ok(())
    }

    pub fn start_camera(&mut self) -> Result<(), ControlError> {
        let device = self
            .selected_device()
            .cloned()
            .ok_or(ControlError::NoDeviceSelected)?;

        if let Some(session) = self.session.take() {
            if session.is_running() {
                self.session = Some(session);
                return Err(CameraError::AlreadyRunning(device.name).into());
            }
            // Delivery gave up on the device; release it before reopening.
            self.stop_recording_quietly();
            session.stop();
        }

        *lock(&self.shared.current) = None;
        let delivery = Delivery {
            shared: Arc::clone(&self.shared),
            events: Arc::clone(&self.events),
        };
        self.session = Some(CaptureSession::start(&device, delivery)?);
        Ok(())
    }

    /// Stop any recording, then the camera.
    pub fn stop_camera(&mut self) -> Result<Option<RecordingSummary>, ControlError> {
        let session = self.session.take().ok_or(ControlError::CameraNotRunning)?;
        let summary = match self.recorder {
            Some(_) => Some(self.stop_recording()?),
            None => None,
        };
        session.stop();
        *lock(&self.shared.current) = None;
        Ok(summary)
    }

    /// Save the current frame as a JPEG. `None` if the user cancelled.
    pub fn capture_image(&mut self) -> Result<Option<PathBuf>, ControlError> {
        if !self.is_running() {
            return Err(ControlError::CameraNotRunning);
        }
        let frame = self.current_frame().ok_or(ControlError::NoFrameYet)?;

        let request = SaveRequest {
            title: "Save Image",
            directory: self.settings.pictures_dir.clone(),
            file_name: format!("capture_{}.jpg", timestamp()),
            filters: IMAGE_FILTERS,
        };
        let Some(mut path) = self.prompter.save_path(&request) else {
            return Ok(None);
        };
        if path.extension().is_none() {
            path.set_extension("jpg");
        }

        still::save_jpeg(&frame, &path, self.settings.jpeg_quality)?;
        Ok(Some(path))
    }

    /// Ask for an output file and start recording to it. `None` if the user
    /// cancelled.
    pub fn start_recording(&mut self) -> Result<Option<RecordingStarted>, ControlError> {
        if !self.is_running() {
            return Err(ControlError::CameraNotRunning);
        }
        if self.recorder.is_some() {
            return Err(ControlError::AlreadyRecording);
        }
        let frame = self.current_frame().ok_or(ControlError::NoFrameYet)?;

        let request = SaveRequest {
            title: "Save Video",
            directory: self.settings.videos_dir.clone(),
            file_name: format!("recording_{}.avi", timestamp()),
            filters: VIDEO_FILTERS,
        };
        let Some(mut path) = self.prompter.save_path(&request) else {
            return Ok(None);
        };
        if path.extension().is_none() {
            path.set_extension("avi");
        }

        let choice = Codec::for_path(&path);
        let (width, height) = frame.dimensions();
        let writer = VideoWriter::open(
            &path,
            self.settings.writer_config(choice.codec, width, height),
        )?;
        let recorder = Recorder::start(writer, Arc::clone(&self.events))?;
        *lock(&self.shared.recording) = Some(recorder.sink());
        self.recorder = Some(recorder);

        Ok(Some(RecordingStarted {
            path,
            codec: choice.codec,
            recognized: choice.recognized,
        }))
    }

    /// Detach the recording from capture and finalize the file.
    pub fn stop_recording(&mut self) -> Result<RecordingSummary, ControlError> {
        let recorder = self.recorder.take().ok_or(ControlError::NotRecording)?;
        lock(&self.shared.recording).take();
        Ok(recorder.finish()?)
    }

    fn stop_recording_quietly(&mut self) {
        if self.recorder.is_none() {
            return;
        }
        match self.stop_recording() {
            Ok(summary) => log::info!("Saved {}", summary.path.display()),
            Err(e) => log::error!("Failed to finalize recording: {e}"),
        }
    }

    /// Stop capture (blocking), then finalize any recording.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
        self.stop_recording_quietly();
    }

    /// Show an error to the user.
    pub fn report(&self, error: &ControlError) {
        log::warn!("{error}");
        self.prompter.message(error.level(), &error.to_string());
    }

    /// Show a message from another thread.
    pub fn notify(&self, level: Level, text: &str) {
        self.prompter.message(level, text);
    }

    /// Run a user command, reporting every outcome through the prompter.
    ///
    /// Returns `false` once [`Command::Exit`] has been handled.
    pub fn handle(&mut self, command: Command) -> bool {
        log::debug!("{command:?}");
        let result = match command {
            Command::SelectDevice(index) => self.select(index),
            Command::StartCamera => self.start_camera(),
            Command::StopCamera => self.stop_camera().map(|summary| {
                if let Some(summary) = summary {
                    self.saved(&summary);
                }
            }),
            Command::CaptureImage => self.capture_image().map(|path| {
                if let Some(path) = path {
                    self.notify(Level::Info, &format!("Image saved to {}", path.display()));
                }
            }),
            Command::StartRecording => self.start_recording().map(|started| {
                if let Some(started) = started.filter(|s| !s.recognized) {
                    self.notify(
                        Level::Info,
                        &format!(
                            "Unrecognized video extension; recording MJPG data in AVI format to {}",
                            started.path.display()
                        ),
                    );
                }
            }),
            Command::StopRecording => self.stop_recording().map(|summary| self.saved(&summary)),
            Command::Exit => {
                self.shutdown();
                return false;
            }
        };

        if let Err(e) = result {
            self.report(&e);
        }
        true
    }

    fn saved(&self, summary: &RecordingSummary) {
        self.notify(
            Level::Info,
            &format!("Recording stopped and saved to {}", summary.path.display()),
        );
    }
}

impl Drop for WebcamController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
