//! Capture sessions: one delivery thread per streaming device.

use crate::pattern::TestPattern;
use crate::sys::{FrameSource, NativeSource};
use crate::{Backend, CameraError, CameraInfo, FrameHandler};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Consecutive capture failures before a session gives up on the device.
const MAX_CONSECUTIVE_ERRORS: u32 = 30;
const ERROR_RETRY_DELAY: Duration = Duration::from_millis(50);

/// A streaming device.
///
/// The device is opened, read and closed on a dedicated thread. Every frame
/// goes to the session's [`FrameHandler`] on that thread. Stopping (or
/// dropping) the session blocks until the device has been released.
#[derive(Debug)]
pub struct CaptureSession {
    device: CameraInfo,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Open `device` and start delivering frames to `handler`.
    ///
    /// Returns once the device is streaming.
    ///
    /// # Errors
    /// Returns [`CameraError::OpenFailed`] or [`CameraError::StartFailed`] if
    /// the device cannot be opened or streamed.
    pub fn start<H: FrameHandler>(device: &CameraInfo, handler: H) -> Result<Self, CameraError> {
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let delivered = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let thread = {
            let device = device.clone();
            let stop = Arc::clone(&stop);
            let running = Arc::clone(&running);
            let delivered = Arc::clone(&delivered);
            thread::Builder::new()
                .name(format!("capture {}", device.moniker))
                .spawn(move || {
                    match open_source(&device) {
                        Ok(source) => {
                            let _ = ready_tx.send(Ok(()));
                            deliver(source, handler, &stop, &delivered);
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                        }
                    }
                    running.store(false, Ordering::Release);
                })
                .map_err(|e| CameraError::StartFailed(e.to_string()))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!("Capture started on {}", device.name);
                Ok(Self {
                    device: device.clone(),
                    stop,
                    running,
                    delivered,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CameraError::StartFailed(
                    "capture thread exited during startup".into(),
                ))
            }
        }
    }

    /// The device this session streams from.
    #[must_use]
    pub const fn device(&self) -> &CameraInfo {
        &self.device
    }

    /// Whether the delivery thread is still streaming.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Frames handed to the handler so far.
    #[must_use]
    pub fn frames_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Signal the delivery thread to stop and wait until the device is closed.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        if thread.join().is_err() {
            log::error!("Capture thread for {} panicked", self.device.name);
        }
        log::info!(
            "Capture stopped on {} after {} frames",
            self.device.name,
            self.frames_delivered()
        );
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.halt();
    }
}

fn open_source(device: &CameraInfo) -> Result<Box<dyn FrameSource>, CameraError> {
    match device.backend {
        Backend::Native => Ok(Box::new(NativeSource::open(&device.moniker)?)),
        Backend::TestPattern { width, height, fps } => {
            Ok(Box::new(TestPattern::open(width, height, fps)?))
        }
    }
}

fn deliver<H: FrameHandler>(
    mut source: Box<dyn FrameSource>,
    mut handler: H,
    stop: &AtomicBool,
    delivered: &AtomicU64,
) {
    let started = Instant::now();
    let mut consecutive_errors = 0u32;

    while !stop.load(Ordering::Acquire) {
        match source.next_frame() {
            Ok(mut frame) => {
                consecutive_errors = 0;
                frame.timestamp_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
                delivered.fetch_add(1, Ordering::Relaxed);
                handler.on_frame(frame);
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors == 1 {
                    log::warn!("Frame capture error: {e}");
                    handler.on_error(&e);
                } else if consecutive_errors % 10 == 0 {
                    log::warn!(
                        "Frame capture error ({consecutive_errors}/{MAX_CONSECUTIVE_ERRORS}): {e}"
                    );
                }

                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    let fatal = CameraError::Disconnected(format!(
                        "{consecutive_errors} consecutive capture failures, last: {e}"
                    ));
                    log::error!("{fatal}");
                    handler.on_error(&fatal);
                    break;
                }
                thread::sleep(ERROR_RETRY_DELAY);
            }
        }
    }

    if let Err(e) = source.close() {
        log::warn!("Error stopping camera stream: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CameraFrame;
    use std::sync::Mutex;

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn delivers_frames_until_stopped() {
        let frames = Arc::new(Mutex::new(Vec::<CameraFrame>::new()));
        let sink = Arc::clone(&frames);
        let device = CameraInfo::test_pattern(32, 24, 200);

        let session = CaptureSession::start(&device, move |frame: CameraFrame| {
            sink.lock().unwrap().push(frame);
        })
        .unwrap();

        assert!(session.is_running());
        assert!(wait_for(|| frames.lock().unwrap().len() >= 3));
        session.stop();

        let count = frames.lock().unwrap().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(frames.lock().unwrap().len(), count, "frames arrived after stop");

        let frames = frames.lock().unwrap();
        assert!(frames.windows(2).all(|w| w[0].timestamp_ns <= w[1].timestamp_ns));
        assert!(frames.iter().all(|f| f.width == 32 && f.height == 24));
    }

    #[test]
    fn open_failure_is_reported_synchronously() {
        let device = CameraInfo::test_pattern(0, 0, 30);
        let err = CaptureSession::start(&device, |_frame: CameraFrame| {}).unwrap_err();
        assert!(matches!(err, CameraError::OpenFailed(_)));
    }

    #[test]
    fn drop_stops_delivery() {
        let device = CameraInfo::test_pattern(8, 8, 500);
        let count = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&count);
        let session = CaptureSession::start(&device, move |_frame: CameraFrame| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert!(wait_for(|| count.load(Ordering::SeqCst) > 0));
        drop(session);

        let after = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after);
    }

    struct Failing(u32);

    impl FrameSource for Failing {
        fn next_frame(&mut self) -> Result<CameraFrame, CameraError> {
            self.0 += 1;
            Err(CameraError::CaptureFailed(format!("attempt {}", self.0)))
        }

        fn close(&mut self) -> Result<(), CameraError> {
            Ok(())
        }
    }

    struct Recording(Arc<Mutex<Vec<CameraError>>>);

    impl FrameHandler for Recording {
        fn on_frame(&mut self, _frame: CameraFrame) {}

        fn on_error(&mut self, error: &CameraError) {
            self.0.lock().unwrap().push(error.clone());
        }
    }

    #[test]
    fn gives_up_after_repeated_failures() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let stop = AtomicBool::new(false);
        let delivered = AtomicU64::new(0);

        deliver(
            Box::new(Failing(0)),
            Recording(Arc::clone(&errors)),
            &stop,
            &delivered,
        );

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 2, "first failure and the disconnect");
        assert!(matches!(errors[0], CameraError::CaptureFailed(_)));
        assert!(matches!(errors[1], CameraError::Disconnected(_)));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }
}
