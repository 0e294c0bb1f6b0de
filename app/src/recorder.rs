//! Encoder-writer thread.
//!
//! Capture hands frames to a bounded channel; a dedicated thread converts
//! them to the writer's layout and appends them. When the writer falls
//! behind, new frames are dropped instead of stalling capture.

use crate::controller::{EventSink, UiEvent};
use camkit_codec::Frame;
use camkit_video::{RecordingSummary, VideoError, VideoWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Frames buffered between capture and the writer thread.
pub const QUEUE_DEPTH: usize = 8;

/// Capture-side handle of a recording.
#[derive(Debug, Clone)]
pub struct RecorderSink {
    tx: SyncSender<Frame>,
    dropped: Arc<AtomicU64>,
}

impl RecorderSink {
    fn new(tx: SyncSender<Frame>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue a frame without blocking.
    pub fn push(&self, frame: Frame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 100 == 0 {
                    log::warn!("Recorder is behind, {dropped} frames dropped");
                }
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A recording in progress.
#[derive(Debug)]
pub struct Recorder {
    path: PathBuf,
    sink: RecorderSink,
    thread: JoinHandle<Result<RecordingSummary, VideoError>>,
}

impl Recorder {
    /// Start the writer thread for `writer`.
    ///
    /// Write failures are reported through `events`, once per run of
    /// consecutive failures.
    pub fn start(writer: VideoWriter, events: EventSink) -> Result<Self, VideoError> {
        let (tx, rx) = mpsc::sync_channel(QUEUE_DEPTH);
        let path = writer.path().to_path_buf();
        let thread = thread::Builder::new()
            .name("recorder".into())
            .spawn(move || write_frames(writer, &rx, &events))?;

        Ok(Self {
            path,
            sink: RecorderSink::new(tx),
            thread,
        })
    }

    /// Output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A handle capture can push frames into.
    pub fn sink(&self) -> RecorderSink {
        self.sink.clone()
    }

    /// Drain queued frames and finalize the file.
    ///
    /// Every sink obtained from [`sink`](Self::sink) must be dropped first;
    /// the writer thread runs until the last one is gone.
    pub fn finish(self) -> Result<RecordingSummary, VideoError> {
        let Self { sink, thread, path } = self;
        let dropped = sink.dropped();
        drop(sink);

        let summary = thread
            .join()
            .map_err(|_| VideoError::Encoder(format!("writer thread for {} panicked", path.display())))??;
        if dropped > 0 {
            log::warn!("{dropped} frames dropped while recording {}", path.display());
        }
        Ok(summary)
    }
}

fn write_frames(
    mut writer: VideoWriter,
    rx: &Receiver<Frame>,
    events: &EventSink,
) -> Result<RecordingSummary, VideoError> {
    let mut failing = false;
    for frame in rx {
        let result = frame
            .to_format(writer.native_format())
            .map_err(VideoError::from)
            .and_then(|frame| writer.write(&frame));

        match result {
            Ok(()) => failing = false,
            Err(e) if failing => log::debug!("Frame not recorded: {e}"),
            Err(e) => {
                log::error!("Frame not recorded: {e}");
                events(UiEvent::Error(format!("Recording error: {e}")));
                failing = true;
            }
        }
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camkit_codec::{Codec, PixelFormat};
    use camkit_video::WriterConfig;
    use std::sync::Mutex;

    fn collecting() -> (EventSink, Arc<Mutex<Vec<UiEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (
            Arc::new(move |event: UiEvent| sink.lock().unwrap().push(event)),
            events,
        )
    }

    fn bgr(width: u32, height: u32) -> Frame {
        Frame::new(vec![10; (width * height * 3) as usize], width, height, PixelFormat::Bgr24)
            .unwrap()
    }

    #[test]
    fn full_queue_drops_frames() {
        let (tx, rx) = mpsc::sync_channel(1);
        let sink = RecorderSink::new(tx);
        for _ in 0..3 {
            sink.push(bgr(2, 2));
        }
        assert_eq!(sink.dropped(), 2);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn records_converted_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        let writer = VideoWriter::open(&path, WriterConfig::new(Codec::Mjpg, 8, 6)).unwrap();
        let (events, seen) = collecting();

        let recorder = Recorder::start(writer, events).unwrap();
        assert_eq!(recorder.path(), path);
        let sink = recorder.sink();
        for _ in 0..QUEUE_DEPTH {
            sink.push(bgr(8, 6));
        }
        let queued = QUEUE_DEPTH as u64 - sink.dropped();
        drop(sink);

        let summary = recorder.finish().unwrap();
        assert_eq!(summary.frames, queued);
        assert!(seen.lock().unwrap().is_empty());
        assert!(path.exists());
    }

    #[test]
    fn size_change_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let writer =
            VideoWriter::open(dir.path().join("clip.avi"), WriterConfig::new(Codec::Mjpg, 8, 6))
                .unwrap();
        let (events, seen) = collecting();

        let recorder = Recorder::start(writer, events).unwrap();
        let sink = recorder.sink();
        sink.push(bgr(4, 4));
        sink.push(bgr(4, 4));
        drop(sink);

        let summary = recorder.finish().unwrap();
        assert_eq!(summary.frames, 0);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], UiEvent::Error(msg) if msg.contains("doesn't match")));
    }
}
