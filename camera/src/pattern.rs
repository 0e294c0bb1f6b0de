//! Synthetic test-pattern device.

use crate::sys::FrameSource;
use crate::{CameraError, CameraFrame, FrameFormat};
use std::thread;
use std::time::{Duration, Instant};

/// Classic eight-bar pattern, as RGB.
const BARS: [[u8; 3]; 8] = [
    [235, 235, 235],
    [235, 235, 16],
    [16, 235, 235],
    [16, 235, 16],
    [235, 16, 235],
    [235, 16, 16],
    [16, 16, 235],
    [16, 16, 16],
];

/// Emits color bars with a sweeping white column, BGR ordered with rows
/// padded to four bytes like a device-independent bitmap.
pub(crate) struct TestPattern {
    width: u32,
    height: u32,
    stride: usize,
    interval: Duration,
    next_due: Instant,
    tick: u64,
}

impl TestPattern {
    pub(crate) fn open(width: u32, height: u32, fps: u32) -> Result<Self, CameraError> {
        if width == 0 || height == 0 || fps == 0 {
            return Err(CameraError::OpenFailed(format!(
                "invalid test pattern {width}x{height} @ {fps} fps"
            )));
        }
        let stride = (width as usize * 3).next_multiple_of(4);
        log::info!("Opened test pattern ({width}x{height} @ {fps} fps)");
        Ok(Self {
            width,
            height,
            stride,
            interval: Duration::from_secs(1) / fps,
            next_due: Instant::now(),
            tick: 0,
        })
    }

    fn render(&self) -> Vec<u8> {
        let width = self.width as usize;
        let sweep = usize::try_from(self.tick % u64::from(self.width)).unwrap_or(0);
        let mut data = vec![0u8; self.stride * self.height as usize];

        for row in data.chunks_exact_mut(self.stride) {
            for (x, px) in row[..width * 3].chunks_exact_mut(3).enumerate() {
                let [r, g, b] = if x == sweep {
                    [255, 255, 255]
                } else {
                    BARS[x * BARS.len() / width]
                };
                px.copy_from_slice(&[b, g, r]);
            }
        }
        data
    }
}

impl FrameSource for TestPattern {
    fn next_frame(&mut self) -> Result<CameraFrame, CameraError> {
        let now = Instant::now();
        if self.next_due > now {
            thread::sleep(self.next_due - now);
        } else if now - self.next_due > self.interval * 2 {
            // Too far behind, resync rather than burst.
            self.next_due = now;
        }
        self.next_due += self.interval;

        let frame = CameraFrame {
            data: self.render(),
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: FrameFormat::Bgr,
            timestamp_ns: 0,
        };
        self.tick += 1;
        Ok(frame)
    }

    fn close(&mut self) -> Result<(), CameraError> {
        log::debug!("Closing test pattern after {} frames", self.tick);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_four_bytes() {
        let mut source = TestPattern::open(5, 3, 1000).unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!(frame.stride, 16);
        assert_eq!(frame.data.len(), 16 * 3);
        assert_eq!(frame.format, FrameFormat::Bgr);
    }

    #[test]
    fn bars_are_stored_blue_first() {
        let mut source = TestPattern::open(8, 1, 1000).unwrap();
        source.next_frame().unwrap();
        // Sweep sits on column 1 now; column 5 is the red bar.
        let frame = source.next_frame().unwrap();
        assert_eq!(&frame.data[5 * 3..5 * 3 + 3], &[16, 16, 235]);
        assert_eq!(&frame.data[3..6], &[255, 255, 255]);
    }

    #[test]
    fn rejects_zero_geometry() {
        assert!(TestPattern::open(0, 10, 30).is_err());
        assert!(TestPattern::open(10, 10, 0).is_err());
    }
}
