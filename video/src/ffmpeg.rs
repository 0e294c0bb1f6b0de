//! H.264/MP4 recording through an ffmpeg child process.
//!
//! Raw frames are piped to ffmpeg's stdin; ffmpeg encodes and muxes.

use crate::{VideoError, WriterConfig};
use camkit_codec::{convert, Frame};
use ffmpeg_sidecar::command::FfmpegCommand;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Stdio};
use std::thread::{self, JoinHandle};

/// Lines of ffmpeg stderr kept for error reports.
const STDERR_TAIL: usize = 20;

/// Arguments for an ffmpeg run reading raw frames from stdin.
pub(crate) fn build_args(config: &WriterConfig, output: &Path) -> Vec<String> {
    let input_format = if config.is_color { "bgr24" } else { "gray" };
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        input_format,
    ]
    .into_iter()
    .map(String::from)
    .collect();

    args.extend([
        "-video_size".into(),
        format!("{}x{}", config.width, config.height),
        "-framerate".into(),
        config.fps.to_string(),
        "-i".into(),
        "-".into(),
    ]);

    // yuv420p needs even dimensions.
    if config.width % 2 == 1 || config.height % 2 == 1 {
        args.extend(["-vf".into(), "pad=ceil(iw/2)*2:ceil(ih/2)*2".into()]);
    }

    args.extend(["-c:v".into(), config.h264_encoder.clone()]);
    if config.h264_encoder == "libx264" {
        args.extend([
            "-preset".into(),
            "ultrafast".into(),
            "-crf".into(),
            "23".into(),
        ]);
    }

    args.extend([
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ]);
    args
}

pub(crate) struct FfmpegPipe {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<VecDeque<String>>>,
    is_color: bool,
}

impl FfmpegPipe {
    pub(crate) fn spawn(path: &Path, config: &WriterConfig) -> Result<Self, VideoError> {
        let mut command = match &config.ffmpeg_binary {
            Some(binary) => FfmpegCommand::new_with_path(binary),
            None => FfmpegCommand::new(),
        };
        command.args(build_args(config, path));

        let inner = command.as_inner_mut();
        inner.stdin(Stdio::piped());
        inner.stdout(Stdio::null());
        inner.stderr(Stdio::piped());

        let mut child = inner
            .spawn()
            .map_err(|e| VideoError::Encoder(format!("failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VideoError::Encoder("ffmpeg stdin unavailable".into()))?;

        let stderr = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL);
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    log::debug!("[ffmpeg] {line}");
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail
            })
        });

        log::info!(
            "Started ffmpeg ({}) for {}",
            config.h264_encoder,
            path.display()
        );
        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr,
            is_color: config.is_color,
        })
    }

    /// Pipe one frame. Rows are written without padding.
    pub(crate) fn write(&mut self, frame: &Frame) -> Result<(), VideoError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VideoError::Encoder("ffmpeg input already closed".into()))?;

        let result = if !self.is_color {
            stdin.write_all(&convert::to_luma(frame)?)
        } else if frame.stride == frame.row_bytes() {
            stdin.write_all(&frame.data[..frame.row_bytes() * frame.height as usize])
        } else {
            frame
                .data
                .chunks(frame.stride)
                .take(frame.height as usize)
                .try_for_each(|row| stdin.write_all(&row[..frame.row_bytes()]))
        };
        result.map_err(|e| VideoError::Encoder(format!("ffmpeg stopped accepting frames: {e}")))
    }

    /// Close stdin and wait for ffmpeg to finalize the file.
    pub(crate) fn finish(mut self) -> Result<(), VideoError> {
        drop(self.stdin.take());

        let status = self
            .child
            .wait()
            .map_err(|e| VideoError::Encoder(format!("ffmpeg process error: {e}")))?;
        let tail = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        if status.success() {
            return Ok(());
        }
        let reason = tail
            .back()
            .cloned()
            .unwrap_or_else(|| format!("exit status {status}"));
        Err(VideoError::Encoder(format!("ffmpeg failed: {reason}")))
    }
}
