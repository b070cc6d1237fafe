//! FFmpeg encoder process
//!
//! Spawns FFmpeg with both raw inputs declared on stdin and feeds it captured
//! bytes. Shutdown closes stdin, waits for a bounded time and kills the
//! process if it is still alive.

use super::types::{EncoderLauncher, EncoderSink, EncoderSpec, ShutdownOutcome};
use crate::utils::{RecorderError, RecorderResult};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Launches FFmpeg from a configurable binary path
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    binary: String,
}

impl FfmpegLauncher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegLauncher {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl EncoderLauncher for FfmpegLauncher {
    fn probe(&self) -> RecorderResult<String> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                RecorderError::EncoderUnavailable(format!(
                    "'{}' could not be run: {}. Please install FFmpeg and add it to PATH.",
                    self.binary, e
                ))
            })?;

        if !output.status.success() {
            return Err(RecorderError::EncoderUnavailable(format!(
                "'{} -version' exited with {}",
                self.binary, output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();
        tracing::debug!("Encoder probe: {}", version);
        Ok(version)
    }

    fn launch(&self, spec: &EncoderSpec) -> RecorderResult<Box<dyn EncoderSink>> {
        let args = spec.args();
        tracing::info!("Starting FFmpeg encoder: {:?}", args);

        let mut process = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecorderError::EncoderLaunch(format!("Failed to start FFmpeg: {}", e)))?;

        let stdin = process.stdin.take();
        let stderr = process.stderr.take();
        let mut encoder = FfmpegEncoder {
            process,
            stdin,
            last_log_line: Arc::new(Mutex::new(String::new())),
            video_bytes: 0,
            audio_bytes: 0,
        };

        if let Some(stderr) = stderr {
            let last_log_line = encoder.last_log_line.clone();
            thread::Builder::new()
                .name("ffmpeg-stderr".to_string())
                .spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                        tracing::debug!(target: "ffmpeg", "{}", line);
                        *last_log_line.lock() = line;
                    }
                })
                .map_err(|e| {
                    RecorderError::EncoderLaunch(format!("Failed to monitor FFmpeg output: {}", e))
                })?;
        }

        if encoder.stdin.is_none() {
            return Err(RecorderError::EncoderLaunch(
                "Failed to capture FFmpeg stdin".to_string(),
            ));
        }

        match encoder.process.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                return Err(RecorderError::EncoderLaunch(format!(
                    "FFmpeg exited immediately with {}",
                    status
                )));
            }
            Err(e) => {
                return Err(RecorderError::EncoderLaunch(format!(
                    "Failed to query FFmpeg state: {}",
                    e
                )));
            }
        }

        tracing::info!(
            "FFmpeg running (pid {}): {}x{} @ {}fps, {}Hz/{}ch -> {:?}",
            encoder.process.id(),
            spec.width,
            spec.height,
            spec.frame_rate,
            spec.audio.sample_rate,
            spec.audio.channels,
            spec.output_path
        );

        Ok(Box::new(encoder))
    }
}

/// A running FFmpeg process fed through its stdin
pub struct FfmpegEncoder {
    process: Child,
    stdin: Option<ChildStdin>,
    last_log_line: Arc<Mutex<String>>,
    video_bytes: u64,
    audio_bytes: u64,
}

impl FfmpegEncoder {
    fn write(&mut self, data: &[u8], stream: &str) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return false;
        };
        match stdin.write_all(data) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "FFmpeg {} write failed ({}), dropping further input. Last output: {}",
                    stream,
                    e,
                    self.last_log_line.lock()
                );
                self.stdin = None;
                false
            }
        }
    }
}

impl EncoderSink for FfmpegEncoder {
    fn is_running(&mut self) -> bool {
        self.stdin.is_some() && matches!(self.process.try_wait(), Ok(None))
    }

    fn write_video(&mut self, data: &[u8]) -> bool {
        let written = self.write(data, "video");
        if written {
            self.video_bytes += data.len() as u64;
        }
        written
    }

    fn write_audio(&mut self, data: &[u8]) -> bool {
        let written = self.write(data, "audio");
        if written {
            self.audio_bytes += data.len() as u64;
        }
        written
    }

    fn shutdown(&mut self, timeout: Duration) -> ShutdownOutcome {
        // EOF on stdin is the end-of-stream marker
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.flush();
        }

        let deadline = Instant::now() + timeout;
        loop {
            match self.process.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        tracing::warn!(
                            "FFmpeg exited with status {}: {}",
                            status,
                            self.last_log_line.lock()
                        );
                    }
                    tracing::info!(
                        "FFmpeg finished: {} video bytes, {} audio bytes",
                        self.video_bytes,
                        self.audio_bytes
                    );
                    return ShutdownOutcome::Exited {
                        success: status.success(),
                        code: status.code(),
                    };
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to query FFmpeg state: {}", e);
                    break;
                }
            }
        }

        tracing::warn!("FFmpeg did not exit within {:?}, killing it", timeout);
        let _ = self.process.kill();
        let _ = self.process.wait();
        ShutdownOutcome::Killed
    }

    fn last_output_line(&self) -> Option<String> {
        let line = self.last_log_line.lock();
        (!line.is_empty()).then(|| line.clone())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if matches!(self.process.try_wait(), Ok(None)) {
            let _ = self.process.kill();
            let _ = self.process.wait();
        }
    }
}
