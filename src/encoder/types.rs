//! Encoder types
//!
//! Launch parameters, shutdown results and the traits the recorder drives the
//! encoder through.

use crate::capture::traits::{AudioFormat, ScreenRegion};
use crate::recorder::state::RecordingConfig;
use crate::utils::RecorderResult;
use std::path::PathBuf;
use std::time::Duration;

/// Everything needed to launch one encoder process
#[derive(Debug, Clone)]
pub struct EncoderSpec {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub audio: AudioFormat,
    pub video_codec: String,
    pub video_preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub output_path: PathBuf,
}

impl EncoderSpec {
    pub fn new(
        config: &RecordingConfig,
        region: &ScreenRegion,
        audio: AudioFormat,
        output_path: PathBuf,
    ) -> Self {
        Self {
            width: region.width,
            height: region.height,
            frame_rate: config.frame_rate,
            audio,
            video_codec: config.video_codec.clone(),
            video_preset: config.video_preset.clone(),
            crf: config.crf,
            audio_codec: config.audio_codec.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
            output_path,
        }
    }

    /// Command-line arguments declaring both raw inputs on stdin
    pub fn args(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            // Input 0: raw video
            "-f".to_string(),
            "rawvideo".to_string(),
            "-vcodec".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", self.width, self.height),
            "-r".to_string(),
            self.frame_rate.to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            // Input 1: raw PCM
            "-f".to_string(),
            self.audio.sample_format_arg().to_string(),
            "-ar".to_string(),
            self.audio.sample_rate.to_string(),
            "-ac".to_string(),
            self.audio.channels.to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            // Output
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.video_preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            self.output_path.to_string_lossy().to_string(),
        ]
    }
}

/// How an encoder process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Exited on its own after end-of-stream
    Exited { success: bool, code: Option<i32> },
    /// Did not exit before the deadline and was killed
    Killed,
}

/// Starts encoder processes
pub trait EncoderLauncher {
    /// Cheap check that the encoder binary can be invoked. Returns its version line.
    fn probe(&self) -> RecorderResult<String>;

    /// Spawn an encoder and confirm it is running
    fn launch(&self, spec: &EncoderSpec) -> RecorderResult<Box<dyn EncoderSink>>;
}

/// A running encoder accepting raw video and audio bytes.
///
/// Both writers are no-ops once the process is no longer running.
pub trait EncoderSink {
    fn is_running(&mut self) -> bool;

    /// Returns whether the bytes were written
    fn write_video(&mut self, data: &[u8]) -> bool;

    /// Returns whether the bytes were written
    fn write_audio(&mut self, data: &[u8]) -> bool;

    /// Signal end-of-stream and wait up to `timeout` before killing the process
    fn shutdown(&mut self, timeout: Duration) -> ShutdownOutcome;

    /// Most recent diagnostic line from the encoder, if it produced one
    fn last_output_line(&self) -> Option<String> {
        None
    }
}
