//! Recording state management
//!
//! Defines the recording state machine states, session tracking and the
//! recorder configuration.

use crate::capture::traits::AudioFormat;
use crate::utils::RecorderResult;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    #[default]
    Stopped,
    /// Capturing and feeding the encoder
    Recording,
    /// Encoder kept alive, capture halted
    Paused,
}

/// Information about the active recording.
///
/// Created on entering `Recording` from `Stopped`, dropped on `stop()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub id: Uuid,

    /// Final output file
    pub output_path: PathBuf,

    /// Seconds spent in `Recording`, frozen while paused
    pub elapsed_seconds: u64,

    pub started_at: DateTime<Utc>,

    /// Audio format declared to the encoder
    pub audio_format: AudioFormat,
}

impl RecordingSession {
    pub fn new(output_path: PathBuf, audio_format: AudioFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            output_path,
            elapsed_seconds: 0,
            started_at: Utc::now(),
            audio_format,
        }
    }
}

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingConfig {
    /// Encoder executable name or path
    pub encoder_binary: String,

    /// Where generated output files go
    pub recordings_dir: PathBuf,

    /// Generated file names are `<prefix>_<timestamp>.mp4`
    pub file_prefix: String,

    pub frame_rate: u32,

    /// Grace period for the encoder to exit after end-of-stream
    pub shutdown_timeout_secs: u64,

    pub video_codec: String,
    pub video_preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            encoder_binary: "ffmpeg".to_string(),
            recordings_dir: PathBuf::from("recordings"),
            file_prefix: "screen_recording".to_string(),
            frame_rate: 30,
            shutdown_timeout_secs: 5,
            video_codec: "libx264".to_string(),
            video_preset: "ultrafast".to_string(),
            crf: 25,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

impl RecordingConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> RecorderResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RecordingConfig = serde_json::from_str(&content)?;
        tracing::debug!("Loaded recorder config from {:?}", path);
        Ok(config)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }

    /// Pick the output file for a new recording.
    ///
    /// An explicit path is used as-is. Otherwise a timestamped name is generated
    /// inside `recordings_dir`, which is created when missing.
    pub fn resolve_output_path(&self, requested: Option<PathBuf>) -> RecorderResult<PathBuf> {
        if let Some(path) = requested {
            return Ok(path);
        }

        std::fs::create_dir_all(&self.recordings_dir)?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        Ok(self
            .recordings_dir
            .join(format!("{}_{}.mp4", self.file_prefix, timestamp)))
    }
}
