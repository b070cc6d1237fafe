//! Encoder process management

pub mod ffmpeg;
pub mod types;

pub use ffmpeg::FfmpegLauncher;
pub use types::{EncoderLauncher, EncoderSink, EncoderSpec, ShutdownOutcome};
