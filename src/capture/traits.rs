//! Capture trait definitions
//!
//! Platform-agnostic types and traits for the frame and audio sources.

use crate::utils::RecorderResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;

/// Rectangle of the screen that is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Size of one packed RGB24 frame of this region in bytes
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * Frame::BYTES_PER_PIXEL
    }

    /// `WxH` as understood by the encoder
    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// A captured frame in packed RGB24 layout
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Build an RGB24 frame from 4-byte pixels, dropping alpha.
    ///
    /// `bgr` selects BGRA input order (Windows GDI) instead of RGBA.
    pub fn from_four_channel(width: u32, height: u32, pixels: &[u8], bgr: bool) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * Self::BYTES_PER_PIXEL);
        for px in pixels.chunks_exact(4) {
            if bgr {
                data.extend_from_slice(&[px[2], px[1], px[0]]);
            } else {
                data.extend_from_slice(&px[..3]);
            }
        }
        Self { width, height, data }
    }
}

/// PCM layout of captured audio.
///
/// Samples are always signed 16-bit little-endian integers; only the rate and
/// channel count are negotiated with the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// The format requested from the device: 44.1 kHz stereo s16le
    pub const NOMINAL: AudioFormat = AudioFormat {
        sample_rate: 44_100,
        channels: 2,
        bits_per_sample: 16,
    };

    /// FFmpeg raw sample format name
    pub fn sample_format_arg(&self) -> &'static str {
        "s16le"
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::NOMINAL
    }
}

/// Source of screen frames
pub trait FrameGrabber {
    /// Grab the given region. `None` when the platform could not produce a frame.
    fn grab(&mut self, region: &ScreenRegion) -> Option<Frame>;
}

/// Factory for audio input channels
pub trait AudioBackend {
    /// Pick the format closest to `nominal` that the device supports.
    ///
    /// Only queries the device; no stream is opened.
    fn negotiate(&mut self, nominal: &AudioFormat) -> RecorderResult<AudioFormat>;

    /// Open a channel delivering samples in the negotiated format.
    ///
    /// `ready` is notified whenever new samples become available.
    fn open(&mut self, ready: Arc<Notify>) -> RecorderResult<Box<dyn AudioChannel>>;
}

/// An open audio input stream
pub trait AudioChannel {
    /// Format of the bytes returned by [`AudioChannel::read_available`]
    fn format(&self) -> AudioFormat;

    /// Begin or resume delivery
    fn start(&mut self) -> RecorderResult<()>;

    /// Halt delivery and discard anything still buffered
    fn stop(&mut self);

    /// Take every sample buffered since the last call
    fn read_available(&mut self) -> Vec<u8>;
}
