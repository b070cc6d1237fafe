//! Screen and microphone capture
//!
//! Platform grabbers sit behind [`traits::FrameGrabber`]; the microphone goes
//! through cpal on every platform.

pub mod audio;
pub mod screen;
pub mod traits;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(all(not(target_os = "windows"), feature = "xcap"))]
pub mod xcap;

pub use audio::CpalAudioBackend;
pub use screen::{default_grabber, primary_region, FrameCaptureChannel};
pub use traits::{AudioBackend, AudioChannel, AudioFormat, Frame, FrameGrabber, ScreenRegion};
