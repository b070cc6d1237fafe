//! Frame capture channel
//!
//! Grabs the session region on each frame tick and normalises the result to
//! exactly one RGB24 frame of the region's size.

use super::traits::{FrameGrabber, ScreenRegion};
use crate::utils::RecorderResult;

/// Frame source bound to one fixed region
pub struct FrameCaptureChannel {
    grabber: Box<dyn FrameGrabber>,
    region: ScreenRegion,
    frames_grabbed: u64,
    frames_dropped: u64,
}

impl FrameCaptureChannel {
    pub fn new(grabber: Box<dyn FrameGrabber>, region: ScreenRegion) -> Self {
        Self {
            grabber,
            region,
            frames_grabbed: 0,
            frames_dropped: 0,
        }
    }

    pub fn region(&self) -> &ScreenRegion {
        &self.region
    }

    /// Grab one frame and return its raw bytes, sized for the encoder's declared input.
    pub fn capture(&mut self) -> Option<Vec<u8>> {
        let expected = self.region.frame_len();
        let Some(frame) = self.grabber.grab(&self.region) else {
            self.frames_dropped += 1;
            tracing::debug!("Frame grab failed, dropping tick");
            return None;
        };

        let mut data = frame.data;
        if data.len() < expected {
            self.frames_dropped += 1;
            tracing::debug!(
                "Short frame ({}x{}, {} bytes, expected {}), dropping",
                frame.width,
                frame.height,
                data.len(),
                expected
            );
            return None;
        }
        data.truncate(expected);

        self.frames_grabbed += 1;
        if self.frames_grabbed % 300 == 0 {
            tracing::debug!(
                "Captured {} frames at {} ({} dropped)",
                self.frames_grabbed,
                self.region.size_arg(),
                self.frames_dropped
            );
        }
        Some(data)
    }

    pub fn frames_grabbed(&self) -> u64 {
        self.frames_grabbed
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }
}

/// Geometry of the primary display
pub fn primary_region() -> RecorderResult<ScreenRegion> {
    #[cfg(target_os = "windows")]
    {
        crate::capture::windows::screen::primary_region()
    }

    #[cfg(all(not(target_os = "windows"), feature = "xcap"))]
    {
        crate::capture::xcap::primary_region()
    }

    #[cfg(all(not(target_os = "windows"), not(feature = "xcap")))]
    {
        Err(crate::utils::RecorderError::Platform(
            "No screen capture backend compiled in; rebuild with --features xcap".to_string(),
        ))
    }
}

/// Platform frame grabber for the given region
pub fn default_grabber(region: &ScreenRegion) -> RecorderResult<Box<dyn FrameGrabber>> {
    #[cfg(target_os = "windows")]
    {
        let _ = region;
        Ok(Box::new(crate::capture::windows::screen::GdiGrabber::new()))
    }

    #[cfg(all(not(target_os = "windows"), feature = "xcap"))]
    {
        Ok(Box::new(crate::capture::xcap::XcapGrabber::for_region(region)?))
    }

    #[cfg(all(not(target_os = "windows"), not(feature = "xcap")))]
    {
        let _ = region;
        Err(crate::utils::RecorderError::Platform(
            "No screen capture backend compiled in; rebuild with --features xcap".to_string(),
        ))
    }
}
