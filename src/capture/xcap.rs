//! Cross-platform screen capture through `xcap`
//!
//! Used on every platform without a native grabber.

use crate::capture::traits::{Frame, FrameGrabber, ScreenRegion};
use crate::utils::{RecorderError, RecorderResult};
use xcap::image::imageops;
use xcap::Monitor;

/// Geometry of the primary monitor
pub fn primary_region() -> RecorderResult<ScreenRegion> {
    let monitors = Monitor::all().map_err(|e| RecorderError::Platform(e.to_string()))?;
    let monitor = monitors
        .iter()
        .find(|m| m.is_primary())
        .or_else(|| monitors.first())
        .ok_or_else(|| RecorderError::Platform("No display found".to_string()))?;

    Ok(ScreenRegion::new(
        monitor.x(),
        monitor.y(),
        monitor.width(),
        monitor.height(),
    ))
}

/// Grabber bound to the monitor containing the region's origin
pub struct XcapGrabber {
    monitor: Monitor,
}

impl XcapGrabber {
    pub fn for_region(region: &ScreenRegion) -> RecorderResult<Self> {
        let monitor = Monitor::from_point(region.x, region.y)
            .map_err(|e| RecorderError::Platform(e.to_string()))?;
        Ok(Self { monitor })
    }
}

impl FrameGrabber for XcapGrabber {
    fn grab(&mut self, region: &ScreenRegion) -> Option<Frame> {
        let image = match self.monitor.capture_image() {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!("Screen grab failed: {}", e);
                return None;
            }
        };

        let offset_x = (region.x - self.monitor.x()).max(0) as u32;
        let offset_y = (region.y - self.monitor.y()).max(0) as u32;
        let image = if offset_x == 0
            && offset_y == 0
            && image.width() == region.width
            && image.height() == region.height
        {
            image
        } else {
            imageops::crop_imm(&image, offset_x, offset_y, region.width, region.height).to_image()
        };

        Some(Frame::from_four_channel(
            image.width(),
            image.height(),
            image.as_raw(),
            false,
        ))
    }
}
