//! Windows screen capture using GDI BitBlt
//!
//! Copies the recorded region out of the desktop DC and converts the 32-bit
//! BGRA DIB into packed RGB24.

use crate::capture::traits::{Frame, FrameGrabber, ScreenRegion};
use crate::utils::{RecorderError, RecorderResult};

use windows::{
    Win32::Foundation::{BOOL, LPARAM, RECT},
    Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject,
        EnumDisplayMonitors, GetDC, GetDIBits, GetMonitorInfoW, ReleaseDC, SelectObject,
        BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HDC, HMONITOR, MONITORINFO,
        SRCCOPY,
    },
    Win32::UI::WindowsAndMessaging::GetDesktopWindow,
};

const MONITORINFOF_PRIMARY: u32 = 1;

/// Geometry of the primary monitor in virtual-desktop coordinates
pub fn primary_region() -> RecorderResult<ScreenRegion> {
    let mut monitors: Vec<(ScreenRegion, bool)> = Vec::new();
    let monitors_ptr = &mut monitors as *mut Vec<(ScreenRegion, bool)>;

    unsafe extern "system" fn enum_monitors_callback(
        hmonitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let monitors = unsafe { &mut *(lparam.0 as *mut Vec<(ScreenRegion, bool)>) };

        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };

        if unsafe { GetMonitorInfoW(hmonitor, &mut info) }.as_bool() {
            let rect = info.rcMonitor;
            monitors.push((
                ScreenRegion::new(
                    rect.left,
                    rect.top,
                    (rect.right - rect.left) as u32,
                    (rect.bottom - rect.top) as u32,
                ),
                (info.dwFlags & MONITORINFOF_PRIMARY) != 0,
            ));
        }

        BOOL::from(true)
    }

    unsafe {
        let _ = EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(enum_monitors_callback),
            LPARAM(monitors_ptr as isize),
        );
    }

    monitors
        .iter()
        .find(|(_, primary)| *primary)
        .or_else(|| monitors.first())
        .map(|(region, _)| *region)
        .ok_or_else(|| RecorderError::Platform("No display found".to_string()))
}

/// GDI-backed grabber
#[derive(Default)]
pub struct GdiGrabber;

impl GdiGrabber {
    pub fn new() -> Self {
        Self
    }
}

impl FrameGrabber for GdiGrabber {
    fn grab(&mut self, region: &ScreenRegion) -> Option<Frame> {
        let pixels = capture_region_bgra(region)?;
        Some(Frame::from_four_channel(region.width, region.height, &pixels, true))
    }
}

fn capture_region_bgra(region: &ScreenRegion) -> Option<Vec<u8>> {
    let width = region.width as i32;
    let height = region.height as i32;

    unsafe {
        let hwnd = GetDesktopWindow();
        let hdc_screen = GetDC(hwnd);
        if hdc_screen.is_invalid() {
            return None;
        }

        let hdc_mem = CreateCompatibleDC(hdc_screen);
        if hdc_mem.is_invalid() {
            ReleaseDC(hwnd, hdc_screen);
            return None;
        }

        let hbitmap = CreateCompatibleBitmap(hdc_screen, width, height);
        if hbitmap.is_invalid() {
            let _ = DeleteDC(hdc_mem);
            ReleaseDC(hwnd, hdc_screen);
            return None;
        }

        let old_bitmap = SelectObject(hdc_mem, hbitmap);

        let blit = BitBlt(
            hdc_mem,
            0,
            0,
            width,
            height,
            hdc_screen,
            region.x,
            region.y,
            SRCCOPY,
        );

        let mut buffer = None;
        if blit.is_ok() {
            let mut bmi = BITMAPINFO::default();
            bmi.bmiHeader.biSize = std::mem::size_of::<BITMAPINFOHEADER>() as u32;
            bmi.bmiHeader.biWidth = width;
            bmi.bmiHeader.biHeight = -height; // top-down
            bmi.bmiHeader.biPlanes = 1;
            bmi.bmiHeader.biBitCount = 32;
            bmi.bmiHeader.biCompression = BI_RGB.0;

            let mut pixels = vec![0u8; region.width as usize * region.height as usize * 4];
            let lines = GetDIBits(
                hdc_mem,
                hbitmap,
                0,
                region.height,
                Some(pixels.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            );
            if lines != 0 {
                buffer = Some(pixels);
            }
        }

        SelectObject(hdc_mem, old_bitmap);
        let _ = DeleteObject(hbitmap);
        let _ = DeleteDC(hdc_mem);
        ReleaseDC(hwnd, hdc_screen);

        buffer
    }
}
