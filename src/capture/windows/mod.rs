//! Windows capture implementations
//!
//! Uses GDI for screen capture.

pub mod screen;

pub use screen::GdiGrabber;
