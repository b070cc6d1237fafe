//! Shared helpers: error taxonomy and time formatting.

pub mod error;
pub mod time;

pub use error::{ErrorResponse, RecorderError, RecorderResult};
pub use time::format_elapsed;
