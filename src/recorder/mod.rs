//! Recording system module
//!
//! - RecordingCoordinator, the Stopped/Recording/Paused state machine
//! - Clock for frame and elapsed-time deadlines
//! - Event loop and handle that drive the coordinator from async code

pub mod clock;
pub mod coordinator;
pub mod driver;
pub mod state;

pub use coordinator::{RecorderEvent, RecordingCoordinator};
pub use driver::{spawn_loop, RecorderCommand, RecorderHandle};
pub use state::{RecorderState, RecordingConfig, RecordingSession};
