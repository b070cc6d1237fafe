//! Capture clock
//!
//! Two periodic triggers driven by deadlines rather than runtime timers: the
//! frame tick and the one-second elapsed tick. The event loop sleeps until
//! [`Clock::next_deadline`] and then drains [`Clock::poll`].

use std::time::{Duration, Instant};

/// Which trigger fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Frame,
    Second,
}

#[derive(Debug)]
pub struct Clock {
    frame_period: Duration,
    second_period: Duration,
    next_frame: Option<Instant>,
    next_second: Option<Instant>,
}

impl Clock {
    pub fn new(frame_period: Duration) -> Self {
        Self {
            frame_period,
            second_period: Duration::from_secs(1),
            next_frame: None,
            next_second: None,
        }
    }

    /// Arm both triggers, first firing one period after `now`
    pub fn start(&mut self, now: Instant) {
        self.next_frame = Some(now + self.frame_period);
        self.next_second = Some(now + self.second_period);
    }

    pub fn stop(&mut self) {
        self.next_frame = None;
        self.next_second = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_frame.is_some() || self.next_second.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.next_frame, self.next_second) {
            (Some(frame), Some(second)) => Some(frame.min(second)),
            (frame, second) => frame.or(second),
        }
    }

    /// Return one due tick, if any, and re-arm its trigger.
    ///
    /// Elapsed ticks are never skipped; a late frame trigger fires once and
    /// realigns to `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Tick> {
        if let Some(due) = self.next_second.filter(|due| *due <= now) {
            self.next_second = Some(due + self.second_period);
            return Some(Tick::Second);
        }

        if let Some(due) = self.next_frame.filter(|due| *due <= now) {
            let next = due + self.frame_period;
            self.next_frame = Some(if next <= now {
                now + self.frame_period
            } else {
                next
            });
            return Some(Tick::Frame);
        }

        None
    }
}
