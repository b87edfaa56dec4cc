//! Host-facing event vocabulary.
//!
//! The surface driver (windowing host) translates its native events into these types and
//! implements [`RedrawRequester`] so asynchronous producers can wake an idle render loop.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// A single pointer/touch sample in surface pixel coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub x: f32,
    pub y: f32,
    pub pointer_id: u64,
}

impl TouchEvent {
    pub fn new(phase: TouchPhase, x: f32, y: f32) -> Self {
        Self {
            phase,
            x,
            y,
            pointer_id: 0,
        }
    }
}

/// Back-channel to the surface driver: "draw a frame soon".
///
/// Called from capture threads, so implementations must be cheap and must not touch GPU state.
pub trait RedrawRequester: Send + Sync {
    fn request_redraw(&self);
}

/// A requester that only counts requests. Useful for headless hosts and tests.
#[derive(Default)]
pub struct CountingRedraw {
    count: AtomicU64,
}

impl CountingRedraw {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

impl RedrawRequester for CountingRedraw {
    fn request_redraw(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for CountingRedraw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingRedraw")
            .field("count", &self.count())
            .finish()
    }
}
