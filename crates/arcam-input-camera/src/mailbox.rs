//! Single-slot cross-thread frame handoff.
//!
//! At most one frame is pending. A newer frame replaces an unconsumed older one (frame
//! dropping, never queuing), so the render thread always uploads the most recent image.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arcam_core::RedrawRequester;

use crate::RgbaFrame;

#[derive(Debug)]
struct Slot<T> {
    latest: Option<T>,
    closed: bool,
    dropped: u64,
}

#[derive(Debug)]
pub struct FrameMailbox<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Default for FrameMailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameMailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                latest: None,
                closed: false,
                dropped: 0,
            }),
        }
    }

    // A panic while holding the lock cannot leave the slot half-written.
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Producer side. Returns `false` if the mailbox is closed and the frame was discarded.
    pub fn post(&self, frame: T) -> bool {
        let mut slot = self.lock();
        if slot.closed {
            return false;
        }
        if slot.latest.replace(frame).is_some() {
            slot.dropped += 1;
        }
        true
    }

    /// Consumer side: the pending frame, if any. Clears the pending state.
    pub fn take(&self) -> Option<T> {
        self.lock().latest.take()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().latest.is_some()
    }

    /// Frames replaced before anyone consumed them.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Discard any pending frame and refuse further posts.
    pub fn close(&self) {
        let mut slot = self.lock();
        slot.latest = None;
        slot.closed = true;
    }

    pub fn reopen(&self) {
        self.lock().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// What a camera device holds on to: where to put frames and whom to wake.
#[derive(Clone)]
pub struct FrameSink {
    mailbox: Arc<FrameMailbox<RgbaFrame>>,
    redraw: Option<Arc<dyn RedrawRequester>>,
}

impl FrameSink {
    pub fn new(
        mailbox: Arc<FrameMailbox<RgbaFrame>>,
        redraw: Option<Arc<dyn RedrawRequester>>,
    ) -> Self {
        Self { mailbox, redraw }
    }

    /// Frame-arrival callback. Never blocks beyond the O(1) slot swap; no GPU work.
    pub fn frame_available(&self, frame: RgbaFrame) {
        if !self.mailbox.post(frame) {
            return;
        }
        if let Some(r) = &self.redraw {
            r.request_redraw();
        }
    }
}

impl fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSink")
            .field("pending", &self.mailbox.is_pending())
            .field("has_redraw", &self.redraw.is_some())
            .finish()
    }
}
