//! Pointer translation: winit mouse and touch input into [`TouchEvent`]s.

use arcam_core::{TouchEvent, TouchPhase};

/// The mouse acts as pointer 0. A move only counts while the left button is down.
#[derive(Debug, Default)]
pub struct PointerTracker {
    cursor: (f32, f32),
    pressed: bool,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor_moved(&mut self, x: f64, y: f64) -> Option<TouchEvent> {
        self.cursor = (x as f32, y as f32);
        self.pressed
            .then(|| TouchEvent::new(TouchPhase::Move, self.cursor.0, self.cursor.1))
    }

    pub fn left_button(&mut self, pressed: bool) -> Option<TouchEvent> {
        if pressed == self.pressed {
            return None;
        }
        self.pressed = pressed;
        let phase = if pressed {
            TouchPhase::Down
        } else {
            TouchPhase::Up
        };
        Some(TouchEvent::new(phase, self.cursor.0, self.cursor.1))
    }

    /// The cursor left the window mid-drag.
    pub fn cursor_left(&mut self) -> Option<TouchEvent> {
        if !self.pressed {
            return None;
        }
        self.pressed = false;
        Some(TouchEvent::new(TouchPhase::Cancel, self.cursor.0, self.cursor.1))
    }
}

pub fn touch_event(phase: winit::event::TouchPhase, x: f64, y: f64, id: u64) -> TouchEvent {
    use winit::event::TouchPhase as W;
    let phase = match phase {
        W::Started => TouchPhase::Down,
        W::Moved => TouchPhase::Move,
        W::Ended => TouchPhase::Up,
        W::Cancelled => TouchPhase::Cancel,
    };
    TouchEvent {
        phase,
        x: x as f32,
        y: y as f32,
        pointer_id: id,
    }
}
