//! Camera input: device contract, frame delivery and preview geometry.
//!
//! The camera subsystem is push-based. A [`CameraDevice`] delivers frames from its own capture
//! context into a [`FrameSink`]; the sink stores them in a single-slot [`FrameMailbox`] and asks
//! the surface driver for a redraw. The render thread drains the mailbox right before drawing.

use thiserror::Error;

pub mod display;
pub mod mailbox;
#[cfg(feature = "native")]
pub mod native;
pub mod scripted;

pub use display::{
    align_display, display_orientation, negotiate_preview_size, rotated_coordinates,
    DisplayAlignment, Rotation,
};
pub use mailbox::{FrameMailbox, FrameSink};

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("webcam support not enabled (build with feature: arcam-input-camera/native)")]
    NotEnabled,

    #[error("no back-facing camera available")]
    NoBackCamera,

    #[error("camera {0:?} is busy")]
    Busy(CameraId),

    #[error("camera permission denied")]
    PermissionDenied,

    #[error("preview size {0}x{1} not supported")]
    UnsupportedSize(u32, u32),

    #[error("{0}")]
    Backend(String),
}

impl From<CameraError> for arcam_core::EngineError {
    fn from(e: CameraError) -> Self {
        arcam_core::EngineError::Camera(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraInfo {
    pub id: CameraId,
    pub facing: Facing,
    /// Clockwise angle (degrees) the sensor image must be rotated to be upright on the
    /// device's natural orientation.
    pub orientation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PreviewSize {
    pub width: u32,
    pub height: u32,
}

impl PreviewSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>, // RGBA8
}

/// Entry point of a camera subsystem: who is there, and open one of them.
pub trait CameraProvider {
    fn enumerate(&mut self) -> Result<Vec<CameraInfo>, CameraError>;
    fn open(&mut self, id: CameraId) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// An opened camera. Dropping it releases the device.
pub trait CameraDevice {
    fn info(&self) -> CameraInfo;
    fn supported_preview_sizes(&self) -> Vec<PreviewSize>;
    fn set_preview_size(&mut self, size: PreviewSize) -> Result<(), CameraError>;
    /// Start streaming; every new frame goes to `sink`, possibly from another thread.
    fn start_preview(&mut self, sink: FrameSink) -> Result<(), CameraError>;
    /// Stop streaming and forget the sink. Must be safe to call when not streaming.
    fn stop_preview(&mut self);
}

/// Enumerate and pick cameras the way a phone app does: remember the back and the front one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraSelection {
    pub back: Option<CameraInfo>,
    pub front: Option<CameraInfo>,
}

impl CameraSelection {
    /// Later devices of the same facing win, matching enumeration order on most platforms.
    pub fn from_infos(infos: &[CameraInfo]) -> Self {
        let mut sel = Self::default();
        for info in infos {
            match info.facing {
                Facing::Back => sel.back = Some(*info),
                Facing::Front => sel.front = Some(*info),
            }
        }
        sel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_remembers_back_and_front() {
        let infos = [
            CameraInfo {
                id: CameraId(0),
                facing: Facing::Back,
                orientation: 90,
            },
            CameraInfo {
                id: CameraId(1),
                facing: Facing::Front,
                orientation: 270,
            },
        ];
        let sel = CameraSelection::from_infos(&infos);
        assert_eq!(sel.back.map(|i| i.id), Some(CameraId(0)));
        assert_eq!(sel.front.map(|i| i.id), Some(CameraId(1)));
    }

    #[test]
    fn camera_error_converts_into_engine_error() {
        let e: arcam_core::EngineError = CameraError::Busy(CameraId(2)).into();
        assert!(e.to_string().contains("busy"), "{e}");
    }
}
