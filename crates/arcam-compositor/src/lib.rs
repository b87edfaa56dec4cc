//! Render graph for the camera pipeline.
//!
//! Sources (camera, still image) composite into one offscreen target; filters then chain
//! framebuffer to framebuffer, the last one writing to the screen. Everything GPU-facing goes
//! through [`arcam_runtime::GpuBackend`].
#![deny(missing_debug_implementations)]
#![forbid(unsafe_code)]

pub mod capture;
pub mod compositor;
pub mod filter;
pub mod stage;
pub mod static_source;

pub use capture::{CaptureSource, CaptureState};
pub use compositor::{Compositor, Lifecycle};
pub use filter::PixelateFilter;
pub use stage::{PipelineStage, StageCore, StageKind, TextureBinding, TouchHandler};
pub use static_source::ImageSource;
