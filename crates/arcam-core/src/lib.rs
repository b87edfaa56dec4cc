//! arcam core vocabulary: errors, configuration and host-facing events.
//!
//! Contract rule: nothing here touches a GPU or a camera.
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod events;

pub use config::{CameraConfig, FilterConfig, PipelineConfig, RenderMode, WindowConfig};
pub use error::EngineError;
pub use events::{CountingRedraw, RedrawRequester, TouchEvent, TouchPhase};
