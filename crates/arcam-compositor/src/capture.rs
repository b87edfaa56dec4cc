//! Camera-backed source stage.
//!
//! Frames arrive on the camera's own thread through a [`FrameSink`] and land in a single-slot
//! [`FrameMailbox`]. The render thread drains the mailbox in `before_draw`, so only the most
//! recent frame is ever uploaded.

use std::fmt;
use std::sync::Arc;

use arcam_core::RedrawRequester;
use arcam_input_camera::{
    align_display, display_orientation, negotiate_preview_size, CameraDevice, CameraError,
    CameraProvider, CameraSelection, Facing, FrameMailbox, FrameSink, PreviewSize, RgbaFrame,
    Rotation,
};
use arcam_runtime::{shaders, GpuBackend, TextureTarget};

use crate::stage::StageCore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Uninitialized,
    ProgramReady,
    PreviewStarting,
    PreviewActive,
    Destroyed,
}

pub struct CaptureSource {
    provider: Box<dyn CameraProvider>,
    device: Option<Box<dyn CameraDevice>>,
    mailbox: Arc<FrameMailbox<RgbaFrame>>,
    redraw: Option<Arc<dyn RedrawRequester>>,
    state: CaptureState,
    target: TextureTarget,
    display_rotation: Rotation,
    selection: CameraSelection,
    preview_size: Option<PreviewSize>,
    mirrored: bool,
    uploads: u64,
}

impl fmt::Debug for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSource")
            .field("state", &self.state)
            .field("target", &self.target)
            .field("display_rotation", &self.display_rotation)
            .field("selection", &self.selection)
            .field("preview_size", &self.preview_size)
            .field("mirrored", &self.mirrored)
            .field("device_open", &self.device.is_some())
            .finish_non_exhaustive()
    }
}

impl CaptureSource {
    pub fn new(provider: Box<dyn CameraProvider>) -> Self {
        Self {
            provider,
            device: None,
            mailbox: Arc::new(FrameMailbox::new()),
            redraw: None,
            state: CaptureState::Uninitialized,
            target: TextureTarget::Texture2D,
            display_rotation: Rotation::Deg0,
            selection: CameraSelection::default(),
            preview_size: None,
            mirrored: false,
            uploads: 0,
        }
    }

    /// Sample through an external-stream texture (GLES platforms that bind the camera stream
    /// directly). CPU frames are still delivered through the mailbox.
    pub fn with_external_texture(mut self, external: bool) -> Self {
        self.target = if external {
            TextureTarget::ExternalStream
        } else {
            TextureTarget::Texture2D
        };
        self
    }

    pub fn with_display_rotation(mut self, rotation: Rotation) -> Self {
        self.display_rotation = rotation;
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn preview_size(&self) -> Option<PreviewSize> {
        self.preview_size
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn display_rotation(&self) -> Rotation {
        self.display_rotation
    }

    /// Number of frames uploaded to the texture so far.
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    /// Frames replaced in the mailbox before the render thread got to them.
    pub fn dropped_frames(&self) -> u64 {
        self.mailbox.dropped()
    }

    pub(crate) fn texture_target(&self) -> TextureTarget {
        self.target
    }

    pub(crate) fn shader_sources(&self) -> (&'static str, &'static str) {
        match self.target {
            TextureTarget::Texture2D => (shaders::QUAD_VERT, shaders::PASSTHROUGH_FRAG),
            TextureTarget::ExternalStream => (shaders::QUAD_VERT_ES, shaders::EXTERNAL_FRAG),
        }
    }

    pub(crate) fn set_redraw_requester(&mut self, redraw: Option<Arc<dyn RedrawRequester>>) {
        self.redraw = redraw;
    }

    /// Only records the rotation; the owning stage re-negotiates a running preview.
    pub fn set_display_rotation(&mut self, rotation: Rotation) {
        self.display_rotation = rotation;
    }

    pub(crate) fn on_initialize(&mut self, core: &mut StageCore) {
        self.mailbox.reopen();
        self.state = CaptureState::ProgramReady;
        tracing::debug!(stage = %core.label(), "capture program ready");
    }

    pub(crate) fn on_resize(&mut self, core: &mut StageCore) {
        let (w, h) = core.viewport();
        if w <= 0 || h <= 0 {
            return;
        }
        match self.state {
            CaptureState::ProgramReady => {
                self.state = CaptureState::PreviewStarting;
                if let Err(e) = self.open_camera() {
                    // Stays dark; the next resize tries again.
                    tracing::error!(stage = %core.label(), error = %e, "camera unavailable");
                    self.device = None;
                    self.state = CaptureState::ProgramReady;
                    return;
                }
            }
            CaptureState::PreviewActive => {}
            CaptureState::Uninitialized
            | CaptureState::PreviewStarting
            | CaptureState::Destroyed => return,
        }

        if let Err(e) = self.configure_preview(core) {
            tracing::error!(stage = %core.label(), error = %e, "preview start failed");
            self.close_camera();
            self.state = CaptureState::ProgramReady;
            return;
        }
        self.state = CaptureState::PreviewActive;
        self.realign(core);
    }

    fn open_camera(&mut self) -> Result<(), CameraError> {
        let infos = self.provider.enumerate()?;
        self.selection = CameraSelection::from_infos(&infos);
        let back = self.selection.back.ok_or(CameraError::NoBackCamera)?;
        let device = self.provider.open(back.id)?;
        self.mirrored = device.info().facing == Facing::Front;
        tracing::info!(camera = back.id.0, orientation = back.orientation, "camera opened");
        self.device = Some(device);
        Ok(())
    }

    fn configure_preview(&mut self, core: &StageCore) -> Result<(), CameraError> {
        let sink = FrameSink::new(Arc::clone(&self.mailbox), self.redraw.clone());
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        let rotation = display_orientation(&device.info(), self.display_rotation);
        let sizes = device.supported_preview_sizes();

        match negotiate_preview_size(&sizes, core.viewport(), rotation) {
            Some(size) if Some(size) != self.preview_size => {
                device.set_preview_size(size)?;
                tracing::info!(width = size.width, height = size.height, "preview size");
                self.preview_size = Some(size);
                // Restart so the new size applies.
                device.stop_preview();
                device.start_preview(sink)?;
            }
            Some(_) => {}
            None => {
                tracing::warn!(viewport = ?core.viewport(), "no preview size fits, using device default");
                if self.state != CaptureState::PreviewActive {
                    device.start_preview(sink)?;
                }
            }
        }
        Ok(())
    }

    /// Recompute the quad geometry for the current viewport, preview size and rotation.
    pub(crate) fn realign(&mut self, core: &mut StageCore) {
        let (Some(device), Some(preview)) = (self.device.as_ref(), self.preview_size) else {
            return;
        };
        let rotation = display_orientation(&device.info(), self.display_rotation);
        if let Some(a) = align_display(core.viewport(), preview, rotation, self.mirrored) {
            tracing::debug!(rotation = a.rotation.degrees(), scale = a.scale, "display aligned");
            core.position = Some(a.position);
            core.coordinate = Some(a.coordinate);
        }
    }

    pub(crate) fn before_draw(&mut self, core: &StageCore, gpu: &mut impl GpuBackend) {
        let Some(frame) = self.mailbox.take() else {
            return;
        };
        let Some(tex) = core.texture() else {
            return;
        };
        let (Ok(w), Ok(h)) = (i32::try_from(frame.width), i32::try_from(frame.height)) else {
            return;
        };
        gpu.texture_storage(tex.unit, tex.target, tex.id, w, h, Some(&frame.bytes));
        self.uploads += 1;
        tracing::trace!(width = w, height = h, "camera frame uploaded");
    }

    fn close_camera(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.stop_preview();
        }
        self.preview_size = None;
    }

    pub(crate) fn on_destroy(&mut self) {
        // Detach the receiver before the device goes away.
        self.mailbox.close();
        self.close_camera();
        if self.state != CaptureState::Uninitialized {
            self.state = CaptureState::Destroyed;
        }
    }
}
