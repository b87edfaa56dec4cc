//! One full-screen-quad render unit.
//!
//! A [`PipelineStage`] is shared state ([`StageCore`]) plus a closed set of variants
//! ([`StageKind`]). Lifecycle hooks are dispatched with a `match`; variants only see the core
//! and the backend, never each other.

use std::fmt;
use std::sync::Arc;

use arcam_core::{RedrawRequester, TouchEvent};
use arcam_input_camera::Rotation;
use arcam_runtime::{
    shaders, AttribLocation, GpuBackend, ProgramId, QuadBuffer, TextureId, TextureTarget,
    UniformLocation, QUAD_COORDINATE, QUAD_POSITION,
};

use crate::capture::{CaptureSource, CaptureState};
use crate::filter::PixelateFilter;
use crate::static_source::ImageSource;

/// Touch callback attached to a stage. Returns `true` if the event was consumed.
pub type TouchHandler = Box<dyn FnMut(&TouchEvent) -> bool>;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ProgramBinding {
    pub id: ProgramId,
    pub position: Option<AttribLocation>,
    pub coordinate: Option<AttribLocation>,
    pub sampler: Option<UniformLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub id: TextureId,
    pub unit: u32,
    pub target: TextureTarget,
}

/// State every stage carries regardless of its variant.
pub struct StageCore {
    label: String,
    vert_src: &'static str,
    frag_src: &'static str,
    pub(crate) program: Option<ProgramBinding>,
    /// Custom quad geometry; `None` means the full-screen default.
    pub(crate) position: Option<QuadBuffer>,
    pub(crate) coordinate: Option<QuadBuffer>,
    pub(crate) texture: Option<TextureBinding>,
    pub(crate) target: TextureTarget,
    pub(crate) viewport: (i32, i32),
    touch: Option<TouchHandler>,
}

impl StageCore {
    fn new(label: &str, vert_src: &'static str, frag_src: &'static str) -> Self {
        Self {
            label: label.to_string(),
            vert_src,
            frag_src,
            program: None,
            position: None,
            coordinate: None,
            texture: None,
            target: TextureTarget::Texture2D,
            viewport: (0, 0),
            touch: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    pub fn viewport(&self) -> (i32, i32) {
        self.viewport
    }

    pub fn texture(&self) -> Option<TextureBinding> {
        self.texture
    }

    pub fn position(&self) -> QuadBuffer {
        self.position.unwrap_or(QUAD_POSITION)
    }

    pub fn coordinate(&self) -> QuadBuffer {
        self.coordinate.unwrap_or(QUAD_COORDINATE)
    }

    pub(crate) fn program_id(&self) -> Option<ProgramId> {
        self.program.map(|p| p.id)
    }
}

impl fmt::Debug for StageCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageCore")
            .field("label", &self.label)
            .field("program", &self.program)
            .field("texture", &self.texture)
            .field("target", &self.target)
            .field("viewport", &self.viewport)
            .field("has_touch", &self.touch.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub enum StageKind {
    Image(ImageSource),
    Capture(CaptureSource),
    Pixelate(PixelateFilter),
}

#[derive(Debug)]
pub struct PipelineStage {
    core: StageCore,
    kind: StageKind,
}

impl PipelineStage {
    pub fn image(source: ImageSource) -> Self {
        Self::with_kind("image", StageKind::Image(source))
    }

    pub fn capture(source: CaptureSource) -> Self {
        Self::with_kind("camera", StageKind::Capture(source))
    }

    pub fn pixelate(filter: PixelateFilter) -> Self {
        Self::with_kind("pixelate", StageKind::Pixelate(filter))
    }

    fn with_kind(label: &str, kind: StageKind) -> Self {
        let (vert, frag) = match &kind {
            StageKind::Image(_) => (shaders::QUAD_VERT, shaders::PASSTHROUGH_FRAG),
            StageKind::Capture(c) => c.shader_sources(),
            StageKind::Pixelate(_) => (shaders::QUAD_VERT, shaders::PIXELATE_FRAG),
        };
        let mut core = StageCore::new(label, vert, frag);
        if let StageKind::Capture(c) = &kind {
            core.target = c.texture_target();
        }
        Self { core, kind }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.core.label = label.into();
        self
    }

    pub fn with_touch_handler(mut self, handler: impl FnMut(&TouchEvent) -> bool + 'static) -> Self {
        self.core.touch = Some(Box::new(handler));
        self
    }

    pub fn core(&self) -> &StageCore {
        &self.core
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut StageKind {
        &mut self.kind
    }

    pub fn is_source(&self) -> bool {
        !matches!(self.kind, StageKind::Pixelate(_))
    }

    pub(crate) fn set_redraw_requester(&mut self, redraw: Option<Arc<dyn RedrawRequester>>) {
        if let StageKind::Capture(c) = &mut self.kind {
            c.set_redraw_requester(redraw);
        }
    }

    /// Forwarded to camera stages; other stages ignore it.
    ///
    /// A running preview re-negotiates its size against the rotated viewport and realigns.
    pub fn set_display_rotation(&mut self, rotation: Rotation) {
        if let StageKind::Capture(c) = &mut self.kind {
            c.set_display_rotation(rotation);
            if c.state() == CaptureState::PreviewActive {
                c.on_resize(&mut self.core);
            }
        }
    }

    /// Compile the program once and bind `texture` on `unit`.
    ///
    /// Calling it again while initialized only rebinds the texture. A compile failure is logged
    /// and leaves the stage uninitialized; it will not draw.
    pub fn initialize(&mut self, gpu: &mut impl GpuBackend, texture: TextureId, unit: u32) {
        self.core.texture = Some(TextureBinding {
            id: texture,
            unit,
            target: self.core.target,
        });
        if self.core.is_initialized() {
            return;
        }

        let id = match gpu.compile_program(self.core.vert_src, self.core.frag_src) {
            Ok(id) => id,
            Err(e) if e.is_shader_error() => {
                tracing::error!(stage = %self.core.label, error = %e, "shader rejected");
                return;
            }
            Err(e) => {
                tracing::error!(stage = %self.core.label, error = %e, "program creation failed");
                return;
            }
        };
        self.core.program = Some(ProgramBinding {
            id,
            position: gpu.attrib_location(id, shaders::ATTRIB_POSITION),
            coordinate: gpu.attrib_location(id, shaders::ATTRIB_COORDINATE),
            sampler: gpu.uniform_location(id, shaders::UNIFORM_SAMPLER),
        });

        match &mut self.kind {
            StageKind::Image(s) => s.on_initialize(&mut self.core, gpu),
            StageKind::Capture(c) => c.on_initialize(&mut self.core),
            StageKind::Pixelate(f) => f.on_initialize(&self.core, gpu),
        }
        tracing::debug!(stage = %self.core.label, program = id.0, "stage initialized");
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        self.core.viewport = (width, height);
        if let StageKind::Capture(c) = &mut self.kind {
            c.on_resize(&mut self.core);
        }
    }

    /// Issue this stage's single quad draw into whatever framebuffer is bound.
    pub fn draw(&mut self, gpu: &mut impl GpuBackend) {
        let Some(program) = self.core.program else {
            return;
        };
        gpu.use_program(Some(program.id));

        let position = self.core.position();
        let coordinate = self.core.coordinate();
        if let Some(loc) = program.position {
            gpu.enable_vertex_attrib(loc, &position);
        }
        if let Some(loc) = program.coordinate {
            gpu.enable_vertex_attrib(loc, &coordinate);
        }

        if let Some(tex) = self.core.texture {
            gpu.bind_texture(tex.unit, tex.target, tex.id);
            if let Some(loc) = program.sampler {
                gpu.set_uniform_i32(loc, i32::try_from(tex.unit).unwrap_or(0));
            }
        }

        // before-draw
        match &mut self.kind {
            StageKind::Capture(c) => c.before_draw(&self.core, gpu),
            StageKind::Pixelate(f) => f.before_draw(&self.core, gpu),
            StageKind::Image(_) => {}
        }

        gpu.draw_quad();

        // after-draw
        match &self.kind {
            StageKind::Image(_) | StageKind::Capture(_) | StageKind::Pixelate(_) => {}
        }

        if let Some(loc) = program.position {
            gpu.disable_vertex_attrib(loc);
        }
        if let Some(loc) = program.coordinate {
            gpu.disable_vertex_attrib(loc);
        }
        gpu.use_program(None);
    }

    /// Release the program and variant resources. Safe to call repeatedly or before
    /// [`initialize`](Self::initialize).
    pub fn destroy(&mut self, gpu: &mut impl GpuBackend) {
        if let Some(program) = self.core.program.take() {
            gpu.delete_program(program.id);
        }
        match &mut self.kind {
            StageKind::Capture(c) => c.on_destroy(),
            StageKind::Pixelate(f) => f.on_destroy(),
            StageKind::Image(_) => {}
        }
        self.core.texture = None;
    }

    pub fn handle_touch(&mut self, event: &TouchEvent) -> bool {
        match self.core.touch.as_mut() {
            Some(handler) => handler(event),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcam_core::TouchPhase;
    use arcam_runtime::recording::{GpuCall, RecordingBackend};

    fn image_stage() -> PipelineStage {
        let img = ImageSource::from_rgba(1, 1, vec![255, 0, 0, 255]).expect("1x1 rgba");
        PipelineStage::image(img)
    }

    #[test]
    fn second_initialize_only_rebinds_texture() {
        let mut gpu = RecordingBackend::new();
        let mut stage = image_stage();
        stage.initialize(&mut gpu, TextureId(100), 0);
        stage.initialize(&mut gpu, TextureId(101), 1);

        assert_eq!(gpu.live_programs(), 1);
        let tex = stage.core().texture().expect("bound");
        assert_eq!((tex.id, tex.unit), (TextureId(101), 1));
    }

    #[test]
    fn draw_issues_one_quad_with_default_geometry() {
        let mut gpu = RecordingBackend::new();
        let mut stage = image_stage();
        stage.initialize(&mut gpu, TextureId(7), 0);
        gpu.clear_calls();

        stage.draw(&mut gpu);
        assert_eq!(gpu.draw_count(), 1);
        assert!(gpu.calls().contains(&GpuCall::EnableAttrib {
            name: shaders::ATTRIB_POSITION.to_string(),
            data: QUAD_POSITION,
        }));
        assert!(gpu.calls().contains(&GpuCall::EnableAttrib {
            name: shaders::ATTRIB_COORDINATE.to_string(),
            data: QUAD_COORDINATE,
        }));
    }

    #[test]
    fn draw_restores_state_after_the_quad() {
        let mut gpu = RecordingBackend::new();
        let mut stage = PipelineStage::pixelate(PixelateFilter::new(8.0));
        stage.initialize(&mut gpu, TextureId(2), 0);
        stage.resize(64, 64);
        gpu.clear_calls();

        stage.draw(&mut gpu);
        let calls = gpu.calls();
        let quad = calls
            .iter()
            .position(|c| matches!(c, GpuCall::DrawQuad { .. }))
            .expect("one quad");
        assert_eq!(
            &calls[quad + 1..],
            &[
                GpuCall::DisableAttrib(shaders::ATTRIB_POSITION.to_string()),
                GpuCall::DisableAttrib(shaders::ATTRIB_COORDINATE.to_string()),
                GpuCall::UseProgram(None),
            ]
        );
    }

    #[test]
    fn compile_failure_leaves_stage_silent() {
        let mut gpu = RecordingBackend::new();
        gpu.fail_compile_containing("uBlockSize");
        let mut stage = PipelineStage::pixelate(PixelateFilter::new(20.0));
        stage.initialize(&mut gpu, TextureId(3), 0);
        assert!(!stage.core().is_initialized());

        stage.draw(&mut gpu);
        assert_eq!(gpu.draw_count(), 0);
    }

    #[test]
    fn destroy_is_safe_without_initialize_and_twice() {
        let mut gpu = RecordingBackend::new();
        let mut stage = image_stage();
        stage.destroy(&mut gpu);

        stage.initialize(&mut gpu, TextureId(1), 0);
        stage.destroy(&mut gpu);
        stage.destroy(&mut gpu);
        assert_eq!(gpu.live_programs(), 0);
        assert!(!stage.core().is_initialized());
    }

    #[test]
    fn touch_defaults_to_unhandled() {
        let ev = TouchEvent::new(TouchPhase::Down, 1.0, 2.0);
        let mut plain = image_stage();
        assert!(!plain.handle_touch(&ev));

        let mut hits = 0;
        let mut touchy = image_stage().with_touch_handler(move |e| {
            hits += 1;
            e.phase == TouchPhase::Down && hits > 0
        });
        assert!(touchy.handle_touch(&ev));
    }
}
