//! Multi-pass compositor.
//!
//! Frame layout for `N` filters:
//!
//! ```text
//! sources ──► fbo[0] ──filter 0──► fbo[1] ── ... ──filter N-1──► screen
//! ```
//!
//! With no filters the sources draw straight to the screen.

use std::fmt;
use std::sync::Arc;

use arcam_core::{EngineError, FilterConfig, PipelineConfig, RedrawRequester, TouchEvent};
use arcam_input_camera::Rotation;
use arcam_runtime::{texture_unit_for, FramebufferId, GpuBackend, TextureId, TextureTarget};

use crate::filter::PixelateFilter;
use crate::stage::PipelineStage;

/// Offscreen targets start transparent so sources composite by overdraw.
const OFFSCREEN_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

#[derive(Debug, Clone, PartialEq, Eq)]
struct GpuResources {
    source_textures: Vec<TextureId>,
    filter_framebuffers: Vec<FramebufferId>,
    filter_textures: Vec<TextureId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResourceState {
    Unallocated,
    Allocated(GpuResources),
    Released,
}

/// Coarse lifecycle view for hosts and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unallocated,
    Allocated,
    Released,
}

pub struct Compositor {
    sources: Vec<PipelineStage>,
    filters: Vec<PipelineStage>,
    resources: ResourceState,
    clear_color: [f32; 4],
    alpha_blend: bool,
    viewport: (i32, i32),
    redraw: Option<Arc<dyn RedrawRequester>>,
}

impl fmt::Debug for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("sources", &self.sources)
            .field("filters", &self.filters)
            .field("resources", &self.resources)
            .field("clear_color", &self.clear_color)
            .field("alpha_blend", &self.alpha_blend)
            .field("viewport", &self.viewport)
            .field("has_redraw", &self.redraw.is_some())
            .finish()
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------------------------------------
// Construction
// -------------------------------------------------------------------------------------------------

impl Compositor {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            filters: Vec::new(),
            resources: ResourceState::Unallocated,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            alpha_blend: true,
            viewport: (0, 0),
            redraw: None,
        }
    }

    /// Screen clear color and blending from `cfg`, plus every configured filter.
    ///
    /// Sources depend on the host (camera provider, image loading) and are registered by the
    /// caller.
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        let mut c = Self::new();
        c.clear_color = cfg.clear_color;
        c.alpha_blend = cfg.alpha_blend;
        for (i, f) in cfg.filters.iter().enumerate() {
            let stage = match f {
                FilterConfig::Pixelate { block_size } => {
                    PipelineStage::pixelate(PixelateFilter::new(*block_size))
                        .with_label(format!("pixelate#{i}"))
                }
            };
            c.filters.push(stage);
        }
        c
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    /// Applied at the next [`on_surface_ready`](Self::on_surface_ready).
    pub fn set_alpha_blending(&mut self, enabled: bool) {
        self.alpha_blend = enabled;
    }

    pub fn set_redraw_requester(&mut self, redraw: Arc<dyn RedrawRequester>) {
        for s in &mut self.sources {
            s.set_redraw_requester(Some(Arc::clone(&redraw)));
        }
        self.redraw = Some(redraw);
    }

    /// Append a source. Draw order is registration order.
    pub fn register_source(&mut self, mut stage: PipelineStage) -> Result<(), EngineError> {
        self.ensure_unallocated("source")?;
        if !stage.is_source() {
            return Err(EngineError::other(format!(
                "stage {:?} is a filter, not a source",
                stage.core().label()
            )));
        }
        stage.set_redraw_requester(self.redraw.clone());
        self.sources.push(stage);
        Ok(())
    }

    /// Append a filter. Pass order is registration order.
    pub fn register_filter(&mut self, stage: PipelineStage) -> Result<(), EngineError> {
        self.ensure_unallocated("filter")?;
        if stage.is_source() {
            return Err(EngineError::other(format!(
                "stage {:?} is a source, not a filter",
                stage.core().label()
            )));
        }
        self.filters.push(stage);
        Ok(())
    }

    fn ensure_unallocated(&self, what: &str) -> Result<(), EngineError> {
        if matches!(self.resources, ResourceState::Allocated(_)) {
            return Err(EngineError::other(format!(
                "cannot register a {what} after the surface is ready"
            )));
        }
        Ok(())
    }

    pub fn sources(&self) -> &[PipelineStage] {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut [PipelineStage] {
        &mut self.sources
    }

    pub fn filters(&self) -> &[PipelineStage] {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut [PipelineStage] {
        &mut self.filters
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.resources {
            ResourceState::Unallocated => Lifecycle::Unallocated,
            ResourceState::Allocated(_) => Lifecycle::Allocated,
            ResourceState::Released => Lifecycle::Released,
        }
    }

    pub fn viewport(&self) -> (i32, i32) {
        self.viewport
    }
}

// -------------------------------------------------------------------------------------------------
// Surface callbacks
// -------------------------------------------------------------------------------------------------

impl Compositor {
    /// Allocate GPU resources and initialize every stage.
    ///
    /// A second call while allocated is a no-op. After [`teardown`](Self::teardown) it
    /// allocates afresh (lost and recreated surface).
    pub fn on_surface_ready(&mut self, gpu: &mut impl GpuBackend) -> Result<(), EngineError> {
        if matches!(self.resources, ResourceState::Allocated(_)) {
            tracing::debug!("surface ready again; resources already allocated");
            return Ok(());
        }

        gpu.set_alpha_blending(self.alpha_blend);

        let source_textures = gpu.create_textures(self.sources.len())?;
        let filter_framebuffers = match gpu.create_framebuffers(self.filters.len()) {
            Ok(fbs) => fbs,
            Err(e) => {
                gpu.delete_textures(&source_textures);
                return Err(e);
            }
        };
        let filter_textures = match gpu.create_textures(self.filters.len()) {
            Ok(t) => t,
            Err(e) => {
                gpu.delete_textures(&source_textures);
                gpu.delete_framebuffers(&filter_framebuffers);
                return Err(e);
            }
        };

        for (i, (stage, tex)) in self.sources.iter_mut().zip(&source_textures).enumerate() {
            stage.initialize(gpu, *tex, texture_unit_for(i));
        }
        for (stage, tex) in self.filters.iter_mut().zip(&filter_textures) {
            stage.initialize(gpu, *tex, 0);
        }

        tracing::info!(
            sources = self.sources.len(),
            filters = self.filters.len(),
            "compositor resources allocated"
        );
        self.resources = ResourceState::Allocated(GpuResources {
            source_textures,
            filter_framebuffers,
            filter_textures,
        });
        Ok(())
    }

    /// Propagate the new size to every stage and resize the offscreen targets.
    pub fn on_surface_resized(&mut self, gpu: &mut impl GpuBackend, width: i32, height: i32) {
        self.viewport = (width, height);
        gpu.viewport(width, height);

        for stage in self.sources.iter_mut().chain(self.filters.iter_mut()) {
            stage.resize(width, height);
        }

        let ResourceState::Allocated(res) = &self.resources else {
            return;
        };
        if width <= 0 || height <= 0 {
            return;
        }
        for (fbo, tex) in res.filter_framebuffers.iter().zip(&res.filter_textures) {
            gpu.texture_storage(0, TextureTarget::Texture2D, *tex, width, height, None);
            if let Err(e) = gpu.attach_color_texture(*fbo, *tex) {
                tracing::error!(framebuffer = fbo.0, error = %e, "offscreen target unusable");
            }
        }
        tracing::debug!(width, height, "surface resized");
    }

    /// Run every pass for one frame.
    pub fn draw_frame(&mut self, gpu: &mut impl GpuBackend) {
        let ResourceState::Allocated(res) = &self.resources else {
            return;
        };

        gpu.clear(self.clear_color);

        let Some(&first) = res.filter_framebuffers.first() else {
            for s in &mut self.sources {
                s.draw(gpu);
            }
            return;
        };

        gpu.bind_framebuffer(Some(first));
        gpu.clear(OFFSCREEN_CLEAR);
        for s in &mut self.sources {
            s.draw(gpu);
        }
        gpu.bind_framebuffer(None);

        let last = self.filters.len() - 1;
        for (i, f) in self.filters.iter_mut().enumerate() {
            if i < last {
                gpu.bind_framebuffer(Some(res.filter_framebuffers[i + 1]));
                gpu.clear(OFFSCREEN_CLEAR);
                f.draw(gpu);
                gpu.bind_framebuffer(None);
            } else {
                f.draw(gpu);
            }
        }
    }

    pub fn request_redraw(&self) {
        if let Some(r) = &self.redraw {
            r.request_redraw();
        }
    }

    /// Offer `event` to each source in order; the first taker wins.
    pub fn dispatch_touch(&mut self, event: &TouchEvent) -> bool {
        self.sources.iter_mut().any(|s| s.handle_touch(event))
    }

    /// Forward the window manager's rotation to camera sources.
    pub fn set_display_rotation(&mut self, rotation: Rotation) {
        for s in &mut self.sources {
            s.set_display_rotation(rotation);
        }
    }

    /// Destroy every stage and release all GPU handles. Safe to call repeatedly.
    pub fn teardown(&mut self, gpu: &mut impl GpuBackend) {
        for stage in self.sources.iter_mut().chain(self.filters.iter_mut()) {
            stage.destroy(gpu);
        }
        match std::mem::replace(&mut self.resources, ResourceState::Released) {
            ResourceState::Allocated(res) => {
                gpu.delete_textures(&res.source_textures);
                gpu.delete_textures(&res.filter_textures);
                gpu.delete_framebuffers(&res.filter_framebuffers);
                tracing::info!("compositor resources released");
            }
            ResourceState::Unallocated => self.resources = ResourceState::Unallocated,
            ResourceState::Released => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKind;
    use crate::static_source::ImageSource;
    use arcam_core::{CountingRedraw, TouchPhase};
    use arcam_runtime::recording::RecordingBackend;

    fn image() -> PipelineStage {
        PipelineStage::image(ImageSource::from_rgba(1, 1, vec![0, 0, 0, 255]).expect("rgba"))
    }

    #[test]
    fn registration_is_closed_once_allocated() {
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.register_source(image()).expect("before ready");
        c.on_surface_ready(&mut gpu).expect("ready");
        assert!(c.register_source(image()).is_err());
        assert!(c
            .register_filter(PipelineStage::pixelate(PixelateFilter::new(4.0)))
            .is_err());
    }

    #[test]
    fn registration_checks_the_stage_role() {
        let mut c = Compositor::new();
        assert!(c
            .register_source(PipelineStage::pixelate(PixelateFilter::new(4.0)))
            .is_err());
        assert!(c.register_filter(image()).is_err());
        assert!(c.sources().is_empty() && c.filters().is_empty());
    }

    #[test]
    fn filter_settings_are_reachable_through_the_stage() {
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.register_source(image()).expect("register");
        c.register_filter(PipelineStage::pixelate(PixelateFilter::new(4.0)))
            .expect("register");
        c.on_surface_ready(&mut gpu).expect("ready");
        c.on_surface_resized(&mut gpu, 100, 100);

        if let StageKind::Pixelate(f) = c.filters_mut()[0].kind_mut() {
            f.set_block_size(12.0);
        }
        let setup = gpu.take_calls();
        assert!(!setup.is_empty());
        c.draw_frame(&mut gpu);
        assert_eq!(gpu.uniform_f32_values("uBlockSize"), vec![12.0]);
    }

    #[test]
    fn draw_before_ready_is_a_no_op() {
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.register_source(image()).expect("register");
        c.draw_frame(&mut gpu);
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn alpha_blending_follows_setting() {
        use arcam_runtime::recording::GpuCall;
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.set_alpha_blending(false);
        c.on_surface_ready(&mut gpu).expect("ready");
        assert!(gpu.calls().contains(&GpuCall::AlphaBlending(false)));
    }

    #[test]
    fn resize_sets_viewport_and_attaches_targets() {
        use arcam_runtime::recording::GpuCall;
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.register_source(image()).expect("register");
        c.register_filter(PipelineStage::pixelate(PixelateFilter::new(4.0)))
            .expect("register");
        c.on_surface_ready(&mut gpu).expect("ready");
        gpu.clear_calls();

        c.on_surface_resized(&mut gpu, 320, 240);
        let calls = gpu.calls();
        assert_eq!(calls[0], GpuCall::Viewport { width: 320, height: 240 });
        assert_eq!(
            calls
                .iter()
                .filter(|c| matches!(c, GpuCall::AttachColorTexture { .. }))
                .count(),
            1
        );
        assert!(calls.iter().any(|c| matches!(
            c,
            GpuCall::TextureStorage { width: 320, height: 240, pixels: None, .. }
        )));
    }

    #[test]
    fn touch_short_circuits_on_first_handler() {
        let mut c = Compositor::new();
        let hits = std::rc::Rc::new(std::cell::Cell::new(0));
        let h1 = hits.clone();
        let h2 = hits.clone();
        c.register_source(image().with_touch_handler(move |_| {
            h1.set(h1.get() + 1);
            true
        }))
        .expect("register");
        c.register_source(image().with_touch_handler(move |_| {
            h2.set(h2.get() + 10);
            true
        }))
        .expect("register");

        assert!(c.dispatch_touch(&TouchEvent::new(TouchPhase::Down, 0.0, 0.0)));
        assert_eq!(hits.get(), 1);

        let mut plain = Compositor::new();
        plain.register_source(image()).expect("register");
        assert!(!plain.dispatch_touch(&TouchEvent::new(TouchPhase::Up, 0.0, 0.0)));
    }

    #[test]
    fn request_redraw_reaches_driver() {
        let redraw = Arc::new(CountingRedraw::new());
        let mut c = Compositor::new();
        c.request_redraw();
        c.set_redraw_requester(redraw.clone());
        c.request_redraw();
        assert_eq!(redraw.count(), 1);
    }

    #[test]
    fn surface_can_be_recreated_after_teardown() {
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.register_source(image()).expect("register");
        c.on_surface_ready(&mut gpu).expect("ready");
        c.teardown(&mut gpu);
        assert_eq!(c.lifecycle(), Lifecycle::Released);
        assert_eq!(gpu.live_handle_count(), 0);

        c.on_surface_ready(&mut gpu).expect("ready again");
        assert_eq!(c.lifecycle(), Lifecycle::Allocated);
        gpu.clear_calls();
        c.draw_frame(&mut gpu);
        assert_eq!(gpu.draw_count(), 1);
    }

    #[test]
    fn from_config_builds_filters() {
        let cfg = PipelineConfig::default();
        let c = Compositor::from_config(&cfg);
        assert_eq!(c.filters().len(), 1);
        assert_eq!(c.filters()[0].core().label(), "pixelate#0");
        assert!(c.sources().is_empty());
    }
}
