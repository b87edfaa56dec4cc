//! Backend-agnostic GPU contract.
//!
//! Stages and the compositor only ever talk to a [`GpuBackend`]. The glow crate implements it on
//! top of a real GL context; [`recording::RecordingBackend`] implements it in memory for tests.
//!
//! Handles are plain newtypes so the contract stays free of any GL crate.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![forbid(unsafe_code)]

pub mod quad;
pub mod recording;
pub mod shaders;

pub use arcam_core::EngineError;
pub use quad::{QuadBuffer, QUAD_COORDINATE, QUAD_POSITION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttribLocation(pub u32);

/// What kind of texture a stage samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureTarget {
    #[default]
    Texture2D,
    /// Platform stream texture (camera/video surfaces), sampled with `samplerExternalOES`.
    ExternalStream,
}

/// The operations the compositor needs from a graphics API.
///
/// Contract:
/// - every call happens on the thread that owns the context (the render thread)
/// - `texture_storage` always means RGBA8, linear min/mag filtering, clamp-to-edge wrapping
/// - `draw_quad` draws 4 vertices as a triangle strip from the currently enabled attributes
pub trait GpuBackend {
    // ---- programs ----
    fn compile_program(&mut self, vert_src: &str, frag_src: &str)
        -> Result<ProgramId, EngineError>;
    fn delete_program(&mut self, program: ProgramId);
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<AttribLocation>;
    fn use_program(&mut self, program: Option<ProgramId>);
    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32);
    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32);

    // ---- textures ----
    fn create_textures(&mut self, count: usize) -> Result<Vec<TextureId>, EngineError>;
    fn delete_textures(&mut self, textures: &[TextureId]);
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureId);
    /// (Re)specify storage for `texture`. `pixels` is tightly packed RGBA8, or `None` to leave
    /// the contents undefined (render targets).
    fn texture_storage(
        &mut self,
        unit: u32,
        target: TextureTarget,
        texture: TextureId,
        width: i32,
        height: i32,
        pixels: Option<&[u8]>,
    );

    // ---- framebuffers ----
    fn create_framebuffers(&mut self, count: usize) -> Result<Vec<FramebufferId>, EngineError>;
    fn delete_framebuffers(&mut self, framebuffers: &[FramebufferId]);
    fn attach_color_texture(
        &mut self,
        framebuffer: FramebufferId,
        texture: TextureId,
    ) -> Result<(), EngineError>;
    /// `None` selects the screen's default framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    // ---- fixed-function state ----
    fn viewport(&mut self, width: i32, height: i32);
    fn set_alpha_blending(&mut self, enabled: bool);
    fn clear(&mut self, rgba: [f32; 4]);

    // ---- geometry ----
    fn enable_vertex_attrib(&mut self, location: AttribLocation, data: &QuadBuffer);
    fn disable_vertex_attrib(&mut self, location: AttribLocation);
    fn draw_quad(&mut self);
}

/// Unit-checked helper: the `GL_TEXTUREn` style index for the `n`th source.
pub fn texture_unit_for(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
