//! arcam GPU backend (glow/OpenGL)
//
// This crate intentionally contains **only** the GL realization of `arcam_runtime::GpuBackend`:
// - compile/link stage programs
// - textures and framebuffers addressed by their GL names
// - one shared VAO with a streamed buffer per vertex attribute
//
// It does NOT contain windowing or context creation; the host owns the context.
#![allow(clippy::missing_safety_doc)]

use glow::HasContext;
use std::collections::HashMap;
use std::num::NonZeroU32;

use arcam_runtime::{
    AttribLocation, FramebufferId, GpuBackend, ProgramId, QuadBuffer, TextureId, TextureTarget,
    UniformLocation,
};
use tracing::{debug, error, warn};

pub use arcam_core::EngineError;

/// `GL_TEXTURE_EXTERNAL_OES` (OES_EGL_image_external).
pub const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;

fn gl_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::ExternalStream => TEXTURE_EXTERNAL_OES,
    }
}

fn native_program(id: ProgramId) -> Option<glow::NativeProgram> {
    NonZeroU32::new(id.0).map(glow::NativeProgram)
}

fn native_texture(id: TextureId) -> Option<glow::NativeTexture> {
    NonZeroU32::new(id.0).map(glow::NativeTexture)
}

fn native_framebuffer(id: FramebufferId) -> Option<glow::NativeFramebuffer> {
    NonZeroU32::new(id.0).map(glow::NativeFramebuffer)
}

/// Which half of a program a shader object is, with the error each half reports.
#[derive(Debug, Clone, Copy)]
enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn gl_kind(self) -> u32 {
        match self {
            Self::Vertex => glow::VERTEX_SHADER,
            Self::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    fn rejected(self, log: String) -> EngineError {
        match self {
            Self::Vertex => EngineError::VertexCompile(log),
            Self::Fragment => EngineError::FragmentCompile(log),
        }
    }
}

/// [`GpuBackend`] over a current GL context.
///
/// The host must keep the context current on the calling thread for every call.
pub struct GlowBackend {
    gl: glow::Context,
    vao: glow::NativeVertexArray,
    attrib_buffers: HashMap<u32, glow::NativeBuffer>,
}

impl std::fmt::Debug for GlowBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowBackend")
            .field("vao", &self.vao)
            .field("attrib_buffers", &self.attrib_buffers.len())
            .finish()
    }
}

impl GlowBackend {
    /// Takes ownership of the context and binds the shared vertex array.
    pub unsafe fn new(gl: glow::Context) -> Result<Self, EngineError> {
        let vao = gl
            .create_vertex_array()
            .map_err(|e| EngineError::GpuCreate(format!("create_vertex_array: {e}")))?;
        gl.bind_vertex_array(Some(vao));
        gl.disable(glow::DEPTH_TEST);
        Ok(Self {
            gl,
            vao,
            attrib_buffers: HashMap::new(),
        })
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Deletes the objects this backend created for itself (not stage resources).
    pub unsafe fn destroy(&mut self) {
        for (_, buf) in self.attrib_buffers.drain() {
            self.gl.delete_buffer(buf);
        }
        self.gl.bind_vertex_array(None);
        self.gl.delete_vertex_array(self.vao);
    }

    /// Compile one shader object; on failure the object is already deleted.
    unsafe fn compile_shader(
        &self,
        stage: ShaderStage,
        src: &str,
    ) -> Result<glow::NativeShader, EngineError> {
        let gl = &self.gl;
        let shader = gl
            .create_shader(stage.gl_kind())
            .map_err(|e| EngineError::GpuCreate(format!("create_shader({stage:?}): {e}")))?;
        gl.shader_source(shader, src);
        gl.compile_shader(shader);
        if gl.get_shader_compile_status(shader) {
            return Ok(shader);
        }
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        Err(stage.rejected(log))
    }

    unsafe fn link(
        &self,
        vs: glow::NativeShader,
        fs: glow::NativeShader,
    ) -> Result<glow::NativeProgram, EngineError> {
        let gl = &self.gl;
        let program = match gl.create_program() {
            Ok(p) => p,
            Err(e) => {
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                return Err(EngineError::GpuCreate(format!("create_program: {e}")));
            }
        };
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);
        // The program keeps the compiled code; the shader objects can go.
        for shader in [vs, fs] {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }
        if gl.get_program_link_status(program) {
            return Ok(program);
        }
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        Err(EngineError::Link(log))
    }

    unsafe fn attrib_buffer(&mut self, location: u32) -> Option<glow::NativeBuffer> {
        if let Some(buf) = self.attrib_buffers.get(&location) {
            return Some(*buf);
        }
        match self.gl.create_buffer() {
            Ok(buf) => {
                self.attrib_buffers.insert(location, buf);
                Some(buf)
            }
            Err(e) => {
                error!(location, error = %e, "create_buffer for vertex attribute failed");
                None
            }
        }
    }
}

impl GpuBackend for GlowBackend {
    fn compile_program(
        &mut self,
        vert_src: &str,
        frag_src: &str,
    ) -> Result<ProgramId, EngineError> {
        let program = unsafe {
            let vs = self.compile_shader(ShaderStage::Vertex, vert_src)?;
            let fs = match self.compile_shader(ShaderStage::Fragment, frag_src) {
                Ok(fs) => fs,
                Err(e) => {
                    self.gl.delete_shader(vs);
                    return Err(e);
                }
            };
            self.link(vs, fs)?
        };
        debug!(program = program.0.get(), "program linked");
        Ok(ProgramId(program.0.get()))
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(p) = native_program(program) {
            unsafe { self.gl.delete_program(p) };
        }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let p = native_program(program)?;
        unsafe { self.gl.get_uniform_location(p, name) }.map(|loc| UniformLocation(loc.0))
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<AttribLocation> {
        let p = native_program(program)?;
        unsafe { self.gl.get_attrib_location(p, name) }.map(AttribLocation)
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        unsafe { self.gl.use_program(program.and_then(native_program)) };
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        let loc = glow::NativeUniformLocation(location.0);
        unsafe { self.gl.uniform_1_i32(Some(&loc), value) };
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        let loc = glow::NativeUniformLocation(location.0);
        unsafe { self.gl.uniform_1_f32(Some(&loc), value) };
    }

    fn create_textures(&mut self, count: usize) -> Result<Vec<TextureId>, EngineError> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            match unsafe { self.gl.create_texture() } {
                Ok(t) => out.push(TextureId(t.0.get())),
                Err(e) => {
                    self.delete_textures(&out);
                    return Err(EngineError::GpuCreate(format!("create_texture failed: {e:?}")));
                }
            }
        }
        Ok(out)
    }

    fn delete_textures(&mut self, textures: &[TextureId]) {
        for t in textures.iter().copied().filter_map(native_texture) {
            unsafe { self.gl.delete_texture(t) };
        }
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureId) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl
                .bind_texture(gl_target(target), native_texture(texture));
        }
    }

    fn texture_storage(
        &mut self,
        unit: u32,
        target: TextureTarget,
        texture: TextureId,
        width: i32,
        height: i32,
        pixels: Option<&[u8]>,
    ) {
        if target == TextureTarget::ExternalStream && pixels.is_some() {
            // External images are filled by the platform producer, not by glTexImage2D.
            warn!(?texture, "ignoring CPU upload into an external-stream texture");
            return;
        }
        if let Some(px) = pixels {
            let expected = (width.max(0) as usize) * (height.max(0) as usize) * 4;
            if px.len() != expected {
                warn!(?texture, width, height, len = px.len(), "pixel buffer size mismatch; skipping upload");
                return;
            }
        }
        let t = gl_target(target);
        unsafe {
            let gl = &self.gl;
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(t, native_texture(texture));
            gl.tex_parameter_i32(t, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(t, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(t, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(t, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            if target == TextureTarget::Texture2D {
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    glow::RGBA8 as i32,
                    width,
                    height,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    pixels,
                );
            }
        }
    }

    fn create_framebuffers(&mut self, count: usize) -> Result<Vec<FramebufferId>, EngineError> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            match unsafe { self.gl.create_framebuffer() } {
                Ok(f) => out.push(FramebufferId(f.0.get())),
                Err(e) => {
                    self.delete_framebuffers(&out);
                    return Err(EngineError::GpuCreate(format!(
                        "create_framebuffer failed: {e:?}"
                    )));
                }
            }
        }
        Ok(out)
    }

    fn delete_framebuffers(&mut self, framebuffers: &[FramebufferId]) {
        for f in framebuffers.iter().copied().filter_map(native_framebuffer) {
            unsafe { self.gl.delete_framebuffer(f) };
        }
    }

    fn attach_color_texture(
        &mut self,
        framebuffer: FramebufferId,
        texture: TextureId,
    ) -> Result<(), EngineError> {
        let gl = &self.gl;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, native_framebuffer(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                native_texture(texture),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.bind_texture(glow::TEXTURE_2D, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                return Err(EngineError::GpuCreate(format!(
                    "framebuffer incomplete: 0x{status:x}"
                )));
            }
        }
        Ok(())
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        unsafe {
            self.gl
                .bind_framebuffer(glow::FRAMEBUFFER, framebuffer.and_then(native_framebuffer))
        };
    }

    fn viewport(&mut self, width: i32, height: i32) {
        unsafe { self.gl.viewport(0, 0, width, height) };
    }

    fn set_alpha_blending(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::BLEND);
                self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            } else {
                self.gl.disable(glow::BLEND);
            }
        }
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        unsafe {
            self.gl.clear_color(rgba[0], rgba[1], rgba[2], rgba[3]);
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn enable_vertex_attrib(&mut self, location: AttribLocation, data: &QuadBuffer) {
        unsafe {
            let Some(buf) = self.attrib_buffer(location.0) else {
                return;
            };
            let gl = &self.gl;
            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buf));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(data.as_slice()),
                glow::STREAM_DRAW,
            );
            gl.enable_vertex_attrib_array(location.0);
            gl.vertex_attrib_pointer_f32(location.0, 2, glow::FLOAT, false, 0, 0);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn disable_vertex_attrib(&mut self, location: AttribLocation) {
        unsafe { self.gl.disable_vertex_attrib_array(location.0) };
    }

    fn draw_quad(&mut self) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.vao));
            self.gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
        }
    }
}
