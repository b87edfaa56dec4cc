//! In-memory [`GpuBackend`] that records every call.
//!
//! Used by the unit and contract tests, and handy for headless hosts that want to inspect the
//! pass sequence a compositor would issue.

use std::collections::{HashMap, HashSet};

use crate::{
    AttribLocation, EngineError, FramebufferId, GpuBackend, ProgramId, QuadBuffer, TextureId,
    TextureTarget, UniformLocation,
};

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CompileProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    SetUniformI32 { name: String, value: i32 },
    SetUniformF32 { name: String, value: f32 },
    CreateTextures(Vec<TextureId>),
    DeleteTextures(Vec<TextureId>),
    BindTexture {
        unit: u32,
        target: TextureTarget,
        texture: TextureId,
    },
    TextureStorage {
        unit: u32,
        target: TextureTarget,
        texture: TextureId,
        width: i32,
        height: i32,
        pixels: Option<Vec<u8>>,
    },
    CreateFramebuffers(Vec<FramebufferId>),
    DeleteFramebuffers(Vec<FramebufferId>),
    AttachColorTexture {
        framebuffer: FramebufferId,
        texture: TextureId,
    },
    BindFramebuffer(Option<FramebufferId>),
    Viewport { width: i32, height: i32 },
    AlphaBlending(bool),
    Clear([f32; 4]),
    EnableAttrib { name: String, data: QuadBuffer },
    DisableAttrib(String),
    /// A draw, with the state it was issued under.
    DrawQuad {
        program: Option<ProgramId>,
        framebuffer: Option<FramebufferId>,
        unit0: Option<TextureId>,
    },
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<GpuCall>,
    next_id: u32,

    live_programs: HashSet<ProgramId>,
    live_textures: HashSet<TextureId>,
    live_framebuffers: HashSet<FramebufferId>,

    uniform_names: HashMap<u32, String>,
    uniform_ids: HashMap<(ProgramId, String), u32>,

    current_program: Option<ProgramId>,
    current_framebuffer: Option<FramebufferId>,
    bound_textures: HashMap<u32, TextureId>,

    /// Shader sources containing this marker fail to compile.
    fail_marker: Option<String>,
}

const ATTRIB_NAMES: [&str; 2] = [
    crate::shaders::ATTRIB_POSITION,
    crate::shaders::ATTRIB_COORDINATE,
];

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `compile_program` fail for any source containing `marker`.
    pub fn fail_compile_containing(&mut self, marker: impl Into<String>) {
        self.fail_marker = Some(marker.into());
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GpuCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draws(&self) -> Vec<&GpuCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, GpuCall::DrawQuad { .. }))
            .collect()
    }

    pub fn draw_count(&self) -> usize {
        self.draws().len()
    }

    /// `(binds to an offscreen framebuffer, binds back to the screen)`.
    pub fn framebuffer_bind_counts(&self) -> (usize, usize) {
        self.calls.iter().fold((0, 0), |(on, off), c| match c {
            GpuCall::BindFramebuffer(Some(_)) => (on + 1, off),
            GpuCall::BindFramebuffer(None) => (on, off + 1),
            _ => (on, off),
        })
    }

    /// Every value pushed to the float uniform `name`, in call order.
    pub fn uniform_f32_values(&self, name: &str) -> Vec<f32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GpuCall::SetUniformF32 { name: n, value } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn texture_uploads(&self) -> Vec<&GpuCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, GpuCall::TextureStorage { pixels: Some(_), .. }))
            .collect()
    }

    pub fn live_programs(&self) -> usize {
        self.live_programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.live_framebuffers.len()
    }

    pub fn live_handle_count(&self) -> usize {
        self.live_programs() + self.live_textures() + self.live_framebuffers()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for RecordingBackend {
    fn compile_program(
        &mut self,
        vert_src: &str,
        frag_src: &str,
    ) -> Result<ProgramId, EngineError> {
        if let Some(marker) = &self.fail_marker {
            if vert_src.contains(marker.as_str()) {
                return Err(EngineError::VertexCompile(format!("injected failure: {marker}")));
            }
            if frag_src.contains(marker.as_str()) {
                return Err(EngineError::FragmentCompile(format!(
                    "injected failure: {marker}"
                )));
            }
        }
        let id = ProgramId(self.next());
        self.live_programs.insert(id);
        self.calls.push(GpuCall::CompileProgram(id));
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.live_programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.calls.push(GpuCall::DeleteProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if !self.live_programs.contains(&program) {
            return None;
        }
        let key = (program, name.to_string());
        if let Some(id) = self.uniform_ids.get(&key) {
            return Some(UniformLocation(*id));
        }
        let id = self.next();
        self.uniform_ids.insert(key, id);
        self.uniform_names.insert(id, name.to_string());
        Some(UniformLocation(id))
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<AttribLocation> {
        if !self.live_programs.contains(&program) {
            return None;
        }
        ATTRIB_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| AttribLocation(i as u32))
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
        self.calls.push(GpuCall::UseProgram(program));
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        let name = self
            .uniform_names
            .get(&location.0)
            .cloned()
            .unwrap_or_default();
        self.calls.push(GpuCall::SetUniformI32 { name, value });
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        let name = self
            .uniform_names
            .get(&location.0)
            .cloned()
            .unwrap_or_default();
        self.calls.push(GpuCall::SetUniformF32 { name, value });
    }

    fn create_textures(&mut self, count: usize) -> Result<Vec<TextureId>, EngineError> {
        let ids: Vec<TextureId> = (0..count).map(|_| TextureId(self.next())).collect();
        self.live_textures.extend(ids.iter().copied());
        self.calls.push(GpuCall::CreateTextures(ids.clone()));
        Ok(ids)
    }

    fn delete_textures(&mut self, textures: &[TextureId]) {
        for t in textures {
            self.live_textures.remove(t);
        }
        self.bound_textures.retain(|_, t| !textures.contains(t));
        self.calls.push(GpuCall::DeleteTextures(textures.to_vec()));
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureId) {
        self.bound_textures.insert(unit, texture);
        self.calls.push(GpuCall::BindTexture {
            unit,
            target,
            texture,
        });
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
        self.bound_textures.insert(unit, texture);
        self.calls.push(GpuCall::TextureStorage {
            unit,
            target,
            texture,
            width,
            height,
            pixels: pixels.map(<[u8]>::to_vec),
        });
    }

    fn create_framebuffers(&mut self, count: usize) -> Result<Vec<FramebufferId>, EngineError> {
        let ids: Vec<FramebufferId> = (0..count).map(|_| FramebufferId(self.next())).collect();
        self.live_framebuffers.extend(ids.iter().copied());
        self.calls.push(GpuCall::CreateFramebuffers(ids.clone()));
        Ok(ids)
    }

    fn delete_framebuffers(&mut self, framebuffers: &[FramebufferId]) {
        for f in framebuffers {
            self.live_framebuffers.remove(f);
        }
        self.calls
            .push(GpuCall::DeleteFramebuffers(framebuffers.to_vec()));
    }

    fn attach_color_texture(
        &mut self,
        framebuffer: FramebufferId,
        texture: TextureId,
    ) -> Result<(), EngineError> {
        if !self.live_framebuffers.contains(&framebuffer) {
            return Err(EngineError::GpuCreate(format!(
                "attach to unknown framebuffer {framebuffer:?}"
            )));
        }
        self.calls.push(GpuCall::AttachColorTexture {
            framebuffer,
            texture,
        });
        Ok(())
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.current_framebuffer = framebuffer;
        self.calls.push(GpuCall::BindFramebuffer(framebuffer));
    }

    fn viewport(&mut self, width: i32, height: i32) {
        self.calls.push(GpuCall::Viewport { width, height });
    }

    fn set_alpha_blending(&mut self, enabled: bool) {
        self.calls.push(GpuCall::AlphaBlending(enabled));
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        self.calls.push(GpuCall::Clear(rgba));
    }

    fn enable_vertex_attrib(&mut self, location: AttribLocation, data: &QuadBuffer) {
        let name = ATTRIB_NAMES
            .get(location.0 as usize)
            .map(|n| n.to_string())
            .unwrap_or_default();
        self.calls.push(GpuCall::EnableAttrib { name, data: *data });
    }

    fn disable_vertex_attrib(&mut self, location: AttribLocation) {
        let name = ATTRIB_NAMES
            .get(location.0 as usize)
            .map(|n| n.to_string())
            .unwrap_or_default();
        self.calls.push(GpuCall::DisableAttrib(name));
    }

    fn draw_quad(&mut self) {
        self.calls.push(GpuCall::DrawQuad {
            program: self.current_program,
            framebuffer: self.current_framebuffer,
            unit0: self.bound_textures.get(&0).copied(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_live_handles_across_create_and_delete() {
        let mut gpu = RecordingBackend::new();
        let p = gpu.compile_program("v", "f").unwrap();
        let tex = gpu.create_textures(3).unwrap();
        let fbo = gpu.create_framebuffers(2).unwrap();
        assert_eq!(gpu.live_handle_count(), 6);

        gpu.delete_program(p);
        gpu.delete_textures(&tex);
        gpu.delete_framebuffers(&fbo);
        assert_eq!(gpu.live_handle_count(), 0);
    }

    #[test]
    fn injected_compile_failure_names_the_shader_stage() {
        let mut gpu = RecordingBackend::new();
        gpu.fail_compile_containing("BROKEN");
        let err = gpu.compile_program("ok", "BROKEN").unwrap_err();
        assert!(matches!(err, EngineError::FragmentCompile(_)));
        assert_eq!(gpu.live_programs(), 0);
    }

    #[test]
    fn uniform_values_are_recorded_by_name() {
        let mut gpu = RecordingBackend::new();
        let p = gpu.compile_program("v", "f").unwrap();
        let loc = gpu.uniform_location(p, "uBlockSize").unwrap();
        assert_eq!(gpu.uniform_location(p, "uBlockSize"), Some(loc));
        gpu.set_uniform_f32(loc, 4.0);
        assert_eq!(gpu.uniform_f32_values("uBlockSize"), vec![4.0]);
    }
}
