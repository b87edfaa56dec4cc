//! Post-processing filters.

use arcam_runtime::{shaders, GpuBackend, UniformLocation};

use crate::stage::StageCore;

#[derive(Debug, Clone, Copy)]
struct PixelateUniforms {
    block_size: Option<UniformLocation>,
    inv_width: Option<UniformLocation>,
    inv_height: Option<UniformLocation>,
}

/// Block pixelation: every `block_size` x `block_size` pixel cell shows one sample.
#[derive(Debug, Clone)]
pub struct PixelateFilter {
    block_size: f32,
    uniforms: Option<PixelateUniforms>,
}

impl PixelateFilter {
    pub fn new(block_size: f32) -> Self {
        Self {
            block_size,
            uniforms: None,
        }
    }

    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    /// Takes effect on the next draw. Non-finite or non-positive sizes are ignored.
    pub fn set_block_size(&mut self, block_size: f32) {
        if block_size.is_finite() && block_size > 0.0 {
            self.block_size = block_size;
        } else {
            tracing::warn!(block_size, "ignoring invalid pixelate block size");
        }
    }

    pub(crate) fn on_initialize(&mut self, core: &StageCore, gpu: &mut impl GpuBackend) {
        let Some(program) = core.program_id() else {
            return;
        };
        self.uniforms = Some(PixelateUniforms {
            block_size: gpu.uniform_location(program, shaders::UNIFORM_BLOCK_SIZE),
            inv_width: gpu.uniform_location(program, shaders::UNIFORM_INV_WIDTH),
            inv_height: gpu.uniform_location(program, shaders::UNIFORM_INV_HEIGHT),
        });
    }

    pub(crate) fn before_draw(&self, core: &StageCore, gpu: &mut impl GpuBackend) {
        let Some(u) = self.uniforms else {
            return;
        };
        let (w, h) = core.viewport();
        if w > 0 && h > 0 {
            if let Some(loc) = u.inv_width {
                gpu.set_uniform_f32(loc, 1.0 / w as f32);
            }
            if let Some(loc) = u.inv_height {
                gpu.set_uniform_f32(loc, 1.0 / h as f32);
            }
        }
        if let Some(loc) = u.block_size {
            gpu.set_uniform_f32(loc, self.block_size);
        }
    }

    pub(crate) fn on_destroy(&mut self) {
        self.uniforms = None;
    }
}
