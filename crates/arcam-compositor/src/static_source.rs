//! A fixed image uploaded once at initialization.

use std::path::Path;

use arcam_core::EngineError;
use arcam_runtime::{GpuBackend, TextureTarget};

use crate::stage::StageCore;

#[derive(Clone)]
pub struct ImageSource {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSource")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl ImageSource {
    /// Tightly packed RGBA8 pixels, top row first.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, EngineError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(EngineError::ImageDecode(format!(
                "{width}x{height} RGBA needs {expected} bytes, got {}",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Decode a PNG or JPEG held in memory.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, EngineError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| EngineError::ImageDecode(e.to_string()))?
            .to_rgba8();
        let (w, h) = img.dimensions();
        Self::from_rgba(w, h, img.into_raw())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| EngineError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_encoded(&bytes)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub(crate) fn on_initialize(&self, core: &mut StageCore, gpu: &mut impl GpuBackend) {
        let Some(tex) = core.texture else {
            return;
        };
        let (Ok(w), Ok(h)) = (i32::try_from(self.width), i32::try_from(self.height)) else {
            tracing::error!(stage = %core.label(), "image too large for a texture");
            return;
        };
        gpu.texture_storage(tex.unit, TextureTarget::Texture2D, tex.id, w, h, Some(&self.rgba));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::PipelineStage;
    use arcam_runtime::recording::{GpuCall, RecordingBackend};
    use arcam_runtime::TextureId;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn decodes_png_into_rgba() {
        let src = ImageSource::from_encoded(&png_bytes()).expect("decode");
        assert_eq!(src.size(), (3, 2));
    }

    #[test]
    fn rejects_garbage_and_short_buffers() {
        assert!(matches!(
            ImageSource::from_encoded(b"not an image"),
            Err(EngineError::ImageDecode(_))
        ));
        assert!(ImageSource::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(ImageSource::from_rgba(0, 2, vec![]).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ImageSource::from_path("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }), "{err}");
    }

    #[test]
    fn uploads_exactly_once() {
        let mut gpu = RecordingBackend::new();
        let src = ImageSource::from_rgba(1, 1, vec![1, 2, 3, 4]).expect("rgba");
        let mut stage = PipelineStage::image(src);
        stage.initialize(&mut gpu, TextureId(9), 2);
        stage.initialize(&mut gpu, TextureId(9), 2);
        stage.draw(&mut gpu);
        stage.draw(&mut gpu);

        let uploads = gpu.texture_uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(
            uploads[0],
            &GpuCall::TextureStorage {
                unit: 2,
                target: TextureTarget::Texture2D,
                texture: TextureId(9),
                width: 1,
                height: 1,
                pixels: Some(vec![1, 2, 3, 4]),
            }
        );
    }
}
