//! Pipeline configuration (JSON).
//!
//! Every field has a default so a partial (or empty `{}`) document is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Draw only when something asked for a redraw (frame arrival, resize, input).
    #[default]
    WhenDirty,
    /// Draw every time the event loop is idle.
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Preferred device index for providers that enumerate by index.
    #[serde(default)]
    pub index: u32,
    /// Sample the camera through an external-stream texture instead of a plain 2D texture.
    #[serde(default)]
    pub external_texture: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index: 0,
            external_texture: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    Pixelate {
        #[serde(default = "default_block_size")]
        block_size: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub render_mode: RenderMode,

    /// Screen clear color (RGBA, 0..1).
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],

    /// Composite sources with `SRC_ALPHA / ONE_MINUS_SRC_ALPHA` blending.
    #[serde(default = "default_true")]
    pub alpha_blend: bool,

    /// Display rotation in degrees (0, 90, 180, 270), as reported by the window manager.
    #[serde(default)]
    pub display_rotation: u32,

    #[serde(default)]
    pub camera: CameraConfig,

    /// Optional still image composited over the camera feed.
    #[serde(default)]
    pub image: Option<PathBuf>,

    #[serde(default = "default_filters")]
    pub filters: Vec<FilterConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            render_mode: RenderMode::default(),
            clear_color: default_clear_color(),
            alpha_blend: true,
            display_rotation: 0,
            camera: CameraConfig::default(),
            image: None,
            filters: default_filters(),
        }
    }
}

fn default_title() -> String {
    "arcam".to_string()
}
fn default_width() -> u32 {
    960
}
fn default_height() -> u32 {
    540
}
fn default_true() -> bool {
    true
}
fn default_block_size() -> f32 {
    20.0
}
fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
fn default_filters() -> Vec<FilterConfig> {
    vec![FilterConfig::Pixelate {
        block_size: default_block_size(),
    }]
}

impl PipelineConfig {
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: PipelineConfig =
            serde_json::from_str(&text).map_err(|source| EngineError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    /// Parse from an in-memory document. `origin` is only used in error messages.
    pub fn from_json_str(text: &str, origin: impl AsRef<Path>) -> Result<Self, EngineError> {
        let origin = origin.as_ref();
        let cfg: PipelineConfig =
            serde_json::from_str(text).map_err(|source| EngineError::Json {
                path: origin.to_path_buf(),
                source,
            })?;
        cfg.validate(origin)?;
        Ok(cfg)
    }

    fn validate(&self, path: &Path) -> Result<(), EngineError> {
        let invalid = |msg: String| EngineError::InvalidConfig {
            path: path.to_path_buf(),
            msg,
        };

        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window width/height must be > 0".into()));
        }
        if self.display_rotation % 90 != 0 {
            return Err(invalid(format!(
                "display_rotation must be a multiple of 90, got {}",
                self.display_rotation
            )));
        }
        for (i, f) in self.filters.iter().enumerate() {
            match f {
                FilterConfig::Pixelate { block_size } => {
                    if !(block_size.is_finite() && *block_size > 0.0) {
                        return Err(invalid(format!(
                            "filters[{i}]: pixelate block_size must be > 0, got {block_size}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_takes_defaults() {
        let cfg = PipelineConfig::from_json_str("{}", "inline").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.render_mode, RenderMode::WhenDirty);
        assert_eq!(
            cfg.filters,
            vec![FilterConfig::Pixelate { block_size: 20.0 }]
        );
    }

    #[test]
    fn filters_are_tagged_by_kind() {
        let cfg = PipelineConfig::from_json_str(
            r#"{ "filters": [ { "kind": "pixelate", "block_size": 8 }, { "kind": "pixelate" } ] }"#,
            "inline",
        )
        .unwrap();
        assert_eq!(
            cfg.filters,
            vec![
                FilterConfig::Pixelate { block_size: 8.0 },
                FilterConfig::Pixelate { block_size: 20.0 },
            ]
        );
    }

    #[test]
    fn rejects_odd_rotation() {
        let err = PipelineConfig::from_json_str(r#"{ "display_rotation": 45 }"#, "inline")
            .expect_err("45 degrees is not a display rotation");
        assert!(matches!(err, EngineError::InvalidConfig { .. }), "{err}");
    }

    #[test]
    fn rejects_non_positive_block_size() {
        let err = PipelineConfig::from_json_str(
            r#"{ "filters": [ { "kind": "pixelate", "block_size": 0 } ] }"#,
            "inline",
        )
        .expect_err("zero block size");
        assert!(err.to_string().contains("block_size"), "{err}");
    }
}
