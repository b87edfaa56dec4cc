//! AR camera demo: live camera feed plus an optional still overlay, through a pixelate chain.
//!
//! Build with `--features native` for a real webcam; without it the camera source is skipped.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use arcam_compositor::{CaptureSource, Compositor, ImageSource, PipelineStage};
use arcam_core::{PipelineConfig, TouchPhase};
use arcam_input_camera::{CameraProvider, Rotation};

struct Args {
    config: Option<PathBuf>,
}

fn print_usage_and_exit() -> ! {
    eprintln!(
        "Usage:\n  arcam-demo-ar-camera [--config pipeline.json]\n\n\
         Environment:\n  RUST_LOG   log filter (default: info)\n"
    );
    std::process::exit(2);
}

fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    while let Some(a) = args.next() {
        match a.as_str() {
            "--config" => config = args.next().map(PathBuf::from),
            "--help" | "-h" => print_usage_and_exit(),
            _ => {
                eprintln!("Unknown arg: {a}");
                print_usage_and_exit();
            }
        }
    }
    Args { config }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(feature = "native")]
fn camera_provider(cfg: &PipelineConfig) -> Option<Box<dyn CameraProvider>> {
    Some(Box::new(arcam_input_camera::native::NokhwaProvider::with_index(
        cfg.camera.index,
    )))
}

#[cfg(not(feature = "native"))]
fn camera_provider(_cfg: &PipelineConfig) -> Option<Box<dyn CameraProvider>> {
    tracing::warn!(
        error = %arcam_input_camera::CameraError::NotEnabled,
        "continuing without live input"
    );
    None
}

fn build_compositor(cfg: &PipelineConfig) -> Result<Compositor> {
    let mut compositor = Compositor::from_config(cfg);
    let rotation = Rotation::from_degrees(cfg.display_rotation as i32);

    if cfg.camera.enabled {
        if let Some(provider) = camera_provider(cfg) {
            let source = CaptureSource::new(provider)
                .with_external_texture(cfg.camera.external_texture)
                .with_display_rotation(rotation);
            compositor.register_source(PipelineStage::capture(source))?;
        }
    }

    if let Some(path) = &cfg.image {
        let image = ImageSource::from_path(path)
            .with_context(|| format!("loading overlay {}", path.display()))?;
        let stage = PipelineStage::image(image)
            .with_label("overlay")
            .with_touch_handler(|ev| {
                if ev.phase == TouchPhase::Down {
                    tracing::info!(x = ev.x, y = ev.y, "overlay tapped");
                }
                false
            });
        compositor.register_source(stage)?;
    }

    tracing::info!(
        sources = compositor.sources().len(),
        filters = compositor.filters().len(),
        "pipeline assembled"
    );
    Ok(compositor)
}

fn main() -> Result<()> {
    initialise_tracing();
    let args = parse_args();

    let cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let compositor = build_compositor(&cfg)?;
    arcam_host_winit::run(&cfg, compositor)?;
    Ok(())
}
