//! Desktop cameras through nokhwa.
//!
//! nokhwa's `Camera` is not `Send` on every backend, so the capture thread builds its own
//! instance and pushes decoded frames into the sink. Desktop webcams report no mount angle and
//! no facing; every device is treated as a back camera at 0 degrees.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use nokhwa::{
    pixel_format::{RgbAFormat, RgbFormat},
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution},
    Camera,
};

use crate::{
    CameraDevice, CameraError, CameraId, CameraInfo, CameraProvider, Facing, FrameSink,
    PreviewSize, RgbaFrame,
};

/// Consecutive `frame()` errors before the capture thread gives up (about 5 s at the back-off).
const MAX_CONSECUTIVE_FAILURES: u32 = 100;
const FAILURE_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    First,
    Again,
    GiveUp,
}

/// Consecutive capture errors since the last good frame.
#[derive(Debug, Default)]
struct FailureStreak(u32);

impl FailureStreak {
    fn record(&mut self) -> Retry {
        self.0 = self.0.saturating_add(1);
        match self.0 {
            1 => Retry::First,
            n if n >= MAX_CONSECUTIVE_FAILURES => Retry::GiveUp,
            _ => Retry::Again,
        }
    }

    fn reset(&mut self) {
        self.0 = 0;
    }
}

fn backend_err(e: impl std::fmt::Display) -> CameraError {
    CameraError::Backend(e.to_string())
}

fn requested() -> RequestedFormat<'static> {
    RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate)
}

#[derive(Debug, Default)]
pub struct NokhwaProvider {
    only_index: Option<u32>,
}

impl NokhwaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict enumeration to one device index, if that device exists.
    pub fn with_index(index: u32) -> Self {
        Self {
            only_index: Some(index),
        }
    }
}

impl CameraProvider for NokhwaProvider {
    fn enumerate(&mut self) -> Result<Vec<CameraInfo>, CameraError> {
        let devices = nokhwa::query(ApiBackend::Auto).map_err(backend_err)?;
        let mut infos: Vec<CameraInfo> = devices
            .iter()
            .filter_map(|d| d.index().as_index().ok())
            .map(|index| CameraInfo {
                id: CameraId(index),
                facing: Facing::Back,
                orientation: 0,
            })
            .collect();
        if let Some(only) = self.only_index {
            if infos.iter().any(|i| i.id.0 == only) {
                infos.retain(|i| i.id.0 == only);
            } else {
                tracing::warn!(index = only, "requested camera not found, using any");
            }
        }
        Ok(infos)
    }

    fn open(&mut self, id: CameraId) -> Result<Box<dyn CameraDevice>, CameraError> {
        // Probe once for the formats; the capture thread opens its own instance later.
        let mut probe = Camera::new(CameraIndex::Index(id.0), requested()).map_err(backend_err)?;
        let mut sizes: Vec<PreviewSize> = probe
            .compatible_camera_formats()
            .map_err(backend_err)?
            .iter()
            .map(|f| {
                let r = f.resolution();
                PreviewSize::new(r.width_x, r.height_y)
            })
            .collect();
        sizes.sort_by_key(|s| (s.width, s.height));
        sizes.dedup();
        drop(probe);

        tracing::info!(camera = id.0, sizes = sizes.len(), "opened camera");
        Ok(Box::new(NokhwaDevice {
            info: CameraInfo {
                id,
                facing: Facing::Back,
                orientation: 0,
            },
            sizes,
            size: None,
            worker: None,
        }))
    }
}

#[derive(Debug)]
struct Worker {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

#[derive(Debug)]
struct NokhwaDevice {
    info: CameraInfo,
    sizes: Vec<PreviewSize>,
    size: Option<PreviewSize>,
    worker: Option<Worker>,
}

fn capture_loop(index: u32, size: Option<PreviewSize>, sink: FrameSink, stop: &AtomicBool) {
    let mut cam = match Camera::new(CameraIndex::Index(index), requested()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(camera = index, error = %e, "camera open failed");
            return;
        }
    };
    if let Some(s) = size {
        // Best effort; the device keeps its default on rejection.
        if let Err(e) = cam.set_resolution(Resolution::new(s.width, s.height)) {
            tracing::warn!(camera = index, error = %e, "resolution rejected");
        }
    }
    if let Err(e) = cam.open_stream() {
        tracing::error!(camera = index, error = %e, "stream open failed");
        return;
    }

    let mut failures = FailureStreak::default();
    while !stop.load(Ordering::Relaxed) {
        let buf = match cam.frame() {
            Ok(b) => {
                failures.reset();
                b
            }
            Err(e) => {
                match failures.record() {
                    Retry::First => {
                        tracing::warn!(camera = index, error = %e, "frame capture failed");
                    }
                    Retry::Again => {}
                    Retry::GiveUp => {
                        tracing::error!(camera = index, error = %e, "camera stopped delivering frames");
                        break;
                    }
                }
                std::thread::sleep(FAILURE_BACKOFF);
                continue;
            }
        };
        let res = buf.resolution();
        match buf.decode_image::<RgbAFormat>() {
            Ok(img) => sink.frame_available(RgbaFrame {
                width: res.width_x,
                height: res.height_y,
                bytes: img.into_raw(),
            }),
            Err(e) => tracing::warn!(camera = index, error = %e, "frame decode failed"),
        }
    }

    if let Err(e) = cam.stop_stream() {
        tracing::debug!(camera = index, error = %e, "stop_stream");
    }
}

impl CameraDevice for NokhwaDevice {
    fn info(&self) -> CameraInfo {
        self.info
    }

    fn supported_preview_sizes(&self) -> Vec<PreviewSize> {
        self.sizes.clone()
    }

    fn set_preview_size(&mut self, size: PreviewSize) -> Result<(), CameraError> {
        if !self.sizes.is_empty() && !self.sizes.contains(&size) {
            return Err(CameraError::UnsupportedSize(size.width, size.height));
        }
        self.size = Some(size);
        Ok(())
    }

    fn start_preview(&mut self, sink: FrameSink) -> Result<(), CameraError> {
        self.stop_preview();

        let stop = Arc::new(AtomicBool::new(false));
        let index = self.info.id.0;
        let size = self.size;
        let join = std::thread::Builder::new()
            .name(format!("arcam-camera-{index}"))
            .spawn({
                let stop = Arc::clone(&stop);
                move || capture_loop(index, size, sink, &stop)
            })
            .map_err(backend_err)?;

        self.worker = Some(Worker { stop, join });
        Ok(())
    }

    fn stop_preview(&mut self) {
        if let Some(w) = self.worker.take() {
            w.stop.store(true, Ordering::Relaxed);
            if w.join.join().is_err() {
                tracing::error!(camera = self.info.id.0, "capture thread panicked");
            }
        }
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        self.stop_preview();
    }
}
