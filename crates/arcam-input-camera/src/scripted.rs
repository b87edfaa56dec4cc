//! In-memory camera provider.
//!
//! Hosts without a camera (CI, headless rendering) and the tests use it. A
//! [`ScriptedCameraHandle`] plays the role of the capture thread: it pushes frames into whatever
//! sink the preview was started with.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    CameraDevice, CameraError, CameraId, CameraInfo, CameraProvider, FrameSink, PreviewSize,
    RgbaFrame,
};

#[derive(Debug, Default)]
struct ScriptedState {
    opened: Vec<CameraId>,
    preview_size: Option<PreviewSize>,
    sink: Option<FrameSink>,
    previewing: bool,
    released: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedCameraHandle {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedCameraHandle {
    fn lock(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a frame as the capture thread would. Returns `false` if no preview is running.
    pub fn push_frame(&self, frame: RgbaFrame) -> bool {
        let sink = self.lock().sink.clone();
        match sink {
            Some(s) => {
                s.frame_available(frame);
                true
            }
            None => false,
        }
    }

    pub fn opened(&self) -> Vec<CameraId> {
        self.lock().opened.clone()
    }

    pub fn preview_size(&self) -> Option<PreviewSize> {
        self.lock().preview_size
    }

    pub fn is_previewing(&self) -> bool {
        self.lock().previewing
    }

    /// How many opened devices have been dropped.
    pub fn released(&self) -> usize {
        self.lock().released
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedCamera {
    infos: Vec<CameraInfo>,
    sizes: Vec<PreviewSize>,
    open_error: Option<fn(CameraId) -> CameraError>,
    preview_error: Option<fn(CameraId) -> CameraError>,
    handle: ScriptedCameraHandle,
}

impl ScriptedCamera {
    pub fn new(infos: Vec<CameraInfo>, sizes: Vec<PreviewSize>) -> Self {
        Self {
            infos,
            sizes,
            open_error: None,
            preview_error: None,
            handle: ScriptedCameraHandle::default(),
        }
    }

    /// Every `open` fails with the error built by `make`.
    pub fn failing_open(mut self, make: fn(CameraId) -> CameraError) -> Self {
        self.open_error = Some(make);
        self
    }

    /// Devices open fine, but every `start_preview` fails with the error built by `make`.
    pub fn failing_preview(mut self, make: fn(CameraId) -> CameraError) -> Self {
        self.preview_error = Some(make);
        self
    }

    pub fn handle(&self) -> ScriptedCameraHandle {
        self.handle.clone()
    }
}

impl CameraProvider for ScriptedCamera {
    fn enumerate(&mut self) -> Result<Vec<CameraInfo>, CameraError> {
        Ok(self.infos.clone())
    }

    fn open(&mut self, id: CameraId) -> Result<Box<dyn CameraDevice>, CameraError> {
        if let Some(make) = self.open_error {
            return Err(make(id));
        }
        let info = self
            .infos
            .iter()
            .copied()
            .find(|i| i.id == id)
            .ok_or_else(|| CameraError::Backend(format!("unknown camera {id:?}")))?;
        self.handle.lock().opened.push(id);
        Ok(Box::new(ScriptedDevice {
            info,
            sizes: self.sizes.clone(),
            preview_error: self.preview_error,
            handle: self.handle.clone(),
        }))
    }
}

#[derive(Debug)]
struct ScriptedDevice {
    info: CameraInfo,
    sizes: Vec<PreviewSize>,
    preview_error: Option<fn(CameraId) -> CameraError>,
    handle: ScriptedCameraHandle,
}

impl CameraDevice for ScriptedDevice {
    fn info(&self) -> CameraInfo {
        self.info
    }

    fn supported_preview_sizes(&self) -> Vec<PreviewSize> {
        self.sizes.clone()
    }

    fn set_preview_size(&mut self, size: PreviewSize) -> Result<(), CameraError> {
        if !self.sizes.contains(&size) {
            return Err(CameraError::UnsupportedSize(size.width, size.height));
        }
        self.handle.lock().preview_size = Some(size);
        Ok(())
    }

    fn start_preview(&mut self, sink: FrameSink) -> Result<(), CameraError> {
        if let Some(make) = self.preview_error {
            return Err(make(self.info.id));
        }
        let mut st = self.handle.lock();
        st.sink = Some(sink);
        st.previewing = true;
        Ok(())
    }

    fn stop_preview(&mut self) {
        let mut st = self.handle.lock();
        st.sink = None;
        st.previewing = false;
    }
}

impl Drop for ScriptedDevice {
    fn drop(&mut self) {
        let mut st = self.handle.lock();
        st.sink = None;
        st.previewing = false;
        st.released += 1;
    }
}
