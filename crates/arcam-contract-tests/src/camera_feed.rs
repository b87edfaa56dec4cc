#![forbid(unsafe_code)]

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arcam_compositor::{CaptureSource, CaptureState, Compositor, PipelineStage, StageKind};
    use arcam_core::CountingRedraw;
    use arcam_input_camera::scripted::{ScriptedCamera, ScriptedCameraHandle};
    use arcam_input_camera::{
        rotated_coordinates, CameraId, CameraInfo, Facing, PreviewSize, RgbaFrame, Rotation,
    };
    use arcam_runtime::recording::{GpuCall, RecordingBackend};

    fn back_camera(orientation: u32) -> (ScriptedCamera, ScriptedCameraHandle) {
        let cam = ScriptedCamera::new(
            vec![CameraInfo {
                id: CameraId(0),
                facing: Facing::Back,
                orientation,
            }],
            vec![
                PreviewSize::new(320, 240),
                PreviewSize::new(640, 480),
                PreviewSize::new(1280, 720),
            ],
        );
        let handle = cam.handle();
        (cam, handle)
    }

    fn frame(width: u32, height: u32, tag: u8) -> RgbaFrame {
        RgbaFrame {
            width,
            height,
            bytes: vec![tag; (width * height * 4) as usize],
        }
    }

    fn capture_state(c: &Compositor) -> CaptureState {
        match c.sources()[0].kind() {
            StageKind::Capture(cap) => cap.state(),
            other => panic!("expected a capture stage, got {other:?}"),
        }
    }

    #[test]
    fn two_frames_before_a_draw_upload_only_the_latest() {
        let (cam, handle) = back_camera(0);
        let redraw = Arc::new(CountingRedraw::new());
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.set_redraw_requester(redraw.clone());
        c.register_source(PipelineStage::capture(CaptureSource::new(Box::new(cam))))
            .expect("register camera");
        c.on_surface_ready(&mut gpu).expect("ready");
        c.on_surface_resized(&mut gpu, 800, 600);

        assert!(handle.push_frame(frame(2, 2, 1)));
        assert!(handle.push_frame(frame(2, 2, 2)));
        assert_eq!(redraw.count(), 2, "each frame wakes the driver");

        gpu.clear_calls();
        c.draw_frame(&mut gpu);
        c.draw_frame(&mut gpu);

        let uploads = gpu.texture_uploads();
        assert_eq!(uploads.len(), 1);
        match uploads[0] {
            GpuCall::TextureStorage {
                width,
                height,
                pixels: Some(p),
                ..
            } => {
                assert_eq!((*width, *height), (2, 2));
                assert!(p.iter().all(|b| *b == 2), "stale frame uploaded");
            }
            other => panic!("unexpected upload {other:?}"),
        }
    }

    #[test]
    fn first_frame_may_be_missing() {
        let (cam, _handle) = back_camera(0);
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.register_source(PipelineStage::capture(CaptureSource::new(Box::new(cam))))
            .expect("register camera");
        c.on_surface_ready(&mut gpu).expect("ready");
        c.on_surface_resized(&mut gpu, 800, 600);

        gpu.clear_calls();
        c.draw_frame(&mut gpu);
        assert!(gpu.texture_uploads().is_empty());
        assert_eq!(gpu.draw_count(), 1);
    }

    #[test]
    fn camera_opens_on_first_positive_size_and_closes_at_teardown() {
        let (cam, handle) = back_camera(90);
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.register_source(PipelineStage::capture(CaptureSource::new(Box::new(cam))))
            .expect("register camera");
        c.on_surface_ready(&mut gpu).expect("ready");
        assert_eq!(capture_state(&c), CaptureState::ProgramReady);

        c.on_surface_resized(&mut gpu, 0, 0);
        assert!(handle.opened().is_empty(), "zero size must not open the camera");

        // Portrait window, sensor mounted at 90 degrees: the sensor sees 700x500.
        c.on_surface_resized(&mut gpu, 500, 700);
        assert_eq!(capture_state(&c), CaptureState::PreviewActive);
        assert_eq!(handle.opened(), vec![CameraId(0)]);
        assert_eq!(handle.preview_size(), Some(PreviewSize::new(640, 480)));
        assert_eq!(
            c.sources()[0].core().coordinate(),
            rotated_coordinates(Rotation::Deg90, false)
        );

        c.teardown(&mut gpu);
        assert_eq!(capture_state(&c), CaptureState::Destroyed);
        assert!(!handle.is_previewing());
        assert_eq!(handle.released(), 1);
        assert!(!handle.push_frame(frame(1, 1, 9)), "no sink after teardown");
        assert_eq!(gpu.live_handle_count(), 0);
    }

    #[test]
    fn display_rotation_renegotiates_and_realigns() {
        let (cam, handle) = back_camera(90);
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.register_source(PipelineStage::capture(CaptureSource::new(Box::new(cam))))
            .expect("register camera");
        c.on_surface_ready(&mut gpu).expect("ready");
        c.on_surface_resized(&mut gpu, 640, 480);
        // The sensor sees the landscape window as 480x640.
        assert_eq!(handle.preview_size(), Some(PreviewSize::new(320, 240)));
        assert_eq!(
            c.sources()[0].core().coordinate(),
            rotated_coordinates(Rotation::Deg90, false)
        );

        // (90 - 90 + 360) % 360 = 0
        c.set_display_rotation(Rotation::Deg90);
        assert_eq!(capture_state(&c), CaptureState::PreviewActive);
        assert_eq!(handle.preview_size(), Some(PreviewSize::new(640, 480)));
        assert!(handle.is_previewing());
        assert_eq!(handle.opened(), vec![CameraId(0)], "rotation keeps the open device");
        assert_eq!(
            c.sources()[0].core().coordinate(),
            rotated_coordinates(Rotation::Deg0, false)
        );
    }

    #[test]
    fn rotation_before_first_resize_is_applied_when_the_camera_opens() {
        let (cam, handle) = back_camera(90);
        let mut gpu = RecordingBackend::new();
        let mut c = Compositor::new();
        c.register_source(PipelineStage::capture(CaptureSource::new(Box::new(cam))))
            .expect("register camera");
        c.on_surface_ready(&mut gpu).expect("ready");

        c.set_display_rotation(Rotation::Deg90);
        assert!(handle.opened().is_empty());

        c.on_surface_resized(&mut gpu, 640, 480);
        assert_eq!(handle.preview_size(), Some(PreviewSize::new(640, 480)));
    }
}
