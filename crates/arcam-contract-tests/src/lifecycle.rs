#![forbid(unsafe_code)]

#[cfg(test)]
mod tests {
    use arcam_compositor::{Compositor, ImageSource, Lifecycle, PipelineStage, PixelateFilter};
    use arcam_runtime::recording::RecordingBackend;
    use arcam_runtime::shaders;

    fn pipeline(sources: usize, filters: usize) -> Compositor {
        let mut c = Compositor::new();
        for _ in 0..sources {
            let img = ImageSource::from_rgba(1, 1, vec![0, 0, 255, 255]).expect("rgba");
            c.register_source(PipelineStage::image(img))
                .expect("register source");
        }
        for _ in 0..filters {
            c.register_filter(PipelineStage::pixelate(PixelateFilter::new(20.0)))
                .expect("register filter");
        }
        c
    }

    #[test]
    fn surface_ready_twice_does_not_double_allocate() {
        let mut gpu = RecordingBackend::new();
        let mut c = pipeline(2, 2);

        c.on_surface_ready(&mut gpu).expect("first ready");
        let after_first = (
            gpu.live_programs(),
            gpu.live_textures(),
            gpu.live_framebuffers(),
        );
        // 4 programs; 2 source + 2 filter textures; 2 framebuffers
        assert_eq!(after_first, (4, 4, 2));

        c.on_surface_ready(&mut gpu).expect("second ready");
        assert_eq!(
            (
                gpu.live_programs(),
                gpu.live_textures(),
                gpu.live_framebuffers()
            ),
            after_first
        );
    }

    #[test]
    fn teardown_twice_leaves_no_live_handles() {
        let mut gpu = RecordingBackend::new();
        let mut c = pipeline(2, 3);
        c.on_surface_ready(&mut gpu).expect("ready");
        c.on_surface_resized(&mut gpu, 320, 200);
        c.draw_frame(&mut gpu);

        c.teardown(&mut gpu);
        assert_eq!(gpu.live_handle_count(), 0);
        assert_eq!(c.lifecycle(), Lifecycle::Released);

        gpu.clear_calls();
        c.teardown(&mut gpu);
        assert_eq!(gpu.live_handle_count(), 0);
        assert!(gpu.calls().is_empty(), "second teardown touched the GPU");

        c.draw_frame(&mut gpu);
        assert_eq!(gpu.draw_count(), 0);
    }

    #[test]
    fn teardown_before_ready_is_a_no_op() {
        let mut gpu = RecordingBackend::new();
        let mut c = pipeline(1, 1);
        c.teardown(&mut gpu);
        assert!(gpu.calls().is_empty());
        assert_eq!(c.lifecycle(), Lifecycle::Unallocated);
    }

    #[test]
    fn filter_that_fails_to_compile_does_not_stop_the_frame() {
        let mut gpu = RecordingBackend::new();
        gpu.fail_compile_containing(shaders::UNIFORM_BLOCK_SIZE);
        let mut c = pipeline(1, 2);

        c.on_surface_ready(&mut gpu).expect("ready despite compile failure");
        c.on_surface_resized(&mut gpu, 640, 480);
        gpu.clear_calls();
        c.draw_frame(&mut gpu);

        // Only the source draws; both filters stay silent, passes still run.
        assert_eq!(gpu.draw_count(), 1);
        assert_eq!(gpu.framebuffer_bind_counts(), (2, 2));

        c.teardown(&mut gpu);
        assert_eq!(gpu.live_handle_count(), 0);
    }
}
