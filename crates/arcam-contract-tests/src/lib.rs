#![forbid(unsafe_code)]

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use arcam_core::{EngineError, FilterConfig, PipelineConfig, RenderMode};

    // ---- Golden fixtures (JSON contracts) ----
    const PIPELINE_FULL_JSON: &str = include_str!("../fixtures/pipeline_full.json");
    const PIPELINE_EMPTY_JSON: &str = include_str!("../fixtures/pipeline_empty.json");
    const PIPELINE_BAD_ROTATION_JSON: &str = include_str!("../fixtures/pipeline_bad_rotation.json");
    const PIPELINE_BAD_BLOCK_SIZE_JSON: &str =
        include_str!("../fixtures/pipeline_bad_block_size.json");
    const PIPELINE_UNKNOWN_FILTER_JSON: &str =
        include_str!("../fixtures/pipeline_unknown_filter.json");

    fn write_temp_fixture(name: &str, contents: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("arcam_contract_tests_{name}_{ts}.json"));
        fs::write(&p, contents).expect("write fixture");
        p
    }

    #[test]
    fn golden_pipeline_full_json_deserializes() {
        let path = write_temp_fixture("pipeline_full", PIPELINE_FULL_JSON);

        let cfg = PipelineConfig::from_json_path(&path).expect("pipeline_full.json should parse");
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.render_mode, RenderMode::Continuous);
        assert!(!cfg.alpha_blend);
        assert_eq!(cfg.display_rotation, 90);
        assert_eq!(cfg.camera.index, 1);
        assert_eq!(cfg.image, Some(PathBuf::from("assets/overlay.png")));
        assert_eq!(
            cfg.filters,
            vec![
                FilterConfig::Pixelate { block_size: 20.0 },
                FilterConfig::Pixelate { block_size: 4.0 },
            ]
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn golden_pipeline_empty_takes_defaults() {
        let path = write_temp_fixture("pipeline_empty", PIPELINE_EMPTY_JSON);

        let cfg = PipelineConfig::from_json_path(&path).expect("empty document is valid");
        assert_eq!(cfg, PipelineConfig::default());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn golden_pipeline_bad_rotation_is_rejected() {
        let path = write_temp_fixture("pipeline_bad_rotation", PIPELINE_BAD_ROTATION_JSON);

        let err = PipelineConfig::from_json_path(&path)
            .expect_err("rotation 45 must fail validation");
        match &err {
            EngineError::InvalidConfig { path: p, msg } => {
                assert_eq!(p, &path);
                assert!(msg.contains("display_rotation"), "got: {msg}");
            }
            other => panic!("expected InvalidConfig, got {other}"),
        }

        let _ = fs::remove_file(path);
    }

    #[test]
    fn golden_pipeline_bad_block_size_is_rejected() {
        let err = PipelineConfig::from_json_str(PIPELINE_BAD_BLOCK_SIZE_JSON, "bad_block.json")
            .expect_err("zero block size must fail validation");
        assert!(
            err.to_string().contains("block_size"),
            "expected error to mention block_size, got: {err}"
        );
    }

    #[test]
    fn golden_pipeline_unknown_filter_is_a_json_error() {
        let err = PipelineConfig::from_json_str(PIPELINE_UNKNOWN_FILTER_JSON, "unknown.json")
            .expect_err("unknown filter kind");
        assert!(matches!(err, EngineError::Json { .. }), "got: {err}");
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let err = PipelineConfig::from_json_path("/nonexistent/arcam/pipeline.json")
            .expect_err("missing file");
        assert!(matches!(err, EngineError::Io { .. }), "got: {err}");
    }
}

mod camera_feed;
mod lifecycle;
mod passes;
