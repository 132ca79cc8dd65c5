use std::fs;

use checkerboard_pose::{ConfigError, PatternOrigin, PipelineConfig};

#[test]
fn legacy_parameter_names_are_accepted() {
    let cfg = PipelineConfig::from_json_str(
        r#"{"rows": 7, "cols": 9, "size": 0.025, "frame_id": "target", "rectified": false}"#,
    )
    .unwrap();
    assert_eq!((cfg.rows, cfg.cols), (7, 9));
    assert_eq!(cfg.square_size, 0.025);
    assert_eq!(cfg.target_frame_id, "target");
    assert!(!cfg.rectified);
    assert_eq!(cfg.pattern_origin, PatternOrigin::Center);
}

#[test]
fn nested_sections_fill_missing_fields() {
    let cfg = PipelineConfig::from_json_str(
        r#"{
            "pattern_origin": "half_square_offset",
            "detector": {"chess_threshold_rel": 0.1, "chessboard": {"flags": {"normalize_image": false}}},
            "solver": {"max_reprojection_error": 0.5}
        }"#,
    )
    .unwrap();
    let defaults = PipelineConfig::default();
    assert_eq!(cfg.pattern_origin, PatternOrigin::HalfSquareOffset);
    assert_eq!(cfg.detector.chess_threshold_rel, 0.1);
    assert_eq!(cfg.detector.chess_nms_radius, defaults.detector.chess_nms_radius);
    assert!(!cfg.detector.chessboard.flags.normalize_image);
    assert!(cfg.detector.chessboard.flags.fast_check);
    assert_eq!(cfg.solver.max_reprojection_error, 0.5);
    assert_eq!(cfg.solver.max_iterations, defaults.solver.max_iterations);
}

#[test]
fn load_reports_missing_file_and_bad_json() {
    let dir = tempfile::tempdir().unwrap();
    let missing = PipelineConfig::load(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));

    let path = dir.path().join("bad.json");
    fs::write(&path, "{rows: }").unwrap();
    assert!(matches!(
        PipelineConfig::load(&path).unwrap_err(),
        ConfigError::Json(_)
    ));

    fs::write(&path, r#"{"square_size": -1.0}"#).unwrap();
    assert!(matches!(
        PipelineConfig::load(&path).unwrap_err(),
        ConfigError::Board(_)
    ));
}
