use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn render_then_detect_writes_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("board.png");
    let camera_info = dir.path().join("camera.json");
    let output = dir.path().join("out/poses.jsonl");

    Command::cargo_bin("checkerboard-pose")
        .unwrap()
        .args(["render", "--distance", "0.9", "--output"])
        .arg(&image)
        .arg("--camera-info-out")
        .arg(&camera_info)
        .assert()
        .success();
    assert!(image.exists());

    Command::cargo_bin("checkerboard-pose")
        .unwrap()
        .args(["detect", "--frame-id", "cam0", "--stamp", "12.5", "--camera-info"])
        .arg(&camera_info)
        .arg("--output")
        .arg(&output)
        .arg(&image)
        .assert()
        .success();

    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(r#""kind":"transform""#));
    assert!(lines[0].contains(r#""frame_id":"cam0""#));
    assert!(lines[1].contains(r#""kind":"pose""#));
    assert!(lines[1].contains(r#""nanosec":500000000"#));
}

#[test]
fn detect_requires_images() {
    Command::cargo_bin("checkerboard-pose")
        .unwrap()
        .args(["detect", "--camera-info", "camera.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("IMAGES"));
}
