use std::fs;
use std::io::BufWriter;

use checkerboard_pose::{JsonLinesSink, PoseEmitter, PoseSink, Stamp, TransformSink};
use nalgebra::Vector3;

#[test]
fn json_lines_are_tagged_and_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("poses.jsonl");

    let emitter = PoseEmitter::new("checkerboard");
    let first = emitter.emit(
        &Vector3::new(3.1, 0.0, 0.0),
        &Vector3::new(0.0, 0.1, 0.8),
        Stamp::new(10, 0),
        "camera",
    );
    let second = emitter.emit(
        &Vector3::zeros(),
        &Vector3::new(0.0, 0.0, 1.0),
        Stamp::new(11, 0),
        "camera",
    );

    {
        let mut sink = JsonLinesSink::new(BufWriter::new(fs::File::create(&path).unwrap()));
        for out in [&first, &second] {
            sink.send_transform(&out.transform).unwrap();
            sink.publish(&out.pose).unwrap();
        }
    }

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["kind"], "transform");
    assert_eq!(lines[1]["kind"], "pose");
    assert_eq!(lines[0]["child_frame_id"], "checkerboard");
    assert_eq!(lines[0]["header"]["frame_id"], "camera");
    assert_eq!(lines[1]["header"]["stamp"]["sec"], 10);
    assert_eq!(lines[3]["header"]["stamp"]["sec"], 11);
    assert_eq!(
        lines[0]["transform"]["translation"]["z"],
        lines[1]["pose"]["position"]["z"]
    );
    assert_eq!(lines[2]["transform"]["rotation"]["w"], 1.0);
}
