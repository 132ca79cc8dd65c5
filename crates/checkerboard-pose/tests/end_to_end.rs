use checkerboard_pose::core::synthetic::SyntheticScene;
use checkerboard_pose::{
    CameraInfo, CameraParams, Clock, Frame, MemorySink, PatternOrigin, PipelineConfig,
    PipelineError, PngOverlayWriter, PosePipeline, Stamp,
};
use nalgebra::{Isometry3, Vector3};

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> Stamp {
        Stamp::new(7, 0)
    }
}

fn render(config: &PipelineConfig, info: &CameraInfo, pose: Isometry3<f64>) -> image::GrayImage {
    let camera = CameraParams::from_camera_info(info, false);
    let scene = SyntheticScene::new(info.width as usize, info.height as usize, camera, pose);
    let rendered = scene.render(&config.pattern_model().unwrap());
    image::GrayImage::from_raw(info.width, info.height, rendered.data).unwrap()
}

fn assert_pose_close(est: &Isometry3<f64>, gt: &Isometry3<f64>) {
    let dt = (est.translation.vector - gt.translation.vector).norm();
    let dr = est.rotation.angle_to(&gt.rotation);
    assert!(dt < 5e-3, "translation error {dt} m");
    assert!(dr < 1e-2, "rotation error {dr} rad");
}

#[test]
fn rendered_board_yields_ground_truth_pose() {
    let config = PipelineConfig::default();
    let info = CameraInfo::pinhole(640, 480, 600.0, 600.0, 320.0, 240.0);
    let gt = SyntheticScene::facing_pose(0.9, 0.2, -0.1);
    let img = render(&config, &info, gt);

    let pipeline = PosePipeline::with_clock(config, FixedClock).unwrap();
    let frame = Frame::new(img, Stamp::new(100, 250), "camera_optical");
    let out = pipeline
        .process_frame(&frame, &info)
        .unwrap()
        .expect("board should be found");

    assert_pose_close(&out.isometry(), &gt);
    assert_eq!(out.transform.header.stamp, Stamp::new(100, 250));
    assert_eq!(out.transform.header.frame_id, "camera_optical");
    assert_eq!(out.transform.child_frame_id, "checkerboard");
    assert_eq!(out.pose.header, out.transform.header);
}

#[test]
fn raw_image_with_distortion() {
    let config = PipelineConfig {
        rectified: false,
        ..PipelineConfig::default()
    };
    let mut info = CameraInfo::pinhole(640, 480, 620.0, 615.0, 318.0, 243.0);
    info.d = vec![-0.15, 0.02, 0.0005, -0.0005, 0.0];
    let gt = SyntheticScene::facing_pose(0.95, -0.15, 0.2);
    let img = render(&config, &info, gt);

    let pipeline = PosePipeline::with_clock(config, FixedClock).unwrap();
    let frame = Frame::new(img, Stamp::default(), "camera");
    let out = pipeline.process_frame(&frame, &info).unwrap().unwrap();
    assert_pose_close(&out.isometry(), &gt);
    // Unstamped frames take the clock's stamp.
    assert_eq!(out.pose.header.stamp, Stamp::new(7, 0));
}

#[test]
fn half_square_origin_shifts_translation() {
    let info = CameraInfo::pinhole(640, 480, 600.0, 600.0, 320.0, 240.0);
    let gt = SyntheticScene::facing_pose(0.9, 0.1, 0.1);
    let centered = PipelineConfig::default();
    let img = render(&centered, &info, gt);
    let frame = Frame::new(img, Stamp::new(1, 0), "camera");

    let a = PosePipeline::with_clock(centered, FixedClock)
        .unwrap()
        .process_frame(&frame, &info)
        .unwrap()
        .unwrap()
        .isometry();
    let offset = PipelineConfig {
        pattern_origin: PatternOrigin::HalfSquareOffset,
        ..PipelineConfig::default()
    };
    let b = PosePipeline::with_clock(offset, FixedClock)
        .unwrap()
        .process_frame(&frame, &info)
        .unwrap()
        .unwrap()
        .isometry();

    // Same board, origin moved by (+s/2, -s/2) in board coordinates.
    let s = 0.06;
    let expected = a.translation.vector + a.rotation * Vector3::new(s / 2.0, -s / 2.0, 0.0);
    assert!((b.translation.vector - expected).norm() < 1e-6);
    assert!(a.rotation.angle_to(&b.rotation) < 1e-6);
}

#[test]
fn blank_image_publishes_nothing() {
    let config = PipelineConfig {
        show_detection: true,
        ..PipelineConfig::default()
    };
    let info = CameraInfo::pinhole(320, 240, 300.0, 300.0, 160.0, 120.0);
    let pipeline = PosePipeline::with_clock(config, FixedClock).unwrap();
    let frame = Frame::new(
        image::GrayImage::from_pixel(320, 240, image::Luma([128])),
        Stamp::new(1, 0),
        "camera",
    );

    let dir = tempfile::tempdir().unwrap();
    let mut overlay = PngOverlayWriter::new(dir.path().join("overlay"));
    let mut sink = MemorySink::new();
    let out = pipeline
        .run_frame(&frame, &info, &mut sink, Some(&mut overlay))
        .unwrap();

    assert!(out.is_none());
    assert!(sink.transforms.is_empty());
    assert!(sink.poses.is_empty());
    // Misses are still shown.
    assert!(dir.path().join("overlay/frame_000000.png").exists());
}

#[test]
fn run_frame_publishes_transform_and_pose() {
    let config = PipelineConfig {
        show_detection: true,
        ..PipelineConfig::default()
    };
    let info = CameraInfo::pinhole(640, 480, 600.0, 600.0, 320.0, 240.0);
    let img = render(&config, &info, SyntheticScene::facing_pose(0.9, 0.0, 0.15));
    let pipeline = PosePipeline::with_clock(config, FixedClock).unwrap();
    let frame = Frame::new(img, Stamp::new(3, 0), "camera");

    let dir = tempfile::tempdir().unwrap();
    let mut overlay = PngOverlayWriter::new(dir.path());
    let mut sink = MemorySink::new();
    let out = pipeline
        .run_frame(&frame, &info, &mut sink, Some(&mut overlay))
        .unwrap()
        .unwrap();

    assert_eq!(sink.transforms, vec![out.transform.clone()]);
    assert_eq!(sink.poses, vec![out.pose.clone()]);
    let overlay_img = image::open(dir.path().join("frame_000000.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(overlay_img.dimensions(), (640, 480));
}

#[test]
fn bad_raw_buffer_is_an_error() {
    let pipeline = PosePipeline::new(PipelineConfig::default()).unwrap();
    let info = CameraInfo::pinhole(4, 4, 1.0, 1.0, 2.0, 2.0);
    let err = pipeline
        .process_gray_u8(4, 4, &[0u8; 15], Stamp::default(), "camera", &info)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Detect(_)));
}
