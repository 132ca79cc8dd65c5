use checkerboard_pose_chessboard::{ChessboardDetector, ChessboardParams};
use checkerboard_pose_core::synthetic::SyntheticScene;
use checkerboard_pose_core::{BoardSpec, CameraParams, Corner, GrayImage, PatternModel};
use nalgebra::{Matrix3, Point2};

struct Fixture {
    board: BoardSpec,
    image: GrayImage,
    truth: Vec<Point2<f64>>,
}

fn fixture() -> Fixture {
    let board = BoardSpec::new(6, 8, 0.03).unwrap();
    let model = PatternModel::new(board);
    let k = Matrix3::new(600.0, 0.0, 320.0, 0.0, 600.0, 240.0, 0.0, 0.0, 1.0);
    let scene = SyntheticScene::new(
        640,
        480,
        CameraParams::pinhole(k),
        SyntheticScene::facing_pose(0.7, 0.2, -0.1),
    );
    Fixture {
        board,
        image: scene.render(&model),
        truth: scene.project_corners(&model).unwrap(),
    }
}

// Ground truth nudged off by a fraction of a pixel, in scrambled order,
// plus clutter in the flat background.
fn candidates(truth: &[Point2<f64>]) -> Vec<Corner> {
    let mut out: Vec<Corner> = truth
        .iter()
        .map(|p| Corner::new(p.x as f32 + 0.4, p.y as f32 - 0.3, 1.0))
        .collect();
    out.reverse();
    let half = out.len() / 2;
    out.rotate_left(half / 3);
    out.push(Corner::new(15.0, 15.0, 0.5));
    out.push(Corner::new(30.0, 18.0, 0.5));
    out.push(Corner::new(620.0, 460.0, 0.5));
    out
}

#[test]
fn assembles_rendered_board_in_row_major_order() {
    let f = fixture();
    let detector = ChessboardDetector::new(ChessboardParams::default());
    let search = detector.prepare_image(f.image.view()).expect("contrast");

    let det = detector
        .detect(&search, &candidates(&f.truth), &f.board)
        .expect("board found");

    assert_eq!((det.rows, det.cols), (6, 8));
    assert_eq!(det.corners.len(), 48);
    assert!(det.parity_agreement.unwrap() >= 0.9);
    for (got, want) in det.corners.iter().zip(&f.truth) {
        let err = (got - want).norm();
        assert!(err < 0.1, "corner {got:?} vs {want:?} ({err:.3} px)");
    }
}

#[test]
fn missing_corner_is_not_a_board() {
    let f = fixture();
    let detector = ChessboardDetector::new(ChessboardParams::default());
    let search = detector.prepare_image(f.image.view()).expect("contrast");

    let mut cands = candidates(&f.truth);
    cands.retain(|c| (c.position.x - (f.truth[20].x as f32 + 0.4)).abs() > 1e-3);
    assert!(detector.detect(&search, &cands, &f.board).is_none());
}

#[test]
fn wrong_board_size_is_not_found() {
    let f = fixture();
    let detector = ChessboardDetector::new(ChessboardParams::default());
    let search = detector.prepare_image(f.image.view()).expect("contrast");
    let bigger = BoardSpec::new(7, 8, 0.03).unwrap();
    assert!(detector.detect(&search, &candidates(&f.truth), &bigger).is_none());
}

#[test]
fn flat_image_fails_fast_check() {
    let img = GrayImage {
        width: 64,
        height: 48,
        data: vec![128; 64 * 48],
    };
    let detector = ChessboardDetector::new(ChessboardParams::default());
    assert!(detector.prepare_image(img.view()).is_none());
}

#[test]
fn params_deserialize_with_defaults() {
    let params: ChessboardParams =
        serde_json::from_str(r#"{"flags": {"normalize_image": false}, "subpix": {"half_window": 3}}"#)
            .unwrap();
    assert!(!params.flags.normalize_image);
    assert!(params.flags.fast_check);
    assert_eq!(params.subpix.half_window, 3);
    assert_eq!(params.subpix.max_iterations, 30);
    assert_eq!(params.graph.k_neighbors, 8);
}
