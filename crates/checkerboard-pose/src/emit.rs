//! Packaging solved poses as stamped rigid transforms.
//!
//! The message types mirror the shapes of the ROS `TransformStamped` and
//! `PoseStamped` messages so the JSON output can be replayed onto a bus
//! without reshaping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use checkerboard_pose_pnp::PnpSolution;
use nalgebra::{Isometry3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Angles below this are treated as no rotation.
pub const MIN_ROTATION_ANGLE: f64 = 1e-12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i64,
    pub nanosec: u32,
}

impl Stamp {
    pub fn new(sec: i64, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }

    /// Whole and fractional seconds; negative or non-finite input gives zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::default();
        }
        let sec = secs.floor();
        let nanosec = (((secs - sec) * NANOS_PER_SEC as f64).round() as u32).min(999_999_999);
        Self::new(sec as i64, nanosec)
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self::new(
            (nanos / NANOS_PER_SEC) as i64,
            (nanos % NANOS_PER_SEC) as u32,
        )
    }

    /// Unset stamp.
    pub fn is_zero(&self) -> bool {
        self.sec == 0 && self.nanosec == 0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

/// Source of stamps for frames that arrive without one.
pub trait Clock {
    fn now(&self) -> Stamp;
}

/// Wall clock whose stamps are non-zero and strictly increasing, also
/// across threads.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_nanos: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Stamp {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        let mut prev = self.last_nanos.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self.last_nanos.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Stamp::from_nanos(next),
                Err(actual) => prev = actual,
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Stamp,
    pub frame_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vector3Msg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vector3<f64>> for Vector3Msg {
    fn from(v: Vector3<f64>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuaternionMsg {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl From<UnitQuaternion<f64>> for QuaternionMsg {
    fn from(q: UnitQuaternion<f64>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vector3Msg,
    pub rotation: QuaternionMsg,
}

/// Transform broadcast record: `header.frame_id` is the camera frame,
/// `child_frame_id` the board frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: Transform,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3Msg,
    pub orientation: QuaternionMsg,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

/// Both views of one solved pose. They carry the same numbers and stamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmittedPose {
    pub transform: StampedTransform,
    pub pose: PoseStamped,
}

impl EmittedPose {
    pub fn isometry(&self) -> Isometry3<f64> {
        let t = self.transform.transform.translation;
        let r = self.transform.transform.rotation;
        Isometry3::from_parts(
            Translation3::new(t.x, t.y, t.z),
            UnitQuaternion::new_normalize(Quaternion::new(r.w, r.x, r.y, r.z)),
        )
    }
}

/// Rotation from an axis-angle vector (axis direction, angle = norm).
pub fn rotation_from_axis_angle(v: &Vector3<f64>) -> UnitQuaternion<f64> {
    let angle = v.norm();
    if !angle.is_finite() || angle < MIN_ROTATION_ANGLE {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::from_axis_angle(&Unit::new_normalize(*v), angle)
}

/// Turns rotation/translation pairs into stamped transforms.
pub struct PoseEmitter<C = SystemClock> {
    target_frame_id: String,
    clock: C,
}

impl PoseEmitter<SystemClock> {
    pub fn new(target_frame_id: impl Into<String>) -> Self {
        Self::with_clock(target_frame_id, SystemClock::new())
    }
}

impl<C: Clock> PoseEmitter<C> {
    pub fn with_clock(target_frame_id: impl Into<String>, clock: C) -> Self {
        Self {
            target_frame_id: target_frame_id.into(),
            clock,
        }
    }

    pub fn target_frame_id(&self) -> &str {
        &self.target_frame_id
    }

    /// Camera -> board transform. A zero `stamp` is replaced by the clock.
    pub fn emit(
        &self,
        rotation: &Vector3<f64>,
        translation: &Vector3<f64>,
        stamp: Stamp,
        camera_frame_id: &str,
    ) -> EmittedPose {
        let stamp = if stamp.is_zero() {
            self.clock.now()
        } else {
            stamp
        };
        let header = Header {
            stamp,
            frame_id: camera_frame_id.to_string(),
        };
        let translation = Vector3Msg::from(*translation);
        let rotation = QuaternionMsg::from(rotation_from_axis_angle(rotation));

        EmittedPose {
            transform: StampedTransform {
                header: header.clone(),
                child_frame_id: self.target_frame_id.clone(),
                transform: Transform {
                    translation,
                    rotation,
                },
            },
            pose: PoseStamped {
                header,
                pose: Pose {
                    position: translation,
                    orientation: rotation,
                },
            },
        }
    }

    pub fn emit_solution(
        &self,
        solution: &PnpSolution,
        stamp: Stamp,
        camera_frame_id: &str,
    ) -> EmittedPose {
        self.emit(&solution.rotation, &solution.translation, stamp, camera_frame_id)
    }
}
