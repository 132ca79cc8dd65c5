use thiserror::Error;

/// Errors that can occur during PnP estimation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PnpError {
    /// Object and image point lists differ in length. A caller bug, not a
    /// property of the frame.
    #[error("correspondence mismatch: {object} object points vs {image} image points")]
    CorrespondenceMismatch { object: usize, image: usize },
    #[error("need at least {required} point correspondences, got {got}")]
    InsufficientCorrespondences { got: usize, required: usize },
    /// Collinear or coincident points, or a rank-deficient linear system.
    #[error("degenerate point configuration")]
    Degenerate,
    #[error("intrinsics matrix is not invertible")]
    SingularIntrinsics,
    #[error("solution places points behind the camera")]
    PointsBehindCamera,
    #[error("rms reprojection error {rms:.3} px exceeds {max:.3} px")]
    ReprojectionError { rms: f64, max: f64 },
    #[error("non-finite value in input or solution")]
    NonFinite,
}

impl PnpError {
    /// `true` for contract violations by the caller, as opposed to frames the
    /// solver cannot handle.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::CorrespondenceMismatch { .. })
    }
}
