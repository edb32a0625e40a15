use thiserror::Error;

use crate::geom::IsoAxis;
use crate::topo::{EdgeId, FaceMeshState, TopoError};

/// Failure taxonomy of the mesher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input cannot produce a mesh; the face is recorded as degenerate.
    DegenerateInput,
    /// An edge and its twin disagree; handled by a virtually-meshed fallback.
    InconsistentTwinState,
    /// An internal invariant broke; only the current face is abandoned.
    AssertionViolation,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    #[error("sampling grid is degenerate along {axis:?}: largest gap {gap:e} below tolerance {tolerance:e}")]
    DegenerateGrid { axis: IsoAxis, gap: f64, tolerance: f64 },
    #[error("loop {loop_index} has only {points} boundary points")]
    DegenerateLoop { loop_index: usize, points: usize },
    #[error("triangulation produced no triangles")]
    EmptyTriangulation,
    #[error("twin of edge {0} is meshed without points")]
    InconsistentTwin(EdgeId),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Topo(#[from] TopoError),
}

impl MeshError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DegenerateGrid { .. } | Self::DegenerateLoop { .. } | Self::EmptyTriangulation => {
                ErrorKind::DegenerateInput
            }
            Self::InconsistentTwin(_) => ErrorKind::InconsistentTwinState,
            Self::InvariantViolation(_) | Self::Topo(_) => ErrorKind::AssertionViolation,
        }
    }

    /// Terminal face state recorded when meshing stops on this error.
    #[must_use]
    pub const fn face_state(&self) -> FaceMeshState {
        match self {
            Self::DegenerateGrid { .. } => FaceMeshState::DegenerateGrid,
            Self::DegenerateLoop { .. } => FaceMeshState::DegenerateLoop,
            _ => FaceMeshState::Aborted,
        }
    }
}

/// Return [`MeshError::InvariantViolation`] when `$cond` does not hold; debug
/// builds also log the violation at error level.
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            let message = format!($($arg)+);
            if cfg!(debug_assertions) {
                log::error!("invariant violated: {message}");
            }
            return Err($crate::mesher::MeshError::InvariantViolation(message));
        }
    };
}

pub(crate) use ensure;
