//! Arena-allocated face topology consumed by the mesher.
//!
//! Every entity lives in a [`TopoModel`] vector and is referenced through a
//! typed index handle, so the cyclic relations (edge to twin edge, face to loops
//! to edges) never need owning pointers.

use std::fmt;

use thiserror::Error;

mod edge;
mod face;
mod model;

pub use edge::{
    CuttingPoint, CuttingPointType, Edge, EdgeCrossings, EdgeMeshData, EdgeMeshState, TwinLink,
    Vertex,
};
pub use face::{Face, FaceMeshState, Loop, OrientedEdge, Orientation};
pub use model::TopoModel;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub usize);

        impl $name {
            #[must_use]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle of a carrier surface.
    SurfaceId,
    "S"
);
arena_id!(
    /// Handle of a topological vertex.
    VertexId,
    "V"
);
arena_id!(
    /// Handle of a bounded edge.
    EdgeId,
    "E"
);
arena_id!(
    /// Handle of a face.
    FaceId,
    "F"
);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopoError {
    #[error("unknown surface {0}")]
    UnknownSurface(SurfaceId),
    #[error("unknown vertex {0}")]
    UnknownVertex(VertexId),
    #[error("unknown edge {0}")]
    UnknownEdge(EdgeId),
    #[error("unknown face {0}")]
    UnknownFace(FaceId),
    #[error("edge {0} already bounds another face")]
    EdgeInUse(EdgeId),
    #[error("face needs an external loop")]
    MissingExternalLoop,
    #[error("loop {loop_index} is open after edge {position}")]
    OpenLoop { loop_index: usize, position: usize },
    #[error("edge {0} already has a twin")]
    TwinAlreadyLinked(EdgeId),
    #[error("edges {0} and {1} do not share their vertices")]
    TwinVertexMismatch(EdgeId, EdgeId),
    #[error("edge boundary [{0}, {1}] is empty or not finite")]
    InvalidBoundary(f64, f64),
    #[error("invalid polygon face: {0}")]
    InvalidPolygon(&'static str),
}
