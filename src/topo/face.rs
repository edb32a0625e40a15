use crate::geom::UvDomain;

use super::{Edge, EdgeId, SurfaceId, VertexId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Forward,
    Reversed,
}

/// Use of an edge inside a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrientedEdge {
    pub edge: EdgeId,
    pub orientation: Orientation,
}

impl OrientedEdge {
    #[must_use]
    pub const fn forward(edge: EdgeId) -> Self {
        Self { edge, orientation: Orientation::Forward }
    }

    #[must_use]
    pub const fn reversed(edge: EdgeId) -> Self {
        Self { edge, orientation: Orientation::Reversed }
    }

    #[must_use]
    pub const fn is_forward(self) -> bool {
        matches!(self.orientation, Orientation::Forward)
    }

    /// First vertex met when walking the loop.
    #[must_use]
    pub const fn first_vertex(self, edge: &Edge) -> VertexId {
        if self.is_forward() { edge.start } else { edge.end }
    }

    #[must_use]
    pub const fn last_vertex(self, edge: &Edge) -> VertexId {
        if self.is_forward() { edge.end } else { edge.start }
    }
}

/// Closed chain of oriented edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    pub edges: Vec<OrientedEdge>,
    pub external: bool,
}

/// Progress of a face through the meshing pipeline.
///
/// The happy path is strictly ordered; the last three states are terminal
/// failures that still leave the face marked meshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum FaceMeshState {
    #[default]
    NotStarted,
    VerticesMeshed,
    EdgesDiscretized,
    GridBuilt,
    Triangulated,
    Done,
    DegenerateGrid,
    DegenerateLoop,
    Aborted,
}

impl FaceMeshState {
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::DegenerateGrid | Self::DegenerateLoop | Self::Aborted)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.is_failure() || matches!(self, Self::Done)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.is_failure() || next as u8 == self as u8 + 1
    }
}

/// Bounded region of a carrier surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub surface: SurfaceId,
    /// External loop first, then holes.
    pub loops: Vec<Loop>,
    /// Parametric bounding box of the loops, clipped to the surface domain.
    pub domain: UvDomain,
    pub tolerance: f64,
    /// Parametric tolerance per axis derived from `tolerance`.
    pub tolerance_uv: [f64; 2],
    /// Triangles are emitted clockwise in the parameter plane.
    pub back_facing: bool,
    pub has_thin_zones: bool,
    pub state: FaceMeshState,
    pub meshed: bool,
}

impl Face {
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.loops.iter().flat_map(|l| l.edges.iter().map(|oe| oe.edge))
    }

    #[must_use]
    pub fn external_loop(&self) -> Option<&Loop> {
        self.loops.iter().find(|l| l.external)
    }
}
