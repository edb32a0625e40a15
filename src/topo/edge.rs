use crate::geom::{Curve2d, Point3};

use super::{EdgeId, FaceId, VertexId};

/// Topological vertex with its model-space position.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub point: Point3,
    /// Global mesh node id once the vertex has been meshed.
    pub mesh_id: Option<u32>,
}

/// Origin tag of a cutting point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CuttingPointType {
    /// Edge extremity.
    Vertex,
    /// Forced by a twin edge or a thin-zone partner.
    Imposed,
    /// Intersection with an iso-U grid line.
    IsoU,
    /// Intersection with an iso-V grid line.
    IsoV,
    /// Intersection with both grid directions.
    IsoUV,
    /// Inserted by the spacing pass.
    Other,
}

impl CuttingPointType {
    #[must_use]
    pub const fn is_iso(self) -> bool {
        matches!(self, Self::IsoU | Self::IsoV | Self::IsoUV)
    }
}

/// A parameter on an edge that will become a mesh vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CuttingPoint {
    pub coordinate: f64,
    pub kind: CuttingPointType,
    /// Mesh nodes on the facing side this point was derived from.
    pub opposite_nodes: [Option<u32>; 2],
    /// Admissible delta; two points closer than the smaller delta are merged.
    pub delta: f64,
}

impl CuttingPoint {
    #[must_use]
    pub const fn new(coordinate: f64, kind: CuttingPointType, delta: f64) -> Self {
        Self { coordinate, kind, opposite_nodes: [None, None], delta }
    }

    #[must_use]
    pub const fn with_opposite(mut self, node: u32) -> Self {
        self.opposite_nodes = [Some(node), None];
        self
    }
}

/// Criteria samples along an edge: `coordinates` are increasing and
/// `delta_max[i]` is the admissible step on `[coordinates[i], coordinates[i + 1]]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeCrossings {
    pub coordinates: Vec<f64>,
    pub delta_max: Vec<f64>,
}

impl EdgeCrossings {
    /// Admissible delta at parameter `t`.
    #[must_use]
    pub fn delta_at(&self, t: f64) -> f64 {
        if self.delta_max.is_empty() {
            return f64::INFINITY;
        }
        let i = self.coordinates.partition_point(|c| *c <= t).saturating_sub(1);
        self.delta_max[i.min(self.delta_max.len() - 1)]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EdgeMeshState {
    #[default]
    NotMeshed,
    /// Provisional cutting points exist, no mesh nodes yet.
    PreMeshed,
    Meshed,
    /// Meshed from vertex ids only.
    VirtuallyMeshed,
}

impl EdgeMeshState {
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Meshed | Self::VirtuallyMeshed)
    }
}

/// Mutable meshing state of an edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeMeshData {
    pub state: EdgeMeshState,
    /// Near-zero 3D length (for example an edge collapsed on a pole).
    pub degenerate: bool,
    pub crossings: Option<EdgeCrossings>,
    pub imposed: Vec<CuttingPoint>,
    pub cutting: Vec<CuttingPoint>,
    /// Global mesh node id per cutting point.
    pub node_ids: Vec<u32>,
}

/// Link from an edge to the matching edge of the neighbouring face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwinLink {
    pub edge: EdgeId,
    /// Whether both edges run in the same direction in model space.
    pub same_direction: bool,
}

/// Edge of a face: a restriction curve in the surface parameter plane bounded to
/// `boundary`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub curve: Curve2d,
    pub boundary: (f64, f64),
    pub start: VertexId,
    pub end: VertexId,
    pub face: Option<FaceId>,
    pub twin: Option<TwinLink>,
    /// Approximate model-space length, set when the edge joins a face.
    pub length: f64,
    pub mesh: EdgeMeshData,
}

impl Edge {
    /// Map a parameter of this edge onto its twin, assuming both edges are
    /// parameterized proportionally to each other.
    #[must_use]
    pub fn map_to_twin(&self, t: f64, twin: &Self, same_direction: bool) -> f64 {
        let (a0, a1) = self.boundary;
        let (b0, b1) = twin.boundary;
        let s = if a1 > a0 { (t - a0) / (a1 - a0) } else { 0.0 };
        if same_direction { b0 + s * (b1 - b0) } else { b1 - s * (b1 - b0) }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.start.0 == self.end.0
    }
}
