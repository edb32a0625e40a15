//! Model-wide mesh collection shared by concurrent face tasks.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::geom::{Point3, UvPoint, Vec3};
use crate::topo::{EdgeId, FaceId};

/// Triangle mesh of one face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceMesh {
    pub face: Option<FaceId>,
    pub positions: Vec<Point3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<UvPoint>,
    /// Counter-clockwise seen from the outward normal.
    pub triangles: Vec<[u32; 3]>,
    /// Global node id of each local vertex.
    pub global_ids: Vec<u32>,
}

impl FaceMesh {
    #[must_use]
    pub fn empty(face: FaceId) -> Self {
        Self { face: Some(face), ..Self::default() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Sum of triangle areas.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| self.positions[i as usize]);
                0.5 * (b - a).cross(c - a).length()
            })
            .sum()
    }

    /// Unit normal of triangle `index` from its winding.
    #[must_use]
    pub fn triangle_normal(&self, index: usize) -> Option<Vec3> {
        let [a, b, c] = self.triangles.get(index)?.map(|i| self.positions[i as usize]);
        (b - a).cross(c - a).normalized()
    }
}

/// Points and global ids along one discretized edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeMesh {
    pub edge: Option<EdgeId>,
    pub points: Vec<Point3>,
    pub node_ids: Vec<u32>,
}

#[derive(Debug, Default)]
struct Collection {
    faces: Vec<FaceMesh>,
    edges: HashMap<EdgeId, EdgeMesh>,
}

/// Append-only store of mesh nodes, face meshes and edge meshes.
///
/// Node ids are indices into the node registry; an id handed out once always
/// resolves to the same position.
#[derive(Debug, Default)]
pub struct MeshModel {
    nodes: Mutex<Vec<Point3>>,
    collection: Mutex<Collection>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // The guarded data stays consistent; every writer only appends.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MeshModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_node(&self, point: Point3) -> u32 {
        let mut nodes = lock(&self.nodes);
        nodes.push(point);
        (nodes.len() - 1) as u32
    }

    /// Register consecutive nodes; returns the id of the first one.
    pub fn register_nodes(&self, points: &[Point3]) -> u32 {
        let mut nodes = lock(&self.nodes);
        let first = nodes.len() as u32;
        nodes.extend_from_slice(points);
        first
    }

    #[must_use]
    pub fn node(&self, id: u32) -> Option<Point3> {
        lock(&self.nodes).get(id as usize).copied()
    }

    /// Positions of `ids`; unknown ids are skipped.
    #[must_use]
    pub fn node_positions(&self, ids: &[u32]) -> Vec<Point3> {
        let nodes = lock(&self.nodes);
        ids.iter().filter_map(|id| nodes.get(*id as usize).copied()).collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        lock(&self.nodes).len()
    }

    #[must_use]
    pub fn nodes(&self) -> Vec<Point3> {
        lock(&self.nodes).clone()
    }

    pub fn push_face_mesh(&self, mesh: FaceMesh) {
        lock(&self.collection).faces.push(mesh);
    }

    /// Store an edge mesh; returns `false` if the edge already has one.
    pub fn push_edge_mesh(&self, mesh: EdgeMesh) -> bool {
        let Some(edge) = mesh.edge else {
            return false;
        };
        let mut collection = lock(&self.collection);
        if collection.edges.contains_key(&edge) {
            return false;
        }
        collection.edges.insert(edge, mesh);
        true
    }

    #[must_use]
    pub fn face_mesh(&self, face: FaceId) -> Option<FaceMesh> {
        lock(&self.collection).faces.iter().find(|m| m.face == Some(face)).cloned()
    }

    #[must_use]
    pub fn face_meshes(&self) -> Vec<FaceMesh> {
        lock(&self.collection).faces.clone()
    }

    #[must_use]
    pub fn edge_mesh(&self, edge: EdgeId) -> Option<EdgeMesh> {
        lock(&self.collection).edges.get(&edge).cloned()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        lock(&self.collection).faces.iter().map(FaceMesh::triangle_count).sum()
    }
}
