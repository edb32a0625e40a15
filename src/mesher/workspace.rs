use std::collections::BTreeMap;

use crate::topo::{EdgeId, EdgeMeshData, FaceId, TopoModel, VertexId};

use super::diagnostics::FaceMeshDiagnostics;
use super::mesh_model::MeshModel;

/// Private view of the model for one face task.
///
/// Reads fall through to the shared arena; writes land in an overlay returned
/// with the task outcome and committed later by the driver.
pub(crate) struct FaceWorkspace<'a> {
    pub model: &'a TopoModel,
    pub mesh: &'a MeshModel,
    pub face: FaceId,
    edges: BTreeMap<EdgeId, EdgeMeshData>,
    vertex_ids: BTreeMap<VertexId, u32>,
    pub diagnostics: FaceMeshDiagnostics,
}

impl<'a> FaceWorkspace<'a> {
    pub fn new(model: &'a TopoModel, mesh: &'a MeshModel, face: FaceId) -> Self {
        Self {
            model,
            mesh,
            face,
            edges: BTreeMap::new(),
            vertex_ids: BTreeMap::new(),
            diagnostics: FaceMeshDiagnostics::new(),
        }
    }

    pub fn edge_data(&self, edge: EdgeId) -> &EdgeMeshData {
        self.edges.get(&edge).unwrap_or(&self.model[edge].mesh)
    }

    pub fn edge_data_mut(&mut self, edge: EdgeId) -> &mut EdgeMeshData {
        let model = self.model;
        self.edges.entry(edge).or_insert_with(|| model[edge].mesh.clone())
    }

    /// Global id of a vertex, registering it on first use.
    pub fn vertex_mesh_id(&mut self, vertex: VertexId) -> u32 {
        if let Some(id) = self.model[vertex].mesh_id.or_else(|| self.vertex_ids.get(&vertex).copied()) {
            return id;
        }
        let id = self.mesh.register_node(self.model[vertex].point);
        self.vertex_ids.insert(vertex, id);
        id
    }

    pub fn into_parts(
        self,
    ) -> (Vec<(EdgeId, EdgeMeshData)>, Vec<(VertexId, u32)>, FaceMeshDiagnostics) {
        (self.edges.into_iter().collect(), self.vertex_ids.into_iter().collect(), self.diagnostics)
    }
}
