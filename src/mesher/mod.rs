//! Tessellation of trimmed parametric faces.
//!
//! # Main Types
//!
//! - [`FaceMesher`]: runs the pipeline of one face and returns a
//!   [`FaceMeshOutcome`] to commit.
//! - [`MeshModel`]: global node registry and append-only mesh collection
//!   shared by face tasks.
//! - [`TaskGraph`]: twin-edge dependencies between faces, grouped in waves.
//! - [`MesherConfig`]: every tunable of the pipeline.
//!
//! [`mesh_topology`] meshes every face of a [`TopoModel`].

mod config;
mod criteria;
mod cutting;
mod diagnostics;
mod edge;
mod error;
mod face;
mod grid;
mod mesh_model;
mod metrics;
mod schedule;
mod thin_zone;
mod workspace;

pub use config::{MesherConfig, ThinZoneOptions};
pub use criteria::{MeshingCriteria, density_integral, density_quantiles, edge_crossings, face_crossings, select_cuts};
pub use cutting::{apply_spacing, find_crossings, merge_cutting_points};
pub use diagnostics::FaceMeshDiagnostics;
pub use edge::{EdgeDiscretizer, propagate_ids};
pub use error::{ErrorKind, MeshError};
pub use face::{FaceMeshOutcome, FaceMesher, mesh_face};
pub use grid::{NodeStatus, SamplingGrid};
pub use mesh_model::{EdgeMesh, FaceMesh, MeshModel};
pub use metrics::{MeshMetrics, MeshTimingReport, TimingBucket};
pub use schedule::{ScheduleError, TaskGraph};
pub use thin_zone::{ThinZone, ThinZoneAnalyzer, ThinZoneSide, element_size, order_zones};

use crate::topo::{FaceId, FaceMeshState, TopoModel};

/// Result of [`mesh_topology`].
#[derive(Debug)]
pub struct MeshReport {
    pub mesh: MeshModel,
    /// Final state of every face that was scheduled, in meshing order.
    pub faces: Vec<(FaceId, FaceMeshState)>,
    pub diagnostics: FaceMeshDiagnostics,
    pub wave_count: usize,
}

impl MeshReport {
    #[must_use]
    pub fn state_of(&self, face: FaceId) -> Option<FaceMeshState> {
        self.faces.iter().find(|(f, _)| *f == face).map(|(_, s)| *s)
    }
}

/// Mesh every unmeshed face of `model`.
///
/// Vertices get their global nodes first so faces that only touch at a vertex
/// agree on it. Faces then run wave by wave; outcomes of a wave are committed
/// in face order before the next wave starts.
pub fn mesh_topology(model: &mut TopoModel, config: &MesherConfig) -> Result<MeshReport, MeshError> {
    let mesh = MeshModel::new();
    pre_mesh_vertices(model, &mesh);

    let mut diagnostics = FaceMeshDiagnostics::new();
    let graph = TaskGraph::from_model(model);
    let waves = match graph.waves() {
        Ok(waves) => waves,
        Err(err) => {
            let warning = format!("{err}; meshing faces sequentially");
            log::warn!("{warning}");
            diagnostics.add_warning(warning);
            model.face_ids().filter(|f| !model[*f].meshed).map(|f| vec![f]).collect()
        }
    };
    log::info!("meshing {} faces in {} waves", graph.task_count(), waves.len());

    let mut faces = Vec::with_capacity(graph.task_count());
    for wave in &waves {
        let outcomes = {
            let mesher = FaceMesher::new(config, &mesh);
            schedule::run_wave(&mesher, model, wave)
        };
        for outcome in outcomes {
            let outcome = outcome?;
            faces.push((outcome.face, outcome.state));
            let face_diagnostics = outcome.commit(model, &mesh)?;
            diagnostics.merge(&face_diagnostics);
        }
    }

    log::info!("{}", diagnostics.summary());
    Ok(MeshReport { mesh, faces, diagnostics, wave_count: waves.len() })
}

fn pre_mesh_vertices(model: &mut TopoModel, mesh: &MeshModel) {
    for index in 0..model.vertex_count() {
        let Some(vertex) = model.vertex_mut(crate::topo::VertexId(index)) else {
            continue;
        };
        if vertex.mesh_id.is_none() {
            vertex.mesh_id = Some(mesh.register_node(vertex.point));
        }
    }
}
