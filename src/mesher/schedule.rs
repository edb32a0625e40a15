//! Ordering of face tasks.
//!
//! Faces sharing a twin edge form a dependency: the face meshed first fixes the
//! points of the shared edge and its twin copies them. Faces are grouped in
//! waves by Kahn's algorithm; faces of one wave are independent and may run
//! concurrently, and each wave is committed before the next one starts.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::topo::{FaceId, TopoModel};

use super::error::MeshError;
use super::face::{FaceMeshOutcome, FaceMesher};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("face dependencies contain a cycle through {0:?}")]
    Cycle(Vec<FaceId>),
}

/// Directed acyclic graph of face tasks.
#[derive(Debug, Default, Clone)]
pub struct TaskGraph {
    tasks: BTreeSet<FaceId>,
    /// Faces that wait for the key face.
    dependents: BTreeMap<FaceId, BTreeSet<FaceId>>,
}

impl TaskGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One task per unmeshed face; a twin edge across two faces makes the
    /// higher face id wait for the lower.
    #[must_use]
    pub fn from_model(model: &TopoModel) -> Self {
        let mut graph = Self::new();
        for id in model.face_ids() {
            if !model[id].meshed {
                graph.add_task(id);
            }
        }
        for id in model.face_ids() {
            for edge in model[id].edge_ids() {
                let Some(link) = model[edge].twin else {
                    continue;
                };
                let Some(other) = model[link.edge].face else {
                    continue;
                };
                if other != id && graph.tasks.contains(&id) && graph.tasks.contains(&other) {
                    graph.add_dependency(id.min(other), id.max(other));
                }
            }
        }
        graph
    }

    pub fn add_task(&mut self, face: FaceId) {
        self.tasks.insert(face);
    }

    /// `after` runs in a later wave than `before`.
    pub fn add_dependency(&mut self, before: FaceId, after: FaceId) {
        self.tasks.insert(before);
        self.tasks.insert(after);
        self.dependents.entry(before).or_default().insert(after);
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn dependents(&self, face: FaceId) -> Vec<FaceId> {
        self.dependents.get(&face).map(|d| d.iter().copied().collect()).unwrap_or_default()
    }

    /// Tasks grouped by depth, each wave sorted by face id.
    pub fn waves(&self) -> Result<Vec<Vec<FaceId>>, ScheduleError> {
        let mut indegree: BTreeMap<FaceId, usize> = self.tasks.iter().map(|t| (*t, 0)).collect();
        for after in self.dependents.values().flatten() {
            if let Some(count) = indegree.get_mut(after) {
                *count += 1;
            }
        }

        let mut wave: Vec<FaceId> = indegree.iter().filter_map(|(f, &n)| (n == 0).then_some(*f)).collect();
        let mut waves = Vec::new();
        let mut scheduled = 0;
        while !wave.is_empty() {
            let mut next = BTreeSet::new();
            for face in &wave {
                for after in self.dependents.get(face).into_iter().flatten() {
                    if let Some(count) = indegree.get_mut(after) {
                        *count -= 1;
                        if *count == 0 {
                            next.insert(*after);
                        }
                    }
                }
            }
            scheduled += wave.len();
            waves.push(wave);
            wave = next.into_iter().collect();
        }

        if scheduled == self.tasks.len() {
            return Ok(waves);
        }
        let remaining = indegree.into_iter().filter_map(|(f, n)| (n > 0).then_some(f)).collect();
        Err(ScheduleError::Cycle(remaining))
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        use rayon::prelude::*;

        /// Mesh every face of a wave in parallel; results keep the wave order.
        pub(crate) fn run_wave(
            mesher: &FaceMesher<'_>,
            model: &TopoModel,
            wave: &[FaceId],
        ) -> Vec<Result<FaceMeshOutcome, MeshError>> {
            wave.par_iter().map(|face| mesher.mesh(model, *face)).collect()
        }
    } else {
        /// Mesh every face of a wave in order.
        pub(crate) fn run_wave(
            mesher: &FaceMesher<'_>,
            model: &TopoModel,
            wave: &[FaceId],
        ) -> Vec<Result<FaceMeshOutcome, MeshError>> {
            wave.iter().map(|face| mesher.mesh(model, *face)).collect()
        }
    }
}
