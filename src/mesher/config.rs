use serde::{Deserialize, Serialize};

use super::criteria::MeshingCriteria;

/// Options of the thin-zone analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinZoneOptions {
    pub enabled: bool,
    /// Two boundary sides closer than `width_ratio` times the local element
    /// size form a thin zone.
    pub width_ratio: f64,
}

impl Default for ThinZoneOptions {
    fn default() -> Self {
        Self { enabled: true, width_ratio: 0.3 }
    }
}

/// Configuration handed to [`FaceMesher::new`](super::FaceMesher::new).
///
/// Every field has a default, so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesherConfig {
    /// Take the direct polygon path for geometrically planar carriers.
    pub detect_planar: bool,
    /// Smallest 3D distance under which two boundary points of an edge are
    /// fused. A larger face tolerance takes over.
    pub geometric_tolerance: f64,
    pub criteria: MeshingCriteria,
    /// Directional parity tests (out of 4) that must agree before a grid node
    /// is classified inside.
    pub inside_vote_threshold: u8,
    /// Grid nodes closer to the boundary than this fraction of their local
    /// cell size are discarded.
    pub close_to_loop_ratio: f64,
    pub thin_zones: ThinZoneOptions,
    pub max_cuts_per_axis: usize,
    /// Iso lines sampled per axis when evaluating the criteria over a face.
    pub iso_sample_lines: usize,
    /// Samples per iso line or per edge.
    pub crossing_samples: usize,
}

impl Default for MesherConfig {
    fn default() -> Self {
        Self {
            detect_planar: true,
            geometric_tolerance: 1e-6,
            criteria: MeshingCriteria::default(),
            inside_vote_threshold: 3,
            close_to_loop_ratio: 0.05,
            thin_zones: ThinZoneOptions::default(),
            max_cuts_per_axis: 256,
            iso_sample_lines: 5,
            crossing_samples: 32,
        }
    }
}

impl MesherConfig {
    /// Vote threshold clamped to a meaningful range.
    #[must_use]
    pub fn vote_threshold(&self) -> u8 {
        self.inside_vote_threshold.clamp(1, 4)
    }

    /// 3D merge distance used on the edges of a face with `face_tolerance`.
    #[must_use]
    pub fn edge_tolerance(&self, face_tolerance: f64) -> f64 {
        face_tolerance.max(self.geometric_tolerance)
    }

    /// Fine-grained configuration used when a mesh must follow a fixed size.
    #[must_use]
    pub fn with_max_edge_length(mut self, length: f64) -> Self {
        self.criteria.max_edge_length = Some(length);
        self
    }
}
