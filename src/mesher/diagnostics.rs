//! Per-face and per-batch meshing diagnostics.

use std::fmt;

use super::metrics::MeshTimingReport;

/// Counters and warnings collected while meshing faces.
///
/// A face task fills one instance; the batch driver merges them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FaceMeshDiagnostics {
    pub face_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Cutting points over all discretized edges.
    pub cutting_point_count: usize,
    pub grid_node_count: usize,
    pub inside_node_count: usize,
    pub close_to_loop_node_count: usize,
    /// Nodes discarded for sitting too close to the boundary.
    pub too_close_node_count: usize,
    pub thin_zone_count: usize,
    /// Triangles dropped because two corners share a global node.
    pub culled_triangle_count: usize,
    pub planar_face_count: usize,
    /// Faces whose planar triangulation fell back to the winding filter.
    pub winding_fallback_count: usize,
    pub degenerate_face_count: usize,
    pub aborted_face_count: usize,
    pub virtually_meshed_edge_count: usize,
    /// Edges whose twin id list had to be padded.
    pub padded_edge_count: usize,
    pub timing: Option<MeshTimingReport>,
    pub warnings: Vec<String>,
}

impl FaceMeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// No face failed and no fallback was needed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.degenerate_face_count == 0
            && self.aborted_face_count == 0
            && self.padded_edge_count == 0
            && self.winding_fallback_count == 0
            && self.warnings.is_empty()
    }

    #[must_use]
    pub fn failed_face_count(&self) -> usize {
        self.degenerate_face_count + self.aborted_face_count
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Sum counters, append warnings and accumulate timing.
    pub fn merge(&mut self, other: &Self) {
        self.face_count += other.face_count;
        self.vertex_count += other.vertex_count;
        self.triangle_count += other.triangle_count;
        self.cutting_point_count += other.cutting_point_count;
        self.grid_node_count += other.grid_node_count;
        self.inside_node_count += other.inside_node_count;
        self.close_to_loop_node_count += other.close_to_loop_node_count;
        self.too_close_node_count += other.too_close_node_count;
        self.thin_zone_count += other.thin_zone_count;
        self.culled_triangle_count += other.culled_triangle_count;
        self.planar_face_count += other.planar_face_count;
        self.winding_fallback_count += other.winding_fallback_count;
        self.degenerate_face_count += other.degenerate_face_count;
        self.aborted_face_count += other.aborted_face_count;
        self.virtually_meshed_edge_count += other.virtually_meshed_edge_count;
        self.padded_edge_count += other.padded_edge_count;
        self.warnings.extend(other.warnings.iter().cloned());
        if let Some(timing) = &other.timing {
            self.timing.get_or_insert_with(MeshTimingReport::default).accumulate(timing);
        }
    }

    /// One-line summary: `"F:{faces} V:{vertices} T:{triangles} [issues...]"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("F:{} V:{} T:{}", self.face_count, self.vertex_count, self.triangle_count)];
        if self.planar_face_count > 0 {
            parts.push(format!("planar:{}", self.planar_face_count));
        }
        if self.thin_zone_count > 0 {
            parts.push(format!("thin:{}", self.thin_zone_count));
        }
        if self.culled_triangle_count > 0 {
            parts.push(format!("culled:{}", self.culled_triangle_count));
        }
        if self.degenerate_face_count > 0 {
            parts.push(format!("degenerate:{}", self.degenerate_face_count));
        }
        if self.aborted_face_count > 0 {
            parts.push(format!("aborted:{}", self.aborted_face_count));
        }
        if self.virtually_meshed_edge_count > 0 {
            parts.push(format!("virtual-edges:{}", self.virtually_meshed_edge_count));
        }
        parts.join(" ")
    }
}

impl fmt::Display for FaceMeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Diagnostics:")?;
        writeln!(f, "  Faces: {} ({} planar)", self.face_count, self.planar_face_count)?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        writeln!(f, "  Cutting points: {}", self.cutting_point_count)?;
        writeln!(
            f,
            "  Grid nodes: {} (inside {}, close to loop {}, too close {})",
            self.grid_node_count, self.inside_node_count, self.close_to_loop_node_count, self.too_close_node_count
        )?;
        if self.thin_zone_count > 0 {
            writeln!(f, "  Thin zones: {}", self.thin_zone_count)?;
        }
        if self.culled_triangle_count > 0 {
            writeln!(f, "  Culled triangles: {}", self.culled_triangle_count)?;
        }
        if self.failed_face_count() > 0 {
            writeln!(f, "  Failed faces: {} degenerate, {} aborted", self.degenerate_face_count, self.aborted_face_count)?;
        }
        if self.virtually_meshed_edge_count > 0 || self.padded_edge_count > 0 {
            writeln!(
                f,
                "  Edge fallbacks: {} virtually meshed, {} padded",
                self.virtually_meshed_edge_count, self.padded_edge_count
            )?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        if let Some(timing) = &self.timing {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }
        writeln!(f, "  Status: {}", if self.is_clean() { "CLEAN" } else { "ISSUES DETECTED" })
    }
}
