//! Opt-in timing of the meshing pipeline.
//!
//! Timing is collected only when the `mesh_engine_metrics` feature is enabled
//! and the target is not WASM. Otherwise every call compiles to a plain closure
//! call and [`MeshMetrics::end`] returns `None`.
//!
//! ```ignore
//! let mut metrics = MeshMetrics::default();
//! metrics.begin();
//! let grid = metrics.time(TimingBucket::Grid, || build_grid(face));
//! if let Some(report) = metrics.end() {
//!     log::debug!("grid: {} ns", report.grid_ns);
//! }
//! ```

/// Pipeline phases with their own timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Cutting-point computation, merge and spacing of boundary edges.
    EdgeDiscretization,
    /// Thin-zone detection and side synchronization.
    ThinZones,
    /// Cutting parameters and point-cloud evaluation.
    Grid,
    /// Inside, close-to-loop and too-close classification of grid nodes.
    Classification,
    /// Constrained triangulation and point insertion.
    Triangulation,
    /// Writing face results back into the model.
    Commit,
}

/// Cumulative nanoseconds per bucket.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MeshTimingReport {
    pub edge_discretization_ns: u64,
    pub thin_zones_ns: u64,
    pub grid_ns: u64,
    pub classification_ns: u64,
    pub triangulation_ns: u64,
    pub commit_ns: u64,
}

impl MeshTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.edge_discretization_ns
            .saturating_add(self.thin_zones_ns)
            .saturating_add(self.grid_ns)
            .saturating_add(self.classification_ns)
            .saturating_add(self.triangulation_ns)
            .saturating_add(self.commit_ns)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    /// Add every bucket of `other` into `self`.
    pub fn accumulate(&mut self, other: &Self) {
        self.edge_discretization_ns = self.edge_discretization_ns.saturating_add(other.edge_discretization_ns);
        self.thin_zones_ns = self.thin_zones_ns.saturating_add(other.thin_zones_ns);
        self.grid_ns = self.grid_ns.saturating_add(other.grid_ns);
        self.classification_ns = self.classification_ns.saturating_add(other.classification_ns);
        self.triangulation_ns = self.triangulation_ns.saturating_add(other.triangulation_ns);
        self.commit_ns = self.commit_ns.saturating_add(other.commit_ns);
    }
}

/// Timing accumulator; a no-op unless metrics are compiled in.
#[derive(Debug, Default)]
pub struct MeshMetrics {
    #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
    report: MeshTimingReport,
}

impl MeshMetrics {
    pub fn begin(&mut self) {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            self.report = MeshTimingReport::default();
        }
    }

    #[must_use]
    pub fn end(&self) -> Option<MeshTimingReport> {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Run `f` and charge its duration to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            self.add_to_bucket(bucket, nanos);
            result
        }

        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
    fn add_to_bucket(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::EdgeDiscretization => &mut self.report.edge_discretization_ns,
            TimingBucket::ThinZones => &mut self.report.thin_zones_ns,
            TimingBucket::Grid => &mut self.report.grid_ns,
            TimingBucket::Classification => &mut self.report.classification_ns,
            TimingBucket::Triangulation => &mut self.report.triangulation_ns,
            TimingBucket::Commit => &mut self.report.commit_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}
