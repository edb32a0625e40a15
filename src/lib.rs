#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Tessellation of trimmed parametric faces.
//!
//! - [`geom`]: carrier surfaces (Bezier, NURBS, plane, cylinder), trimming
//!   curves and parameter-plane triangulation.
//! - [`topo`]: arena of surfaces, vertices, edges and faces with twin links.
//! - [`mesher`]: edge discretization, thin zones, sampling grid and the per-face
//!   pipeline, plus a wave scheduler for whole models.
//!
//! ```ignore
//! let mut model = TopoModel::new(1e-6);
//! let s = model.add_surface(surface);
//! model.add_polygon_face(s, &outer, &[])?;
//! let report = mesher::mesh_topology(&mut model, &MesherConfig::default())?;
//! println!("{}", report.diagnostics);
//! ```

pub mod geom;
pub mod mesher;
pub mod topo;
