mod bezier;
pub mod bspline;
mod core;
mod curve;
mod nurbs;
mod surface;
mod triangulation;

pub use bezier::BezierSurface;
pub use core::{
    IsoAxis, Point3, UvDomain, UvPoint, Vec3, in_circle, orient2d,
    project_on_segment, signed_area,
};
pub use curve::{Curve2d, CurveSample};
pub use nurbs::NurbsSurface;
pub use surface::{
    CarrierSurface, CylinderSurface, DerivativeOrder, PlaneSurface, SurfaceError, SurfacePoint,
};
pub use triangulation::{
    ConstrainedTriangulation, TriangulationError, earclip_rings, triangulate_by_winding,
    winding_number,
};

#[cfg(test)]
mod tests;
