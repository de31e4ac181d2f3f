//! Interaction records carry the local geometry of a ray/shape
//! intersection out of the intersection routines. The acceleration
//! structure treats them as an opaque write sink; only shapes fill
//! them and only the shading layers of a host renderer read them.

// crate
use crate::core::geometry::{Normal3f, Point3f, Vector3f};

/// Geometry of a surface hit: position, surface normal, and the
/// outgoing direction (the negated ray direction).
#[derive(Debug, Default, Copy, Clone)]
pub struct SurfaceInteraction {
    pub p: Point3f,
    pub n: Normal3f,
    pub wo: Vector3f,
}
