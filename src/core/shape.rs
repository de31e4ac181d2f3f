//! The contract between geometry and everything that intersects it.
//! The acceleration structure is polymorphic over exactly this
//! capability set and never inspects a concrete shape.

// crate
use crate::core::geometry::{Bounds3f, Ray};
use crate::core::interaction::SurfaceInteraction;

pub trait Shape {
    /// Axis-aligned bound of the shape in world space.
    fn world_bound(&self) -> Bounds3f;
    /// Closest-hit query over the segment `(0, ray.t_max)`. On a hit,
    /// fills `isect` and shrinks `ray.t_max` to the hit parameter, so
    /// repeated calls against one ray converge on the nearest hit.
    fn intersect(&self, ray: &Ray, isect: &mut SurfaceInteraction) -> bool;
    /// Predicate form for shadow rays; leaves the ray untouched.
    fn intersect_p(&self, ray: &Ray) -> bool;
}
