//! Spheres are the simplest curved surface useful to a ray tracer
//! and a good starting point for general ray intersection routines.

// crate
use crate::core::defs::{quadratic, Float};
use crate::core::geometry::{vec3_dot_vec3, vec3_normalize};
use crate::core::geometry::{Bounds3f, Point3f, Ray, Vector3f};
use crate::core::interaction::SurfaceInteraction;
use crate::core::shape::Shape;

#[derive(Debug, Copy, Clone)]
pub struct Sphere {
    pub center: Point3f,
    pub radius: Float,
}

impl Sphere {
    pub fn new(center: Point3f, radius: Float) -> Self {
        Sphere { center, radius }
    }
    /// Nearest intersection parameter in `(0, ray.t_max)`, if any.
    fn hit(&self, ray: &Ray) -> Option<Float> {
        let oc: Vector3f = ray.o - self.center;
        let a: Float = vec3_dot_vec3(&ray.d, &ray.d);
        let b: Float = 2.0 * vec3_dot_vec3(&oc, &ray.d);
        let c: Float = vec3_dot_vec3(&oc, &oc) - self.radius * self.radius;
        let mut t0: Float = 0.0;
        let mut t1: Float = 0.0;
        if !quadratic(a, b, c, &mut t0, &mut t1) {
            return None;
        }
        // check quadric shape _t0_ and _t1_ for nearest intersection
        if t0 > ray.t_max.get() || t1 <= 0.0 {
            return None;
        }
        let mut t_hit: Float = t0;
        if t_hit <= 0.0 {
            t_hit = t1;
            if t_hit > ray.t_max.get() {
                return None;
            }
        }
        Some(t_hit)
    }
}

impl Shape for Sphere {
    fn world_bound(&self) -> Bounds3f {
        let r = Vector3f::new(self.radius, self.radius, self.radius);
        Bounds3f::new(self.center - r, self.center + r)
    }
    fn intersect(&self, ray: &Ray, isect: &mut SurfaceInteraction) -> bool {
        if let Some(t_hit) = self.hit(ray) {
            let p = ray.position(t_hit);
            isect.p = p;
            isect.n = vec3_normalize(&(p - self.center));
            isect.wo = -ray.d;
            ray.t_max.set(t_hit);
            true
        } else {
            false
        }
    }
    fn intersect_p(&self, ray: &Ray) -> bool {
        self.hit(ray).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontal_hit_shrinks_t_max() {
        let sphere = Sphere::new(Point3f::new(0.0, 0.0, 0.0), 1.0);
        let ray = Ray::new(Point3f::new(0.0, 0.0, -3.0), Vector3f::new(0.0, 0.0, 1.0));
        let mut isect = SurfaceInteraction::default();
        assert!(sphere.intersect(&ray, &mut isect));
        assert!((ray.t_max.get() - 2.0).abs() < 1e-5);
        assert!((isect.n.z - (-1.0)).abs() < 1e-5);
    }

    #[test]
    fn ray_from_inside_hits_far_wall() {
        let sphere = Sphere::new(Point3f::new(0.0, 0.0, 0.0), 1.0);
        let ray = Ray::new(Point3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 0.0, 1.0));
        let mut isect = SurfaceInteraction::default();
        assert!(sphere.intersect(&ray, &mut isect));
        assert!((ray.t_max.get() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn miss_leaves_ray_untouched() {
        let sphere = Sphere::new(Point3f::new(0.0, 5.0, 0.0), 1.0);
        let ray = Ray::new(Point3f::new(0.0, 0.0, -3.0), Vector3f::new(0.0, 0.0, 1.0));
        let mut isect = SurfaceInteraction::default();
        assert!(!sphere.intersect(&ray, &mut isect));
        assert!(ray.t_max.get().is_infinite());
        assert!(!sphere.intersect_p(&ray));
    }

    #[test]
    fn sphere_behind_origin_is_missed() {
        let sphere = Sphere::new(Point3f::new(0.0, 0.0, -5.0), 1.0);
        let ray = Ray::new(Point3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 0.0, 1.0));
        assert!(!sphere.intersect_p(&ray));
    }
}
