//! A single triangle, intersected with the Moeller-Trumbore
//! algorithm. A production mesh representation would share vertex
//! arrays between faces; one standalone triangle is all the
//! intersection core needs from this crate.

// crate
use crate::core::defs::Float;
use crate::core::geometry::{vec3_cross_vec3, vec3_dot_vec3, vec3_normalize};
use crate::core::geometry::{bnd3_union_pnt3, Bounds3f, Point3f, Ray};
use crate::core::interaction::SurfaceInteraction;
use crate::core::shape::Shape;

#[derive(Debug, Copy, Clone)]
pub struct Triangle {
    pub p0: Point3f,
    pub p1: Point3f,
    pub p2: Point3f,
}

impl Triangle {
    pub fn new(p0: Point3f, p1: Point3f, p2: Point3f) -> Self {
        Triangle { p0, p1, p2 }
    }
    fn hit(&self, ray: &Ray) -> Option<Float> {
        let e1 = self.p1 - self.p0;
        let e2 = self.p2 - self.p0;
        let pvec = vec3_cross_vec3(&ray.d, &e2);
        let det = vec3_dot_vec3(&e1, &pvec);
        if det == 0.0 {
            return None;
        }
        let inv_det = 1.0 as Float / det;
        let tvec = ray.o - self.p0;
        let u = vec3_dot_vec3(&tvec, &pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = vec3_cross_vec3(&tvec, &e1);
        let v = vec3_dot_vec3(&ray.d, &qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = vec3_dot_vec3(&e2, &qvec) * inv_det;
        if t <= 0.0 || t > ray.t_max.get() {
            return None;
        }
        Some(t)
    }
}

impl Shape for Triangle {
    fn world_bound(&self) -> Bounds3f {
        bnd3_union_pnt3(&Bounds3f::new(self.p0, self.p1), &self.p2)
    }
    fn intersect(&self, ray: &Ray, isect: &mut SurfaceInteraction) -> bool {
        if let Some(t_hit) = self.hit(ray) {
            let e1 = self.p1 - self.p0;
            let e2 = self.p2 - self.p0;
            isect.p = ray.position(t_hit);
            isect.n = vec3_normalize(&vec3_cross_vec3(&e1, &e2));
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
    use crate::core::geometry::Vector3f;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn interior_hit() {
        let tri = unit_triangle();
        let ray = Ray::new(
            Point3f::new(0.25, 0.25, 1.0),
            Vector3f::new(0.0, 0.0, -1.0),
        );
        let mut isect = SurfaceInteraction::default();
        assert!(tri.intersect(&ray, &mut isect));
        assert!((ray.t_max.get() - 1.0).abs() < 1e-5);
        assert!((isect.n.z.abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn outside_barycentric_range_misses() {
        let tri = unit_triangle();
        let ray = Ray::new(
            Point3f::new(0.75, 0.75, 1.0),
            Vector3f::new(0.0, 0.0, -1.0),
        );
        assert!(!tri.intersect_p(&ray));
    }

    #[test]
    fn parallel_ray_misses() {
        let tri = unit_triangle();
        let ray = Ray::new(
            Point3f::new(0.25, 0.25, 1.0),
            Vector3f::new(1.0, 0.0, 0.0),
        );
        assert!(!tri.intersect_p(&ray));
    }

    #[test]
    fn world_bound_covers_vertices() {
        let b = unit_triangle().world_bound();
        assert_eq!(b.p_min, Point3f::new(0.0, 0.0, 0.0));
        assert_eq!(b.p_max, Point3f::new(1.0, 1.0, 0.0));
    }
}
