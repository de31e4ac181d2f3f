//! An axis-aligned box shape. Intersection is the bounding-box slab
//! test itself, which makes cuboids a convenient primitive for
//! exercising the acceleration structure: the shape hit and the
//! bound hit agree exactly.

// crate
use crate::core::defs::Float;
use crate::core::geometry::{Bounds3f, Point3f, Ray, Vector3f};
use crate::core::interaction::SurfaceInteraction;
use crate::core::shape::Shape;

#[derive(Debug, Copy, Clone)]
pub struct Cuboid {
    pub bounds: Bounds3f,
}

impl Cuboid {
    pub fn new(p1: Point3f, p2: Point3f) -> Self {
        Cuboid {
            bounds: Bounds3f::new(p1, p2),
        }
    }
    fn hit(&self, ray: &Ray) -> Option<Float> {
        let mut t0: Float = 0.0;
        let mut t1: Float = 0.0;
        if !self.bounds.intersect_b(ray, &mut t0, &mut t1) {
            return None;
        }
        // entry point if the origin is outside, exit point if inside
        let t_hit = if t0 > 0.0 { t0 } else { t1 };
        if t_hit <= 0.0 {
            return None;
        }
        Some(t_hit)
    }
}

impl Shape for Cuboid {
    fn world_bound(&self) -> Bounds3f {
        self.bounds
    }
    fn intersect(&self, ray: &Ray, isect: &mut SurfaceInteraction) -> bool {
        if let Some(t_hit) = self.hit(ray) {
            let p = ray.position(t_hit);
            // face normal from the nearest slab plane
            let mut axis = 0;
            let mut sign: Float = -1.0;
            let mut best: Float = f32::MAX;
            for i in 0..3 {
                let d_min = (p[i] - self.bounds.p_min[i]).abs();
                let d_max = (p[i] - self.bounds.p_max[i]).abs();
                if d_min < best {
                    best = d_min;
                    axis = i;
                    sign = -1.0;
                }
                if d_max < best {
                    best = d_max;
                    axis = i;
                    sign = 1.0;
                }
            }
            let mut n = Vector3f::default();
            n[axis] = sign;
            isect.p = p;
            isect.n = n;
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

    fn unit_cube() -> Cuboid {
        Cuboid::new(Point3f::new(0.0, 0.0, 0.0), Point3f::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn entry_face_hit() {
        let cube = unit_cube();
        let ray = Ray::new(Point3f::new(0.5, 0.5, -2.0), Vector3f::new(0.0, 0.0, 1.0));
        let mut isect = SurfaceInteraction::default();
        assert!(cube.intersect(&ray, &mut isect));
        assert!((ray.t_max.get() - 2.0).abs() < 1e-4);
        assert!((isect.n.z - (-1.0)).abs() < 1e-5);
    }

    #[test]
    fn origin_inside_exits_through_far_face() {
        let cube = unit_cube();
        let ray = Ray::new(Point3f::new(0.5, 0.5, 0.5), Vector3f::new(0.0, 0.0, 1.0));
        let mut isect = SurfaceInteraction::default();
        assert!(cube.intersect(&ray, &mut isect));
        assert!((ray.t_max.get() - 0.5).abs() < 1e-4);
        assert!((isect.n.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn box_behind_origin_misses() {
        let cube = unit_cube();
        let ray = Ray::new(Point3f::new(0.5, 0.5, 3.0), Vector3f::new(0.0, 0.0, 1.0));
        assert!(!cube.intersect_p(&ray));
    }

    #[test]
    fn negative_direction_hit() {
        let cube = unit_cube();
        let ray = Ray::new(Point3f::new(0.5, 0.5, 3.0), Vector3f::new(0.0, 0.0, -1.0));
        let mut isect = SurfaceInteraction::default();
        assert!(cube.intersect(&ray, &mut isect));
        assert!((ray.t_max.get() - 2.0).abs() < 1e-4);
        assert!((isect.n.z - 1.0).abs() < 1e-5);
    }
}
