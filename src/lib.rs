//! # rs_tracer
//!
//! [Rust][rust] crate implementing the ray intersection core of a
//! physically based ray tracer: a bounding volume hierarchy over
//! opaque shapes, built either top-down with the surface area
//! heuristic or bottom-up from Morton-sorted treelets, flattened into
//! a compact array and traversed iteratively for closest-hit and
//! shadow queries.
//!
//! The outer layers of a renderer (scene loading, cameras, film,
//! integrators, materials, lights) are deliberately absent; they
//! consume the intersection results through the [`Shape`] contract
//! and the [`BVHAccel`] queries.
//!
//! [rust]: https://www.rust-lang.org
//! [`Shape`]: crate::core::shape::Shape
//! [`BVHAccel`]: crate::accelerators::bvh::BVHAccel

pub mod accelerators;
pub mod core;
pub mod shapes;
