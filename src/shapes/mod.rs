//! Concrete implementations of the [`Shape`] contract. The
//! acceleration structure never looks past that contract, so the
//! shapes here are intentionally simple; a host renderer is free to
//! supply its own.
//!
//! - Cuboid
//! - Sphere
//! - Triangle
//!
//! [`Shape`]: crate::core::shape::Shape

pub mod cuboid;
pub mod sphere;
pub mod triangle;
